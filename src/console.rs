//! Wires the backend, session store, notifier, policy manager, workflow
//! editor and deliberation composer into one handle.

use crate::api::http_client::build_backend_client_with;
use crate::api::{Backend, HttpBackend};
use crate::config::Config;
use crate::deliberation::{self, Composer, Outcome};
use crate::error::{ApiError, ConsoleError};
use crate::notify::{Notifier, normalize};
use crate::policy::PolicyManager;
use crate::session::{Resource, SessionSnapshot, SessionStore};
use crate::workflow::{WorkflowCatalogue, WorkflowEditor};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub struct Console {
    config: Config,
    backend: Arc<dyn Backend>,
    session: Arc<SessionStore>,
    notifier: Arc<Notifier>,
    policies: PolicyManager,
    workflow: WorkflowEditor,
    composer: Mutex<Composer>,
}

impl Console {
    /// Console talking HTTP to `config.backend_url`.
    pub fn new(config: Config) -> Self {
        let client = build_backend_client_with(&config.transport);
        let backend = Arc::new(HttpBackend::with_client(&config.backend_url, client));
        Self::with_backend(config, backend)
    }

    pub fn with_backend(config: Config, backend: Arc<dyn Backend>) -> Self {
        let session = Arc::new(SessionStore::new(Arc::clone(&backend)));
        let notifier = Arc::new(Notifier::new(
            Arc::clone(&session),
            config.notifications.dismiss_delay(),
        ));
        let policies = PolicyManager::new(
            Arc::clone(&backend),
            Arc::clone(&session),
            Arc::clone(&notifier),
        );
        let workflow = WorkflowEditor::new(Arc::clone(&backend));
        tracing::debug!(backend = backend.name(), "console assembled");
        Self {
            config,
            backend,
            session,
            notifier,
            policies,
            workflow,
            composer: Mutex::new(Composer::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn policies(&self) -> &PolicyManager {
        &self.policies
    }

    pub fn workflow(&self) -> &WorkflowEditor {
        &self.workflow
    }

    pub fn composer(&self) -> MutexGuard<'_, Composer> {
        self.composer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, err: &ApiError) {
        if let Some(message) = normalize(err) {
            tracing::warn!("{message}");
            self.notifier.push(message);
        }
    }

    /// Read the session state, then open sessions for configured tokens the
    /// backend does not already hold.
    pub async fn start(&self) -> Result<SessionSnapshot, ConsoleError> {
        if let Err(err) = self.session.refresh().await {
            self.notify(&err);
            return Err(err.into());
        }
        for resource in Resource::ALL {
            if self.session.authenticated(resource) {
                continue;
            }
            let Some(token) = self.config.token_for(resource) else {
                continue;
            };
            if let Err(err) = self.session.login(resource, token).await {
                tracing::warn!(%resource, "configured token was not accepted: {err}");
                if let Some(api) = err.api() {
                    self.notify(api);
                }
            }
        }
        Ok(self.session.snapshot())
    }

    pub async fn login(&self, resource: Resource, token: &str) -> Result<(), ConsoleError> {
        self.session.login(resource, token).await?;
        if resource == Resource::Policy && self.session.authenticated(resource) {
            if let Err(err) = self.policies.refresh().await {
                tracing::debug!("policy refresh after login failed: {err}");
            }
        }
        Ok(())
    }

    pub async fn logout(&self, resource: Resource) -> Result<(), ConsoleError> {
        self.session.logout(resource).await
    }

    /// Replace the workflow source. Held task selections are dropped along
    /// with the catalogue they pointed into; re-setting the same text keeps
    /// both.
    pub fn set_workflow_source(&self, source: impl Into<String>) -> u64 {
        let before = self.workflow.revision();
        let revision = self.workflow.set_source(source);
        if revision != before {
            self.composer().reset_selection();
        }
        revision
    }

    pub async fn compile_workflow(&self) -> Result<Option<WorkflowCatalogue>, ConsoleError> {
        match self.workflow.compile().await {
            Ok(catalogue) => Ok(catalogue),
            Err(err) => {
                match err.api() {
                    Some(api) => self.notifier.report(Resource::Deliberation, api).await,
                    None => self.notifier.push(err.to_string()),
                }
                Err(err)
            }
        }
    }

    /// Build the request from the composer's choices and submit it.
    pub async fn deliberate(&self) -> Result<Outcome, ConsoleError> {
        self.session.require(Resource::Deliberation)?;
        let catalogue = self.workflow.catalogue();
        let request = self.composer().build(catalogue.as_ref())?;
        Ok(deliberation::execute(self.backend.as_ref(), &self.session, &request).await)
    }

    pub fn drain_notifications(&self) -> Vec<String> {
        self.notifier.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::{MemoryBackend, MemoryOp};
    use crate::api::types::WorkflowConversion;
    use crate::deliberation::DeliberationKind;
    use crate::workflow::Workflow;
    use serde_json::json;

    fn config() -> Config {
        let mut config = Config::default();
        config.auth.policy_token = Some("p".into());
        config.auth.deliberation_token = Some("d".into());
        config
    }

    fn backend() -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .accept_token(Resource::Policy, "p")
            .accept_token(Resource::Deliberation, "d")
            .register_workflow(
                "wf",
                WorkflowConversion {
                    workflow: Workflow::from_value(json!({
                        "graph": [{"kind": "nod", "t": 0}],
                        "table": {"tasks": [{"d": {"n": "run"}}]}
                    }))
                    .unwrap(),
                    tasks: Vec::new(),
                    results: Vec::new(),
                },
            );
        backend
    }

    #[tokio::test]
    async fn start_logs_in_with_configured_tokens() {
        let backend = backend();
        let console = Console::with_backend(config(), Arc::clone(&backend) as Arc<dyn Backend>);

        let snapshot = console.start().await.unwrap();

        assert!(snapshot.policy);
        assert!(snapshot.deliberation);
    }

    #[tokio::test]
    async fn start_reports_unreachable_backend() {
        let backend = backend();
        backend.fail_next(MemoryOp::AuthData, ApiError::network("connection refused"));
        let console = Console::with_backend(config(), Arc::clone(&backend) as Arc<dyn Backend>);

        assert!(console.start().await.is_err());
        assert_eq!(console.drain_notifications(), vec!["connection refused"]);
    }

    #[tokio::test]
    async fn editing_the_workflow_resets_the_task_selection() {
        let backend = backend();
        let console = Console::with_backend(config(), Arc::clone(&backend) as Arc<dyn Backend>);
        console.set_workflow_source("wf");
        console.compile_workflow().await.unwrap();
        console.composer().select_task(Some(0));

        console.set_workflow_source("wf2");

        assert_eq!(console.composer().task(), None);
        assert!(console.workflow().catalogue().is_none());
    }

    #[tokio::test]
    async fn unchanged_source_keeps_the_task_selection() {
        let backend = backend();
        let console = Console::with_backend(config(), Arc::clone(&backend) as Arc<dyn Backend>);
        let revision = console.set_workflow_source("wf");
        console.compile_workflow().await.unwrap();
        console.composer().select_task(Some(0));

        assert_eq!(console.set_workflow_source("wf"), revision);

        assert_eq!(console.composer().task(), Some(0));
        assert!(console.workflow().catalogue().is_some());
    }

    #[tokio::test]
    async fn deliberate_requires_a_session() {
        let backend = backend();
        let console = Console::with_backend(Config::default(), Arc::clone(&backend) as Arc<dyn Backend>);
        console.start().await.unwrap();

        assert!(matches!(
            console.deliberate().await,
            Err(ConsoleError::Session(_))
        ));
    }

    #[tokio::test]
    async fn deliberate_submits_the_composed_request() {
        let backend = backend();
        let console = Console::with_backend(config(), Arc::clone(&backend) as Arc<dyn Backend>);
        console.start().await.unwrap();
        console.set_workflow_source("wf");
        console.compile_workflow().await.unwrap();
        console.composer().select_task(Some(0));

        let outcome = console.deliberate().await.unwrap();

        assert!(!outcome.is_failure());
        let sent = backend.deliberations();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, DeliberationKind::Task);
        assert_eq!(sent[0].1["task_id"], json!(["<main>", 0]));
    }

    #[tokio::test]
    async fn failed_compile_is_queued() {
        let backend = backend();
        let console = Console::with_backend(config(), Arc::clone(&backend) as Arc<dyn Backend>);
        console.set_workflow_source("unknown");

        assert!(console.compile_workflow().await.is_err());
        assert_eq!(
            console.drain_notifications(),
            vec!["Failed to compile input workflow"]
        );
    }
}
