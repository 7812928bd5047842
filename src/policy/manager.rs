use super::types::{
    Draft, NEW_VERSION, Policy, Selection, Syntax, canonical_json, canonical_value,
};
use crate::api::Backend;
use crate::api::traits::ApiResult;
use crate::api::types::{CodeFormat, ConnectorInfo, NewPolicy, PolicyContentEntry, PolicyVersion};
use crate::error::{ConsoleError, PolicyError};
use crate::notify::Notifier;
use crate::session::{Resource, SessionStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct PolicyState {
    /// Committed versions in backend order, newest first.
    committed: Vec<i64>,
    draft: Option<Draft>,
    /// Bumped whenever the draft is opened, edited or discarded.
    draft_revision: u64,
    selection: Selection,
    active: Option<i64>,
    policies: HashMap<i64, Policy>,
    connector: Option<ConnectorInfo>,
    list_generation: u64,
    active_generation: u64,
}

/// Owns the policy version list, the open draft, the selection and the
/// active-version pointer.
///
/// The active pointer is only ever written from a backend read. Backend
/// failures are reported through the [`Notifier`] as well as returned.
pub struct PolicyManager {
    backend: Arc<dyn Backend>,
    session: Arc<SessionStore>,
    notifier: Arc<Notifier>,
    state: Mutex<PolicyState>,
}

impl PolicyManager {
    pub fn new(
        backend: Arc<dyn Backend>,
        session: Arc<SessionStore>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            backend,
            session,
            notifier,
            state: Mutex::new(PolicyState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, PolicyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn reported<T>(&self, result: ApiResult<T>) -> Result<T, ConsoleError> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => {
                self.notifier.report(Resource::Policy, &err).await;
                Err(err.into())
            }
        }
    }

    fn gate(&self) -> Result<(), ConsoleError> {
        self.session.require(Resource::Policy)?;
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Version list as shown: the open draft first, then committed versions.
    pub fn list(&self) -> Vec<PolicyVersion> {
        let state = self.state();
        state
            .draft
            .as_ref()
            .map(|_| PolicyVersion {
                version: NEW_VERSION,
            })
            .into_iter()
            .chain(
                state
                    .committed
                    .iter()
                    .map(|&version| PolicyVersion { version }),
            )
            .collect()
    }

    pub fn selection(&self) -> Selection {
        self.state().selection
    }

    /// The committed policy currently selected, once fetched.
    pub fn selected_policy(&self) -> Option<Policy> {
        let state = self.state();
        match state.selection {
            Selection::Committed(version) => state.policies.get(&version).cloned(),
            Selection::None | Selection::Draft => None,
        }
    }

    pub fn draft(&self) -> Option<Draft> {
        self.state().draft.clone()
    }

    /// Last active version read from the backend.
    pub fn active_version(&self) -> Option<i64> {
        self.state().active
    }

    // ── Refresh ──────────────────────────────────────────────────

    /// Re-read the version list and the active pointer.
    pub async fn refresh(&self) -> Result<(), ConsoleError> {
        let listed = self.refresh_list().await;
        let active = self.refresh_active().await;
        listed?;
        active?;
        Ok(())
    }

    /// Re-read the committed versions. The selection moves to the first
    /// listed entry.
    pub async fn refresh_list(&self) -> Result<Vec<PolicyVersion>, ConsoleError> {
        let generation = {
            let mut state = self.state();
            state.list_generation += 1;
            state.list_generation
        };
        let versions = self.reported(self.backend.list_policies().await).await?;

        {
            let mut state = self.state();
            if state.list_generation != generation {
                tracing::warn!("discarding outdated policy list");
                drop(state);
                return Ok(self.list());
            }
            state.committed = versions
                .iter()
                .map(|entry| entry.version)
                .filter(|&version| version != NEW_VERSION)
                .collect();
        }

        let list = self.list();
        self.state().selection = list.first().copied().map_or(Selection::None, Selection::of);
        tracing::debug!(versions = list.len(), "policy list refreshed");
        Ok(list)
    }

    /// Re-read the active pointer.
    pub async fn refresh_active(&self) -> Result<Option<i64>, ConsoleError> {
        let generation = {
            let mut state = self.state();
            state.active_generation += 1;
            state.active_generation
        };
        let active = self
            .reported(self.backend.get_active_version().await)
            .await?;

        let mut state = self.state();
        if state.active_generation != generation {
            tracing::warn!("discarding outdated active version");
            return Ok(state.active);
        }
        state.active = active;
        Ok(active)
    }

    /// Reasoner connector description, fetched once.
    pub async fn connector_info(&self) -> Result<ConnectorInfo, ConsoleError> {
        if let Some(info) = self.state().connector.clone() {
            return Ok(info);
        }
        let info = self.reported(self.backend.connector_info().await).await?;
        self.state().connector = Some(info.clone());
        Ok(info)
    }

    // ── Selection ────────────────────────────────────────────────

    /// Select a version. Committed versions are fetched with both content
    /// renderings unless already known; `Ok(None)` means the draft was
    /// selected or the selection moved on while fetching.
    pub async fn select(&self, version: i64) -> Result<Option<Policy>, ConsoleError> {
        if version == NEW_VERSION {
            let mut state = self.state();
            if state.draft.is_none() {
                return Err(PolicyError::NoDraft.into());
            }
            state.selection = Selection::Draft;
            return Ok(None);
        }
        if version <= 0 {
            return Err(PolicyError::UnknownVersion(version).into());
        }

        {
            let mut state = self.state();
            state.selection = Selection::Committed(version);
            if let Some(policy) = state.policies.get(&version) {
                return Ok(Some(policy.clone()));
            }
        }

        let policy = self.fetch(version).await?;
        let mut state = self.state();
        state.policies.insert(version, policy.clone());
        if state.selection != Selection::Committed(version) {
            tracing::debug!(version, "selection moved on while fetching policy");
            return Ok(None);
        }
        Ok(Some(policy))
    }

    async fn fetch(&self, version: i64) -> Result<Policy, ConsoleError> {
        let record = self
            .reported(self.backend.get_policy(version).await)
            .await?;
        let entry = record
            .content
            .first()
            .ok_or_else(|| PolicyError::Malformed {
                what: "policy",
                message: format!("version {version} has no reasoner content"),
            })?;
        let json_content = canonical_value(&entry.content)?;
        let content = self
            .reported(
                self.backend
                    .convert(CodeFormat::EFlintJson, CodeFormat::EFlint, &json_content)
                    .await,
            )
            .await?;
        Ok(Policy::from_record(&record, content, json_content)?)
    }

    // ── Drafts ───────────────────────────────────────────────────

    /// Open the draft, seeded from `parent` when given, and select it.
    pub fn start_draft(&self, parent: Option<&Policy>) -> Result<(), PolicyError> {
        let mut state = self.state();
        if state.draft.is_some() {
            return Err(PolicyError::DraftAlreadyOpen);
        }
        state.draft = Some(Draft::seeded(parent));
        state.draft_revision += 1;
        state.selection = Selection::Draft;
        tracing::info!(seeded_from = parent.map(|p| p.version), "draft opened");
        Ok(())
    }

    pub fn update_draft(&self, edit: impl FnOnce(&mut Draft)) -> Result<(), PolicyError> {
        let mut state = self.state();
        let draft = state.draft.as_mut().ok_or(PolicyError::NoDraft)?;
        edit(draft);
        state.draft_revision += 1;
        Ok(())
    }

    pub fn discard_draft(&self) -> Result<Draft, PolicyError> {
        let mut state = self.state();
        let draft = state.draft.take().ok_or(PolicyError::NoDraft)?;
        state.draft_revision += 1;
        if state.selection == Selection::Draft {
            state.selection = state
                .committed
                .first()
                .map_or(Selection::None, |&version| Selection::Committed(version));
        }
        Ok(draft)
    }

    /// Commit the open draft as a new version.
    ///
    /// On success the draft is gone and the newest committed version is
    /// returned and selected. A draft edited while the commit was in flight is
    /// kept. On failure the draft is kept exactly as it was. `Ok(None)` means
    /// the version was stored but the list could not be re-read.
    pub async fn commit(&self) -> Result<Option<i64>, ConsoleError> {
        let (draft, revision) = {
            let state = self.state();
            let draft = state.draft.clone().ok_or(PolicyError::NoDraft)?;
            (draft, state.draft_revision)
        };
        if !draft.is_complete() {
            return Err(PolicyError::IncompleteDraft.into());
        }
        self.gate()?;

        let info = self.connector_info().await?;
        let json = match draft.syntax {
            Syntax::Json => canonical_json(&draft.content)?,
            Syntax::EFlint => {
                let converted = self
                    .reported(
                        self.backend
                            .convert(CodeFormat::EFlint, CodeFormat::EFlintJson, &draft.content)
                            .await,
                    )
                    .await?;
                canonical_json(&converted)?
            }
        };
        let content: serde_json::Value = serde_json::from_str(&json)
            .map_err(|err| PolicyError::InvalidContent(err.to_string()))?;

        let body = NewPolicy {
            description: draft.description.clone(),
            version_description: draft.version_description.clone(),
            content: vec![PolicyContentEntry {
                reasoner: info.context.kind.clone(),
                reasoner_version: info.context.version.clone(),
                content,
            }],
        };
        self.reported(self.backend.add_policy(&body).await).await?;

        {
            let mut state = self.state();
            if state.draft_revision == revision {
                state.draft = None;
                state.draft_revision += 1;
                if state.selection == Selection::Draft {
                    state.selection = Selection::None;
                }
            } else {
                tracing::info!("draft changed during commit, keeping it open");
            }
        }
        tracing::info!(message = %draft.version_description, "draft committed");

        if let Err(err) = self.refresh_list().await {
            tracing::warn!("policy list refresh after commit failed: {err}");
            return Ok(None);
        }
        Ok(self.state().committed.first().copied())
    }

    // ── Activation ───────────────────────────────────────────────

    /// Make `version` the active policy, then re-read the pointer.
    pub async fn activate(&self, version: i64) -> Result<Option<i64>, ConsoleError> {
        if version <= 0 {
            return Err(PolicyError::UnknownVersion(version).into());
        }
        self.gate()?;
        self.reported(self.backend.activate_version(version).await)
            .await?;
        tracing::info!(version, "policy activated");
        self.refresh_active().await
    }

    /// Clear the active policy, then re-read the pointer.
    pub async fn deactivate(&self) -> Result<Option<i64>, ConsoleError> {
        self.gate()?;
        self.reported(self.backend.deactivate_version().await)
            .await?;
        tracing::info!("policy deactivated");
        self.refresh_active().await
    }

    /// Deactivate when the selected version is the active one, else
    /// activate the selection.
    pub async fn toggle_activation(&self) -> Result<Option<i64>, ConsoleError> {
        let (selection, active) = {
            let state = self.state();
            (state.selection, state.active)
        };
        match selection {
            Selection::Committed(version) if active == Some(version) => self.deactivate().await,
            Selection::Committed(version) => self.activate(version).await,
            Selection::None | Selection::Draft => Err(PolicyError::NothingSelected.into()),
        }
    }
}
