use super::normalize::normalize;
use super::queue::NotificationQueue;
use crate::error::{ApiError, ConsoleError};
use crate::session::{Resource, SessionStore};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Routes failures of ambient operations: rejected credentials end the
/// session of the resource the call was scoped to, everything else becomes
/// a queued notification.
pub struct Notifier {
    session: Arc<SessionStore>,
    queue: Mutex<NotificationQueue>,
}

impl Notifier {
    pub fn new(session: Arc<SessionStore>, dismiss_delay: Duration) -> Self {
        Self {
            session,
            queue: Mutex::new(NotificationQueue::new(dismiss_delay)),
        }
    }

    fn queue(&self) -> MutexGuard<'_, NotificationQueue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn report(&self, scope: Resource, err: &ApiError) {
        if err.is_unauthorized() {
            self.session.handle_unauthorized(scope).await;
            return;
        }
        if let Some(message) = normalize(err) {
            tracing::warn!(%scope, "{message}");
            self.queue().push(message);
        }
    }

    /// Like [`Notifier::report`], for errors that may not come from the
    /// backend at all.
    pub async fn report_error(&self, scope: Resource, err: &ConsoleError) {
        match err.api() {
            Some(api) => self.report(scope, api).await,
            None => self.push(err.to_string()),
        }
    }

    pub fn push(&self, message: impl Into<String>) {
        self.queue().push(message);
    }

    pub fn current(&self) -> Option<String> {
        self.queue().current(Instant::now()).map(ToOwned::to_owned)
    }

    pub fn dismiss(&self) -> bool {
        self.queue().dismiss(Instant::now())
    }

    pub fn drain(&self) -> Vec<String> {
        self.queue().drain()
    }

    pub fn pending(&self) -> usize {
        self.queue().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Backend;
    use crate::api::memory::MemoryBackend;
    use crate::error::PolicyError;

    async fn notifier() -> (Arc<SessionStore>, Notifier) {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .accept_token(Resource::Policy, "p")
            .accept_token(Resource::Deliberation, "d");
        let session = Arc::new(SessionStore::new(backend as Arc<dyn Backend>));
        session.login(Resource::Policy, "p").await.unwrap();
        session.login(Resource::Deliberation, "d").await.unwrap();
        let notifier = Notifier::new(Arc::clone(&session), Duration::from_millis(0));
        (session, notifier)
    }

    #[tokio::test]
    async fn unauthorized_logs_out_instead_of_notifying() {
        let (session, notifier) = notifier().await;

        notifier
            .report(Resource::Policy, &ApiError::http(401, "Unauthorized", ""))
            .await;

        assert_eq!(notifier.pending(), 0);
        assert!(!session.authenticated(Resource::Policy));
        assert!(session.authenticated(Resource::Deliberation));
    }

    #[tokio::test]
    async fn other_failures_are_queued() {
        let (session, notifier) = notifier().await;

        notifier
            .report(Resource::Policy, &ApiError::http(500, "Internal Server Error", ""))
            .await;

        assert_eq!(
            notifier.current().as_deref(),
            Some("Call returned invalid statuscode: 500 (Internal Server Error)")
        );
        assert!(session.authenticated(Resource::Policy));
    }

    #[tokio::test]
    async fn non_api_errors_use_their_display() {
        let (_session, notifier) = notifier().await;

        notifier
            .report_error(Resource::Policy, &PolicyError::IncompleteDraft.into())
            .await;

        assert_eq!(
            notifier.drain(),
            vec!["policy: draft needs both content and a version description".to_string()]
        );
    }
}
