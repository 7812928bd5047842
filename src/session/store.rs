use super::types::{Resource, SessionSnapshot};
use crate::api::Backend;
use crate::api::types::AuthData;
use crate::error::{ApiError, ConsoleError, SessionError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default, Clone)]
struct ResourceState {
    credential: Option<String>,
    /// Bumped by every login, logout and implicit logout of the resource.
    generation: u64,
}

#[derive(Debug, Default)]
struct SessionState {
    resources: HashMap<Resource, ResourceState>,
    loaded: bool,
}

type Generations = HashMap<Resource, u64>;

/// Tracks the authenticated state of each protected resource.
///
/// The backend owns the credentials: after start-up and after every login or
/// logout the store re-reads `GET /authenticate` instead of trusting its own
/// optimistic write. Completions that raced with a newer action on the same
/// resource are dropped, so a slow response can never bring back a credential
/// that was replaced or revoked in the meantime.
pub struct SessionStore {
    backend: Arc<dyn Backend>,
    state: Mutex<SessionState>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let resources = Resource::ALL
            .into_iter()
            .map(|resource| (resource, ResourceState::default()))
            .collect();
        Self {
            backend,
            state: Mutex::new(SessionState {
                resources,
                loaded: false,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn authenticated(&self, resource: Resource) -> bool {
        self.credential(resource).is_some()
    }

    pub fn credential(&self, resource: Resource) -> Option<String> {
        self.state()
            .resources
            .get(&resource)
            .and_then(|entry| entry.credential.clone())
    }

    /// Whether the authoritative state has been read at least once.
    pub fn is_loaded(&self) -> bool {
        self.state().loaded
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            policy: self.authenticated(Resource::Policy),
            deliberation: self.authenticated(Resource::Deliberation),
        }
    }

    /// Fail with [`SessionError::NotAuthenticated`] unless `resource` has a
    /// session.
    pub fn require(&self, resource: Resource) -> Result<(), SessionError> {
        if self.authenticated(resource) {
            Ok(())
        } else {
            Err(SessionError::NotAuthenticated(resource))
        }
    }

    fn generations(&self) -> Generations {
        self.state()
            .resources
            .iter()
            .map(|(resource, entry)| (*resource, entry.generation))
            .collect()
    }

    fn bump(&self, resource: Resource) -> u64 {
        let mut state = self.state();
        let entry = state.resources.entry(resource).or_default();
        entry.generation += 1;
        entry.generation
    }

    fn is_current(&self, resource: Resource, generation: u64) -> bool {
        self.state()
            .resources
            .get(&resource)
            .is_some_and(|entry| entry.generation == generation)
    }

    /// Credentials held for every resource other than `dropped`, with the
    /// generation they were read at.
    fn held_except(&self, dropped: Resource) -> Vec<(Resource, String, u64)> {
        self.state()
            .resources
            .iter()
            .filter(|(resource, _)| **resource != dropped)
            .filter_map(|(resource, entry)| {
                entry
                    .credential
                    .clone()
                    .map(|credential| (*resource, credential, entry.generation))
            })
            .collect()
    }

    /// `DELETE /authenticate` ends every session on the backend. Re-send the
    /// credentials still held for the other resources so only `dropped` ends.
    async fn end_backend_session(&self, dropped: Resource) -> Result<(), ApiError> {
        let keep = self.held_except(dropped);
        self.backend.remove_auth().await?;
        for (resource, credential, generation) in keep {
            if !self.is_current(resource, generation) {
                continue;
            }
            if let Err(err) = self.backend.authenticate(resource, &credential).await {
                tracing::warn!(%resource, "failed to restore session: {err}");
            }
        }
        Ok(())
    }

    /// Apply fetched auth data to every resource whose generation did not move
    /// while the fetch was in flight.
    fn apply(&self, seen: &Generations, data: &AuthData) {
        let mut state = self.state();
        for (resource, entry) in &mut state.resources {
            if seen.get(resource) == Some(&entry.generation) {
                entry.credential = data.credential(*resource).map(ToOwned::to_owned);
            } else {
                tracing::debug!(%resource, "discarding stale session state");
            }
        }
        state.loaded = true;
    }

    /// Re-read the authoritative session state from the backend.
    pub async fn refresh(&self) -> Result<SessionSnapshot, ApiError> {
        let seen = self.generations();
        let data = self.backend.auth_data().await?;
        self.apply(&seen, &data);
        Ok(self.snapshot())
    }

    /// Store `token` as the credential for `resource`, then re-read state.
    pub async fn login(&self, resource: Resource, token: &str) -> Result<(), ConsoleError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(SessionError::EmptyCredential(resource).into());
        }

        let generation = self.bump(resource);
        self.backend.authenticate(resource, token).await?;
        if !self.is_current(resource, generation) {
            tracing::debug!(%resource, "login superseded by a newer session action");
            return Ok(());
        }

        self.refresh().await?;
        tracing::info!(%resource, authenticated = self.authenticated(resource), "login finished");
        Ok(())
    }

    /// Drop the credential for `resource` only, then re-read state.
    pub async fn logout(&self, resource: Resource) -> Result<(), ConsoleError> {
        let generation = self.bump(resource);
        self.end_backend_session(resource).await?;
        if !self.is_current(resource, generation) {
            tracing::debug!(%resource, "logout superseded by a newer session action");
            return Ok(());
        }

        self.refresh().await?;
        tracing::info!(%resource, "logged out");
        Ok(())
    }

    /// A call scoped to `resource` was rejected with 401: forget the
    /// credential locally right away and ask the backend to drop it. Other
    /// resources keep their sessions.
    pub async fn handle_unauthorized(&self, resource: Resource) {
        {
            let mut state = self.state();
            let entry = state.resources.entry(resource).or_default();
            entry.generation += 1;
            entry.credential = None;
        }
        tracing::info!(%resource, "credential rejected, session dropped");

        if let Err(err) = self.end_backend_session(resource).await {
            tracing::warn!(%resource, "failed to clear rejected credential: {err}");
        }
    }
}
