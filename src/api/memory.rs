//! In-process stand-in for the console backend.
//!
//! Mirrors the REST surface closely enough to drive every manager without a
//! network: per-resource cookies, a single active policy pointer, 401s for
//! calls whose credential is missing or not accepted, and a reversible
//! policy transcoder. Calls can be failed on demand or held open so tests
//! can interleave completions.

use super::traits::{ApiResult, Backend};
use super::types::{
    AuthData, CodeFormat, ConnectorContext, ConnectorInfo, NewPolicy, PolicyRecord, PolicyVersion,
    RawResponse, WorkflowConversion,
};
use crate::deliberation::{DeliberationKind, DeliberationRequest};
use crate::error::ApiError;
use crate::session::Resource;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Header line the in-memory transcoder puts in front of policy source text.
pub const MEMORY_EFLINT_HEADER: &str = "// eflint (memory backend)\n";

/// Operations of [`MemoryBackend`], used to inject failures and holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryOp {
    ListPolicies,
    GetPolicy,
    AddPolicy,
    GetActive,
    Activate,
    Deactivate,
    ConnectorInfo,
    AuthData,
    Authenticate,
    RemoveAuth,
    Convert,
    Deliberate,
}

#[derive(Default)]
struct MemoryState {
    policies: BTreeMap<i64, PolicyRecord>,
    active: Option<i64>,
    accepted: HashMap<Resource, String>,
    cookies: HashMap<Resource, String>,
    workflows: HashMap<String, WorkflowConversion>,
    deliberation_response: Option<String>,
    deliberations: Vec<(DeliberationKind, serde_json::Value)>,
    failures: HashMap<MemoryOp, VecDeque<ApiError>>,
    holds: HashMap<MemoryOp, VecDeque<Arc<Notify>>>,
    calls: HashMap<MemoryOp, usize>,
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept `token` as a valid credential for `resource`.
    pub fn accept_token(&self, resource: Resource, token: &str) -> &Self {
        self.state().accepted.insert(resource, token.to_string());
        self
    }

    /// Store a committed policy directly, bypassing `add_policy`.
    pub fn insert_policy(&self, record: PolicyRecord) -> &Self {
        self.state().policies.insert(record.version, record);
        self
    }

    /// Register the result of compiling `source`.
    pub fn register_workflow(&self, source: &str, conversion: WorkflowConversion) -> &Self {
        self.state()
            .workflows
            .insert(source.to_string(), conversion);
        self
    }

    pub fn set_deliberation_response(&self, body: &str) -> &Self {
        self.state().deliberation_response = Some(body.to_string());
        self
    }

    /// Make the next call of `op` fail with `err`.
    pub fn fail_next(&self, op: MemoryOp, err: ApiError) -> &Self {
        self.state().failures.entry(op).or_default().push_back(err);
        self
    }

    /// Hold the next call of `op` after its response has been computed, until
    /// the returned handle is notified.
    pub fn hold(&self, op: MemoryOp) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state()
            .holds
            .entry(op)
            .or_default()
            .push_back(Arc::clone(&gate));
        gate
    }

    pub fn active(&self) -> Option<i64> {
        self.state().active
    }

    pub fn has_cookie(&self, resource: Resource) -> bool {
        self.state().cookies.contains_key(&resource)
    }

    pub fn calls(&self, op: MemoryOp) -> usize {
        self.state().calls.get(&op).copied().unwrap_or_default()
    }

    pub fn deliberations(&self) -> Vec<(DeliberationKind, serde_json::Value)> {
        self.state().deliberations.clone()
    }

    pub fn policy(&self, version: i64) -> Option<PolicyRecord> {
        self.state().policies.get(&version).cloned()
    }

    /// Count the call and pop any failure or hold queued for it.
    fn enter(&self, op: MemoryOp) -> (Option<ApiError>, Option<Arc<Notify>>) {
        let mut state = self.state();
        *state.calls.entry(op).or_default() += 1;
        let failure = state.failures.get_mut(&op).and_then(VecDeque::pop_front);
        let hold = state.holds.get_mut(&op).and_then(VecDeque::pop_front);
        (failure, hold)
    }

    async fn run<T>(
        &self,
        op: MemoryOp,
        body: impl FnOnce(&mut MemoryState) -> ApiResult<T>,
    ) -> ApiResult<T> {
        let (failure, hold) = self.enter(op);
        let result = match failure {
            Some(err) => Err(err),
            None => body(&mut *self.state()),
        };
        if let Some(gate) = hold {
            gate.notified().await;
        }
        result
    }
}

fn authorize(state: &MemoryState, resource: Resource) -> ApiResult<()> {
    match (state.cookies.get(&resource), state.accepted.get(&resource)) {
        (Some(presented), Some(accepted)) if presented == accepted => Ok(()),
        _ => Err(ApiError::http(401, "Unauthorized", "")),
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError::http(
        404,
        "Not Found",
        serde_json::json!({ "detail": format!("{what} not found") }).to_string(),
    )
}

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError::http(400, "Bad Request", message)
}

fn transcode(state: &MemoryState, from: CodeFormat, to: CodeFormat, body: &str) -> ApiResult<String> {
    if from == to {
        return Err(bad_request("From and into can't be the same format"));
    }
    match (from, to) {
        (CodeFormat::EFlintJson, CodeFormat::EFlint) => {
            let value: serde_json::Value =
                serde_json::from_str(body).map_err(|err| bad_request(err.to_string()))?;
            Ok(format!("{MEMORY_EFLINT_HEADER}{value}"))
        }
        (CodeFormat::EFlint, CodeFormat::EFlintJson) => {
            let source = body
                .strip_prefix(MEMORY_EFLINT_HEADER)
                .ok_or_else(|| bad_request("Failed to parse eFLINT source"))?;
            let value: serde_json::Value =
                serde_json::from_str(source).map_err(|err| bad_request(err.to_string()))?;
            serde_json::to_string_pretty(&value).map_err(|err| bad_request(err.to_string()))
        }
        (CodeFormat::BraneScript, CodeFormat::Wir) => {
            let conversion = state
                .workflows
                .get(body)
                .ok_or_else(|| bad_request("Failed to compile input workflow"))?;
            serde_json::to_string(conversion).map_err(|err| bad_request(err.to_string()))
        }
        _ => Err(bad_request("Invalid conversion")),
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn list_policies(&self) -> ApiResult<Vec<PolicyVersion>> {
        self.run(MemoryOp::ListPolicies, |state| {
            authorize(state, Resource::Policy)?;
            Ok(state
                .policies
                .keys()
                .rev()
                .map(|&version| PolicyVersion { version })
                .collect())
        })
        .await
    }

    async fn get_policy(&self, version: i64) -> ApiResult<PolicyRecord> {
        self.run(MemoryOp::GetPolicy, |state| {
            authorize(state, Resource::Policy)?;
            state
                .policies
                .get(&version)
                .cloned()
                .ok_or_else(|| not_found("policy"))
        })
        .await
    }

    async fn add_policy(&self, policy: &NewPolicy) -> ApiResult<RawResponse> {
        self.run(MemoryOp::AddPolicy, |state| {
            authorize(state, Resource::Policy)?;
            let version = state.policies.keys().next_back().copied().unwrap_or(0) + 1;
            let record = PolicyRecord {
                version,
                description: policy.description.clone(),
                version_description: policy.version_description.clone(),
                content: policy.content.clone(),
            };
            let body = serde_json::to_string(&record).map_err(|err| bad_request(err.to_string()))?;
            state.policies.insert(version, record);
            Ok(RawResponse::new(body))
        })
        .await
    }

    async fn get_active_version(&self) -> ApiResult<Option<i64>> {
        self.run(MemoryOp::GetActive, |state| {
            authorize(state, Resource::Policy)?;
            Ok(state.active)
        })
        .await
    }

    async fn activate_version(&self, version: i64) -> ApiResult<()> {
        self.run(MemoryOp::Activate, |state| {
            authorize(state, Resource::Policy)?;
            if !state.policies.contains_key(&version) {
                return Err(not_found("policy"));
            }
            state.active = Some(version);
            Ok(())
        })
        .await
    }

    async fn deactivate_version(&self) -> ApiResult<()> {
        self.run(MemoryOp::Deactivate, |state| {
            authorize(state, Resource::Policy)?;
            state.active = None;
            Ok(())
        })
        .await
    }

    async fn connector_info(&self) -> ApiResult<ConnectorInfo> {
        self.run(MemoryOp::ConnectorInfo, |state| {
            authorize(state, Resource::Policy)?;
            Ok(ConnectorInfo {
                hash: "memory".into(),
                context: ConnectorContext {
                    version: "0.1.0".into(),
                    kind: "eflint-json".into(),
                    extra: serde_json::Map::new(),
                },
            })
        })
        .await
    }

    async fn auth_data(&self) -> ApiResult<AuthData> {
        self.run(MemoryOp::AuthData, |state| {
            Ok(AuthData {
                policy: state.cookies.get(&Resource::Policy).cloned(),
                deliberation: state.cookies.get(&Resource::Deliberation).cloned(),
            })
        })
        .await
    }

    async fn authenticate(&self, resource: Resource, token: &str) -> ApiResult<()> {
        self.run(MemoryOp::Authenticate, |state| {
            state.cookies.insert(resource, token.to_string());
            Ok(())
        })
        .await
    }

    async fn remove_auth(&self) -> ApiResult<()> {
        self.run(MemoryOp::RemoveAuth, |state| {
            state.cookies.clear();
            Ok(())
        })
        .await
    }

    async fn convert(&self, from: CodeFormat, to: CodeFormat, body: &str) -> ApiResult<String> {
        self.run(MemoryOp::Convert, |state| transcode(state, from, to, body))
            .await
    }

    async fn deliberate(&self, request: &DeliberationRequest) -> ApiResult<RawResponse> {
        self.run(MemoryOp::Deliberate, |state| {
            authorize(state, Resource::Deliberation)?;
            let payload =
                serde_json::to_value(request).map_err(|err| bad_request(err.to_string()))?;
            state.deliberations.push((request.kind(), payload));
            let body = state
                .deliberation_response
                .clone()
                .unwrap_or_else(|| r#"{"verdict":"allow"}"#.to_string());
            Ok(RawResponse::new(body))
        })
        .await
    }

    fn name(&self) -> &str {
        "memory"
    }
}
