use super::types::{
    AuthData, CodeFormat, ConnectorInfo, NewPolicy, PolicyRecord, PolicyVersion, RawResponse,
};
use crate::deliberation::DeliberationRequest;
use crate::error::ApiError;
use crate::session::Resource;
use async_trait::async_trait;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// The backend the console talks to.
///
/// Every method is a single attempt: no retries happen at this layer, and
/// credentials are attached by the implementation on every call.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /policies`
    async fn list_policies(&self) -> ApiResult<Vec<PolicyVersion>>;

    /// `GET /policies/{version}`
    async fn get_policy(&self, version: i64) -> ApiResult<PolicyRecord>;

    /// `POST /policies`
    async fn add_policy(&self, policy: &NewPolicy) -> ApiResult<RawResponse>;

    /// `GET /policies/active`; `None` when no version is active.
    async fn get_active_version(&self) -> ApiResult<Option<i64>>;

    /// `POST /policies/active`
    async fn activate_version(&self, version: i64) -> ApiResult<()>;

    /// `DELETE /policies/active`
    async fn deactivate_version(&self) -> ApiResult<()>;

    /// `GET /reasoner-connector-info`
    async fn connector_info(&self) -> ApiResult<ConnectorInfo>;

    /// `GET /authenticate`
    async fn auth_data(&self) -> ApiResult<AuthData>;

    /// `POST /authenticate`
    async fn authenticate(&self, resource: Resource, token: &str) -> ApiResult<()>;

    /// `DELETE /authenticate`. The backend drops the credentials of every
    /// resource at once.
    async fn remove_auth(&self) -> ApiResult<()>;

    /// `POST /conv?from=..&to=..`, returning the converted text.
    async fn convert(&self, from: CodeFormat, to: CodeFormat, body: &str) -> ApiResult<String>;

    /// `POST /deliberation/{kind}`, with the kind taken from the request.
    async fn deliberate(&self, request: &DeliberationRequest) -> ApiResult<RawResponse>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        "backend"
    }
}
