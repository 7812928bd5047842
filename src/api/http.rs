//! `reqwest` implementation of [`Backend`] against the console backend's
//! REST surface.

use super::http_client::build_backend_client;
use super::traits::{ApiResult, Backend};
use super::types::{
    ActiveVersion, AuthData, AuthRequest, CodeFormat, ConnectorInfo, NewPolicy, PolicyRecord,
    PolicyVersion, RawResponse,
};
use crate::deliberation::DeliberationRequest;
use crate::error::ApiError;
use crate::session::Resource;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

pub struct HttpBackend {
    base_url: String,
    client: Client,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(base_url, build_backend_client())
    }

    pub fn with_client(base_url: &str, client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &[&str]) -> String {
        let mut url = self.base_url.clone();
        for segment in path {
            url.push('/');
            url.push_str(segment);
        }
        url
    }

    /// Send the request and turn error statuses into [`ApiError::Http`].
    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|err| ApiError::network(err.to_string()))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let status_text = status.canonical_reason().unwrap_or_default().to_string();
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), "backend call failed");
            return Err(ApiError::http(status.as_u16(), status_text, body));
        }
        Ok(response)
    }

    async fn send_text(&self, request: RequestBuilder) -> ApiResult<String> {
        self.send(request)
            .await?
            .text()
            .await
            .map_err(|err| ApiError::network(err.to_string()))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let text = self.send_text(request).await?;
        serde_json::from_str(&text).map_err(|err| ApiError::decode(err.to_string()))
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_policies(&self) -> ApiResult<Vec<PolicyVersion>> {
        tracing::debug!("GET /policies");
        self.send_json(self.client.get(self.url(&["policies"])))
            .await
    }

    async fn get_policy(&self, version: i64) -> ApiResult<PolicyRecord> {
        tracing::debug!(version, "GET /policies/{{version}}");
        let version = version.to_string();
        self.send_json(self.client.get(self.url(&["policies", &version])))
            .await
    }

    async fn add_policy(&self, policy: &NewPolicy) -> ApiResult<RawResponse> {
        tracing::debug!("POST /policies");
        let body = self
            .send_text(self.client.post(self.url(&["policies"])).json(policy))
            .await?;
        Ok(RawResponse::new(body))
    }

    async fn get_active_version(&self) -> ApiResult<Option<i64>> {
        tracing::debug!("GET /policies/active");
        let request = self.client.get(self.url(&["policies", "active"]));
        let text = match self.send_text(request).await {
            Ok(text) => text,
            Err(ApiError::Http { status: 404, .. }) => return Ok(None),
            Err(err) => return Err(err),
        };
        if text.trim().is_empty() {
            return Ok(None);
        }
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|err| ApiError::decode(err.to_string()))?;
        if value.get("version").is_none_or(serde_json::Value::is_null) {
            return Ok(None);
        }
        let active: ActiveVersion =
            serde_json::from_value(value).map_err(|err| ApiError::decode(err.to_string()))?;
        Ok(Some(active.version))
    }

    async fn activate_version(&self, version: i64) -> ApiResult<()> {
        tracing::debug!(version, "POST /policies/active");
        self.send(
            self.client
                .post(self.url(&["policies", "active"]))
                .json(&ActiveVersion { version }),
        )
        .await?;
        Ok(())
    }

    async fn deactivate_version(&self) -> ApiResult<()> {
        tracing::debug!("DELETE /policies/active");
        self.send(self.client.delete(self.url(&["policies", "active"])))
            .await?;
        Ok(())
    }

    async fn connector_info(&self) -> ApiResult<ConnectorInfo> {
        tracing::debug!("GET /reasoner-connector-info");
        self.send_json(self.client.get(self.url(&["reasoner-connector-info"])))
            .await
    }

    async fn auth_data(&self) -> ApiResult<AuthData> {
        tracing::debug!("GET /authenticate");
        self.send_json(self.client.get(self.url(&["authenticate"])))
            .await
    }

    async fn authenticate(&self, resource: Resource, token: &str) -> ApiResult<()> {
        tracing::debug!(%resource, "POST /authenticate");
        let body = AuthRequest {
            t: resource,
            token: token.to_string(),
        };
        self.send(self.client.post(self.url(&["authenticate"])).json(&body))
            .await?;
        Ok(())
    }

    async fn remove_auth(&self) -> ApiResult<()> {
        tracing::debug!("DELETE /authenticate");
        self.send(self.client.delete(self.url(&["authenticate"])))
            .await?;
        Ok(())
    }

    async fn convert(&self, from: CodeFormat, to: CodeFormat, body: &str) -> ApiResult<String> {
        tracing::debug!(%from, %to, "POST /conv");
        self.send_text(
            self.client
                .post(self.url(&["conv"]))
                .query(&[("from", from.to_string()), ("to", to.to_string())])
                .body(body.to_string()),
        )
        .await
    }

    async fn deliberate(&self, request: &DeliberationRequest) -> ApiResult<RawResponse> {
        let kind = request.kind().to_string();
        tracing::debug!(%kind, "POST /deliberation/{{kind}}");
        let body = self
            .send_text(
                self.client
                    .post(self.url(&["deliberation", &kind]))
                    .json(request),
            )
            .await?;
        Ok(RawResponse::new(body))
    }

    fn name(&self) -> &str {
        "http"
    }
}
