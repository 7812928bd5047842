use crate::session::Resource;
use crate::workflow::{TaskOption, Workflow};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One entry of `GET /policies`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyVersion {
    pub version: i64,
}

/// Reasoner-specific content of a committed policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyContentEntry {
    pub reasoner: String,
    pub reasoner_version: String,
    pub content: serde_json::Value,
}

/// Full record returned by `GET /policies/{version}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub version: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version_description: String,
    #[serde(default)]
    pub content: Vec<PolicyContentEntry>,
}

/// Body of `POST /policies`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPolicy {
    pub description: String,
    pub version_description: String,
    pub content: Vec<PolicyContentEntry>,
}

/// Body of `GET`/`POST /policies/active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveVersion {
    pub version: i64,
}

/// Context the reasoner connector reports about itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorContext {
    pub version: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Body of `GET /reasoner-connector-info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorInfo {
    pub hash: String,
    pub context: ConnectorContext,
}

/// Body of `GET /authenticate`. Empty or missing credentials mean "not
/// authenticated" for that resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthData {
    #[serde(default)]
    pub policy: Option<String>,
    #[serde(default)]
    pub deliberation: Option<String>,
}

impl AuthData {
    pub fn credential(&self, resource: Resource) -> Option<&str> {
        let raw = match resource {
            Resource::Policy => self.policy.as_deref(),
            Resource::Deliberation => self.deliberation.as_deref(),
        };
        raw.filter(|token| !token.is_empty())
    }
}

/// Body of `POST /authenticate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    pub t: Resource,
    pub token: String,
}

/// Formats understood by `POST /conv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CodeFormat {
    /// Policy source syntax.
    EFlint,
    /// Canonical JSON policy form.
    EFlintJson,
    /// Compiled workflow graph.
    Wir,
    /// Workflow source syntax.
    BraneScript,
}

/// Response of a `branescript → wir` conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConversion {
    pub workflow: Workflow,
    #[serde(default)]
    pub tasks: Vec<TaskOption>,
    #[serde(default)]
    pub results: Vec<String>,
}

/// Successful response body of a call, kept as text with its JSON parse
/// when the body is structured.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub body: String,
}

impl RawResponse {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// The body pretty-printed when it is JSON, verbatim otherwise.
    pub fn pretty(&self) -> String {
        match serde_json::from_str::<serde_json::Value>(&self.body) {
            Ok(serde_json::Value::String(text)) => text,
            Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| self.body.clone()),
            Err(_) => self.body.clone(),
        }
    }
}
