use crate::api::types::{PolicyRecord, PolicyVersion};
use crate::error::PolicyError;
use serde::Serialize;
use strum::{Display, EnumString};

/// Version number of the unsaved draft. Never sent to the backend.
pub const NEW_VERSION: i64 = -1;

/// Content a draft starts from when it has no parent.
pub const DRAFT_TEMPLATE: &str = r#"[
    {
        "version": "0.1.0",
        "kind": "phrases",
        "phrases": []
    }
]"#;

/// Syntax of a draft's content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Syntax {
    /// Policy source syntax; transcoded by the backend before commit.
    EFlint,
    #[default]
    Json,
}

/// A committed policy with both renderings of its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    pub version: i64,
    pub reasoner: String,
    pub reasoner_version: String,
    /// Content in policy source syntax.
    pub content: String,
    /// Content as canonical JSON.
    pub json_content: String,
    pub description: String,
    pub version_description: String,
}

impl Policy {
    pub(crate) fn from_record(
        record: &PolicyRecord,
        content: String,
        json_content: String,
    ) -> Result<Self, PolicyError> {
        let entry = record.content.first().ok_or_else(|| PolicyError::Malformed {
            what: "policy",
            message: format!("version {} has no reasoner content", record.version),
        })?;
        Ok(Self {
            version: record.version,
            reasoner: entry.reasoner.clone(),
            reasoner_version: entry.reasoner_version.clone(),
            content,
            json_content,
            description: record.description.clone(),
            version_description: record.version_description.clone(),
        })
    }
}

/// The single uncommitted policy version under edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub content: String,
    pub syntax: Syntax,
    pub description: String,
    pub version_description: String,
}

impl Draft {
    /// A new draft, seeded from `parent`'s canonical content when given.
    pub fn seeded(parent: Option<&Policy>) -> Self {
        Self {
            content: parent.map_or_else(|| DRAFT_TEMPLATE.to_string(), |p| p.json_content.clone()),
            syntax: Syntax::Json,
            description: String::new(),
            version_description: String::new(),
        }
    }

    /// Only complete drafts can be committed.
    pub fn is_complete(&self) -> bool {
        !self.content.trim().is_empty() && !self.version_description.trim().is_empty()
    }
}

/// What the operator is looking at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    None,
    Committed(i64),
    Draft,
}

impl Selection {
    pub fn version(self) -> Option<i64> {
        match self {
            Self::None => None,
            Self::Committed(version) => Some(version),
            Self::Draft => Some(NEW_VERSION),
        }
    }

    pub(crate) fn of(entry: PolicyVersion) -> Self {
        if entry.version == NEW_VERSION {
            Self::Draft
        } else {
            Self::Committed(entry.version)
        }
    }
}

/// Pretty-print JSON policy content with four-space indentation.
pub fn canonical_json(text: &str) -> Result<String, PolicyError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|err| PolicyError::InvalidContent(err.to_string()))?;
    canonical_value(&value)
}

pub(crate) fn canonical_value(value: &serde_json::Value) -> Result<String, PolicyError> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|err| PolicyError::InvalidContent(err.to_string()))?;
    String::from_utf8(out).map_err(|err| PolicyError::InvalidContent(err.to_string()))
}
