use super::addressing::WorkflowCatalogue;
use super::types::{TaskOption, Workflow};
use crate::api::Backend;
use crate::api::types::CodeFormat;
use crate::error::{ApiError, ConsoleError};
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// `branescript → wir` response, with the workflow left unparsed so a bad
/// graph surfaces as a format violation rather than a decode error.
#[derive(Deserialize)]
struct Conversion {
    workflow: serde_json::Value,
    #[serde(default)]
    tasks: Vec<TaskOption>,
    #[serde(default)]
    results: Vec<String>,
}

#[derive(Debug, Default)]
struct EditorState {
    source: String,
    revision: u64,
    catalogue: Option<WorkflowCatalogue>,
}

/// Workflow source text and the catalogue compiled from it.
///
/// Program counters are positional, so every edit drops the catalogue before
/// anything is recompiled. A compile that finishes after a newer edit is
/// thrown away.
pub struct WorkflowEditor {
    backend: Arc<dyn Backend>,
    state: Mutex<EditorState>,
}

impl WorkflowEditor {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            state: Mutex::new(EditorState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, EditorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn source(&self) -> String {
        self.state().source.clone()
    }

    /// Bumped by every edit of the source text.
    pub fn revision(&self) -> u64 {
        self.state().revision
    }

    pub fn catalogue(&self) -> Option<WorkflowCatalogue> {
        self.state().catalogue.clone()
    }

    /// Replace the source text. Returns the new revision.
    pub fn set_source(&self, source: impl Into<String>) -> u64 {
        let source = source.into();
        let mut state = self.state();
        if state.source == source {
            return state.revision;
        }
        state.source = source;
        state.revision += 1;
        state.catalogue = None;
        state.revision
    }

    /// Compile the current source and recompute its catalogue.
    ///
    /// Returns `Ok(None)` when the source is blank or was edited while the
    /// compile was in flight. On failure the catalogue is left as it was.
    pub async fn compile(&self) -> Result<Option<WorkflowCatalogue>, ConsoleError> {
        let (revision, source) = {
            let state = self.state();
            (state.revision, state.source.clone())
        };
        if source.trim().is_empty() {
            return Ok(None);
        }

        let text = self
            .backend
            .convert(CodeFormat::BraneScript, CodeFormat::Wir, &source)
            .await?;
        let conversion: Conversion =
            serde_json::from_str(&text).map_err(|err| ApiError::decode(err.to_string()))?;
        let workflow = Workflow::from_value(conversion.workflow)?;
        let mut catalogue = WorkflowCatalogue::analyze(workflow)?;
        catalogue.merge_reported(&conversion.tasks, &conversion.results);

        let mut state = self.state();
        if state.revision != revision {
            tracing::warn!(
                compiled = revision,
                current = state.revision,
                "discarding workflow compiled from outdated source"
            );
            return Ok(None);
        }
        tracing::debug!(
            revision,
            tasks = catalogue.tasks.len(),
            results = catalogue.results.len(),
            "workflow compiled"
        );
        state.catalogue = Some(catalogue.clone());
        Ok(Some(catalogue))
    }
}
