use super::shapes::{DeliberationKind, DeliberationRequest, Input, RequestShape, Selection};
use crate::api::Backend;
use crate::error::ValidationError;
use crate::notify::normalize_inline;
use crate::session::{Resource, SessionStore};
use crate::workflow::WorkflowCatalogue;

/// The operator's choices for the next deliberation request.
///
/// The task is kept as an index into the catalogue it was picked from; the
/// owner resets it whenever that catalogue is replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    kind: DeliberationKind,
    task: Option<usize>,
    dataset: String,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(&self) -> DeliberationKind {
        self.kind
    }

    pub fn shape(&self) -> &'static RequestShape {
        self.kind.shape()
    }

    pub fn task(&self) -> Option<usize> {
        self.task
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Switch request kind; task and dataset start over.
    pub fn select_kind(&mut self, kind: DeliberationKind) {
        self.kind = kind;
        self.reset_selection();
    }

    /// Pick a task by catalogue index (`None` for "no task"); the dataset
    /// starts over.
    pub fn select_task(&mut self, task: Option<usize>) {
        self.task = task;
        self.dataset.clear();
    }

    pub fn set_dataset(&mut self, dataset: impl Into<String>) {
        self.dataset = dataset.into();
    }

    pub fn reset_selection(&mut self) {
        self.task = None;
        self.dataset.clear();
    }

    fn selection<'a>(
        &'a self,
        catalogue: &'a WorkflowCatalogue,
    ) -> Result<Selection<'a>, ValidationError> {
        let shape = self.shape();
        let task = match self.task.filter(|_| shape.accepts(Input::Task)) {
            Some(index) => Some(catalogue.task(index).ok_or(ValidationError::UnknownTask {
                index,
                len: catalogue.tasks.len(),
            })?),
            None => None,
        };
        let dataset = Some(self.dataset.trim()).filter(|text| !text.is_empty());
        let known_datasets = match task {
            Some(task) => task.datasets.as_slice(),
            None => catalogue.results.as_slice(),
        };
        Ok(Selection {
            task,
            dataset,
            known_datasets,
        })
    }

    pub fn validate(&self, catalogue: Option<&WorkflowCatalogue>) -> Result<(), ValidationError> {
        let catalogue = catalogue.ok_or(ValidationError::NoWorkflow)?;
        (self.shape().validate)(&self.selection(catalogue)?)
    }

    pub fn can_execute(&self, catalogue: Option<&WorkflowCatalogue>) -> bool {
        self.validate(catalogue).is_ok()
    }

    pub fn build(
        &self,
        catalogue: Option<&WorkflowCatalogue>,
    ) -> Result<DeliberationRequest, ValidationError> {
        let catalogue = catalogue.ok_or(ValidationError::NoWorkflow)?;
        let selection = self.selection(catalogue)?;
        (self.shape().build)(&catalogue.workflow, &selection)
    }

    /// Datasets the operator may pick: the selected task's inputs, or the
    /// workflow's results when no task is selected. Empty for kinds without
    /// a dataset input.
    pub fn dataset_choices(&self, catalogue: Option<&WorkflowCatalogue>) -> Vec<String> {
        let Some(catalogue) = catalogue else {
            return Vec::new();
        };
        if !self.shape().accepts(Input::Dataset) {
            return Vec::new();
        }
        match self.task.and_then(|index| catalogue.task(index)) {
            Some(task) => task.datasets.clone(),
            None => catalogue.results.clone(),
        }
    }
}

/// Result of submitting a deliberation request, shown next to the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The reasoner's answer, pretty-printed when structured.
    Answer(String),
    /// Why the call failed.
    Failed(String),
}

impl Outcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Answer(text) | Self::Failed(text) => text,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Submit `request`. Failures are returned for inline display instead of
/// being queued; a rejected credential also ends the deliberation session.
pub async fn execute(
    backend: &dyn Backend,
    session: &SessionStore,
    request: &DeliberationRequest,
) -> Outcome {
    let kind = request.kind();
    match backend.deliberate(request).await {
        Ok(response) => {
            tracing::info!(%kind, "deliberation answered");
            Outcome::Answer(response.pretty())
        }
        Err(err) => {
            tracing::debug!(%kind, "deliberation failed: {err}");
            if err.is_unauthorized() {
                session.handle_unauthorized(Resource::Deliberation).await;
            }
            Outcome::Failed(normalize_inline(&err))
        }
    }
}
