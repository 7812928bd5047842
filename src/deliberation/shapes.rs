use crate::error::ValidationError;
use crate::workflow::{ProgramCounter, TaskOption, Workflow};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The three questions the reasoner can be asked.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeliberationKind {
    /// May this task be executed?
    #[default]
    Task,
    /// May this dataset be transferred?
    Data,
    /// Is this workflow acceptable as a whole?
    Workflow,
}

impl DeliberationKind {
    pub const ALL: [Self; 3] = [Self::Task, Self::Data, Self::Workflow];

    pub fn shape(self) -> &'static RequestShape {
        match self {
            Self::Task => &SHAPES[0],
            Self::Data => &SHAPES[1],
            Self::Workflow => &SHAPES[2],
        }
    }
}

/// Inputs a request kind lets the operator fill in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Task,
    Dataset,
}

/// The operator's current choices, resolved against a compiled workflow.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub task: Option<&'a TaskOption>,
    /// `None` when the dataset field is empty.
    pub dataset: Option<&'a str>,
    /// Dataset names the workflow itself offers for the current task.
    pub known_datasets: &'a [String],
}

type Validator = fn(&Selection<'_>) -> Result<(), ValidationError>;
type Builder = fn(&Workflow, &Selection<'_>) -> Result<DeliberationRequest, ValidationError>;

/// Validation and payload construction for one request kind.
pub struct RequestShape {
    pub kind: DeliberationKind,
    pub label: &'static str,
    pub inputs: &'static [Input],
    pub validate: Validator,
    pub build: Builder,
}

impl RequestShape {
    pub fn accepts(&self, input: Input) -> bool {
        self.inputs.contains(&input)
    }
}

pub static SHAPES: [RequestShape; 3] = [
    RequestShape {
        kind: DeliberationKind::Task,
        label: "Execute task request",
        inputs: &[Input::Task],
        validate: validate_task,
        build: build_task,
    },
    RequestShape {
        kind: DeliberationKind::Data,
        label: "Transfer data request",
        inputs: &[Input::Task, Input::Dataset],
        validate: validate_data,
        build: build_data,
    },
    RequestShape {
        kind: DeliberationKind::Workflow,
        label: "Validate workflow",
        inputs: &[],
        validate: validate_workflow,
        build: build_workflow,
    },
];

fn validate_task(selection: &Selection<'_>) -> Result<(), ValidationError> {
    if selection.dataset.is_some() {
        return Err(ValidationError::DatasetNotAllowed("task"));
    }
    if selection.task.is_none() {
        return Err(ValidationError::TaskRequired("task"));
    }
    Ok(())
}

fn build_task(
    workflow: &Workflow,
    selection: &Selection<'_>,
) -> Result<DeliberationRequest, ValidationError> {
    validate_task(selection)?;
    let task = selection.task.ok_or(ValidationError::TaskRequired("task"))?;
    Ok(DeliberationRequest::Task {
        workflow: workflow.clone(),
        task_id: task.pg,
    })
}

fn validate_data(selection: &Selection<'_>) -> Result<(), ValidationError> {
    if selection.task.is_none() && selection.dataset.is_none() {
        return Err(ValidationError::TaskOrDatasetRequired("data"));
    }
    Ok(())
}

fn build_data(
    workflow: &Workflow,
    selection: &Selection<'_>,
) -> Result<DeliberationRequest, ValidationError> {
    validate_data(selection)?;
    let data_id = selection
        .dataset
        .map(|text| parse_dataset(text, selection.known_datasets))
        .transpose()?;
    Ok(DeliberationRequest::Data {
        workflow: workflow.clone(),
        task_id: selection.task.map(|task| task.pg),
        data_id,
    })
}

fn validate_workflow(_: &Selection<'_>) -> Result<(), ValidationError> {
    Ok(())
}

fn build_workflow(
    workflow: &Workflow,
    _: &Selection<'_>,
) -> Result<DeliberationRequest, ValidationError> {
    Ok(DeliberationRequest::Workflow {
        workflow: workflow.clone(),
    })
}

/// Parse a dataset identifier as JSON. A bare name is accepted only when it
/// is one of the names the workflow offers, and is then sent as a string.
pub fn parse_dataset(text: &str, known: &[String]) -> Result<serde_json::Value, ValidationError> {
    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(_) if known.iter().any(|name| name == text) => {
            Ok(serde_json::Value::String(text.to_string()))
        }
        Err(err) => Err(ValidationError::InvalidDataset(err.to_string())),
    }
}

/// Body of `POST /deliberation/{kind}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DeliberationRequest {
    Task {
        workflow: Workflow,
        task_id: ProgramCounter,
    },
    Data {
        workflow: Workflow,
        #[serde(skip_serializing_if = "Option::is_none")]
        task_id: Option<ProgramCounter>,
        #[serde(skip_serializing_if = "Option::is_none")]
        data_id: Option<serde_json::Value>,
    },
    Workflow {
        workflow: Workflow,
    },
}

impl DeliberationRequest {
    pub fn kind(&self) -> DeliberationKind {
        match self {
            Self::Task { .. } => DeliberationKind::Task,
            Self::Data { .. } => DeliberationKind::Data,
            Self::Workflow { .. } => DeliberationKind::Workflow,
        }
    }

    pub fn workflow(&self) -> &Workflow {
        match self {
            Self::Task { workflow, .. }
            | Self::Data { workflow, .. }
            | Self::Workflow { workflow } => workflow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task() -> TaskOption {
        TaskOption {
            pg: ProgramCounter::main(2),
            name: "B".into(),
            datasets: vec!["input".into()],
        }
    }

    fn workflow() -> Workflow {
        Workflow::from_value(json!({"graph": [], "funcs": {}, "table": {"tasks": []}})).unwrap()
    }

    fn selection<'a>(task: Option<&'a TaskOption>, dataset: Option<&'a str>) -> Selection<'a> {
        Selection {
            task,
            dataset,
            known_datasets: &[],
        }
    }

    #[test]
    fn shapes_are_indexed_by_kind() {
        for kind in DeliberationKind::ALL {
            assert_eq!(kind.shape().kind, kind);
        }
        assert_eq!(DeliberationKind::Data.shape().label, "Transfer data request");
    }

    #[test]
    fn task_request_needs_a_task_and_no_dataset() {
        let task = task();
        let shape = DeliberationKind::Task.shape();
        assert!((shape.validate)(&selection(Some(&task), None)).is_ok());
        assert_eq!(
            (shape.validate)(&selection(Some(&task), Some("\"x\""))),
            Err(ValidationError::DatasetNotAllowed("task"))
        );
        assert_eq!(
            (shape.validate)(&selection(None, None)),
            Err(ValidationError::TaskRequired("task"))
        );
    }

    #[test]
    fn data_request_needs_task_or_dataset() {
        let task = task();
        let shape = DeliberationKind::Data.shape();
        assert!((shape.validate)(&selection(None, None)).is_err());
        assert!((shape.validate)(&selection(Some(&task), None)).is_ok());
        assert!((shape.validate)(&selection(None, Some("\"x\""))).is_ok());
        assert!((shape.validate)(&selection(Some(&task), Some("\"x\""))).is_ok());
    }

    #[test]
    fn workflow_request_is_always_valid() {
        let shape = DeliberationKind::Workflow.shape();
        assert!((shape.validate)(&selection(None, None)).is_ok());
        assert!(shape.inputs.is_empty());
    }

    #[test]
    fn task_payload_carries_the_program_counter() {
        let task = task();
        let request =
            (DeliberationKind::Task.shape().build)(&workflow(), &selection(Some(&task), None))
                .unwrap();
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["task_id"], json!(["<main>", 2]));
        assert!(body.get("data_id").is_none());
        assert_eq!(request.kind(), DeliberationKind::Task);
    }

    #[test]
    fn data_payload_omits_absent_fields() {
        let request =
            (DeliberationKind::Data.shape().build)(&workflow(), &selection(None, Some("{\"id\": 3}")))
                .unwrap();
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("task_id").is_none());
        assert_eq!(body["data_id"], json!({"id": 3}));
    }

    #[test]
    fn unparsable_dataset_is_a_validation_failure() {
        let err = (DeliberationKind::Data.shape().build)(&workflow(), &selection(None, Some("{oops")))
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidDataset(_)));
    }

    #[test]
    fn offered_dataset_names_are_sent_as_strings() {
        let known = vec!["input".to_string()];
        assert_eq!(parse_dataset("input", &known).unwrap(), json!("input"));
        assert!(parse_dataset("other", &known).is_err());
    }

    #[test]
    fn workflow_payload_is_the_workflow_only() {
        let request =
            (DeliberationKind::Workflow.shape().build)(&workflow(), &selection(None, None)).unwrap();
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body.as_object().unwrap().len(), 1);
        assert!(body.get("workflow").is_some());
    }

    #[test]
    fn kind_parses_from_path_segment() {
        assert_eq!("data".parse::<DeliberationKind>().unwrap(), DeliberationKind::Data);
        assert_eq!(DeliberationKind::Workflow.to_string(), "workflow");
    }
}
