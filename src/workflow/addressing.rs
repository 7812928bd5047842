use super::types::{Edge, Graph, ProgramCounter, RETURN_EDGE, Scope, TaskOption, Workflow};
use crate::error::FormatViolation;

/// Build the ordered catalogue of selectable tasks of `workflow`.
///
/// Main-body tasks come first in edge order, then each function body in
/// ascending function index, each in edge order. Offsets are raw edge
/// positions. A task node pointing outside the task table rejects the whole
/// workflow.
pub fn extract_tasks(workflow: &Workflow) -> Result<Vec<TaskOption>, FormatViolation> {
    let graph = workflow.graph();
    let mut tasks = Vec::new();

    scan_body(graph, Scope::Main, &graph.graph, &mut tasks)?;
    for (index, edges) in &graph.funcs {
        scan_body(graph, Scope::Func(*index), edges, &mut tasks)?;
    }

    Ok(tasks)
}

fn scan_body(
    graph: &Graph,
    scope: Scope,
    edges: &[Edge],
    tasks: &mut Vec<TaskOption>,
) -> Result<(), FormatViolation> {
    for (offset, edge) in edges.iter().enumerate() {
        if !edge.is_node() {
            continue;
        }

        let task = edge.t.ok_or_else(|| FormatViolation::MissingTaskIndex {
            scope: scope.to_string(),
            offset,
        })?;
        let def = graph
            .table
            .tasks
            .get(task)
            .ok_or_else(|| FormatViolation::UnknownTask {
                scope: scope.to_string(),
                offset,
                task,
                max: graph.table.tasks.len(),
            })?;

        tasks.push(TaskOption {
            pg: ProgramCounter { scope, offset },
            name: def.d.n.clone(),
            datasets: edge.input_names(),
        });
    }
    Ok(())
}

/// Names of the datasets the main body returns.
pub fn extract_results(workflow: &Workflow) -> Vec<String> {
    let mut results: Vec<String> = Vec::new();
    for edge in workflow
        .graph()
        .graph
        .iter()
        .filter(|edge| edge.kind == RETURN_EDGE)
    {
        for name in edge.result_names() {
            if !results.contains(&name) {
                results.push(name);
            }
        }
    }
    results
}

/// A compiled workflow together with its task and result catalogue.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowCatalogue {
    pub workflow: Workflow,
    pub tasks: Vec<TaskOption>,
    pub results: Vec<String>,
}

impl WorkflowCatalogue {
    pub fn analyze(workflow: Workflow) -> Result<Self, FormatViolation> {
        let tasks = extract_tasks(&workflow)?;
        let results = extract_results(&workflow);
        Ok(Self {
            workflow,
            tasks,
            results,
        })
    }

    /// Fill in datasets and results the backend knows about but the graph
    /// alone does not show. Addresses and order stay the locally computed
    /// ones.
    pub fn merge_reported(&mut self, reported: &[TaskOption], results: &[String]) {
        for task in &mut self.tasks {
            if !task.datasets.is_empty() {
                continue;
            }
            if let Some(known) = reported.iter().find(|option| option.pg == task.pg) {
                task.datasets.clone_from(&known.datasets);
            }
        }
        if self.results.is_empty() {
            self.results = results.to_vec();
        }
    }

    pub fn task(&self, index: usize) -> Option<&TaskOption> {
        self.tasks.get(index)
    }
}
