use crate::api::{ConnectorInfo, PolicyVersion};
use crate::policy::{Policy, Syntax};
use crate::session::{Resource, SessionSnapshot};
use crate::workflow::WorkflowCatalogue;

pub fn render_session(snapshot: &SessionSnapshot) -> String {
    Resource::ALL
        .iter()
        .map(|resource| {
            let state = if snapshot.authenticated(*resource) {
                "logged in"
            } else {
                "logged out"
            };
            format!("{:<13} {state}", resource.to_string())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Newest first, the active version marked with `*`.
pub fn render_policy_list(versions: &[PolicyVersion], active: Option<i64>) -> String {
    if versions.is_empty() {
        return "No policy versions committed yet.".to_string();
    }
    versions
        .iter()
        .map(|entry| {
            let marker = if Some(entry.version) == active { '*' } else { ' ' };
            format!("{marker} {}", entry.version)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_policy(policy: &Policy, syntax: Syntax) -> String {
    let mut lines = vec![
        format!("version      {}", policy.version),
        format!("reasoner     {} {}", policy.reasoner, policy.reasoner_version),
    ];
    if !policy.description.is_empty() {
        lines.push(format!("description  {}", policy.description));
    }
    if !policy.version_description.is_empty() {
        lines.push(format!("message      {}", policy.version_description));
    }
    lines.push(String::new());
    lines.push(match syntax {
        Syntax::EFlint => policy.content.clone(),
        Syntax::Json => policy.json_content.clone(),
    });
    lines.join("\n")
}

pub fn render_connector(info: &ConnectorInfo) -> String {
    let mut lines = vec![
        format!("hash     {}", info.hash),
        format!("type     {}", info.context.kind),
        format!("version  {}", info.context.version),
    ];
    for (key, value) in &info.context.extra {
        lines.push(format!("{key:<8} {value}"));
    }
    lines.join("\n")
}

/// One line per task: its index, program counter, name and offered datasets.
pub fn render_tasks(catalogue: &WorkflowCatalogue) -> String {
    if catalogue.tasks.is_empty() {
        return "Workflow has no tasks.".to_string();
    }
    let mut lines: Vec<String> = catalogue
        .tasks
        .iter()
        .enumerate()
        .map(|(index, task)| {
            let mut line = format!("{index:>3}  {:<10} {}", task.pg.to_string(), task.name);
            if !task.datasets.is_empty() {
                line.push_str(&format!("  [{}]", task.datasets.join(", ")));
            }
            line
        })
        .collect();
    if !catalogue.results.is_empty() {
        lines.push(format!("results: {}", catalogue.results.join(", ")));
    }
    lines.join("\n")
}
