use crate::error::FormatViolation;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Literal used for the main body in a program counter.
pub const MAIN_SCOPE: &str = "<main>";

/// Edge kind that executes a task.
pub const NODE_EDGE: &str = "nod";

/// Edge kind that returns from a body.
pub const RETURN_EDGE: &str = "ret";

/// A compiled workflow.
///
/// The full JSON document is kept as-is so it goes back to the backend
/// byte-for-byte equivalent (64-bit identifiers included); the parts the
/// console needs for addressing are parsed next to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Workflow {
    raw: serde_json::Value,
    graph: Graph,
}

/// The addressing-relevant part of a compiled workflow.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Graph {
    /// Edges of the main body, in order.
    pub graph: Vec<Edge>,
    /// Edges of each function body, keyed by function index.
    #[serde(default)]
    pub funcs: BTreeMap<usize, Vec<Edge>>,
    #[serde(default)]
    pub table: SymbolTable,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SymbolTable {
    #[serde(default)]
    pub tasks: Vec<TaskDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskDef {
    #[serde(default)]
    pub d: TaskSignature,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskSignature {
    #[serde(default)]
    pub n: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Edge {
    pub kind: String,
    /// Task table index of a task node.
    #[serde(default)]
    pub t: Option<usize>,
    /// Inputs of a task node.
    #[serde(default)]
    pub i: Option<serde_json::Value>,
    /// Result of a return edge.
    #[serde(default)]
    pub r: Option<serde_json::Value>,
}

impl Edge {
    pub fn is_node(&self) -> bool {
        self.kind == NODE_EDGE
    }

    /// Names of the datasets a task node consumes.
    pub fn input_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        match &self.i {
            Some(serde_json::Value::Object(inputs)) => {
                names.extend(inputs.keys().cloned());
            }
            Some(serde_json::Value::Array(entries)) => {
                for entry in entries {
                    match entry {
                        serde_json::Value::Array(pair) if !pair.is_empty() => {
                            collect_data_names(&pair[0], &mut names);
                        }
                        other => collect_data_names(other, &mut names),
                    }
                }
            }
            _ => {}
        }
        dedup(names)
    }

    /// Names of the datasets a return edge hands back.
    pub fn result_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(result) = &self.r {
            collect_data_names(result, &mut names);
        }
        dedup(names)
    }
}

/// Accepts plain names, externally tagged names (`{"Data": "x"}`) and lists
/// of either.
fn collect_data_names(value: &serde_json::Value, names: &mut Vec<String>) {
    match value {
        serde_json::Value::String(name) if !name.is_empty() => names.push(name.clone()),
        serde_json::Value::Array(items) => {
            for item in items {
                collect_data_names(item, names);
            }
        }
        serde_json::Value::Object(tagged) if tagged.len() == 1 => {
            if let Some(serde_json::Value::String(name)) = tagged.values().next() {
                names.push(name.clone());
            }
        }
        _ => {}
    }
}

fn dedup(names: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

impl Workflow {
    pub fn from_value(raw: serde_json::Value) -> Result<Self, FormatViolation> {
        let graph =
            Graph::deserialize(&raw).map_err(|err| FormatViolation::Malformed(err.to_string()))?;
        Ok(Self { raw, graph })
    }

    pub fn from_json(text: &str) -> Result<Self, FormatViolation> {
        let raw: serde_json::Value =
            serde_json::from_str(text).map_err(|err| FormatViolation::Malformed(err.to_string()))?;
        Self::from_value(raw)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.raw
    }
}

impl Serialize for Workflow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Workflow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Self::from_value(raw).map_err(D::Error::custom)
    }
}

// ── Program counters ─────────────────────────────────────────────

/// The body a program counter points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Main,
    Func(usize),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => f.write_str(MAIN_SCOPE),
            Self::Func(index) => write!(f, "{index}"),
        }
    }
}

impl Serialize for Scope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Main => serializer.serialize_str(MAIN_SCOPE),
            Self::Func(index) => serializer.serialize_u64(*index as u64),
        }
    }
}

impl<'de> Deserialize<'de> for Scope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Index(usize),
            Name(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Index(index) => Ok(Self::Func(index)),
            Repr::Name(name) if name == MAIN_SCOPE => Ok(Self::Main),
            Repr::Name(name) => name
                .parse()
                .map(Self::Func)
                .map_err(|_| D::Error::custom(format!("invalid scope '{name}'"))),
        }
    }
}

/// Positional address `[scope, offset]` of a task node.
///
/// Only valid for the compiled workflow it was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(Scope, usize)", into = "(Scope, usize)")]
pub struct ProgramCounter {
    pub scope: Scope,
    pub offset: usize,
}

impl ProgramCounter {
    pub fn main(offset: usize) -> Self {
        Self {
            scope: Scope::Main,
            offset,
        }
    }

    pub fn func(index: usize, offset: usize) -> Self {
        Self {
            scope: Scope::Func(index),
            offset,
        }
    }
}

impl From<(Scope, usize)> for ProgramCounter {
    fn from((scope, offset): (Scope, usize)) -> Self {
        Self { scope, offset }
    }
}

impl From<ProgramCounter> for (Scope, usize) {
    fn from(pc: ProgramCounter) -> Self {
        (pc.scope, pc.offset)
    }
}

impl fmt::Display for ProgramCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.offset)
    }
}

/// A selectable task of a compiled workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOption {
    pub pg: ProgramCounter,
    pub name: String,
    #[serde(default)]
    pub datasets: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn program_counter_serializes_as_pair() {
        assert_eq!(
            serde_json::to_value(ProgramCounter::main(2)).unwrap(),
            json!(["<main>", 2])
        );
        assert_eq!(
            serde_json::to_value(ProgramCounter::func(4, 0)).unwrap(),
            json!([4, 0])
        );
    }

    #[test]
    fn program_counter_accepts_stringly_function_index() {
        let pc: ProgramCounter = serde_json::from_value(json!(["3", 1])).unwrap();
        assert_eq!(pc, ProgramCounter::func(3, 1));
        let pc: ProgramCounter = serde_json::from_value(json!(["<main>", 5])).unwrap();
        assert_eq!(pc, ProgramCounter::main(5));
        assert!(serde_json::from_value::<ProgramCounter>(json!(["main", 5])).is_err());
    }

    #[test]
    fn program_counter_displays_like_the_picker() {
        assert_eq!(ProgramCounter::main(0).to_string(), "<main>:0");
        assert_eq!(ProgramCounter::func(2, 7).to_string(), "2:7");
    }

    #[test]
    fn workflow_keeps_unknown_fields_and_exact_integers() {
        let text = r#"{"id":"wf","graph":[],"funcs":{},"table":{"tasks":[]},"user":18446744073709551615}"#;
        let workflow = Workflow::from_json(text).unwrap();
        let out = serde_json::to_string(&workflow).unwrap();
        assert!(out.contains("18446744073709551615"));
        assert!(out.contains(r#""id":"wf""#));
    }

    #[test]
    fn workflow_parses_integer_function_keys() {
        let workflow = Workflow::from_value(json!({
            "graph": [],
            "funcs": {"10": [{"kind": "ret"}], "2": []},
            "table": {"tasks": []}
        }))
        .unwrap();
        let keys: Vec<usize> = workflow.graph().funcs.keys().copied().collect();
        assert_eq!(keys, vec![2, 10]);
    }

    #[test]
    fn workflow_without_graph_is_malformed() {
        let err = Workflow::from_value(json!({"funcs": {}})).unwrap_err();
        assert!(matches!(err, FormatViolation::Malformed(_)));
    }

    #[test]
    fn input_names_accept_object_and_tagged_list_forms() {
        let edge: Edge =
            serde_json::from_value(json!({"kind": "nod", "t": 0, "i": {"a": null, "b": null}}))
                .unwrap();
        assert_eq!(edge.input_names(), vec!["a", "b"]);

        let edge: Edge = serde_json::from_value(json!({
            "kind": "nod", "t": 0,
            "i": [[{"Data": "x"}, null], {"IntermediateResult": "y"}]
        }))
        .unwrap();
        assert_eq!(edge.input_names(), vec!["x", "y"]);
    }

    #[test]
    fn result_names_deduplicate() {
        let edge: Edge =
            serde_json::from_value(json!({"kind": "ret", "r": [{"Data": "out"}, "out"]})).unwrap();
        assert_eq!(edge.result_names(), vec!["out"]);
    }
}
