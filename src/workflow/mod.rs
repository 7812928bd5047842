pub mod addressing;
pub mod editor;
pub mod types;

pub use addressing::{WorkflowCatalogue, extract_results, extract_tasks};
pub use editor::WorkflowEditor;
pub use types::{MAIN_SCOPE, ProgramCounter, Scope, TaskOption, Workflow};
