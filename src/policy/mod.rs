pub mod manager;
pub mod types;

pub use manager::PolicyManager;
pub use types::{DRAFT_TEMPLATE, Draft, NEW_VERSION, Policy, Selection, Syntax, canonical_json};
