use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `reasoner-console` - Operator console for a policy reasoner.
#[derive(Parser, Debug)]
#[command(name = "reasoner-console")]
#[command(version)]
#[command(about = "Manage reasoner policies and ask for deliberations.", long_about = None)]
pub struct Cli {
    /// Log at debug level regardless of the configured level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage backend sessions
    Auth {
        #[command(subcommand)]
        auth_command: AuthCommands,
    },

    /// Browse, commit and activate policy versions
    Policy {
        #[command(subcommand)]
        policy_command: PolicyCommands,
    },

    /// Show what the reasoner connector reports about itself
    ConnectorInfo,

    /// Inspect compiled workflows
    Workflow {
        #[command(subcommand)]
        workflow_command: WorkflowCommands,
    },

    /// Ask the reasoner whether a workflow, task or transfer is allowed
    Deliberate {
        /// Request kind (task, data, workflow)
        #[arg(value_parser = ["task", "data", "workflow"])]
        kind: String,

        /// Workflow source file (BraneScript)
        file: PathBuf,

        /// Task index as listed by `workflow tasks`
        #[arg(short, long)]
        task: Option<usize>,

        /// Dataset identifier, JSON or one of the task's offered names
        #[arg(short, long)]
        dataset: Option<String>,
    },
}

/// Session subcommands
#[derive(Subcommand, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthCommands {
    /// Show which resources hold a session
    Status,
    /// Open a session for a resource
    Login {
        /// Resource (policy, deliberation)
        #[arg(value_parser = ["policy", "deliberation"])]
        resource: String,
        /// Bearer token; falls back to the configured token
        #[arg(long)]
        token: Option<String>,
    },
    /// Drop the session of a resource
    Logout {
        /// Resource (policy, deliberation)
        #[arg(value_parser = ["policy", "deliberation"])]
        resource: String,
    },
}

/// Policy subcommands
#[derive(Subcommand, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PolicyCommands {
    /// List committed versions, marking the active one
    List,
    /// Print one committed version
    Show {
        version: i64,
        /// Content syntax to print (eflint, json)
        #[arg(long, default_value = "eflint", value_parser = ["eflint", "json"])]
        syntax: String,
    },
    /// Commit a new version from a file, a parent version, or both
    Commit {
        /// Policy content file; may be left out when --parent is given
        #[arg(required_unless_present = "parent")]
        file: Option<PathBuf>,
        /// Description of this version
        #[arg(short, long)]
        message: String,
        /// Description of the policy
        #[arg(long)]
        description: Option<String>,
        /// Syntax of the file (eflint, json)
        #[arg(long, default_value = "json", value_parser = ["eflint", "json"])]
        syntax: String,
        /// Version whose content seeds the new one
        #[arg(long)]
        parent: Option<i64>,
    },
    /// Make a version the active one
    Activate { version: i64 },
    /// Clear the active version
    Deactivate,
    /// Print the active version
    Active,
}

/// Workflow subcommands
#[derive(Subcommand, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkflowCommands {
    /// Compile a workflow and list its addressable tasks
    Tasks {
        /// Workflow source file (BraneScript)
        file: PathBuf,
    },
}
