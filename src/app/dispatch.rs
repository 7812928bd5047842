use crate::app::status::{
    render_connector, render_policy, render_policy_list, render_session, render_tasks,
};
use crate::cli::commands::{AuthCommands, Cli, Commands, PolicyCommands, WorkflowCommands};
use crate::config::Config;
use crate::console::Console;
use crate::deliberation::DeliberationKind;
use crate::policy::{Draft, Syntax};
use crate::session::Resource;
use anyhow::{Context, Result, anyhow, bail};
use std::path::Path;
use tracing::info;

fn parse_resource(name: &str) -> Result<Resource> {
    name.parse()
        .map_err(|_| anyhow!("unknown resource '{name}', expected policy or deliberation"))
}

fn parse_syntax(name: &str) -> Result<Syntax> {
    name.parse()
        .map_err(|_| anyhow!("unknown syntax '{name}', expected eflint or json"))
}

async fn read_source(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Store or clear the token for `resource` in the config file on disk.
///
/// Reloads the file so environment overrides are not written back.
fn persist_token(config: &Config, resource: Resource, token: Option<String>) -> Result<()> {
    let Some(dir) = config.config_path.parent() else {
        return Ok(());
    };
    let mut stored = Config::load_or_init_in(dir)?;
    match resource {
        Resource::Policy => stored.auth.policy_token = token,
        Resource::Deliberation => stored.auth.deliberation_token = token,
    }
    stored.save()
}

/// Fill a draft from `policy commit` arguments. Without a source file the
/// content seeded from the parent version stays.
fn fill_draft(
    draft: &mut Draft,
    source: Option<(String, Syntax)>,
    message: String,
    description: Option<String>,
) {
    if let Some((content, syntax)) = source {
        draft.content = content;
        draft.syntax = syntax;
    }
    draft.version_description = message;
    if let Some(description) = description {
        draft.description = description;
    }
}

async fn run_auth(console: &Console, command: AuthCommands) -> Result<()> {
    match command {
        AuthCommands::Status => {
            let snapshot = console.start().await?;
            println!("{}", render_session(&snapshot));
        }
        AuthCommands::Login { resource, token } => {
            let resource = parse_resource(&resource)?;
            let token = token
                .or_else(|| console.config().token_for(resource).map(str::to_string))
                .with_context(|| format!("No token given or configured for {resource}"))?;
            console.session().refresh().await?;
            console.login(resource, &token).await?;
            if !console.session().authenticated(resource) {
                bail!("The backend did not accept the {resource} token");
            }
            persist_token(console.config(), resource, Some(token))?;
            info!(%resource, "logged in");
            println!("Logged in to {resource}.");
        }
        AuthCommands::Logout { resource } => {
            let resource = parse_resource(&resource)?;
            console.start().await?;
            console.logout(resource).await?;
            persist_token(console.config(), resource, None)?;
            println!("Logged out of {resource}.");
        }
    }
    Ok(())
}

async fn run_policy(console: &Console, command: PolicyCommands) -> Result<()> {
    console.start().await?;
    let policies = console.policies();
    match command {
        PolicyCommands::List => {
            policies.refresh().await?;
            println!(
                "{}",
                render_policy_list(&policies.list(), policies.active_version())
            );
        }
        PolicyCommands::Show { version, syntax } => {
            let syntax = parse_syntax(&syntax)?;
            let policy = policies
                .select(version)
                .await?
                .with_context(|| format!("Version {version} could not be loaded"))?;
            println!("{}", render_policy(&policy, syntax));
        }
        PolicyCommands::Commit {
            file,
            message,
            description,
            syntax,
            parent,
        } => {
            let syntax = parse_syntax(&syntax)?;
            let source = match file {
                Some(file) => Some((read_source(&file).await?, syntax)),
                None => None,
            };
            let parent = match parent {
                Some(version) => Some(
                    policies
                        .select(version)
                        .await?
                        .with_context(|| format!("Version {version} could not be loaded"))?,
                ),
                None => None,
            };
            policies.start_draft(parent.as_ref())?;
            policies.update_draft(|draft| fill_draft(draft, source, message, description))?;
            match policies.commit().await? {
                Some(version) => println!("Committed version {version}."),
                None => println!("Committed."),
            }
        }
        PolicyCommands::Activate { version } => {
            policies.activate(version).await?;
            println!("Version {version} is active.");
        }
        PolicyCommands::Deactivate => {
            policies.deactivate().await?;
            println!("No version is active.");
        }
        PolicyCommands::Active => match policies.refresh_active().await? {
            Some(version) => println!("{version}"),
            None => println!("No version is active."),
        },
    }
    Ok(())
}

async fn run_workflow(console: &Console, command: WorkflowCommands) -> Result<()> {
    match command {
        WorkflowCommands::Tasks { file } => {
            console.start().await?;
            console.set_workflow_source(read_source(&file).await?);
            match console.compile_workflow().await? {
                Some(catalogue) => println!("{}", render_tasks(&catalogue)),
                None => println!("Workflow is empty."),
            }
        }
    }
    Ok(())
}

async fn run_deliberate(
    console: &Console,
    kind: &str,
    file: &Path,
    task: Option<usize>,
    dataset: Option<String>,
) -> Result<()> {
    let kind: DeliberationKind = kind
        .parse()
        .map_err(|_| anyhow!("unknown request kind '{kind}'"))?;
    console.start().await?;
    console.set_workflow_source(read_source(file).await?);
    if console.compile_workflow().await?.is_none() {
        bail!("Workflow is empty");
    }
    {
        let mut composer = console.composer();
        composer.select_kind(kind);
        composer.select_task(task);
        if let Some(dataset) = dataset {
            composer.set_dataset(dataset);
        }
    }
    let outcome = console.deliberate().await?;
    if outcome.is_failure() {
        bail!("{}", outcome.text());
    }
    println!("{}", outcome.text());
    Ok(())
}

async fn run(console: &Console, command: Commands) -> Result<()> {
    match command {
        Commands::Auth { auth_command } => run_auth(console, auth_command).await,
        Commands::Policy { policy_command } => run_policy(console, policy_command).await,
        Commands::ConnectorInfo => {
            console.start().await?;
            let info = console.policies().connector_info().await?;
            println!("{}", render_connector(&info));
            Ok(())
        }
        Commands::Workflow { workflow_command } => run_workflow(console, workflow_command).await,
        Commands::Deliberate {
            kind,
            file,
            task,
            dataset,
        } => run_deliberate(console, &kind, &file, task, dataset).await,
    }
}

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    config.validate()?;
    let console = Console::new(config);
    let result = run(&console, cli.command).await;
    for message in console.drain_notifications() {
        eprintln!("! {message}");
    }
    result
}
