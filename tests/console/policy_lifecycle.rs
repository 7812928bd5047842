use std::sync::Arc;

use reasoner_console::api::memory::MEMORY_EFLINT_HEADER;
use reasoner_console::api::{Backend, MemoryBackend, MemoryOp};
use reasoner_console::config::Config;
use reasoner_console::error::{ApiError, ConsoleError, PolicyError};
use reasoner_console::policy::{NEW_VERSION, Selection, Syntax};
use reasoner_console::session::Resource;
use reasoner_console::Console;

fn console() -> (Arc<MemoryBackend>, Console) {
    let backend = Arc::new(MemoryBackend::new());
    backend
        .accept_token(Resource::Policy, "policy-token")
        .accept_token(Resource::Deliberation, "delib-token");
    let mut config = Config::default();
    config.auth.policy_token = Some("policy-token".into());
    config.auth.deliberation_token = Some("delib-token".into());
    let console = Console::with_backend(config, Arc::clone(&backend) as Arc<dyn Backend>);
    (backend, console)
}

#[tokio::test]
async fn draft_commit_activate_and_revise() {
    let (backend, console) = console();
    console.start().await.unwrap();
    let policies = console.policies();

    policies.refresh().await.unwrap();
    assert!(policies.list().is_empty());
    assert_eq!(policies.active_version(), None);

    policies.start_draft(None).unwrap();
    assert_eq!(policies.list()[0].version, NEW_VERSION);
    assert_eq!(policies.selection(), Selection::Draft);
    policies
        .update_draft(|draft| {
            draft.content = r#"[{"kind":"fact","name":"allowed"}]"#.into();
            draft.version_description = "first".into();
        })
        .unwrap();

    assert_eq!(policies.commit().await.unwrap(), Some(1));
    assert!(policies.draft().is_none());
    assert_eq!(policies.selection(), Selection::Committed(1));

    assert_eq!(policies.activate(1).await.unwrap(), Some(1));
    assert_eq!(backend.active(), Some(1));

    let first = policies.select(1).await.unwrap().unwrap();
    assert!(first.content.starts_with(MEMORY_EFLINT_HEADER));
    assert_eq!(first.version_description, "first");
    assert_eq!(first.reasoner, "eflint-json");

    policies.start_draft(Some(&first)).unwrap();
    let source = first.content.clone();
    policies
        .update_draft(|draft| {
            draft.content = source;
            draft.syntax = Syntax::EFlint;
            draft.version_description = "second".into();
        })
        .unwrap();
    assert_eq!(policies.commit().await.unwrap(), Some(2));

    // Committing never moves the active pointer.
    assert_eq!(policies.active_version(), Some(1));
    assert_eq!(
        backend.policy(2).unwrap().content,
        backend.policy(1).unwrap().content
    );

    assert_eq!(policies.selection(), Selection::Committed(2));
    assert_eq!(policies.toggle_activation().await.unwrap(), Some(2));
    assert_eq!(policies.toggle_activation().await.unwrap(), None);
    assert_eq!(backend.active(), None);
}

#[tokio::test]
async fn failed_commit_keeps_the_draft() {
    let (backend, console) = console();
    console.start().await.unwrap();
    let policies = console.policies();
    policies.start_draft(None).unwrap();
    policies
        .update_draft(|draft| draft.version_description = "kept".into())
        .unwrap();
    backend.fail_next(
        MemoryOp::AddPolicy,
        ApiError::http(500, "Internal Server Error", r#"{"detail":"store offline"}"#),
    );

    assert!(policies.commit().await.is_err());

    let draft = policies.draft().unwrap();
    assert_eq!(draft.version_description, "kept");
    assert_eq!(policies.selection(), Selection::Draft);
    assert_eq!(console.drain_notifications(), vec!["store offline"]);
}

#[tokio::test]
async fn incomplete_draft_is_not_sent() {
    let (backend, console) = console();
    console.start().await.unwrap();
    console.policies().start_draft(None).unwrap();

    assert!(matches!(
        console.policies().commit().await,
        Err(ConsoleError::Policy(PolicyError::IncompleteDraft))
    ));
    assert_eq!(backend.calls(MemoryOp::AddPolicy), 0);
}

#[tokio::test]
async fn activating_a_missing_version_leaves_the_pointer_alone() {
    let (backend, console) = console();
    console.start().await.unwrap();
    let policies = console.policies();
    policies.start_draft(None).unwrap();
    policies
        .update_draft(|draft| draft.version_description = "only".into())
        .unwrap();
    policies.commit().await.unwrap();
    policies.activate(1).await.unwrap();

    assert!(policies.activate(7).await.is_err());

    assert_eq!(policies.active_version(), Some(1));
    assert_eq!(backend.active(), Some(1));
    assert_eq!(console.drain_notifications(), vec!["policy not found"]);
}
