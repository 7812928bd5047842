use std::sync::Arc;

use reasoner_console::api::{Backend, MemoryBackend, MemoryOp};
use reasoner_console::config::Config;
use reasoner_console::error::{ApiError, ConsoleError, SessionError};
use reasoner_console::session::Resource;
use reasoner_console::Console;

fn console(config: Config) -> (Arc<MemoryBackend>, Console) {
    let backend = Arc::new(MemoryBackend::new());
    backend
        .accept_token(Resource::Policy, "policy-token")
        .accept_token(Resource::Deliberation, "delib-token");
    let console = Console::with_backend(config, Arc::clone(&backend) as Arc<dyn Backend>);
    (backend, console)
}

#[tokio::test]
async fn expired_policy_credential_keeps_the_deliberation_session() {
    let mut config = Config::default();
    config.auth.policy_token = Some("policy-token".into());
    config.auth.deliberation_token = Some("delib-token".into());
    let (backend, console) = console(config);
    console.start().await.unwrap();
    backend.fail_next(
        MemoryOp::ListPolicies,
        ApiError::http(401, "Unauthorized", ""),
    );

    assert!(console.policies().refresh_list().await.is_err());

    assert!(!console.session().authenticated(Resource::Policy));
    assert!(console.session().authenticated(Resource::Deliberation));
    assert!(!backend.has_cookie(Resource::Policy));
    assert!(backend.has_cookie(Resource::Deliberation));
    assert!(console.drain_notifications().is_empty());
}

#[tokio::test]
async fn policy_actions_need_a_policy_session() {
    let mut config = Config::default();
    config.auth.deliberation_token = Some("delib-token".into());
    let (backend, console) = console(config);
    console.start().await.unwrap();

    assert!(matches!(
        console.policies().activate(1).await,
        Err(ConsoleError::Session(SessionError::NotAuthenticated(Resource::Policy)))
    ));
    assert_eq!(backend.calls(MemoryOp::Activate), 0);
}

#[tokio::test]
async fn login_then_logout_touches_one_resource() {
    let (backend, console) = console(Config::default());
    console.start().await.unwrap();

    console
        .login(Resource::Deliberation, "delib-token")
        .await
        .unwrap();
    console.login(Resource::Policy, "policy-token").await.unwrap();
    assert!(console.session().snapshot().policy);

    console.logout(Resource::Policy).await.unwrap();

    let snapshot = console.session().snapshot();
    assert!(!snapshot.policy);
    assert!(snapshot.deliberation);
    assert!(backend.has_cookie(Resource::Deliberation));
}

#[tokio::test]
async fn blank_token_is_refused_locally() {
    let (backend, console) = console(Config::default());

    assert!(matches!(
        console.login(Resource::Policy, "   ").await,
        Err(ConsoleError::Session(SessionError::EmptyCredential(
            Resource::Policy
        )))
    ));
    assert_eq!(backend.calls(MemoryOp::Authenticate), 0);
}
