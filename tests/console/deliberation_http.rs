use reasoner_console::config::Config;
use reasoner_console::deliberation::DeliberationKind;
use reasoner_console::session::Resource;
use reasoner_console::Console;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn compiled_workflow() -> Value {
    json!({
        "id": "wf-1",
        "user": 18_446_744_073_709_551_615_u64,
        "graph": [
            {"kind": "nod", "t": 0, "i": {"d1": null}},
            {"kind": "ret", "r": ["out"]}
        ],
        "funcs": {
            "0": [{"kind": "nod", "t": 1}]
        },
        "table": {"tasks": [{"d": {"n": "fetch"}}, {"d": {"n": "train"}}]}
    })
}

async fn backend() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/authenticate"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"policy": null, "deliberation": "d"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/conv"))
        .and(query_param("from", "branescript"))
        .and(query_param("to", "wir"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "workflow": compiled_workflow(),
            "tasks": [],
            "results": []
        })))
        .mount(&server)
        .await;
    server
}

fn console(server: &MockServer) -> Console {
    let config = Config {
        backend_url: server.uri(),
        ..Config::default()
    };
    Console::new(config)
}

#[tokio::test]
async fn data_request_carries_the_workflow_unchanged() {
    let server = backend().await;
    Mock::given(method("POST"))
        .and(path("/deliberation/data"))
        .and(body_json(json!({
            "workflow": compiled_workflow(),
            "task_id": ["<main>", 0],
            "data_id": "d1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"verdict": "allow"})))
        .expect(1)
        .mount(&server)
        .await;
    let console = console(&server);

    let snapshot = console.start().await.unwrap();
    assert!(!snapshot.policy);
    assert!(snapshot.deliberation);

    console.set_workflow_source("import data; fetch(d1);");
    let catalogue = console.compile_workflow().await.unwrap().unwrap();
    let names: Vec<_> = catalogue.tasks.iter().map(|task| task.name.as_str()).collect();
    assert_eq!(names, ["fetch", "train"]);
    assert_eq!(catalogue.results, ["out"]);

    {
        let mut composer = console.composer();
        composer.select_kind(DeliberationKind::Data);
        composer.select_task(Some(0));
        composer.set_dataset("d1");
    }
    let outcome = console.deliberate().await.unwrap();

    assert!(!outcome.is_failure());
    assert_eq!(outcome.text(), "{\n  \"verdict\": \"allow\"\n}");
}

#[tokio::test]
async fn rejected_deliberation_credential_ends_only_that_session() {
    let server = backend().await;
    Mock::given(method("POST"))
        .and(path("/deliberation/workflow"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/authenticate"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    // No other session was held, so nothing is re-sent.
    Mock::given(method("POST"))
        .and(path("/authenticate"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let console = console(&server);
    console.start().await.unwrap();
    console.set_workflow_source("fetch(d1);");
    console.compile_workflow().await.unwrap();
    console.composer().select_kind(DeliberationKind::Workflow);

    let outcome = console.deliberate().await.unwrap();

    assert!(outcome.is_failure());
    assert_eq!(
        outcome.text(),
        "Call returned invalid statuscode: 401 (Unauthorized)"
    );
    assert!(!console.session().authenticated(Resource::Deliberation));
}

#[tokio::test]
async fn policy_logout_keeps_the_deliberation_session() {
    let server = backend().await;
    // Both sessions exist until the logout.
    Mock::given(method("GET"))
        .and(path("/authenticate"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"policy": "p", "deliberation": "d"})),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    // The backend forgets every credential on DELETE.
    Mock::given(method("DELETE"))
        .and(path("/authenticate"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "policy=; Max-Age=0; Path=/")
                .append_header("set-cookie", "deliberation=; Max-Age=0; Path=/"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/authenticate"))
        .and(body_json(json!({"t": "deliberation", "token": "d"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let console = console(&server);
    let snapshot = console.start().await.unwrap();
    assert!(snapshot.policy && snapshot.deliberation);

    console.logout(Resource::Policy).await.unwrap();

    let snapshot = console.session().snapshot();
    assert!(!snapshot.policy);
    assert!(snapshot.deliberation);
    let methods: Vec<_> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request| request.method.to_string())
        .collect();
    assert_eq!(methods, ["GET", "DELETE", "POST", "GET"]);
}

#[tokio::test]
async fn unknown_dataset_name_is_refused_before_sending() {
    let server = backend().await;
    let console = console(&server);
    console.start().await.unwrap();
    console.set_workflow_source("fetch(d1);");
    console.compile_workflow().await.unwrap();
    {
        let mut composer = console.composer();
        composer.select_kind(DeliberationKind::Data);
        composer.set_dataset("not a dataset");
    }

    assert!(console.deliberate().await.is_err());
    let received = server.received_requests().await.unwrap();
    assert!(
        received
            .iter()
            .all(|request| !request.url.path().starts_with("/deliberation"))
    );
}
