use relay_core::TabId;
use relay_engine::{
    AgentError, AutomationAgent, AutomationRequest, HttpAgentSettings, HttpAutomationAgent,
};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn agent_for(server: &MockServer) -> HttpAutomationAgent {
    HttpAutomationAgent::new(HttpAgentSettings {
        base_url: server.uri(),
        ..HttpAgentSettings::default()
    })
    .expect("client builds")
}

#[tokio::test]
async fn lists_tabs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tabs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "7", "url": "https://chatgpt.com/c/abc" },
            { "id": "8", "url": "https://example.org/" }
        ])))
        .mount(&server)
        .await;

    let tabs = agent_for(&server).list_tabs().await.expect("tabs");
    assert_eq!(tabs.len(), 2);
    assert_eq!(tabs[0].id, TabId::from("7"));
    assert_eq!(tabs[1].url, "https://example.org/");
}

#[tokio::test]
async fn ping_reads_ready_flag() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tabs/7/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ready": true })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tabs/8/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let agent = agent_for(&server);
    assert!(agent.ping(&TabId::from("7")).await.unwrap());
    assert!(!agent.ping(&TabId::from("8")).await.unwrap());
}

#[tokio::test]
async fn inject_accepts_empty_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tabs/7/inject"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    agent_for(&server)
        .inject(&TabId::from("7"))
        .await
        .expect("inject ok");
}

#[tokio::test]
async fn send_posts_request_and_decodes_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tabs/7/run"))
        .and(body_json(json!({ "prompt": "hello", "tool": "search" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "text": "hi" }
        })))
        .mount(&server)
        .await;

    let request = AutomationRequest {
        prompt: "hello".into(),
        tool: Some("search".into()),
        mode: None,
        image_ref: None,
    };
    let reply = agent_for(&server)
        .send(&TabId::from("7"), &request)
        .await
        .expect("reply");
    assert!(reply.success);
    assert_eq!(reply.data, Some(json!({ "text": "hi" })));
    assert_eq!(reply.error, None);
}

#[tokio::test]
async fn error_status_is_reported_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tabs"))
        .respond_with(ResponseTemplate::new(503).set_body_string("host busy"))
        .mount(&server)
        .await;

    let err = agent_for(&server).list_tabs().await.unwrap_err();
    assert_eq!(
        err,
        AgentError::Status {
            status: 503,
            body: "host busy".into()
        }
    );
}

#[tokio::test]
async fn malformed_reply_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tabs/7/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = agent_for(&server).ping(&TabId::from("7")).await.unwrap_err();
    assert!(matches!(err, AgentError::Decode(_)));
}

#[tokio::test]
async fn unreachable_host_is_a_transport_error() {
    let agent = HttpAutomationAgent::new(HttpAgentSettings {
        base_url: "http://127.0.0.1:9".into(),
        ..HttpAgentSettings::default()
    })
    .unwrap();

    let err = agent.list_tabs().await.unwrap_err();
    assert!(matches!(err, AgentError::Transport(_)));
}
