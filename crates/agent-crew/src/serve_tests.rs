use super::*;
use crew_core::Role;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

struct TestServer {
    dir: tempfile::TempDir,
    addr: SocketAddr,
    crew: Arc<Crew>,
}

async fn start() -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let mut config = CrewConfig::default();
    config.paths.data_dir = Some(dir.path().join("data"));
    config.paths.prompts_dir = Some(dir.path().join("prompts"));
    config.paths.features_file = Some(dir.path().join("features.md"));
    let crew = Arc::new(Crew::from_config(&config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(crew.clone());
    tokio::spawn(async move { axum::serve(listener, app).await });

    TestServer {
        dir,
        addr,
        crew,
    }
}

impl TestServer {
    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    async fn send(&self, method: &str, path: &str, body: Option<&str>) -> (u16, Value) {
        let mut stream = tokio::net::TcpStream::connect(self.addr).await.unwrap();
        let body = body.unwrap_or("");
        let request = format!(
            "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        let (head, payload) = raw.split_once("\r\n\r\n").unwrap();
        let status = head.split_whitespace().nth(1).unwrap().parse().unwrap();
        (status, serde_json::from_str(payload).unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        self.send("POST", path, Some(&body.to_string())).await
    }
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let server = start().await;
    let (status, body) = server.send("GET", "/api/nope", None).await;
    assert_eq!(status, 404);
    assert_eq!(body, json!({ "error": "Route not found" }));
}

#[tokio::test]
async fn test_validate_working_dir() {
    let server = start().await;
    let work = server.path("work");
    std::fs::create_dir_all(&work).unwrap();

    let (status, body) = server
        .post("/api/validate-working-dir", json!({ "workingDir": work }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "success": true }));
    assert!(work.join(".claude/settings.local.json").is_file());

    let (status, body) = server
        .post("/api/validate-working-dir", json!({ "workingDir": "relative/dir" }))
        .await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("absolute"));

    let (status, body) = server.post("/api/validate-working-dir", json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Working directory is required");
}

#[tokio::test]
async fn test_get_absolute_path_normalizes() {
    let server = start().await;
    let (status, body) = server
        .post("/api/get-absolute-path", json!({ "dirName": "projects/../site" }))
        .await;
    assert_eq!(status, 200);
    let expected = std::env::current_dir().unwrap().join("site");
    assert_eq!(body["absolutePath"], json!(expected));
}

#[tokio::test]
async fn test_prompt_requires_fields() {
    let server = start().await;
    let (status, body) = server
        .post("/api/prompt", json!({ "workingDir": "/tmp" }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Prompt is required");

    let (status, body) = server.post("/api/prompt", json!({ "prompt": "Build it" })).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Working directory is required");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let server = start().await;
    let (status, body) = server.send("POST", "/api/prompt", Some("{not json")).await;
    assert_eq!(status, 400);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_agent_communication_rejects_unknown_role() {
    let server = start().await;
    let (status, body) = server
        .post(
            "/api/agent-communication",
            json!({
                "fromRole": "designer",
                "toRole": "project_manager",
                "projectId": "01J0000000000000000000000A",
                "message": "hello",
            }),
        )
        .await;
    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("designer"));
}

#[tokio::test]
async fn test_project_status() {
    let server = start().await;
    let project = ProjectId::new();

    let (status, _) = server
        .send("GET", &format!("/api/project-status/{project}"), None)
        .await;
    assert_eq!(status, 400);

    server
        .crew
        .store()
        .append_memory(Role::Qa, &project, "Recette passée")
        .unwrap();
    let (status, body) = server
        .send("GET", &format!("/api/project-status/{project}"), None)
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["memories"]["qa"], "Recette passée");
    assert_eq!(body["tasks"], json!({}));
}

#[tokio::test]
async fn test_kill_reports_count() {
    let server = start().await;
    let (status, body) = server.send("POST", "/api/kill-claude", None).await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Terminated 0 tool process(es)");
}

#[test]
fn test_error_classification() {
    let err: ApiError = anyhow::Error::from(CrewError::Validation("bad".into())).into();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert_eq!(err.message, "bad");

    let err: ApiError = anyhow::Error::from(CrewError::Backup("disk full".into())).into();
    assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);

    let err: ApiError = anyhow::anyhow!("boom").into();
    assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
}
