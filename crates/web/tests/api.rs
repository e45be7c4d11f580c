//! REST API tests over real HTTP.
//!
//! Each test starts the server on an ephemeral localhost port backed by a
//! scratch SQLite file and talks to it with `reqwest`.

use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;

use ldapmerge_core::db::Database;
use ldapmerge_web::WebServer;

struct TestServer {
    base_url: String,
    http: reqwest::Client,
    _dir: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("data.db")).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            WebServer::new(db).serve(listener).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            http: reqwest::Client::new(),
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let resp = self.http.get(self.url(path)).send().await.unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn send(&self, method: reqwest::Method, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = self
            .http
            .request(method, self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }
}

fn merge_body() -> Value {
    json!({
        "initial": [{
            "id": "example.lab",
            "domain_name": "example.lab",
            "base_dn": "DC=example,DC=lab",
            "alternative_domain_names": ["EXAMPLE"],
            "ldap_servers": [
                {"url": "ldaps://a:636", "starttls": "False", "enabled": "true",
                 "bind_username": "svc", "bind_password": "pw"},
                {"url": "ldaps://b:636", "starttls": "false", "enabled": "true",
                 "certificates": ["STALE"]}
            ]
        }],
        "response": {"results": [
            {"json": {"pem_encoded": "CERT1", "details": [{"subject_cn": "a"}]},
             "item": {"url": "ldaps://a:636", "starttls": "false", "enabled": "true"},
             "ansible_loop_var": "item"},
            {"json": {"pem_encoded": "CERT2"}, "item": {"url": "ldaps://a:636"}},
            {"json": {"pem_encoded": ""}, "item": {"url": "ldaps://b:636"}}
        ]}
    })
}

#[tokio::test]
async fn health_reports_database() {
    let server = TestServer::start().await;
    let (status, body) = server.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"]["wal_mode"], true);
    assert_eq!(body["database"]["history_count"], 0);
}

#[tokio::test]
async fn merge_returns_result_and_records_history() {
    let server = TestServer::start().await;

    let (status, merged) = server
        .send(reqwest::Method::POST, "/api/merge", merge_body())
        .await;
    assert_eq!(status, StatusCode::OK);

    let servers = &merged[0]["ldap_servers"];
    assert_eq!(servers[0]["certificates"], json!(["CERT1", "CERT2"]));
    assert_eq!(servers[0]["starttls"], "False");
    assert_eq!(servers[0]["bind_password"], "pw");
    // stale certificates are dropped and the field omitted
    assert!(servers[1].get("certificates").is_none());
    assert!(servers[1].get("bind_username").is_none());

    let (status, list) = server.get("/api/history").await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["result"], merged);

    let id = list[0]["id"].as_i64().unwrap();
    let (status, entry) = server.get(&format!("/api/history/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["initial"][0]["id"], "example.lab");
    assert_eq!(entry["response"]["results"][0]["json"]["pem_encoded"], "CERT1");
}

#[tokio::test]
async fn history_limit_and_missing_entry() {
    let server = TestServer::start().await;
    for _ in 0..3 {
        server
            .send(reqwest::Method::POST, "/api/merge", merge_body())
            .await;
    }

    let (_, list) = server.get("/api/history?limit=2").await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert!(list[0]["id"].as_i64() > list[1]["id"].as_i64());

    let (status, body) = server.get("/api/history/9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn malformed_merge_body_is_rejected() {
    let server = TestServer::start().await;
    let resp = server
        .http
        .post(server.url("/api/merge"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn profile_lifecycle() {
    let server = TestServer::start().await;

    let (status, created) = server
        .send(
            reqwest::Method::POST,
            "/api/configs",
            json!({
                "name": "lab",
                "description": "lab manager",
                "host": "https://nsx.example.lab",
                "username": "admin",
                "password": "VMware1!",
                "insecure": true
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created.get("password").is_none());
    let id = created["id"].as_i64().unwrap();

    let (status, fetched) = server.get(&format!("/api/configs/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "lab");
    assert_eq!(fetched["insecure"], true);
    assert!(fetched.get("password").is_none());

    let (status, updated) = server
        .send(
            reqwest::Method::PUT,
            &format!("/api/configs/{id}"),
            json!({"name": "lab", "host": "https://nsx2.example.lab", "username": "admin"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["host"], "https://nsx2.example.lab");

    let (_, list) = server.get("/api/configs").await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let resp = server
        .http
        .delete(server.url(&format!("/api/configs/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let (status, _) = server.get(&format!("/api/configs/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let resp = server
        .http
        .delete(server.url(&format!("/api/configs/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_validation_and_conflicts() {
    let server = TestServer::start().await;

    let (status, body) = server
        .send(
            reqwest::Method::POST,
            "/api/configs",
            json!({"name": "lab", "host": "", "username": "admin"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "host is required");

    let profile = json!({"name": "lab", "host": "https://nsx.lab", "username": "admin"});
    let (status, _) = server
        .send(reqwest::Method::POST, "/api/configs", profile.clone())
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = server
        .send(reqwest::Method::POST, "/api/configs", profile)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = server
        .send(
            reqwest::Method::PUT,
            "/api/configs/4242",
            json!({"name": "ghost", "host": "https://nsx.lab", "username": "admin"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
