//! HTTP backend client
//!
//! Talks to the database gateway under `{base}/database/*`. Every response
//! must be a 2xx JSON body; HTML error pages and `status != "success"`
//! payloads are failures.

use async_trait::async_trait;
use pipeloom_core::config::BackendConfig;
use pipeloom_core::schema::{Table, TableSelection};
use pipeloom_core::Credential;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::backend::Backend;
use crate::demo::DEMO_DATABASES;
use crate::error::{Error, Result};

/// Longest slice of an error body kept in [`Error::HttpStatus`]
const BODY_SNIPPET: usize = 200;

/// Join an optional CORS proxy prefix and the backend base URL
pub fn resolve_base_url(base_url: &str, cors_proxy: Option<&str>) -> String {
    let base = base_url.trim().trim_end_matches('/');
    match cors_proxy.map(str::trim).filter(|p| !p.is_empty()) {
        Some(proxy) => format!("{}/{}", proxy.trim_end_matches('/'), base),
        None => base.to_string(),
    }
}

#[derive(Debug, Serialize)]
struct ConnectRequest<'a> {
    db_type: &'a str,
    host: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<String>,
    username: &'a str,
    password: &'a str,
}

impl<'a> ConnectRequest<'a> {
    fn from_credential(credential: &'a Credential) -> Result<Self> {
        Ok(Self {
            db_type: credential.connection_type.as_str(),
            host: credential.require_host()?,
            port: credential.effective_port(),
            username: credential.username_or_empty(),
            password: credential.password.as_ref().map(|p| p.expose()).unwrap_or(""),
        })
    }
}

#[derive(Debug, Serialize)]
struct SelectDatabaseRequest<'a> {
    #[serde(flatten)]
    connection: ConnectRequest<'a>,
    database: &'a str,
}

#[derive(Debug, Serialize)]
struct PreviewRequest<'a> {
    table_name: &'a str,
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct ConnectResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    databases: Vec<String>,
}

/// Backends report tables either by name or with their columns
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TableEntry {
    Name(String),
    Full(Table),
}

impl From<TableEntry> for Table {
    fn from(entry: TableEntry) -> Self {
        match entry {
            TableEntry::Name(name) => Table::new(name, Vec::new()),
            TableEntry::Full(table) => table,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TablesResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    tables: Vec<TableEntry>,
}

#[derive(Debug, Deserialize)]
struct PreviewResponse {
    data: Vec<Value>,
}

fn require_success(status: Option<&str>, message: Option<String>) -> Result<()> {
    match status {
        Some("success") => Ok(()),
        other => Err(Error::Rejected {
            message: message.unwrap_or_else(|| {
                format!("backend reported status '{}'", other.unwrap_or("missing"))
            }),
        }),
    }
}

fn parse_body<T: DeserializeOwned>(text: &str) -> Result<T> {
    if text.trim_start().starts_with('<') {
        return Err(Error::MalformedBody {
            message: "expected JSON but received HTML".to_string(),
        });
    }
    serde_json::from_str(text).map_err(|e| Error::MalformedBody {
        message: e.to_string(),
    })
}

fn snippet(text: &str) -> String {
    text.chars().take(BODY_SNIPPET).collect()
}

/// Client for the HTTP database gateway
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl ApiClient {
    /// Build a client from backend configuration and an optional CORS
    /// proxy prefix
    pub fn new(config: &BackendConfig, cors_proxy: Option<&str>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        let base_url = resolve_base_url(&config.base_url, cors_proxy);
        tracing::debug!(%base_url, "Created API client");
        Ok(Self {
            client,
            base_url,
            connect_timeout: config.connect_timeout(),
            request_timeout: config.request_timeout(),
        })
    }

    /// Effective base URL, proxy included
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/database/{}", self.base_url, action)
    }

    async fn post<B, R>(&self, action: &str, body: &B, timeout: Duration) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(action);
        tracing::debug!(%url, "POST");

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, timeout.as_secs()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::from_reqwest(e, timeout.as_secs()))?;

        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: snippet(&text),
            });
        }
        parse_body(&text)
    }

    async fn try_connect(&self, credential: &Credential) -> Result<Vec<String>> {
        let body = ConnectRequest::from_credential(credential)?;
        let response: ConnectResponse = self.post("connect", &body, self.connect_timeout).await?;
        require_success(response.status.as_deref(), response.message)?;
        Ok(response.databases)
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn connect(&self, credential: &Credential) -> Result<Vec<String>> {
        match self.try_connect(credential).await {
            Ok(databases) => Ok(databases),
            Err(e) if credential.is_local_root() && e.is_expected() => {
                tracing::warn!("Backend unavailable ({}), using local demo databases", e);
                Ok(DEMO_DATABASES.iter().map(|d| d.to_string()).collect())
            }
            Err(e) => Err(e),
        }
    }

    async fn select_database(&self, credential: &Credential) -> Result<Vec<Table>> {
        let body = SelectDatabaseRequest {
            connection: ConnectRequest::from_credential(credential)?,
            database: credential.require_database()?,
        };
        let response: TablesResponse = self
            .post("select-database", &body, self.request_timeout)
            .await?;
        require_success(response.status.as_deref(), response.message)?;
        Ok(response.tables.into_iter().map(Table::from).collect())
    }

    async fn preview_table(
        &self,
        _credential: &Credential,
        table: &TableSelection,
        limit: usize,
    ) -> Result<Vec<Value>> {
        let body = PreviewRequest {
            table_name: &table.table,
            limit,
        };
        let response: PreviewResponse = self
            .post("preview-table", &body, self.request_timeout)
            .await?;
        Ok(response.data)
    }

    async fn probe(&self) -> Result<()> {
        let url = self.endpoint("connect");
        let response = self
            .client
            .request(reqwest::Method::OPTIONS, &url)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, self.request_timeout.as_secs()))?;
        let status = response.status();
        if status.is_server_error() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: String::new(),
            });
        }
        tracing::debug!(%url, %status, "Backend reachable");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeloom_core::DbEngine;
    use rstest::rstest;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_config(url: &str) -> BackendConfig {
        BackendConfig {
            base_url: url.to_string(),
            connect_timeout_secs: 2,
            request_timeout_secs: 2,
            ..BackendConfig::default()
        }
    }

    fn remote_credential() -> Credential {
        Credential::new(DbEngine::Postgresql, "db.internal")
            .with_username("etl")
            .with_password("s3cret")
    }

    #[rstest]
    #[case("http://api:8000/", None, "http://api:8000")]
    #[case("http://api:8000", Some("https://proxy.example/"), "https://proxy.example/http://api:8000")]
    #[case("http://api:8000", Some("  "), "http://api:8000")]
    fn test_resolve_base_url(
        #[case] base: &str,
        #[case] proxy: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(resolve_base_url(base, proxy), expected);
    }

    #[tokio::test]
    async fn connect_returns_databases() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/database/connect"))
            .and(body_partial_json(json!({
                "db_type": "postgresql",
                "host": "db.internal",
                "port": "5432",
                "username": "etl",
                "password": "s3cret"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "success", "databases": ["sales", "hr"]})),
            )
            .mount(&server)
            .await;

        let client = ApiClient::new(&make_config(&server.uri()), None).unwrap();
        let databases = client.connect(&remote_credential()).await.unwrap();

        assert_eq!(databases, vec!["sales", "hr"]);
    }

    #[tokio::test]
    async fn connect_rejects_non_success_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/database/connect"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "error", "message": "Access denied"})),
            )
            .mount(&server)
            .await;

        let client = ApiClient::new(&make_config(&server.uri()), None).unwrap();
        let err = client.connect(&remote_credential()).await.unwrap_err();

        assert!(matches!(err, Error::Rejected { ref message } if message == "Access denied"));
    }

    #[tokio::test]
    async fn connect_treats_html_as_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/database/connect"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<!DOCTYPE html><html></html>"),
            )
            .mount(&server)
            .await;

        let client = ApiClient::new(&make_config(&server.uri()), None).unwrap();
        let err = client.connect(&remote_credential()).await.unwrap_err();

        assert!(matches!(err, Error::MalformedBody { .. }));
        assert!(err.to_string().contains("HTML"));
    }

    #[tokio::test]
    async fn connect_reports_http_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/database/connect"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = ApiClient::new(&make_config(&server.uri()), None).unwrap();
        let err = client.connect(&remote_credential()).await.unwrap_err();

        assert!(matches!(err, Error::HttpStatus { status: 502, .. }));
    }

    #[tokio::test]
    async fn localhost_root_falls_back_to_demo_databases() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/database/connect"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ApiClient::new(&make_config(&server.uri()), None).unwrap();
        let credential = Credential::new(DbEngine::Mysql, "localhost").with_username("root");
        let databases = client.connect(&credential).await.unwrap();

        assert_eq!(databases, DEMO_DATABASES.to_vec());
    }

    #[tokio::test]
    async fn connect_requires_host() {
        let client = ApiClient::new(&make_config("http://127.0.0.1:9"), None).unwrap();
        let err = client
            .connect(&Credential::new(DbEngine::Mysql, "  "))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("host is required"));
    }

    #[tokio::test]
    async fn select_database_accepts_names_and_objects() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/database/select-database"))
            .and(body_partial_json(json!({"database": "sales"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "tables": [
                    "orders",
                    {"name": "customers", "columns": [{"name": "id", "type": "int", "isPrimaryKey": true}]}
                ]
            })))
            .mount(&server)
            .await;

        let client = ApiClient::new(&make_config(&server.uri()), None).unwrap();
        let tables = client
            .select_database(&remote_credential().with_database("sales"))
            .await
            .unwrap();

        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].name, "orders");
        assert!(tables[0].columns.is_empty());
        assert_eq!(tables[1].primary_key(), vec!["id"]);
    }

    #[tokio::test]
    async fn select_database_requires_database() {
        let client = ApiClient::new(&make_config("http://127.0.0.1:9"), None).unwrap();
        let err = client.select_database(&remote_credential()).await.unwrap_err();

        assert!(err.to_string().contains("database is required"));
    }

    #[tokio::test]
    async fn preview_table_returns_rows() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/database/preview-table"))
            .and(body_partial_json(json!({"table_name": "orders", "limit": 50})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": [{"id": 1}, {"id": 2}]})),
            )
            .mount(&server)
            .await;

        let client = ApiClient::new(&make_config(&server.uri()), None).unwrap();
        let rows = client
            .preview_table(&remote_credential(), &TableSelection::new("sales", "orders"), 50)
            .await
            .unwrap();

        assert_eq!(rows, vec![json!({"id": 1}), json!({"id": 2})]);
    }

    #[tokio::test]
    async fn requests_go_through_the_cors_proxy() {
        let server = MockServer::start().await;

        Mock::given(method("OPTIONS"))
            .and(path("/http://backend.example/database/connect"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let proxy = format!("{}/", server.uri());
        let client = ApiClient::new(&make_config("http://backend.example"), Some(&proxy)).unwrap();
        client.probe().await.unwrap();
    }

    #[tokio::test]
    async fn probe_fails_on_server_error() {
        let server = MockServer::start().await;

        Mock::given(method("OPTIONS"))
            .and(path("/database/connect"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = ApiClient::new(&make_config(&server.uri()), None).unwrap();
        assert!(client.probe().await.is_err());
    }
}
