//! ArangoDB HTTP driver (REST API over reqwest)

use arangolink_core::{ConnectorError, Credentials, ServerError};
use arangolink_types::{DocumentMeta, Scheme};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use super::traits::{Client, Collection, Connection, Database, Driver};

const USER_AGENT: &str = concat!("arangolink/", env!("CARGO_PKG_VERSION"));

/// Database every server has; used for administrative requests
const SYSTEM_DATABASE: &str = "_system";

/// Driver speaking the ArangoDB REST API
#[derive(Debug, Clone, Default)]
pub struct HttpDriver;

impl HttpDriver {
    pub fn new() -> Self {
        Self
    }
}

/// Normalize an endpoint (`tcp://` and `ssl://` included) into an HTTP URL
pub(crate) fn normalize_endpoint(endpoint: &str) -> Result<Url, ConnectorError> {
    let (scheme, rest) = Scheme::split_endpoint(endpoint)
        .map_err(|e| ConnectorError::Connection(format!("Invalid endpoint: {}", e)))?;

    let url = Url::parse(&format!("{}://{}", scheme, rest)).map_err(|e| {
        ConnectorError::Connection(format!("Invalid endpoint '{}': {}", endpoint, e))
    })?;

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConnectorError::Connection(format!(
            "Invalid endpoint '{}': missing host",
            endpoint
        )));
    }

    Ok(url)
}

fn is_tls_endpoint(endpoint: &str) -> bool {
    Scheme::split_endpoint(endpoint).is_ok_and(|(scheme, _)| scheme.is_tls())
}

/// Shared HTTP state behind every handle of one connection
struct Transport {
    http: reqwest::Client,
    base: Url,
    credentials: Option<Credentials>,
}

impl Transport {
    /// Build a URL below the endpoint base; every segment is percent-encoded
    fn url(&self, segments: &[&str]) -> Result<Url, ConnectorError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ConnectorError::Connection(format!(
                    "Endpoint '{}' cannot be a base URL",
                    self.base
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
    ) -> Result<RequestBuilder, ConnectorError> {
        let builder = self.http.request(method, self.url(segments)?);
        Ok(match &self.credentials {
            Some(c) => builder.basic_auth(&c.username, Some(&c.password)),
            None => builder,
        })
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ConnectorError> {
        builder.send().await.map_err(|e| {
            ConnectorError::Connection(format!("Request to {} failed: {}", self.base, e))
        })
    }

    fn with_credentials(&self, credentials: Option<&Credentials>) -> Self {
        Self {
            http: self.http.clone(),
            base: self.base.clone(),
            credentials: credentials.cloned(),
        }
    }
}

/// Read an error response body into a ServerError
async fn server_error(response: Response) -> ServerError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    parse_server_error(status, &body)
}

fn parse_server_error(status: StatusCode, body: &str) -> ServerError {
    match serde_json::from_str::<ServerError>(body) {
        Ok(err) => err,
        Err(_) => {
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                body.trim().to_string()
            };
            ServerError::new(status.as_u16(), 0, message)
        }
    }
}

/// Turn a non-success response into an error, keeping 401 distinct
async fn reject(response: Response, classify: fn(ServerError) -> ConnectorError) -> ConnectorError {
    let err = server_error(response).await;
    if err.code == StatusCode::UNAUTHORIZED.as_u16() {
        ConnectorError::Authentication(err.message)
    } else {
        classify(err)
    }
}

async fn document_meta(response: Response) -> Result<DocumentMeta, ConnectorError> {
    let body = response
        .text()
        .await
        .map_err(|e| ConnectorError::Connection(format!("Failed to read response: {}", e)))?;
    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl Driver for HttpDriver {
    async fn open_connection(
        &self,
        endpoints: &[String],
        insecure_skip_tls_verify: bool,
    ) -> Result<Arc<dyn Connection>, ConnectorError> {
        if insecure_skip_tls_verify {
            for endpoint in endpoints.iter().filter(|e| is_tls_endpoint(e)) {
                warn!("TLS certificate verification is disabled for {}", endpoint);
            }
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(insecure_skip_tls_verify)
            .build()
            .map_err(|e| {
                ConnectorError::Connection(format!("HTTP client creation failed: {}", e))
            })?;

        let mut last_error = ConnectorError::Connection("No endpoints configured".to_string());
        for endpoint in endpoints {
            let transport = match normalize_endpoint(endpoint) {
                Ok(base) => Transport {
                    http: http.clone(),
                    base,
                    credentials: None,
                },
                Err(e) => {
                    warn!("Skipping endpoint {}: {}", endpoint, e);
                    last_error = e;
                    continue;
                }
            };

            // Any HTTP response, 401 included, proves the endpoint is reachable
            let probe = transport.request(Method::GET, &["_api", "version"])?;
            match transport.send(probe).await {
                Ok(_) => {
                    debug!("Endpoint {} is reachable", endpoint);
                    return Ok(Arc::new(HttpConnection {
                        endpoint: endpoint.clone(),
                        transport,
                    }));
                }
                Err(e) => {
                    warn!("Endpoint {} is unreachable: {}", endpoint, e);
                    last_error = e;
                }
            }
        }

        Err(match last_error {
            ConnectorError::Connection(msg) => {
                ConnectorError::Connection(format!("No reachable endpoint: {}", msg))
            }
            other => other,
        })
    }

    fn driver_type(&self) -> &'static str {
        "http"
    }
}

struct HttpConnection {
    endpoint: String,
    transport: Transport,
}

#[async_trait]
impl Connection for HttpConnection {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn client(
        &self,
        credentials: Option<&Credentials>,
    ) -> Result<Arc<dyn Client>, ConnectorError> {
        let transport = self.transport.with_credentials(credentials);

        let request = transport.request(Method::GET, &["_api", "version"])?;
        let response = transport.send(request).await?;
        if !response.status().is_success() {
            return Err(reject(response, |e| ConnectorError::Connection(e.message)).await);
        }

        Ok(Arc::new(HttpClient {
            transport: Arc::new(transport),
        }))
    }
}

struct HttpClient {
    transport: Arc<Transport>,
}

impl HttpClient {
    fn database_handle(&self, name: &str) -> Arc<dyn Database> {
        Arc::new(HttpDatabase {
            transport: self.transport.clone(),
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl Client for HttpClient {
    async fn database_exists(&self, name: &str) -> Result<bool, ConnectorError> {
        let request = self
            .transport
            .request(Method::GET, &["_db", name, "_api", "database", "current"])?;
        let response = self.transport.send(request).await?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(reject(response, ConnectorError::Database).await),
        }
    }

    async fn create_database(&self, name: &str) -> Result<Arc<dyn Database>, ConnectorError> {
        let request = self
            .transport
            .request(Method::POST, &["_db", SYSTEM_DATABASE, "_api", "database"])?
            .json(&json!({ "name": name }));
        let response = self.transport.send(request).await?;

        if !response.status().is_success() {
            return Err(reject(response, ConnectorError::Database).await);
        }
        Ok(self.database_handle(name))
    }

    async fn database(&self, name: &str) -> Result<Arc<dyn Database>, ConnectorError> {
        let request = self
            .transport
            .request(Method::GET, &["_db", name, "_api", "database", "current"])?;
        let response = self.transport.send(request).await?;

        if !response.status().is_success() {
            return Err(reject(response, ConnectorError::Database).await);
        }
        Ok(self.database_handle(name))
    }
}

struct HttpDatabase {
    transport: Arc<Transport>,
    name: String,
}

impl HttpDatabase {
    fn collection_handle(&self, name: &str) -> Arc<dyn Collection> {
        Arc::new(HttpCollection {
            transport: self.transport.clone(),
            database: self.name.clone(),
            name: name.to_string(),
        })
    }
}

#[async_trait]
impl Database for HttpDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, ConnectorError> {
        let request = self
            .transport
            .request(Method::GET, &["_db", self.name.as_str(), "_api", "collection", name])?;
        let response = self.transport.send(request).await?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(reject(response, ConnectorError::Collection).await),
        }
    }

    async fn create_collection(&self, name: &str) -> Result<Arc<dyn Collection>, ConnectorError> {
        let request = self
            .transport
            .request(Method::POST, &["_db", self.name.as_str(), "_api", "collection"])?
            .json(&json!({ "name": name }));
        let response = self.transport.send(request).await?;

        if !response.status().is_success() {
            return Err(reject(response, ConnectorError::Collection).await);
        }
        Ok(self.collection_handle(name))
    }

    async fn collection(&self, name: &str) -> Result<Arc<dyn Collection>, ConnectorError> {
        let request = self
            .transport
            .request(Method::GET, &["_db", self.name.as_str(), "_api", "collection", name])?;
        let response = self.transport.send(request).await?;

        if !response.status().is_success() {
            return Err(reject(response, ConnectorError::Collection).await);
        }
        Ok(self.collection_handle(name))
    }
}

struct HttpCollection {
    transport: Arc<Transport>,
    database: String,
    name: String,
}

impl HttpCollection {
    fn document_request(
        &self,
        method: Method,
        key: Option<&str>,
    ) -> Result<RequestBuilder, ConnectorError> {
        let mut segments = vec![
            "_db",
            self.database.as_str(),
            "_api",
            "document",
            self.name.as_str(),
        ];
        segments.extend(key);
        self.transport.request(method, &segments)
    }

    async fn write(&self, request: RequestBuilder) -> Result<DocumentMeta, ConnectorError> {
        let response = self.transport.send(request).await?;
        if !response.status().is_success() {
            return Err(reject(response, ConnectorError::from_write).await);
        }
        document_meta(response).await
    }
}

#[async_trait]
impl Collection for HttpCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_document(&self, document: &Value) -> Result<DocumentMeta, ConnectorError> {
        let request = self.document_request(Method::POST, None)?.json(document);
        self.write(request).await
    }

    async fn update_document(
        &self,
        key: &str,
        patch: &Value,
    ) -> Result<DocumentMeta, ConnectorError> {
        let request = self.document_request(Method::PATCH, Some(key))?.json(patch);
        self.write(request).await
    }

    async fn remove_document(&self, key: &str) -> Result<DocumentMeta, ConnectorError> {
        let request = self.document_request(Method::DELETE, Some(key))?;
        self.write(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(endpoint: &str) -> Transport {
        Transport {
            http: reqwest::Client::new(),
            base: normalize_endpoint(endpoint).unwrap(),
            credentials: None,
        }
    }

    fn arango_error(code: u16, error_num: i64, message: &str) -> ResponseTemplate {
        ResponseTemplate::new(code).set_body_json(json!({
            "error": true,
            "code": code,
            "errorNum": error_num,
            "errorMessage": message,
        }))
    }

    async fn mock(server: &MockServer, verb: &str, route: &str, response: ResponseTemplate) {
        Mock::given(method(verb))
            .and(path(route))
            .respond_with(response)
            .mount(server)
            .await;
    }

    /// Authenticated client against a mock server answering `/_api/version`
    async fn client_for(server: &MockServer) -> Arc<dyn Client> {
        let version = ResponseTemplate::new(200).set_body_json(json!({
            "server": "arango",
            "version": "3.11.0",
        }));
        mock(server, "GET", "/_api/version", version).await;

        let connection = HttpDriver::new()
            .open_connection(&[server.uri()], false)
            .await
            .unwrap();
        match connection.client(Some(&Credentials::new("root", ""))).await {
            Ok(client) => client,
            Err(e) => panic!("client failed: {e}"),
        }
    }

    /// Client with the `orders/items` collection open
    async fn items_for(server: &MockServer) -> Arc<dyn Collection> {
        let client = client_for(server).await;
        mock(
            server,
            "GET",
            "/_db/orders/_api/database/current",
            ResponseTemplate::new(200).set_body_json(json!({ "result": { "name": "orders" } })),
        )
        .await;
        mock(
            server,
            "GET",
            "/_db/orders/_api/collection/items",
            ResponseTemplate::new(200).set_body_json(json!({ "name": "items", "type": 2 })),
        )
        .await;

        let Ok(db) = client.database("orders").await else {
            panic!("database open failed");
        };
        let Ok(items) = db.collection("items").await else {
            panic!("collection open failed");
        };
        items
    }

    #[test]
    fn test_normalize_endpoint() {
        let url = normalize_endpoint("tcp://localhost:8529").unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.port(), Some(8529));

        let url = normalize_endpoint("ssl://db.example.com:8530").unwrap();
        assert_eq!(url.scheme(), "https");
        assert!(is_tls_endpoint("ssl://db.example.com:8530"));
        assert!(!is_tls_endpoint("tcp://localhost:8529"));

        assert!(normalize_endpoint("localhost:8529").is_err());
        assert!(normalize_endpoint("http://").is_err());
        assert!(matches!(
            normalize_endpoint("redis://localhost"),
            Err(ConnectorError::Connection(_))
        ));
    }

    #[test]
    fn test_url_segments_are_encoded() {
        let t = transport("http://localhost:8529");
        let url = t
            .url(&["_db", "orders", "_api", "document", "items", "a b"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8529/_db/orders/_api/document/items/a%20b"
        );
    }

    #[test]
    fn test_url_keeps_endpoint_path_prefix() {
        let t = transport("https://proxy.example.com/arango/");
        let url = t.url(&["_api", "version"]).unwrap();
        assert_eq!(url.as_str(), "https://proxy.example.com/arango/_api/version");
    }

    #[test]
    fn test_parse_server_error_body() {
        let body = r#"{"error":true,"code":404,"errorNum":1202,"errorMessage":"document not found"}"#;
        let err = parse_server_error(StatusCode::NOT_FOUND, body);
        assert!(err.is_document_not_found());
        assert_eq!(err.message, "document not found");
    }

    #[test]
    fn test_parse_server_error_fallback() {
        let err = parse_server_error(StatusCode::BAD_GATEWAY, "");
        assert_eq!(err.code, 502);
        assert_eq!(err.error_num, 0);
        assert_eq!(err.message, "Bad Gateway");

        let err = parse_server_error(StatusCode::SERVICE_UNAVAILABLE, "upstream down\n");
        assert_eq!(err.message, "upstream down");
    }

    #[tokio::test]
    async fn test_open_connection_rejects_malformed_endpoints() {
        let driver = HttpDriver::new();
        let result = driver
            .open_connection(&["localhost:8529".to_string(), "http://".to_string()], false)
            .await;
        match result {
            Err(ConnectorError::Connection(msg)) => assert!(msg.contains("No reachable endpoint")),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("malformed endpoints must not connect"),
        }
    }

    #[tokio::test]
    async fn test_open_connection_falls_back_to_next_endpoint() {
        let server = MockServer::start().await;
        mock(&server, "GET", "/_api/version", ResponseTemplate::new(401)).await;

        let endpoints = vec![
            "localhost:8529".to_string(),
            "http://127.0.0.1:1".to_string(),
            server.uri(),
        ];
        let connection = HttpDriver::new()
            .open_connection(&endpoints, false)
            .await
            .unwrap();
        assert_eq!(connection.endpoint(), server.uri());
    }

    #[tokio::test]
    async fn test_unauthorized_is_authentication_error() {
        let server = MockServer::start().await;
        mock(
            &server,
            "GET",
            "/_api/version",
            arango_error(401, 11, "not authorized to execute this request"),
        )
        .await;

        let connection = HttpDriver::new()
            .open_connection(&[server.uri()], false)
            .await
            .unwrap();
        match connection.client(Some(&Credentials::new("root", "wrong"))).await {
            Err(ConnectorError::Authentication(msg)) => {
                assert_eq!(msg, "not authorized to execute this request")
            }
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("rejected credentials must not yield a client"),
        }
    }

    #[tokio::test]
    async fn test_credentials_are_sent_as_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_api/version"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        mock(&server, "GET", "/_api/version", ResponseTemplate::new(401)).await;

        let connection = HttpDriver::new()
            .open_connection(&[server.uri()], false)
            .await
            .unwrap();
        assert!(connection
            .client(Some(&Credentials::new("root", "")))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_write_after_credentials_revoked_is_authentication_error() {
        let server = MockServer::start().await;
        let items = items_for(&server).await;
        mock(
            &server,
            "POST",
            "/_db/orders/_api/document/items",
            arango_error(401, 11, "not authorized to execute this request"),
        )
        .await;

        let err = items.create_document(&json!({ "sku": "A1" })).await.unwrap_err();
        assert!(matches!(err, ConnectorError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_exists_maps_404_to_false() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        mock(
            &server,
            "GET",
            "/_db/missing/_api/database/current",
            arango_error(404, 1228, "database not found"),
        )
        .await;
        mock(
            &server,
            "GET",
            "/_db/orders/_api/database/current",
            ResponseTemplate::new(200).set_body_json(json!({ "result": { "name": "orders" } })),
        )
        .await;
        mock(
            &server,
            "GET",
            "/_db/orders/_api/collection/missing",
            arango_error(404, 1203, "collection or view not found"),
        )
        .await;
        mock(
            &server,
            "GET",
            "/_db/orders/_api/collection/items",
            ResponseTemplate::new(200).set_body_json(json!({ "name": "items", "type": 2 })),
        )
        .await;

        assert!(!client.database_exists("missing").await.unwrap());
        assert!(client.database_exists("orders").await.unwrap());

        let Ok(db) = client.database("orders").await else {
            panic!("database open failed");
        };
        assert!(!db.collection_exists("missing").await.unwrap());
        assert!(db.collection_exists("items").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_propagates_other_statuses() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        mock(
            &server,
            "GET",
            "/_db/orders/_api/database/current",
            arango_error(403, 11, "forbidden"),
        )
        .await;

        let err = client.database_exists("orders").await.unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::Database(ref e) if e.code == 403 && e.message == "forbidden"
        ));
    }

    #[tokio::test]
    async fn test_create_database_forbidden() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        mock(
            &server,
            "POST",
            "/_db/_system/_api/database",
            arango_error(403, 11, "forbidden"),
        )
        .await;

        match client.create_database("orders").await {
            Err(ConnectorError::Database(e)) => assert_eq!(e.error_num, 11),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("forbidden create must fail"),
        }
    }

    #[tokio::test]
    async fn test_create_document_returns_meta() {
        let server = MockServer::start().await;
        let items = items_for(&server).await;
        mock(
            &server,
            "POST",
            "/_db/orders/_api/document/items",
            ResponseTemplate::new(202).set_body_json(json!({
                "_key": "1001",
                "_id": "items/1001",
                "_rev": "_hV2k3Ym---",
            })),
        )
        .await;

        let meta = items.create_document(&json!({ "sku": "A1" })).await.unwrap();
        assert_eq!(meta.key, "1001");
        assert_eq!(meta.id, "items/1001");
        assert_eq!(meta.rev, "_hV2k3Ym---");
    }

    #[tokio::test]
    async fn test_missing_document_is_not_found() {
        let server = MockServer::start().await;
        let items = items_for(&server).await;
        mock(
            &server,
            "DELETE",
            "/_db/orders/_api/document/items/missing",
            arango_error(404, 1202, "document not found"),
        )
        .await;
        mock(
            &server,
            "PATCH",
            "/_db/orders/_api/document/items/gone",
            arango_error(404, 1203, "collection or view not found"),
        )
        .await;

        match items.remove_document("missing").await.unwrap_err() {
            ConnectorError::NotFound(e) => assert_eq!(e.message, "document not found"),
            other => panic!("unexpected error: {other}"),
        }

        // Only a missing document is NotFound; a missing collection stays a write error
        let err = items
            .update_document("gone", &json!({ "qty": 1 }))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::Write(ref e) if e.error_num == 1203));
    }

    #[tokio::test]
    async fn test_conflict_is_write_error_with_server_message() {
        let server = MockServer::start().await;
        let items = items_for(&server).await;
        let message = "unique constraint violated - in index primary of type primary over '_key'; \
                       conflicting key: A1";
        mock(
            &server,
            "POST",
            "/_db/orders/_api/document/items",
            arango_error(409, 1210, message),
        )
        .await;

        match items.create_document(&json!({ "_key": "A1" })).await.unwrap_err() {
            ConnectorError::Write(e) => {
                assert_eq!(e.code, 409);
                assert_eq!(e.error_num, 1210);
                assert_eq!(e.message, message);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    #[ignore] // Requires a running ArangoDB instance
    async fn test_arangodb_document_lifecycle() {
        let driver = HttpDriver::new();
        let connection = driver
            .open_connection(&["http://localhost:8529".to_string()], false)
            .await
            .unwrap();
        let client = connection
            .client(Some(&Credentials::new("root", "")))
            .await
            .unwrap();

        let db = if client.database_exists("arangolink_test").await.unwrap() {
            client.database("arangolink_test").await.unwrap()
        } else {
            client.create_database("arangolink_test").await.unwrap()
        };
        let items = if db.collection_exists("items").await.unwrap() {
            db.collection("items").await.unwrap()
        } else {
            db.create_collection("items").await.unwrap()
        };

        let created = items.create_document(&json!({ "sku": "A1" })).await.unwrap();
        assert!(!created.key.is_empty());
        let updated = items
            .update_document(&created.key, &json!({ "qty": 2 }))
            .await
            .unwrap();
        assert_ne!(created.rev, updated.rev);
        items.remove_document(&created.key).await.unwrap();
        assert!(items
            .remove_document(&created.key)
            .await
            .unwrap_err()
            .is_not_found());
    }
}
