//! HTTP services described by an OpenAPI document.
//!
//! Every `METHOD /path` pair of the document is a table. Configured headers
//! and query parameters (usually credentials) are injected into each request
//! and never appear in anything shown to the model.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tracing::{debug, warn};

use super::{clamp_rows, Capability, Column, DataSource, Rows, Schema, SourceKind, TableRef};
use crate::error::{QuarryError, Result};
use crate::provider::http::shared_client;

const CAPABILITIES: [Capability; 5] = [
    Capability::List,
    Capability::Inspect,
    Capability::Sample,
    Capability::Query,
    Capability::Search,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn is_read_only(self) -> bool {
        matches!(self, Self::Get | Self::Head | Self::Options)
    }

    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
            Self::Patch => reqwest::Method::PATCH,
            Self::Head => reqwest::Method::HEAD,
            Self::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// Parse `"METHOD /path?query"`.
pub fn parse_request_line(line: &str) -> Result<(HttpMethod, String)> {
    let (method, target) = line
        .trim()
        .split_once(char::is_whitespace)
        .ok_or_else(|| {
            QuarryError::InvalidQuery(format!("expected 'METHOD /path', got '{line}'"))
        })?;
    let method = HttpMethod::from_str(method)
        .map_err(|_| QuarryError::InvalidQuery(format!("unknown HTTP method '{method}'")))?;
    let target = target.trim();
    if !target.starts_with('/') {
        return Err(QuarryError::InvalidQuery(format!(
            "path must start with '/', got '{target}'"
        )));
    }
    Ok((method, target.to_string()))
}

struct ApiSpec {
    document: Value,
    base_url: Option<String>,
    endpoints: Vec<String>,
}

impl ApiSpec {
    fn parse(document: Value, spec_url: Option<&str>) -> std::result::Result<Self, String> {
        let paths = document
            .get("paths")
            .and_then(Value::as_object)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| "no endpoints found in OpenAPI document".to_string())?;

        let mut endpoints = Vec::new();
        for (path, operations) in paths {
            let Some(operations) = operations.as_object() else {
                continue;
            };
            for method in operations.keys() {
                if let Ok(method) = HttpMethod::from_str(method) {
                    endpoints.push(format!("{method} {path}"));
                }
            }
        }

        let server = document
            .get("servers")
            .and_then(Value::as_array)
            .and_then(|servers| servers.first())
            .and_then(|server| server.get("url"))
            .and_then(Value::as_str);
        let base_url = resolve_base_url(server, spec_url);

        Ok(Self {
            document,
            base_url,
            endpoints,
        })
    }

    fn operation(&self, method: HttpMethod, path: &str) -> Option<(&Value, Option<&Value>)> {
        let item = self.document.get("paths")?.get(path)?;
        let op = item.get(method.to_string().to_ascii_lowercase())?;
        Some((op, item.get("parameters")))
    }
}

fn resolve_base_url(server: Option<&str>, spec_url: Option<&str>) -> Option<String> {
    let spec_url = spec_url
        .and_then(|u| url::Url::parse(u).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"));
    match (server, spec_url) {
        (Some(server), _) if server.starts_with("http://") || server.starts_with("https://") => {
            Some(server.trim_end_matches('/').to_string())
        }
        (Some(server), Some(spec)) => spec
            .join(server)
            .ok()
            .map(|u| u.to_string().trim_end_matches('/').to_string()),
        (None, Some(spec)) => Some(spec.origin().ascii_serialization()),
        _ => None,
    }
}

/// An OpenAPI-described service.
pub struct ApiSource {
    identity: String,
    spec: std::result::Result<ApiSpec, String>,
    headers: HeaderMap,
    params: BTreeMap<String, String>,
    max_rows: usize,
}

impl ApiSource {
    /// Build from an already-parsed OpenAPI document.
    pub fn from_document(
        identity: impl Into<String>,
        document: Value,
        spec_url: Option<&str>,
        headers: BTreeMap<String, String>,
        params: BTreeMap<String, String>,
        max_rows: usize,
    ) -> Self {
        let (headers, spec) = match header_map(&headers) {
            Ok(headers) => (headers, ApiSpec::parse(document, spec_url)),
            Err(reason) => (HeaderMap::new(), Err(reason)),
        };
        Self {
            identity: identity.into(),
            spec,
            headers,
            params,
            max_rows,
        }
    }

    /// Fetch and parse the OpenAPI document behind `url`.
    ///
    /// A document that cannot be loaded leaves the source unreachable. Query
    /// parameters on the document URL are injected into every request.
    pub async fn load(
        identity: impl Into<String>,
        url: &str,
        headers: BTreeMap<String, String>,
        mut params: BTreeMap<String, String>,
        max_rows: usize,
    ) -> Self {
        let identity = identity.into();
        if let Ok(parsed) = url::Url::parse(url) {
            for (key, value) in parsed.query_pairs() {
                params
                    .entry(key.into_owned())
                    .or_insert_with(|| value.into_owned());
            }
        }
        let (headers, spec) = match header_map(&headers) {
            Ok(headers) => {
                let spec = match fetch_document(url, &headers).await {
                    Ok(document) => ApiSpec::parse(document, Some(url)),
                    Err(e) => Err(e.to_string()),
                };
                (headers, spec)
            }
            Err(reason) => (HeaderMap::new(), Err(reason)),
        };
        if let Err(reason) = &spec {
            warn!(source = %identity, error = %reason, "OpenAPI document unavailable");
        }
        Self {
            identity,
            spec,
            headers,
            params,
            max_rows,
        }
    }

    fn spec(&self) -> Result<&ApiSpec> {
        self.spec
            .as_ref()
            .map_err(|reason| QuarryError::connection(&self.identity, reason.clone()))
    }

    async fn send(&self, method: HttpMethod, target: &str) -> Result<Value> {
        let base = self.spec()?.base_url.as_deref().ok_or_else(|| {
            QuarryError::connection(&self.identity, "OpenAPI document declares no server URL")
        })?;
        let mut url = url::Url::parse(&format!("{base}{target}"))
            .map_err(|e| QuarryError::InvalidQuery(format!("invalid request path: {e}")))?;

        let mut query: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| !self.params.contains_key(&**k))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        query.extend(self.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        if query.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(query.iter());
        }

        debug!(source = %self.identity, %method, path = url.path(), "API request");

        let resp = shared_client()
            .request(method.as_reqwest(), url)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| QuarryError::backend(&self.identity, e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| QuarryError::backend(&self.identity, e.to_string()))?;
        if !status.is_success() {
            return Err(QuarryError::backend(
                &self.identity,
                format!("HTTP {}: {body}", status.as_u16()),
            ));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

/// Validate configured headers once; a bad header leaves the source unreachable.
fn header_map(headers: &BTreeMap<String, String>) -> std::result::Result<HeaderMap, String> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| format!("invalid header name '{name}': {e}"))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| format!("invalid value for header '{name}': {e}"))?;
        map.insert(header, value);
    }
    Ok(map)
}

async fn fetch_document(url: &str, headers: &HeaderMap) -> Result<Value> {
    let parsed = url::Url::parse(url)
        .map_err(|e| QuarryError::Configuration(format!("invalid OpenAPI URL '{url}': {e}")))?;
    match parsed.scheme() {
        "file" => {
            let path = parsed.to_file_path().map_err(|_| {
                QuarryError::Configuration(format!("invalid file URL '{url}'"))
            })?;
            let raw = tokio::fs::read_to_string(&path).await?;
            parse_document(&raw, &path)
        }
        "http" | "https" => {
            let resp = shared_client()
                .get(parsed.clone())
                .headers(headers.clone())
                .send()
                .await?;
            let status = resp.status().as_u16();
            let raw = resp.text().await?;
            if !(200..300).contains(&status) {
                return Err(QuarryError::api(status, raw));
            }
            parse_document(&raw, Path::new(parsed.path()))
        }
        other => Err(QuarryError::Configuration(format!(
            "unsupported OpenAPI URL scheme '{other}'"
        ))),
    }
}

fn parse_document(raw: &str, path: &Path) -> Result<Value> {
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
    if is_yaml {
        return Ok(serde_yaml::from_str(raw)?);
    }
    match serde_json::from_str(raw) {
        Ok(value) => Ok(value),
        Err(json_err) => serde_yaml::from_str(raw).map_err(|_| json_err.into()),
    }
}

fn parameter_column(param: &Value) -> Option<Column> {
    let name = param.get("name")?.as_str()?;
    let location = param.get("in").and_then(Value::as_str).unwrap_or("query");
    let declared_type = param
        .get("schema")
        .and_then(|s| s.get("type"))
        .and_then(Value::as_str)
        .unwrap_or("string");
    let required = param
        .get("required")
        .and_then(Value::as_bool)
        .unwrap_or(location == "path");
    Some(Column {
        column_name: name.to_string(),
        declared_type: format!("{declared_type} ({location})"),
        nullable: !required,
        is_key: location == "path",
    })
}

#[async_trait]
impl DataSource for ApiSource {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Api
    }

    fn capabilities(&self) -> &[Capability] {
        &CAPABILITIES
    }

    async fn test(&self) -> bool {
        self.spec
            .as_ref()
            .map(|spec| spec.base_url.is_some())
            .unwrap_or(false)
    }

    async fn discover(&self) -> Result<Vec<TableRef>> {
        Ok(self
            .spec()?
            .endpoints
            .iter()
            .map(|e| TableRef::new(&self.identity, e))
            .collect())
    }

    async fn inspect(&self, table: &str) -> Result<Schema> {
        let (method, path) = parse_request_line(table)
            .map_err(|_| QuarryError::not_found(&self.identity, table))?;
        let spec = self.spec()?;
        let (op, shared) = spec
            .operation(method, &path)
            .ok_or_else(|| QuarryError::not_found(&self.identity, table))?;

        let mut columns: Vec<Column> = Vec::new();
        let params = shared
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .chain(op.get("parameters").and_then(Value::as_array).into_iter().flatten());
        for param in params {
            if let Some(column) = parameter_column(param) {
                columns.retain(|c| c.column_name != column.column_name);
                columns.push(column);
            }
        }
        if let Some(body) = op.get("requestBody") {
            let required = body.get("required").and_then(Value::as_bool).unwrap_or(false);
            columns.push(Column {
                column_name: "body".to_string(),
                declared_type: "object (body)".to_string(),
                nullable: !required,
                is_key: false,
            });
        }

        Ok(Schema {
            table: TableRef::new(&self.identity, format!("{method} {path}")),
            columns,
        })
    }

    async fn sample(&self, table: &str, n: usize) -> Result<Rows> {
        let (method, path) = parse_request_line(table)?;
        if method != HttpMethod::Get {
            return Err(QuarryError::InvalidQuery(format!(
                "only GET endpoints can be sampled, got {method}"
            )));
        }
        if self.spec()?.operation(method, &path).is_none() {
            return Err(QuarryError::not_found(&self.identity, table));
        }
        if path.contains('{') {
            return Err(QuarryError::InvalidQuery(format!(
                "{path} needs path parameters; use query with concrete values"
            )));
        }
        let n = clamp_rows(n, self.max_rows);
        let payload = self.send(method, &path).await?;
        Ok(Rows::from_json(payload).truncate_to(n))
    }

    async fn query(&self, statement: &str) -> Result<Rows> {
        let (method, target) = parse_request_line(statement)?;
        if !method.is_read_only() {
            return Err(QuarryError::ReadOnlyViolation(format!(
                "{method} requests may modify remote state"
            )));
        }
        let payload = self.send(method, &target).await?;
        Ok(Rows::from_json(payload).truncate_to(self.max_rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn petstore() -> Value {
        json!({
            "openapi": "3.0.0",
            "servers": [{"url": "https://pets.example.com/v1"}],
            "paths": {
                "/pets": {
                    "get": {"parameters": [{"name": "limit", "in": "query", "schema": {"type": "integer"}}]},
                    "post": {"requestBody": {"required": true}}
                },
                "/pets/{petId}": {
                    "parameters": [{"name": "petId", "in": "path", "required": true, "schema": {"type": "string"}}],
                    "get": {}
                }
            }
        })
    }

    fn source() -> ApiSource {
        ApiSource::from_document("pets", petstore(), None, BTreeMap::new(), BTreeMap::new(), 100)
    }

    #[test]
    fn request_line_parsing() {
        let (method, target) = parse_request_line("get /pets?limit=2").unwrap();
        assert_eq!(method, HttpMethod::Get);
        assert_eq!(target, "/pets?limit=2");
        assert!(parse_request_line("FETCH /pets").is_err());
        assert!(parse_request_line("GET pets").is_err());
    }

    #[tokio::test]
    async fn endpoints_become_tables() {
        let tables = source().discover().await.unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["GET /pets", "POST /pets", "GET /pets/{petId}"]);
    }

    #[tokio::test]
    async fn inspect_lists_parameters() {
        let schema = source().inspect("GET /pets/{petId}").await.unwrap();
        let pet_id = &schema.columns[0];
        assert_eq!(pet_id.column_name, "petId");
        assert!(pet_id.is_key);
        assert!(!pet_id.nullable);

        let post = source().inspect("POST /pets").await.unwrap();
        assert_eq!(post.columns[0].column_name, "body");
        assert!(!post.columns[0].nullable);
    }

    #[tokio::test]
    async fn unknown_endpoint_is_not_found() {
        assert!(matches!(
            source().inspect("GET /owners").await,
            Err(QuarryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn writes_are_rejected_before_any_request() {
        let err = source().query("POST /pets").await.unwrap_err();
        assert!(matches!(err, QuarryError::ReadOnlyViolation(_)));
    }

    #[tokio::test]
    async fn document_without_paths_is_unreachable() {
        let api = ApiSource::from_document(
            "empty",
            json!({"openapi": "3.0.0"}),
            None,
            BTreeMap::new(),
            BTreeMap::new(),
            100,
        );
        assert!(!api.test().await);
        assert!(matches!(
            api.discover().await,
            Err(QuarryError::Connection { .. })
        ));
    }

    #[tokio::test]
    async fn invalid_header_leaves_source_unreachable() {
        let headers = BTreeMap::from([("x-token".to_string(), "line\nbreak".to_string())]);
        let api = ApiSource::from_document("pets", petstore(), None, headers, BTreeMap::new(), 100);
        assert!(!api.test().await);
        match api.query("GET /pets").await {
            Err(QuarryError::Connection { message, .. }) => {
                assert!(message.contains("x-token"), "{message}");
            }
            other => panic!("expected connection error, got {other:?}"),
        }
    }

    #[test]
    fn relative_server_joins_spec_location() {
        assert_eq!(
            resolve_base_url(Some("/api"), Some("https://svc.local/openapi.json")).as_deref(),
            Some("https://svc.local/api")
        );
        assert_eq!(
            resolve_base_url(None, Some("http://svc.local:8080/spec.yaml")).as_deref(),
            Some("http://svc.local:8080")
        );
        assert_eq!(resolve_base_url(None, Some("file:///tmp/spec.json")), None);
    }
}
