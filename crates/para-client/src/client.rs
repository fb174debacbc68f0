//! # Para API Client
//!
//! [`ParaClient`] is the façade for talking to a Para server. It owns a
//! [`reqwest::Client`], the configured key pair, and the current token
//! state, and exposes one async method per REST operation.
//!
//! ## Request pipeline
//!
//! Every call funnels through [`ParaClient::invoke`]:
//!
//! 1. resolve the full resource path (`{api_path}{resource}`, with
//!    `/jwt_auth` bypassing the API path);
//! 2. pick the auth mode — bearer token if one is held (refreshing it
//!    first when due), HMAC signing if a secret key is configured,
//!    `Authorization: Anonymous {accessKey}` otherwise;
//! 3. dispatch and map the response: 200/201/304 carry a body,
//!    404/204 mean "not found" (`Ok(None)`), anything else becomes
//!    [`ParaError::Api`].
//!
//! Client-side misuse (blank ids, empty batch lists) short-circuits
//! without a network call.
//!
//! ## Concurrency
//!
//! `ParaClient` is `Send + Sync`; calls may be issued concurrently from
//! multiple tasks. Token state sits behind a mutex and concurrent
//! refreshes are last-writer-wins.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use url::Url;
use zeroize::Zeroizing;

use crate::auth::{AuthMode, TokenState};
use crate::constraint::Constraint;
use crate::error::ParaError;
use crate::object::ParaObject;
use crate::pager::Pager;
use crate::signer::{self, SignableRequest};

/// Default Para server endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://paraio.com";
/// Default API path prefix.
pub const DEFAULT_PATH: &str = "/v1/";

const JWT_PATH: &str = "/jwt_auth";
const SEPARATOR: &str = ":";
const ALLOW_ALL: &str = "*";
const GUEST_PERMISSION: &str = "?";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Permissions per subject id, per resource path: lists of HTTP methods.
pub type PermissionMap = HashMap<String, HashMap<String, Vec<String>>>;
/// Validation constraints per type, per field: rule name → rule payload.
pub type ConstraintMap = HashMap<String, HashMap<String, Map<String, Value>>>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection settings for [`ParaClient`].
#[derive(Debug, Clone)]
pub struct ParaConfig {
    /// Server base URL, without a trailing slash.
    pub endpoint: String,
    /// API path prefix, normally `/v1/`.
    pub api_path: String,
    /// Application access key (`app:...`).
    pub access_key: String,
    /// Application secret key. Empty means anonymous access.
    pub secret_key: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl ParaConfig {
    /// Configuration for the default endpoint with a 30s timeout.
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_path: DEFAULT_PATH.to_string(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            timeout_secs: 30,
        }
    }

    /// Override the server endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Typed async client for the Para REST API.
pub struct ParaClient {
    http: reqwest::Client,
    endpoint: String,
    api_path: String,
    access_key: String,
    secret_key: Mutex<Zeroizing<String>>,
    tokens: Mutex<TokenState>,
}

impl ParaClient {
    /// Build a client from the given configuration.
    pub fn new(config: ParaConfig) -> Result<Self, ParaError> {
        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        let mut api_path = config.api_path;
        if !api_path.starts_with('/') {
            api_path.insert(0, '/');
        }
        if !api_path.ends_with('/') {
            api_path.push('/');
        }
        if !config.secret_key.is_empty() && config.secret_key.len() < 6 {
            tracing::warn!("secret key appears to be too short");
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ParaError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint,
            api_path,
            access_key: config.access_key,
            secret_key: Mutex::new(Zeroizing::new(config.secret_key)),
            tokens: Mutex::new(TokenState::new()),
        })
    }

    /// Build a client for the default endpoint. An empty secret key
    /// selects anonymous access.
    pub fn with_keys(access_key: &str, secret_key: &str) -> Result<Self, ParaError> {
        Self::new(ParaConfig::new(access_key, secret_key))
    }

    /// The configured server endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The configured API path prefix.
    pub fn api_path(&self) -> &str {
        &self.api_path
    }

    /// The configured access key.
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// The auth mode the next request would go out with.
    pub fn auth_mode(&self) -> AuthMode {
        if self.token_state().token().is_some() {
            AuthMode::Bearer
        } else if !self.secret_key().is_empty() {
            AuthMode::Signed
        } else {
            AuthMode::Anonymous
        }
    }

    /// Resolve a resource path against the API path prefix. The token
    /// endpoint bypasses the prefix.
    pub fn get_full_path(&self, resource_path: &str) -> String {
        if resource_path.starts_with(JWT_PATH) {
            return resource_path.to_string();
        }
        format!("{}{}", self.api_path, resource_path.trim_start_matches('/'))
    }

    fn token_state(&self) -> MutexGuard<'_, TokenState> {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn secret_key(&self) -> String {
        self.secret_key
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .to_string()
    }

    // -----------------------------------------------------------------------
    // Request pipeline
    // -----------------------------------------------------------------------

    async fn invoke(
        &self,
        method: Method,
        resource_path: &str,
        params: &[(String, String)],
        body: Option<&Value>,
        bearer_override: Option<&str>,
    ) -> Result<reqwest::Response, ParaError> {
        if self.access_key.trim().is_empty() {
            return Err(ParaError::Config("blank access key".to_string()));
        }
        let full_path = self.get_full_path(resource_path);
        let mut url = Url::parse(&format!("{}{}", self.endpoint, full_path))
            .map_err(|e| ParaError::Config(format!("invalid request URL: {e}")))?;
        if !params.is_empty() {
            let mut qp = url.query_pairs_mut();
            for (k, v) in params {
                qp.append_pair(k, v);
            }
        }

        let body_bytes = match body {
            Some(v) => serde_json::to_vec(v)
                .map_err(|e| ParaError::Config(format!("unencodable request body: {e}")))?,
            None => Vec::new(),
        };

        let mut headers = HeaderMap::new();
        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        }

        if let Some(tok) = bearer_override {
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {tok}"))?);
        } else {
            // Requests to the token endpoint never trigger a refresh.
            let allow_refresh = resource_path != JWT_PATH;
            let mut token = self.token_state().token().map(str::to_string);
            if token.is_some() && allow_refresh {
                let due = self.token_state().refresh_due(Utc::now().timestamp_millis());
                if due {
                    if let Err(e) = self.refresh_access_token().await {
                        tracing::warn!(error = %e, "access token refresh failed");
                        self.token_state().clear();
                    }
                    token = self.token_state().token().map(str::to_string);
                }
            }
            match token {
                Some(tok) => {
                    headers.insert(AUTHORIZATION, header_value(&format!("Bearer {tok}"))?);
                }
                None => {
                    let secret = self.secret_key();
                    if secret.is_empty() {
                        headers.insert(
                            AUTHORIZATION,
                            header_value(&format!("Anonymous {}", self.access_key))?,
                        );
                    } else {
                        let host = host_header(&url);
                        let sig = signer::sign(
                            &self.access_key,
                            &secret,
                            &SignableRequest {
                                method: method.as_str(),
                                host: &host,
                                path: &full_path,
                                query: params,
                                content_type: body.map(|_| JSON_CONTENT_TYPE),
                                body: &body_bytes,
                            },
                            Utc::now(),
                        )?;
                        headers.insert("x-amz-date", header_value(&sig.amz_date)?);
                        headers.insert(AUTHORIZATION, header_value(&sig.authorization)?);
                    }
                }
            }
        }

        tracing::debug!(method = %method, path = %full_path, "dispatching request");
        let mut req = self.http.request(method, url).headers(headers);
        if body.is_some() {
            req = req.body(body_bytes);
        }
        req.send().await.map_err(|source| ParaError::Http {
            endpoint: full_path,
            source,
        })
    }

    /// Map a response per the status contract: 200/201/304 carry a body,
    /// 404/204 mean "not found", everything else is an API error.
    async fn read_entity(
        &self,
        endpoint: &str,
        resp: reqwest::Response,
    ) -> Result<Option<String>, ParaError> {
        let status = resp.status().as_u16();
        match status {
            200 | 201 | 304 => {
                let body = resp.text().await.map_err(|source| ParaError::Http {
                    endpoint: endpoint.to_string(),
                    source,
                })?;
                Ok(Some(body))
            }
            404 | 204 => Ok(None),
            _ => {
                let body = resp.text().await.unwrap_or_default();
                let message = error_message(&body, status);
                tracing::warn!(endpoint, status, %message, "Para API error");
                Err(ParaError::Api {
                    endpoint: endpoint.to_string(),
                    status,
                    message,
                })
            }
        }
    }

    async fn invoke_get(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Option<String>, ParaError> {
        let resp = self.invoke(Method::GET, path, params, None, None).await?;
        self.read_entity(path, resp).await
    }

    async fn invoke_post(
        &self,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<String>, ParaError> {
        let resp = self.invoke(Method::POST, path, &[], body, None).await?;
        self.read_entity(path, resp).await
    }

    async fn invoke_put(
        &self,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<String>, ParaError> {
        let resp = self.invoke(Method::PUT, path, &[], body, None).await?;
        self.read_entity(path, resp).await
    }

    async fn invoke_patch(
        &self,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<String>, ParaError> {
        let resp = self.invoke(Method::PATCH, path, &[], body, None).await?;
        self.read_entity(path, resp).await
    }

    async fn invoke_delete(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Option<String>, ParaError> {
        let resp = self.invoke(Method::DELETE, path, params, None, None).await?;
        self.read_entity(path, resp).await
    }

    // -----------------------------------------------------------------------
    // CRUD
    // -----------------------------------------------------------------------

    /// Persist an object. Objects without an id are POSTed and get a
    /// server-assigned id; objects with an id are PUT at their URI.
    pub async fn create(&self, obj: &ParaObject) -> Result<Option<ParaObject>, ParaError> {
        let body = to_body(obj)?;
        let raw = match obj.id.as_deref() {
            Some(id) if !id.trim().is_empty() => {
                self.invoke_put(&obj.object_uri(), Some(&body)).await?
            }
            _ => self.invoke_post(&obj.type_, Some(&body)).await?,
        };
        decode_opt(&obj.object_uri(), raw)
    }

    /// Read an object by type and id. An empty type falls back to the
    /// id-only lookup.
    pub async fn read(&self, type_: &str, id: &str) -> Result<Option<ParaObject>, ParaError> {
        if id.trim().is_empty() {
            return Ok(None);
        }
        if type_.trim().is_empty() {
            return self.read_by_id(id).await;
        }
        let path = ParaObject::with_id_and_type(id, type_).object_uri();
        let raw = self.invoke_get(&path, &[]).await?;
        decode_opt(&path, raw)
    }

    /// Read an object when only its id is known.
    pub async fn read_by_id(&self, id: &str) -> Result<Option<ParaObject>, ParaError> {
        if id.trim().is_empty() {
            return Ok(None);
        }
        let path = format!("_id/{id}");
        let raw = self.invoke_get(&path, &[]).await?;
        decode_opt(&path, raw)
    }

    /// Partially update an object. Only the fields present in the PATCH
    /// body are changed server-side.
    pub async fn update(&self, obj: &ParaObject) -> Result<Option<ParaObject>, ParaError> {
        if obj.id.as_deref().unwrap_or("").trim().is_empty() {
            return Ok(None);
        }
        let path = obj.object_uri();
        let body = to_body(obj)?;
        let raw = self.invoke_patch(&path, Some(&body)).await?;
        decode_opt(&path, raw)
    }

    /// Delete an object.
    pub async fn delete(&self, obj: &ParaObject) -> Result<(), ParaError> {
        if obj.id.as_deref().unwrap_or("").trim().is_empty() {
            return Ok(());
        }
        self.invoke_delete(&obj.object_uri(), &[]).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Batch
    // -----------------------------------------------------------------------

    /// Create several objects in one call. Empty input is a no-op.
    pub async fn create_all(&self, objects: &[ParaObject]) -> Result<Vec<ParaObject>, ParaError> {
        if objects.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::to_value(objects)
            .map_err(|e| ParaError::Config(format!("unencodable request body: {e}")))?;
        let raw = self.invoke_post("_batch", Some(&body)).await?;
        Ok(raw.map(|b| decode_list(&b)).unwrap_or_default())
    }

    /// Read several objects by id in one call. Empty input is a no-op.
    pub async fn read_all(&self, keys: &[String]) -> Result<Vec<ParaObject>, ParaError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let params: Vec<(String, String)> = keys
            .iter()
            .map(|k| ("ids".to_string(), k.clone()))
            .collect();
        let raw = self.invoke_get("_batch", &params).await?;
        Ok(raw.map(|b| decode_list(&b)).unwrap_or_default())
    }

    /// Partially update several objects in one call. Empty input is a no-op.
    pub async fn update_all(&self, objects: &[ParaObject]) -> Result<Vec<ParaObject>, ParaError> {
        if objects.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::to_value(objects)
            .map_err(|e| ParaError::Config(format!("unencodable request body: {e}")))?;
        let raw = self.invoke_patch("_batch", Some(&body)).await?;
        Ok(raw.map(|b| decode_list(&b)).unwrap_or_default())
    }

    /// Delete several objects by id in one call. Empty input is a no-op.
    pub async fn delete_all(&self, keys: &[String]) -> Result<(), ParaError> {
        if keys.is_empty() {
            return Ok(());
        }
        let params: Vec<(String, String)> = keys
            .iter()
            .map(|k| ("ids".to_string(), k.clone()))
            .collect();
        self.invoke_delete("_batch", &params).await?;
        Ok(())
    }

    /// List all objects of a type, paginated.
    pub async fn list(
        &self,
        type_: &str,
        pager: Option<&mut Pager>,
    ) -> Result<Vec<ParaObject>, ParaError> {
        if type_.trim().is_empty() {
            return Ok(Vec::new());
        }
        let params = pager_params(pager.as_deref());
        let path = ParaObject::plural_type(type_);
        let raw = self.invoke_get(&path, &params).await?;
        Ok(raw.map(|b| extract_items(&b, pager)).unwrap_or_default())
    }

    // -----------------------------------------------------------------------
    // Search
    // -----------------------------------------------------------------------

    /// Generic search funnel. All `find_*` methods go through here; empty
    /// parameter lists short-circuit to an empty result.
    async fn find(
        &self,
        query_type: &str,
        mut params: Vec<(String, String)>,
        pager: Option<&mut Pager>,
    ) -> Result<Vec<ParaObject>, ParaError> {
        if params.is_empty() {
            return Ok(Vec::new());
        }
        params.extend(pager_params(pager.as_deref()));
        let qt = if query_type.is_empty() {
            "/default".to_string()
        } else {
            format!("/{query_type}")
        };
        let type_prefix = params
            .iter()
            .find(|(k, _)| k == "type")
            .map(|(_, v)| v.clone())
            .filter(|v| !v.is_empty());
        let path = match type_prefix {
            Some(t) => format!("{t}/search{qt}"),
            None => format!("search{qt}"),
        };
        let raw = self.invoke_get(&path, &params).await?;
        Ok(raw.map(|b| extract_items(&b, pager)).unwrap_or_default())
    }

    /// Search for an object by id.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<ParaObject>, ParaError> {
        if id.trim().is_empty() {
            return Ok(None);
        }
        let params = vec![("id".to_string(), id.to_string())];
        Ok(self.find("id", params, None).await?.into_iter().next())
    }

    /// Search for several objects by id.
    pub async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<ParaObject>, ParaError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let params = ids
            .iter()
            .map(|i| ("ids".to_string(), i.clone()))
            .collect();
        self.find("ids", params, None).await
    }

    /// Geo search around a point, radius in kilometers.
    pub async fn find_nearby(
        &self,
        type_: &str,
        query: &str,
        radius: u32,
        lat: f64,
        lng: f64,
        pager: Option<&mut Pager>,
    ) -> Result<Vec<ParaObject>, ParaError> {
        let params = vec![
            ("latlng".to_string(), format!("{lat},{lng}")),
            ("radius".to_string(), radius.to_string()),
            ("q".to_string(), default_query(query)),
            ("type".to_string(), type_.to_string()),
        ];
        self.find("nearby", params, pager).await
    }

    /// Prefix search on a field.
    pub async fn find_prefix(
        &self,
        type_: &str,
        field: &str,
        prefix: &str,
        pager: Option<&mut Pager>,
    ) -> Result<Vec<ParaObject>, ParaError> {
        let params = vec![
            ("field".to_string(), field.to_string()),
            ("prefix".to_string(), prefix.to_string()),
            ("type".to_string(), type_.to_string()),
        ];
        self.find("prefix", params, pager).await
    }

    /// Full query-string search.
    pub async fn find_query(
        &self,
        type_: &str,
        query: &str,
        pager: Option<&mut Pager>,
    ) -> Result<Vec<ParaObject>, ParaError> {
        let params = vec![
            ("q".to_string(), default_query(query)),
            ("type".to_string(), type_.to_string()),
        ];
        self.find("", params, pager).await
    }

    /// Query-string search within a nested field.
    pub async fn find_nested_query(
        &self,
        type_: &str,
        field: &str,
        query: &str,
        pager: Option<&mut Pager>,
    ) -> Result<Vec<ParaObject>, ParaError> {
        let params = vec![
            ("field".to_string(), field.to_string()),
            ("q".to_string(), default_query(query)),
            ("type".to_string(), type_.to_string()),
        ];
        self.find("nested", params, pager).await
    }

    /// "More like this" search over the given fields.
    pub async fn find_similar(
        &self,
        type_: &str,
        filter_key: &str,
        fields: &[String],
        like_text: &str,
        pager: Option<&mut Pager>,
    ) -> Result<Vec<ParaObject>, ParaError> {
        let mut params: Vec<(String, String)> = fields
            .iter()
            .map(|f| ("fields".to_string(), f.clone()))
            .collect();
        params.push(("filterid".to_string(), filter_key.to_string()));
        params.push(("like".to_string(), like_text.to_string()));
        params.push(("type".to_string(), type_.to_string()));
        self.find("similar", params, pager).await
    }

    /// Search for objects tagged with all of the given tags.
    pub async fn find_tagged(
        &self,
        type_: &str,
        tags: &[String],
        pager: Option<&mut Pager>,
    ) -> Result<Vec<ParaObject>, ParaError> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let mut params: Vec<(String, String)> = tags
            .iter()
            .map(|t| ("tags".to_string(), t.clone()))
            .collect();
        params.push(("type".to_string(), type_.to_string()));
        self.find("tagged", params, pager).await
    }

    /// Search for tag objects by keyword prefix.
    pub async fn find_tags(
        &self,
        keyword: &str,
        pager: Option<&mut Pager>,
    ) -> Result<Vec<ParaObject>, ParaError> {
        let kw = if keyword.trim().is_empty() {
            "*".to_string()
        } else {
            format!("{keyword}*")
        };
        self.find_wildcard("tag", "tag", &kw, pager).await
    }

    /// Search for objects whose list field contains one of the terms.
    pub async fn find_term_in_list(
        &self,
        type_: &str,
        field: &str,
        terms: &[String],
        pager: Option<&mut Pager>,
    ) -> Result<Vec<ParaObject>, ParaError> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let mut params: Vec<(String, String)> = terms
            .iter()
            .map(|t| ("terms".to_string(), t.clone()))
            .collect();
        params.push(("field".to_string(), field.to_string()));
        params.push(("type".to_string(), type_.to_string()));
        self.find("in", params, pager).await
    }

    /// Exact-term search over field/value pairs, ANDed when `match_all`.
    pub async fn find_terms(
        &self,
        type_: &str,
        terms: &Map<String, Value>,
        match_all: bool,
        pager: Option<&mut Pager>,
    ) -> Result<Vec<ParaObject>, ParaError> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let mut params = vec![("matchall".to_string(), match_all.to_string())];
        for (key, value) in terms {
            if value.is_null() {
                continue;
            }
            params.push((
                "terms".to_string(),
                format!("{key}{SEPARATOR}{}", scalar_string(value)),
            ));
        }
        params.push(("type".to_string(), type_.to_string()));
        self.find("terms", params, pager).await
    }

    /// Wildcard search on a field.
    pub async fn find_wildcard(
        &self,
        type_: &str,
        field: &str,
        wildcard: &str,
        pager: Option<&mut Pager>,
    ) -> Result<Vec<ParaObject>, ParaError> {
        let params = vec![
            ("field".to_string(), field.to_string()),
            ("q".to_string(), default_query(wildcard)),
            ("type".to_string(), type_.to_string()),
        ];
        self.find("wildcard", params, pager).await
    }

    /// Count all objects of a type.
    pub async fn get_count(&self, type_: &str) -> Result<u64, ParaError> {
        let params = vec![("type".to_string(), type_.to_string())];
        let mut pager = Pager::new();
        self.find("count", params, Some(&mut pager)).await?;
        Ok(pager.count)
    }

    /// Count objects matching exact field/value terms.
    pub async fn get_count_terms(
        &self,
        type_: &str,
        terms: &Map<String, Value>,
    ) -> Result<u64, ParaError> {
        if terms.is_empty() {
            return Ok(0);
        }
        let mut params = vec![("count".to_string(), "true".to_string())];
        for (key, value) in terms {
            if value.is_null() {
                continue;
            }
            params.push((
                "terms".to_string(),
                format!("{key}{SEPARATOR}{}", scalar_string(value)),
            ));
        }
        params.push(("type".to_string(), type_.to_string()));
        let mut pager = Pager::new();
        self.find("terms", params, Some(&mut pager)).await?;
        Ok(pager.count)
    }

    // -----------------------------------------------------------------------
    // Links & children
    // -----------------------------------------------------------------------

    /// Count the objects of `type2` linked to this one.
    pub async fn count_links(&self, obj: &ParaObject, type2: &str) -> Result<u64, ParaError> {
        if obj.id.as_deref().unwrap_or("").is_empty() || type2.is_empty() {
            return Ok(0);
        }
        let path = format!("{}/links/{}", obj.object_uri(), type2);
        let params = vec![("count".to_string(), "true".to_string())];
        let raw = self.invoke_get(&path, &params).await?;
        let mut pager = Pager::new();
        if let Some(b) = raw {
            extract_items(&b, Some(&mut pager));
        }
        Ok(pager.count)
    }

    /// All objects of `type2` linked to this one.
    pub async fn get_linked_objects(
        &self,
        obj: &ParaObject,
        type2: &str,
        pager: Option<&mut Pager>,
    ) -> Result<Vec<ParaObject>, ParaError> {
        if obj.id.as_deref().unwrap_or("").is_empty() || type2.is_empty() {
            return Ok(Vec::new());
        }
        let path = format!("{}/links/{}", obj.object_uri(), type2);
        let params = pager_params(pager.as_deref());
        let raw = self.invoke_get(&path, &params).await?;
        Ok(raw.map(|b| extract_items(&b, pager)).unwrap_or_default())
    }

    /// Search within the objects of `type2` linked to this one.
    pub async fn find_linked_objects(
        &self,
        obj: &ParaObject,
        type2: &str,
        field: &str,
        query: &str,
        pager: Option<&mut Pager>,
    ) -> Result<Vec<ParaObject>, ParaError> {
        if obj.id.as_deref().unwrap_or("").is_empty() || type2.is_empty() {
            return Ok(Vec::new());
        }
        let path = format!("{}/links/{}", obj.object_uri(), type2);
        let mut params = vec![
            ("field".to_string(), field.to_string()),
            ("q".to_string(), default_query(query)),
        ];
        params.extend(pager_params(pager.as_deref()));
        let raw = self.invoke_get(&path, &params).await?;
        Ok(raw.map(|b| extract_items(&b, pager)).unwrap_or_default())
    }

    /// Whether this object is linked to the object with the given type and id.
    pub async fn is_linked(
        &self,
        obj: &ParaObject,
        type2: &str,
        id2: &str,
    ) -> Result<bool, ParaError> {
        if obj.id.as_deref().unwrap_or("").is_empty() || type2.is_empty() || id2.is_empty() {
            return Ok(false);
        }
        let path = format!("{}/links/{}/{}", obj.object_uri(), type2, id2);
        let raw = self.invoke_get(&path, &[]).await?;
        Ok(parse_bool(raw))
    }

    /// Whether this object is linked to another object.
    pub async fn is_linked_to(
        &self,
        obj: &ParaObject,
        to: &ParaObject,
    ) -> Result<bool, ParaError> {
        match to.id.as_deref() {
            Some(id) if !id.is_empty() => self.is_linked(obj, &to.type_, id).await,
            _ => Ok(false),
        }
    }

    /// Link this object to the object with the given id. Returns the id of
    /// the link object.
    pub async fn link(&self, obj: &ParaObject, id2: &str) -> Result<Option<String>, ParaError> {
        if obj.id.as_deref().unwrap_or("").is_empty() || id2.is_empty() {
            return Ok(None);
        }
        let path = format!("{}/links/{}", obj.object_uri(), id2);
        self.invoke_post(&path, None).await
    }

    /// Remove the link between this object and the given type/id.
    pub async fn unlink(&self, obj: &ParaObject, type2: &str, id2: &str) -> Result<(), ParaError> {
        if obj.id.as_deref().unwrap_or("").is_empty() || type2.is_empty() || id2.is_empty() {
            return Ok(());
        }
        let path = format!("{}/links/{}/{}", obj.object_uri(), type2, id2);
        self.invoke_delete(&path, &[]).await?;
        Ok(())
    }

    /// Remove all links to and from this object.
    pub async fn unlink_all(&self, obj: &ParaObject) -> Result<(), ParaError> {
        if obj.id.as_deref().unwrap_or("").is_empty() {
            return Ok(());
        }
        let path = format!("{}/links", obj.object_uri());
        self.invoke_delete(&path, &[]).await?;
        Ok(())
    }

    /// Count the child objects of the given type.
    pub async fn count_children(&self, obj: &ParaObject, type2: &str) -> Result<u64, ParaError> {
        if obj.id.as_deref().unwrap_or("").is_empty() || type2.is_empty() {
            return Ok(0);
        }
        let path = format!("{}/links/{}", obj.object_uri(), type2);
        let params = vec![
            ("count".to_string(), "true".to_string()),
            ("childrenonly".to_string(), "true".to_string()),
        ];
        let raw = self.invoke_get(&path, &params).await?;
        let mut pager = Pager::new();
        if let Some(b) = raw {
            extract_items(&b, Some(&mut pager));
        }
        Ok(pager.count)
    }

    /// All child objects of the given type.
    pub async fn get_children(
        &self,
        obj: &ParaObject,
        type2: &str,
        pager: Option<&mut Pager>,
    ) -> Result<Vec<ParaObject>, ParaError> {
        if obj.id.as_deref().unwrap_or("").is_empty() || type2.is_empty() {
            return Ok(Vec::new());
        }
        let path = format!("{}/links/{}", obj.object_uri(), type2);
        let mut params = vec![("childrenonly".to_string(), "true".to_string())];
        params.extend(pager_params(pager.as_deref()));
        let raw = self.invoke_get(&path, &params).await?;
        Ok(raw.map(|b| extract_items(&b, pager)).unwrap_or_default())
    }

    /// Child objects of the given type whose `field` equals `term`.
    pub async fn get_children_by_term(
        &self,
        obj: &ParaObject,
        type2: &str,
        field: &str,
        term: &str,
        pager: Option<&mut Pager>,
    ) -> Result<Vec<ParaObject>, ParaError> {
        if obj.id.as_deref().unwrap_or("").is_empty() || type2.is_empty() {
            return Ok(Vec::new());
        }
        let path = format!("{}/links/{}", obj.object_uri(), type2);
        let mut params = vec![
            ("childrenonly".to_string(), "true".to_string()),
            ("field".to_string(), field.to_string()),
            ("term".to_string(), term.to_string()),
        ];
        params.extend(pager_params(pager.as_deref()));
        let raw = self.invoke_get(&path, &params).await?;
        Ok(raw.map(|b| extract_items(&b, pager)).unwrap_or_default())
    }

    /// Search within the child objects of the given type.
    pub async fn find_children(
        &self,
        obj: &ParaObject,
        type2: &str,
        query: &str,
        pager: Option<&mut Pager>,
    ) -> Result<Vec<ParaObject>, ParaError> {
        if obj.id.as_deref().unwrap_or("").is_empty() || type2.is_empty() {
            return Ok(Vec::new());
        }
        let path = format!("{}/links/{}", obj.object_uri(), type2);
        let mut params = vec![
            ("childrenonly".to_string(), "true".to_string()),
            ("q".to_string(), default_query(query)),
        ];
        params.extend(pager_params(pager.as_deref()));
        let raw = self.invoke_get(&path, &params).await?;
        Ok(raw.map(|b| extract_items(&b, pager)).unwrap_or_default())
    }

    /// Delete all child objects of the given type.
    pub async fn delete_children(&self, obj: &ParaObject, type2: &str) -> Result<(), ParaError> {
        if obj.id.as_deref().unwrap_or("").is_empty() || type2.is_empty() {
            return Ok(());
        }
        let path = format!("{}/links/{}", obj.object_uri(), type2);
        let params = vec![("childrenonly".to_string(), "true".to_string())];
        self.invoke_delete(&path, &params).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Utilities
    // -----------------------------------------------------------------------

    /// A new server-generated unique id.
    pub async fn new_id(&self) -> Result<String, ParaError> {
        Ok(self.invoke_get("utils/newid", &[]).await?.unwrap_or_default())
    }

    /// The server's current time in Unix milliseconds.
    pub async fn get_timestamp(&self) -> Result<u64, ParaError> {
        let raw = self.invoke_get("utils/timestamp", &[]).await?;
        Ok(raw
            .and_then(|b| b.trim().parse::<u64>().ok())
            .unwrap_or(0))
    }

    /// Format the current date server-side.
    pub async fn format_date(
        &self,
        format: &str,
        locale: Option<&str>,
    ) -> Result<String, ParaError> {
        let mut params = vec![("format".to_string(), format.to_string())];
        if let Some(loc) = locale {
            params.push(("locale".to_string(), loc.to_string()));
        }
        Ok(self
            .invoke_get("utils/formatdate", &params)
            .await?
            .unwrap_or_default())
    }

    /// Replace spaces in a string with the given separator.
    pub async fn no_spaces(&self, string: &str, replace_with: &str) -> Result<String, ParaError> {
        let params = vec![
            ("string".to_string(), string.to_string()),
            ("replacement".to_string(), replace_with.to_string()),
        ];
        Ok(self
            .invoke_get("utils/nospaces", &params)
            .await?
            .unwrap_or_default())
    }

    /// Strip all symbols and whitespace from a string.
    pub async fn strip_and_trim(&self, string: &str) -> Result<String, ParaError> {
        let params = vec![("string".to_string(), string.to_string())];
        Ok(self
            .invoke_get("utils/nosymbols", &params)
            .await?
            .unwrap_or_default())
    }

    /// Render Markdown to HTML server-side.
    pub async fn markdown_to_html(&self, markdown: &str) -> Result<String, ParaError> {
        let params = vec![("md".to_string(), markdown.to_string())];
        Ok(self
            .invoke_get("utils/md2html", &params)
            .await?
            .unwrap_or_default())
    }

    /// A human-friendly "time ago" string for a duration in milliseconds.
    pub async fn approximately(&self, delta_millis: u64) -> Result<String, ParaError> {
        let params = vec![("delta".to_string(), delta_millis.to_string())];
        Ok(self
            .invoke_get("utils/timeago", &params)
            .await?
            .unwrap_or_default())
    }

    // -----------------------------------------------------------------------
    // Misc
    // -----------------------------------------------------------------------

    /// Generate a new secret key for this app. The new secret replaces the
    /// one held by this client.
    pub async fn new_keys(&self) -> Result<HashMap<String, String>, ParaError> {
        let raw = self.invoke_post("_newkeys", None).await?;
        let keys: HashMap<String, String> = match raw {
            Some(b) => decode_json("_newkeys", &b)?,
            None => HashMap::new(),
        };
        if let Some(sk) = keys.get("secretKey") {
            *self.secret_key.lock().unwrap_or_else(|e| e.into_inner()) =
                Zeroizing::new(sk.clone());
        }
        Ok(keys)
    }

    /// All registered types and their REST resource names.
    pub async fn types(&self) -> Result<HashMap<String, String>, ParaError> {
        let raw = self.invoke_get("_types", &[]).await?;
        match raw {
            Some(b) => decode_json("_types", &b),
            None => Ok(HashMap::new()),
        }
    }

    /// The user or app associated with the current credentials.
    pub async fn me(&self) -> Result<Option<ParaObject>, ParaError> {
        let raw = self.invoke_get("_me", &[]).await?;
        decode_opt("_me", raw)
    }

    /// Like [`me`](Self::me), but authenticating with an explicit JWT
    /// instead of the client's own credentials.
    pub async fn me_with_token(&self, access_token: &str) -> Result<Option<ParaObject>, ParaError> {
        if access_token.trim().is_empty() {
            return self.me().await;
        }
        let token = access_token
            .trim_start_matches("Bearer")
            .trim_start()
            .to_string();
        let resp = self
            .invoke(Method::GET, "_me", &[], None, Some(&token))
            .await?;
        let raw = self.read_entity("_me", resp).await?;
        decode_opt("_me", raw)
    }

    /// Upvote an object on behalf of a voter. Returns whether the vote
    /// was counted.
    pub async fn vote_up(&self, obj: &ParaObject, voter_id: &str) -> Result<bool, ParaError> {
        self.vote(obj, voter_id, "_voteup").await
    }

    /// Downvote an object on behalf of a voter.
    pub async fn vote_down(&self, obj: &ParaObject, voter_id: &str) -> Result<bool, ParaError> {
        self.vote(obj, voter_id, "_votedown").await
    }

    async fn vote(
        &self,
        obj: &ParaObject,
        voter_id: &str,
        direction: &str,
    ) -> Result<bool, ParaError> {
        if obj.id.as_deref().unwrap_or("").is_empty() || voter_id.is_empty() {
            return Ok(false);
        }
        let body = json!({ direction: voter_id });
        let raw = self.invoke_patch(&obj.object_uri(), Some(&body)).await?;
        Ok(parse_bool(raw))
    }

    /// Rebuild the app's search index, optionally into a new destination
    /// index.
    pub async fn rebuild_index(
        &self,
        destination_index: Option<&str>,
    ) -> Result<HashMap<String, String>, ParaError> {
        let params: Vec<(String, String)> = destination_index
            .map(|d| vec![("destinationIndex".to_string(), d.to_string())])
            .unwrap_or_default();
        let resp = self
            .invoke(Method::POST, "_reindex", &params, None, None)
            .await?;
        let raw = self.read_entity("_reindex", resp).await?;
        match raw {
            Some(b) => decode_json("_reindex", &b),
            None => Ok(HashMap::new()),
        }
    }

    /// The server version string, or `"unknown"`.
    pub async fn get_server_version(&self) -> Result<String, ParaError> {
        let raw = self.invoke_get("", &[]).await?;
        let version = raw
            .and_then(|b| serde_json::from_str::<Value>(&b).ok())
            .and_then(|v| v.get("version").and_then(Value::as_str).map(str::to_string))
            .filter(|v| !v.is_empty());
        Ok(version.unwrap_or_else(|| "unknown".to_string()))
    }

    /// The app object associated with the current credentials.
    pub async fn get_app(&self) -> Result<Option<ParaObject>, ParaError> {
        self.me().await
    }

    // -----------------------------------------------------------------------
    // Validation constraints
    // -----------------------------------------------------------------------

    /// All validation constraints for all types.
    pub async fn validation_constraints(&self) -> Result<ConstraintMap, ParaError> {
        let raw = self.invoke_get("_constraints", &[]).await?;
        match raw {
            Some(b) => decode_json("_constraints", &b),
            None => Ok(ConstraintMap::new()),
        }
    }

    /// Validation constraints for a single type.
    pub async fn validation_constraints_for(
        &self,
        type_: &str,
    ) -> Result<ConstraintMap, ParaError> {
        if type_.trim().is_empty() {
            return self.validation_constraints().await;
        }
        let path = format!("_constraints/{type_}");
        let raw = self.invoke_get(&path, &[]).await?;
        match raw {
            Some(b) => decode_json(&path, &b),
            None => Ok(ConstraintMap::new()),
        }
    }

    /// Register a validation constraint for a field of a type.
    pub async fn add_validation_constraint(
        &self,
        type_: &str,
        field: &str,
        constraint: &Constraint,
    ) -> Result<ConstraintMap, ParaError> {
        if type_.trim().is_empty() || field.trim().is_empty() {
            return Ok(ConstraintMap::new());
        }
        let path = format!("_constraints/{type_}/{field}/{}", constraint.name());
        let body = Value::Object(constraint.payload().clone());
        let raw = self.invoke_put(&path, Some(&body)).await?;
        match raw {
            Some(b) => decode_json(&path, &b),
            None => Ok(ConstraintMap::new()),
        }
    }

    /// Remove a validation constraint from a field of a type.
    pub async fn remove_validation_constraint(
        &self,
        type_: &str,
        field: &str,
        constraint_name: &str,
    ) -> Result<ConstraintMap, ParaError> {
        if type_.trim().is_empty() || field.trim().is_empty() || constraint_name.trim().is_empty()
        {
            return Ok(ConstraintMap::new());
        }
        let path = format!("_constraints/{type_}/{field}/{constraint_name}");
        let raw = self.invoke_delete(&path, &[]).await?;
        match raw {
            Some(b) => decode_json(&path, &b),
            None => Ok(ConstraintMap::new()),
        }
    }

    // -----------------------------------------------------------------------
    // Resource permissions
    // -----------------------------------------------------------------------

    /// All resource permissions for all subjects.
    pub async fn resource_permissions(&self) -> Result<PermissionMap, ParaError> {
        let raw = self.invoke_get("_permissions", &[]).await?;
        match raw {
            Some(b) => decode_json("_permissions", &b),
            None => Ok(PermissionMap::new()),
        }
    }

    /// Resource permissions for a single subject.
    pub async fn resource_permissions_of(
        &self,
        subject_id: &str,
    ) -> Result<PermissionMap, ParaError> {
        if subject_id.trim().is_empty() {
            return self.resource_permissions().await;
        }
        let path = format!("_permissions/{subject_id}");
        let raw = self.invoke_get(&path, &[]).await?;
        match raw {
            Some(b) => decode_json(&path, &b),
            None => Ok(PermissionMap::new()),
        }
    }

    /// Grant a subject permission to call the given HTTP methods on a
    /// resource path. Granting to the `"*"` subject with
    /// `allow_guest_access` also opens the resource to unauthenticated
    /// callers (the `"?"` sentinel method).
    pub async fn grant_resource_permission(
        &self,
        subject_id: &str,
        resource_path: &str,
        permission: &[&str],
        allow_guest_access: bool,
    ) -> Result<PermissionMap, ParaError> {
        if subject_id.trim().is_empty() || resource_path.trim().is_empty() || permission.is_empty()
        {
            return Ok(PermissionMap::new());
        }
        let mut methods: Vec<&str> = permission.to_vec();
        if allow_guest_access && subject_id == ALLOW_ALL {
            methods.push(GUEST_PERMISSION);
        }
        let resource = urlencoding::encode(resource_path);
        let path = format!("_permissions/{subject_id}/{resource}");
        let body = json!(methods);
        let raw = self.invoke_put(&path, Some(&body)).await?;
        match raw {
            Some(b) => decode_json(&path, &b),
            None => Ok(PermissionMap::new()),
        }
    }

    /// Revoke a subject's permissions on a resource path.
    pub async fn revoke_resource_permission(
        &self,
        subject_id: &str,
        resource_path: &str,
    ) -> Result<PermissionMap, ParaError> {
        if subject_id.trim().is_empty() || resource_path.trim().is_empty() {
            return Ok(PermissionMap::new());
        }
        let resource = urlencoding::encode(resource_path);
        let path = format!("_permissions/{subject_id}/{resource}");
        let raw = self.invoke_delete(&path, &[]).await?;
        match raw {
            Some(b) => decode_json(&path, &b),
            None => Ok(PermissionMap::new()),
        }
    }

    /// Revoke all of a subject's permissions.
    pub async fn revoke_all_resource_permissions(
        &self,
        subject_id: &str,
    ) -> Result<PermissionMap, ParaError> {
        if subject_id.trim().is_empty() {
            return Ok(PermissionMap::new());
        }
        let path = format!("_permissions/{subject_id}");
        let raw = self.invoke_delete(&path, &[]).await?;
        match raw {
            Some(b) => decode_json(&path, &b),
            None => Ok(PermissionMap::new()),
        }
    }

    /// Whether a subject may call an HTTP method on a resource path.
    pub async fn is_allowed_to(
        &self,
        subject_id: &str,
        resource_path: &str,
        http_method: &str,
    ) -> Result<bool, ParaError> {
        if subject_id.trim().is_empty() || resource_path.trim().is_empty() {
            return Ok(false);
        }
        let resource = urlencoding::encode(resource_path);
        let path = format!("_permissions/{subject_id}/{resource}/{http_method}");
        let raw = self.invoke_get(&path, &[]).await?;
        Ok(parse_bool(raw))
    }

    // -----------------------------------------------------------------------
    // App settings
    // -----------------------------------------------------------------------

    /// All custom app settings.
    pub async fn app_settings(&self) -> Result<Map<String, Value>, ParaError> {
        let raw = self.invoke_get("_settings", &[]).await?;
        match raw {
            Some(b) => decode_json("_settings", &b),
            None => Ok(Map::new()),
        }
    }

    /// A single app setting by key.
    pub async fn app_setting(&self, key: &str) -> Result<Map<String, Value>, ParaError> {
        if key.trim().is_empty() {
            return self.app_settings().await;
        }
        let path = format!("_settings/{key}");
        let raw = self.invoke_get(&path, &[]).await?;
        match raw {
            Some(b) => decode_json(&path, &b),
            None => Ok(Map::new()),
        }
    }

    /// Add or overwrite a single app setting.
    pub async fn add_app_setting(&self, key: &str, value: &Value) -> Result<(), ParaError> {
        if key.trim().is_empty() {
            return Ok(());
        }
        let path = format!("_settings/{key}");
        let body = json!({ "value": value });
        self.invoke_put(&path, Some(&body)).await?;
        Ok(())
    }

    /// Replace all app settings at once.
    pub async fn set_app_settings(&self, settings: &Map<String, Value>) -> Result<(), ParaError> {
        let body = Value::Object(settings.clone());
        self.invoke_put("_settings", Some(&body)).await?;
        Ok(())
    }

    /// Remove a single app setting.
    pub async fn remove_app_setting(&self, key: &str) -> Result<(), ParaError> {
        if key.trim().is_empty() {
            return Ok(());
        }
        let path = format!("_settings/{key}");
        self.invoke_delete(&path, &[]).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tokens
    // -----------------------------------------------------------------------

    /// Authenticate a user with an identity provider token. On success the
    /// JWT is stored (when `remember_jwt`) and the user object returned;
    /// on failure any held token is cleared.
    pub async fn sign_in(
        &self,
        provider: &str,
        provider_token: &str,
        remember_jwt: bool,
    ) -> Result<Option<ParaObject>, ParaError> {
        if provider.trim().is_empty() || provider_token.trim().is_empty() {
            return Ok(None);
        }
        let body = json!({
            "appid": self.access_key,
            "provider": provider,
            "token": provider_token,
        });
        let raw = self.invoke_post(JWT_PATH, Some(&body)).await?;
        let Some(raw) = raw else {
            self.token_state().clear();
            return Ok(None);
        };
        let data: Value = decode_json(JWT_PATH, &raw)?;
        let user = data.get("user").cloned();
        let jwt = data.get("jwt").and_then(Value::as_object);
        match (user, jwt) {
            (Some(user), Some(jwt)) => {
                if remember_jwt {
                    self.store_jwt(jwt);
                }
                let obj = ParaObject::from_value(user).map_err(|e| {
                    ParaError::Deserialization {
                        endpoint: JWT_PATH.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(Some(obj))
            }
            _ => {
                self.token_state().clear();
                Ok(None)
            }
        }
    }

    /// Forget the locally held access token. The token itself is not
    /// revoked server-side.
    pub fn sign_out(&self) {
        self.token_state().clear();
    }

    /// Exchange the current token for a fresh one. Clears the token state
    /// when the server rejects the exchange.
    ///
    /// Issues the request directly: the token endpoint only ever takes
    /// the bearer token itself, and must not re-enter the refresh check.
    async fn refresh_access_token(&self) -> Result<bool, ParaError> {
        let Some(token) = self.token_state().token().map(str::to_string) else {
            return Ok(false);
        };
        let url = Url::parse(&format!("{}{}", self.endpoint, JWT_PATH))
            .map_err(|e| ParaError::Config(format!("invalid request URL: {e}")))?;
        let result = async {
            let resp = self
                .http
                .get(url)
                .header(AUTHORIZATION, header_value(&format!("Bearer {token}"))?)
                .send()
                .await
                .map_err(|source| ParaError::Http {
                    endpoint: JWT_PATH.to_string(),
                    source,
                })?;
            self.read_entity(JWT_PATH, resp).await
        }
        .await;
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                self.token_state().clear();
                return Err(e);
            }
        };
        let Some(raw) = raw else {
            self.token_state().clear();
            return Ok(false);
        };
        let data: Value = decode_json(JWT_PATH, &raw)?;
        let user = data.get("user");
        match data.get("jwt").and_then(Value::as_object) {
            Some(jwt) if user.is_some() => {
                self.store_jwt(jwt);
                Ok(true)
            }
            _ => {
                self.token_state().clear();
                Ok(false)
            }
        }
    }

    /// Revoke all of the user's tokens server-side. The local token is
    /// kept; call [`sign_out`](Self::sign_out) to drop it.
    pub async fn revoke_all_tokens(&self) -> Result<bool, ParaError> {
        let raw = self.invoke_delete(JWT_PATH, &[]).await?;
        Ok(raw.is_some())
    }

    /// The currently held access token, if any.
    pub fn get_access_token(&self) -> Option<String> {
        self.token_state().token().map(str::to_string)
    }

    /// Adopt an externally obtained JWT, lifting its expiry and refresh
    /// claims into the token state.
    pub fn set_access_token(&self, token: &str) {
        self.token_state().set_from_jwt(token);
    }

    fn store_jwt(&self, jwt: &Map<String, Value>) {
        let token = jwt.get("access_token").and_then(Value::as_str);
        let expires = jwt.get("expires").and_then(Value::as_i64).unwrap_or(-1);
        let refresh = jwt.get("refresh").and_then(Value::as_i64).unwrap_or(-1);
        match token {
            Some(tok) if !tok.is_empty() => {
                self.token_state().set(tok.to_string(), expires, refresh);
            }
            _ => self.token_state().clear(),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Pull the human-readable message out of a `{code, message}` error
/// envelope, falling back to the bare status.
fn error_message(body: &str, status: u16) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("HTTP {status}"))
}

fn header_value(value: &str) -> Result<HeaderValue, ParaError> {
    HeaderValue::from_str(value)
        .map_err(|e| ParaError::Config(format!("invalid header value: {e}")))
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(p) => format!("{host}:{p}"),
        None => host.to_string(),
    }
}

fn to_body(obj: &ParaObject) -> Result<Value, ParaError> {
    serde_json::to_value(obj)
        .map_err(|e| ParaError::Config(format!("unencodable request body: {e}")))
}

fn decode_json<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, ParaError> {
    serde_json::from_str(body).map_err(|e| ParaError::Deserialization {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}

fn decode_opt(endpoint: &str, raw: Option<String>) -> Result<Option<ParaObject>, ParaError> {
    raw.map(|b| decode_json(endpoint, &b)).transpose()
}

/// Decode a JSON array of objects, skipping nulls and malformed entries.
fn decode_list(body: &str) -> Vec<ParaObject> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(values)) => values
            .into_iter()
            .filter(|v| !v.is_null())
            .filter_map(|v| match ParaObject::from_value(v) {
                Ok(obj) => Some(obj),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping undecodable item");
                    None
                }
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Decode a search/list envelope, writing `totalHits`/`lastKey` back to
/// the pager and returning the `items` array.
fn extract_items(body: &str, pager: Option<&mut Pager>) -> Vec<ParaObject> {
    let Ok(Value::Object(mut envelope)) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };
    if let Some(p) = pager {
        if let Some(hits) = envelope.get("totalHits").and_then(Value::as_u64) {
            p.count = hits;
        }
        if let Some(lk) = envelope.get("lastKey").and_then(Value::as_str) {
            p.last_key = Some(lk.to_string());
        }
    }
    match envelope.remove("items") {
        Some(Value::Array(values)) => values
            .into_iter()
            .filter(|v| !v.is_null())
            .filter_map(|v| ParaObject::from_value(v).ok())
            .collect(),
        _ => Vec::new(),
    }
}

fn pager_params(pager: Option<&Pager>) -> Vec<(String, String)> {
    let Some(p) = pager else {
        return Vec::new();
    };
    let mut params = vec![
        ("page".to_string(), p.page.to_string()),
        ("desc".to_string(), p.desc.to_string()),
        ("limit".to_string(), p.limit.to_string()),
    ];
    if let Some(lk) = &p.last_key {
        params.push(("lastKey".to_string(), lk.clone()));
    }
    if let Some(sort) = &p.sortby {
        params.push(("sort".to_string(), sort.clone()));
    }
    if !p.select.is_empty() {
        params.push(("select".to_string(), p.select.join(",")));
    }
    params
}

fn parse_bool(raw: Option<String>) -> bool {
    raw.map(|b| b.trim().parse::<bool>().unwrap_or(false))
        .unwrap_or(false)
}

fn default_query(query: &str) -> String {
    if query.trim().is_empty() {
        "*".to_string()
    } else {
        query.to_string()
    }
}

/// Render a JSON scalar without quotes, for `field:value` term pairs.
fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
