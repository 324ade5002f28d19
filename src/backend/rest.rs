//! HTTP bindings of the backend seams against the hosted service.
//!
//! One facade call maps to one request here: auth under `/auth/v1`, rows
//! under `/rest/v1`, blobs under `/storage/v1`. Remote failures are
//! classified into the crate error taxonomy by status code; nothing is
//! retried and no timeout is configured beyond the client's defaults.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::backend::{
    AuthEvent, AuthEvents, Authenticator, Backend, BlobStore, Filter, Query, RecordStore,
    SessionHandle,
};
use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::models::{Session, SignUpMetadata, User};

/// Single-row responses from the row API use this media type.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Build the production backend from connection settings.
pub fn connect(config: &GatewayConfig) -> Backend {
    let client = Arc::new(RestClient {
        http: reqwest::Client::new(),
        base_url: config.service_url.clone(),
        api_key: config.api_key.clone(),
        session: SessionHandle::default(),
    });

    Backend {
        auth: Arc::new(RestAuthenticator {
            client: Arc::clone(&client),
            events: AuthEvents::new(),
        }),
        records: Arc::new(RestRecordStore {
            client: Arc::clone(&client),
        }),
        blobs: Arc::new(RestBlobStore { client }),
    }
}

/// Shared HTTP plumbing: base URL, API key, and the session slot all three
/// bindings authenticate from.
struct RestClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    session: SessionHandle,
}

impl RestClient {
    /// Bearer credential for the next request: the session token when one
    /// exists, the public API key otherwise.
    fn bearer(&self) -> String {
        self.session
            .access_token()
            .unwrap_or_else(|| self.api_key.clone())
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer())
    }
}

/// Best human-readable message the remote error body offers.
fn remote_message(body: &Value) -> Option<String> {
    for key in ["message", "msg", "error_description", "error"] {
        if let Some(text) = body.get(key).and_then(Value::as_str) {
            return Some(text.to_string());
        }
    }
    None
}

async fn response_message(resp: reqwest::Response) -> String {
    let status = resp.status();
    let body = resp.json::<Value>().await.unwrap_or(Value::Null);
    remote_message(&body).unwrap_or_else(|| format!("HTTP {status}"))
}

/// Classify a failed row-API response. 406 is the single-object miss.
fn classify_row_failure(status: StatusCode, message: String) -> Error {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Auth(message),
        StatusCode::NOT_FOUND | StatusCode::NOT_ACCEPTABLE => Error::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            Error::Validation(message)
        }
        _ => Error::Persistence(message),
    }
}

/// Encode a query's select/filter/order parameters.
fn query_string(query: &Query) -> String {
    let mut pairs = url::form_urlencoded::Serializer::new(String::new());
    pairs.append_pair("select", &query.select);
    for filter in &query.filters {
        match filter {
            Filter::Eq(column, value) => {
                pairs.append_pair(column, &format!("eq.{value}"));
            }
            Filter::Gte(column, value) => {
                pairs.append_pair(column, &format!("gte.{value}"));
            }
        }
    }
    if let Some(order) = &query.order {
        let direction = if order.descending { "desc" } else { "asc" };
        pairs.append_pair("order", &format!("{}.{}", order.column, direction));
    }
    pairs.finish()
}

pub struct RestAuthenticator {
    client: Arc<RestClient>,
    events: AuthEvents,
}

impl RestAuthenticator {
    async fn token_request(&self, grant_type: &str, body: Value) -> Result<Session> {
        let url = format!(
            "{}/auth/v1/token?grant_type={}",
            self.client.base_url, grant_type
        );
        let resp = self
            .client
            .request(Method::POST, &url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Auth(format!("auth request failed: {e}")))?;

        if !resp.status().is_success() {
            let message = response_message(resp).await;
            tracing::error!("Token request ({}) failed: {}", grant_type, message);
            return Err(Error::Auth(message));
        }

        resp.json::<Session>()
            .await
            .map_err(|e| Error::Auth(format!("malformed auth response: {e}")))
    }
}

#[async_trait]
impl Authenticator for RestAuthenticator {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<Session> {
        let url = format!("{}/auth/v1/signup", self.client.base_url);
        let body = json!({
            "email": email,
            "password": password,
            "data": metadata,
        });

        let resp = self
            .client
            .request(Method::POST, &url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Auth(format!("sign-up request failed: {e}")))?;

        if !resp.status().is_success() {
            let message = response_message(resp).await;
            tracing::error!("Sign-up failed: {}", message);
            return Err(Error::Auth(message));
        }

        let session: Session = resp
            .json()
            .await
            .map_err(|e| Error::Auth(format!("malformed sign-up response: {e}")))?;

        self.client.session.set(Some(session.clone()));
        self.events.emit(AuthEvent::SignedIn, Some(&session));
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let session = self
            .token_request("password", json!({ "email": email, "password": password }))
            .await?;

        self.client.session.set(Some(session.clone()));
        self.events.emit(AuthEvent::SignedIn, Some(&session));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        if self.client.session.access_token().is_none() {
            return Ok(());
        }

        let url = format!("{}/auth/v1/logout", self.client.base_url);
        let resp = self
            .client
            .request(Method::POST, &url)
            .send()
            .await
            .map_err(|e| Error::Auth(format!("sign-out request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::Auth(response_message(resp).await));
        }

        self.client.session.set(None);
        self.events.emit(AuthEvent::SignedOut, None);
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<User>> {
        if self.client.session.access_token().is_none() {
            return Ok(None);
        }

        let url = format!("{}/auth/v1/user", self.client.base_url);
        let resp = self
            .client
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|e| Error::Auth(format!("user request failed: {e}")))?;

        // An expired or revoked token means no current user, not a failure.
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Error::Auth(response_message(resp).await));
        }

        let user: User = resp
            .json()
            .await
            .map_err(|e| Error::Auth(format!("malformed user response: {e}")))?;
        Ok(Some(user))
    }

    async fn refresh_session(&self) -> Result<Session> {
        let current = self
            .client
            .session
            .get()
            .ok_or_else(|| Error::Auth("No session to refresh".to_string()))?;

        let session = self
            .token_request(
                "refresh_token",
                json!({ "refresh_token": current.refresh_token }),
            )
            .await?;

        self.client.session.set(Some(session.clone()));
        self.events.emit(AuthEvent::TokenRefreshed, Some(&session));
        Ok(session)
    }

    fn events(&self) -> &AuthEvents {
        &self.events
    }
}

pub struct RestRecordStore {
    client: Arc<RestClient>,
}

impl RestRecordStore {
    fn query_url(&self, query: &Query) -> String {
        format!(
            "{}/rest/v1/{}?{}",
            self.client.base_url,
            query.table,
            query_string(query)
        )
    }

    async fn send_rows(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let resp = builder
            .send()
            .await
            .map_err(|e| Error::Persistence(format!("row request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let message = response_message(resp).await;
            tracing::error!("Row request failed ({}): {}", status, message);
            return Err(classify_row_failure(status, message));
        }
        Ok(resp)
    }
}

#[async_trait]
impl RecordStore for RestRecordStore {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        let url = self.query_url(query);
        let resp = self.send_rows(self.client.request(Method::GET, &url)).await?;
        resp.json::<Vec<Value>>()
            .await
            .map_err(|e| Error::Persistence(format!("malformed result set: {e}")))
    }

    async fn select_single(&self, query: &Query) -> Result<Value> {
        let url = self.query_url(query);
        let resp = self
            .send_rows(
                self.client
                    .request(Method::GET, &url)
                    .header(ACCEPT, SINGLE_OBJECT),
            )
            .await?;
        resp.json::<Value>()
            .await
            .map_err(|e| Error::Persistence(format!("malformed row: {e}")))
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let url = format!("{}/rest/v1/{}", self.client.base_url, table);
        let resp = self
            .send_rows(
                self.client
                    .request(Method::POST, &url)
                    .header("Prefer", "return=representation")
                    .header(ACCEPT, SINGLE_OBJECT)
                    .json(&row),
            )
            .await?;
        resp.json::<Value>()
            .await
            .map_err(|e| Error::Persistence(format!("malformed insert response: {e}")))
    }

    async fn update(&self, table: &str, id: Uuid, changes: Value) -> Result<Value> {
        let url = format!("{}/rest/v1/{}?id=eq.{}", self.client.base_url, table, id);
        let resp = self
            .send_rows(
                self.client
                    .request(Method::PATCH, &url)
                    .header("Prefer", "return=representation")
                    .header(ACCEPT, SINGLE_OBJECT)
                    .json(&changes),
            )
            .await?;
        resp.json::<Value>()
            .await
            .map_err(|e| Error::Persistence(format!("malformed update response: {e}")))
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value> {
        let url = format!("{}/rest/v1/rpc/{}", self.client.base_url, function);
        let resp = self
            .send_rows(self.client.request(Method::POST, &url).json(&args))
            .await?;
        resp.json::<Value>()
            .await
            .map_err(|e| Error::Persistence(format!("malformed function response: {e}")))
    }
}

pub struct RestBlobStore {
    client: Arc<RestClient>,
}

impl RestBlobStore {
    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.client.base_url, bucket, path
        )
    }
}

#[async_trait]
impl BlobStore for RestBlobStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<String> {
        let url = self.object_url(bucket, path);
        let resp = self
            .client
            .request(Method::POST, &url)
            .header(CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("upload request failed: {e}")))?;

        if !resp.status().is_success() {
            let message = response_message(resp).await;
            tracing::error!("Upload to {}/{} failed: {}", bucket, path, message);
            return Err(Error::Storage(message));
        }
        Ok(path.to_string())
    }

    async fn remove(&self, bucket: &str, path: &str) -> Result<()> {
        let url = self.object_url(bucket, path);
        let resp = self
            .client
            .request(Method::DELETE, &url)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("remove request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::Storage(response_message(resp).await));
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.client.base_url, bucket, path
        )
    }
}
