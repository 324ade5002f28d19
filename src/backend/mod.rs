//! Seams between the facades and the hosted service.
//!
//! The facades never touch HTTP directly; they speak to these three narrow
//! traits. `rest` binds them to the real service, `memory` provides
//! in-process fakes for tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Session, SignUpMetadata, User};

#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod rest;
mod session;

pub use session::{AuthEvent, AuthEvents, AuthSubscription, SessionHandle};

/// Hosted identity service operations.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<Session>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_out(&self) -> Result<()>;

    /// `Ok(None)` when no session exists; absence is not an error.
    async fn current_user(&self) -> Result<Option<User>>;

    async fn refresh_session(&self) -> Result<Session>;

    fn events(&self) -> &AuthEvents;
}

/// Row-level CRUD against the hosted database.
///
/// Authorization is the remote side's row policy; this layer only relays
/// the denial.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn select(&self, query: &Query) -> Result<Vec<Value>>;

    /// Like `select` but expects exactly one row; a miss is `NotFound`.
    async fn select_single(&self, query: &Query) -> Result<Value>;

    async fn insert(&self, table: &str, row: Value) -> Result<Value>;

    async fn update(&self, table: &str, id: Uuid, changes: Value) -> Result<Value>;

    /// Invoke a server-side function; used where the operation must run at
    /// a trusted boundary.
    async fn rpc(&self, function: &str, args: Value) -> Result<Value>;
}

/// Opaque blob storage for receipt images.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<String>;

    async fn remove(&self, bucket: &str, path: &str) -> Result<()>;

    /// Public, unsigned, non-expiring URL for an object.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// The three seams bundled for injection into the facades.
#[derive(Clone)]
pub struct Backend {
    pub auth: Arc<dyn Authenticator>,
    pub records: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStore>,
}

/// Read query against one table or view.
///
/// Built incrementally the way the admin claim list assembles its filters;
/// the select expression supports the embedded-resource syntax used by the
/// joined reads (`*, condo:condos(name, tier)`).
#[derive(Debug, Clone)]
pub struct Query {
    pub(crate) table: String,
    pub(crate) select: String,
    pub(crate) filters: Vec<Filter>,
    pub(crate) order: Option<Order>,
}

#[derive(Debug, Clone)]
pub(crate) enum Filter {
    Eq(String, String),
    Gte(String, String),
}

#[derive(Debug, Clone)]
pub(crate) struct Order {
    pub(crate) column: String,
    pub(crate) descending: bool,
}

impl Query {
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            table: name.into(),
            select: "*".to_string(),
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.select = columns.into();
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters
            .push(Filter::Eq(column.into(), value.to_string()));
        self
    }

    pub fn gte(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters
            .push(Filter::Gte(column.into(), value.to_string()));
        self
    }

    pub fn order(mut self, column: impl Into<String>, descending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            descending,
        });
        self
    }
}

/// Decode one remote row into a typed record.
pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::Persistence(format!("malformed row: {e}")))
}

/// Decode a result set into typed records.
pub(crate) fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter().map(decode).collect()
}
