//! In-memory fakes of the backend seams.
//!
//! Rows are `serde_json` objects in per-table vectors, with just enough
//! filter/order/embed emulation for the facades, plus fault injection for
//! denial and failure paths. Available to integration tests through the
//! `test-support` feature.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::backend::{
    AuthEvent, AuthEvents, Authenticator, Backend, BlobStore, Filter, Query, RecordStore,
    SessionHandle,
};
use crate::error::{Error, Result};
use crate::models::{Condo, Session, SignUpMetadata, User, UserMetadata};

/// The three fakes bundled with their seeding and fault-injection handles.
pub struct MemoryBackend {
    pub auth: Arc<MemoryAuthenticator>,
    pub records: Arc<MemoryRecordStore>,
    pub blobs: Arc<MemoryBlobStore>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            auth: Arc::new(MemoryAuthenticator::new()),
            records: Arc::new(MemoryRecordStore::new()),
            blobs: Arc::new(MemoryBlobStore::new()),
        }
    }

    /// The trait-object bundle the gateway is constructed from.
    pub fn backend(&self) -> Backend {
        Backend {
            auth: Arc::clone(&self.auth) as Arc<dyn Authenticator>,
            records: Arc::clone(&self.records) as Arc<dyn RecordStore>,
            blobs: Arc::clone(&self.blobs) as Arc<dyn BlobStore>,
        }
    }

    pub fn seed_condo(&self, name: &str, tier: &str, rebate_rate: f64) -> Condo {
        let condo = Condo {
            id: Uuid::new_v4(),
            name: name.to_string(),
            tier: tier.to_string(),
            rebate_rate,
        };
        self.records.push_row(
            "condos",
            serde_json::to_value(&condo).expect("condo serializes"),
        );
        condo
    }

    /// Create an auth user plus the profile row linking them to a condo.
    pub fn seed_resident(
        &self,
        email: &str,
        password: &str,
        name: &str,
        vehicle: &str,
        condo: &Condo,
    ) -> User {
        let user = self.auth.register_user(email, password, name, vehicle);
        self.records.push_row(
            "profiles",
            json!({ "id": user.id, "condo_id": condo.id }),
        );
        user
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

struct MemoryUser {
    email: String,
    password: String,
    user: User,
}

pub struct MemoryAuthenticator {
    users: Mutex<Vec<MemoryUser>>,
    session: SessionHandle,
    events: AuthEvents,
}

impl MemoryAuthenticator {
    fn new() -> Self {
        Self {
            users: Mutex::new(Vec::new()),
            session: SessionHandle::default(),
            events: AuthEvents::new(),
        }
    }

    /// Seed an identity without signing it in.
    pub fn register_user(&self, email: &str, password: &str, name: &str, vehicle: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            user_metadata: UserMetadata {
                name: Some(name.to_string()),
                vehicle_number: Some(vehicle.to_string()),
            },
            created_at: Utc::now(),
        };
        self.users
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(MemoryUser {
                email: email.to_string(),
                password: password.to_string(),
                user: user.clone(),
            });
        user
    }

    /// Install a session directly, bypassing credentials and events.
    pub fn force_sign_in(&self, user: &User) {
        self.session.set(Some(session_for(user)));
    }

    /// Drop the session without emitting an event.
    pub fn force_sign_out(&self) {
        self.session.set(None);
    }
}

fn session_for(user: &User) -> Session {
    Session {
        access_token: format!("memory-token-{}", user.id),
        refresh_token: format!("memory-refresh-{}", user.id),
        expires_in: 3600,
        user: user.clone(),
    }
}

#[async_trait]
impl Authenticator for MemoryAuthenticator {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<Session> {
        if password.len() < 6 {
            return Err(Error::Auth(
                "Password should be at least 6 characters".to_string(),
            ));
        }
        {
            let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
            if users.iter().any(|u| u.email == email) {
                return Err(Error::Auth("User already registered".to_string()));
            }
        }

        let user = self.register_user(email, password, &metadata.name, &metadata.vehicle_number);
        let session = session_for(&user);
        self.session.set(Some(session.clone()));
        self.events.emit(AuthEvent::SignedIn, Some(&session));
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let user = {
            let users = self.users.lock().unwrap_or_else(|e| e.into_inner());
            users
                .iter()
                .find(|u| u.email == email && u.password == password)
                .map(|u| u.user.clone())
        };
        let user = user.ok_or_else(|| Error::Auth("Invalid login credentials".to_string()))?;

        let session = session_for(&user);
        self.session.set(Some(session.clone()));
        self.events.emit(AuthEvent::SignedIn, Some(&session));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<()> {
        if self.session.get().is_none() {
            return Ok(());
        }
        self.session.set(None);
        self.events.emit(AuthEvent::SignedOut, None);
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<User>> {
        Ok(self.session.get().map(|s| s.user))
    }

    async fn refresh_session(&self) -> Result<Session> {
        let current = self
            .session
            .get()
            .ok_or_else(|| Error::Auth("No session to refresh".to_string()))?;

        let mut session = session_for(&current.user);
        session.access_token = format!("{}-refreshed", current.access_token);
        self.session.set(Some(session.clone()));
        self.events.emit(AuthEvent::TokenRefreshed, Some(&session));
        Ok(session)
    }

    fn events(&self) -> &AuthEvents {
        &self.events
    }
}

pub struct MemoryRecordStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    denied_tables: Mutex<HashSet<String>>,
    failing_tables: Mutex<HashSet<String>>,
    rpc_denied: AtomicBool,
}

impl MemoryRecordStore {
    fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            denied_tables: Mutex::new(HashSet::new()),
            failing_tables: Mutex::new(HashSet::new()),
            rpc_denied: AtomicBool::new(false),
        }
    }

    /// Seed a row, filling in `id` and `created_at` like the remote side.
    pub fn push_row(&self, table: &str, row: Value) -> Value {
        let row = with_row_defaults(row);
        self.tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        row
    }

    /// Simulate a row policy denying writes on a table.
    pub fn deny_writes(&self, table: &str) {
        self.denied_tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(table.to_string());
    }

    /// Simulate a constraint violation on every write to a table.
    pub fn fail_writes(&self, table: &str) {
        self.failing_tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(table.to_string());
    }

    /// Simulate the remote function rejecting the caller.
    pub fn deny_rpc(&self) {
        self.rpc_denied.store(true, Ordering::SeqCst);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    fn check_write(&self, table: &str) -> Result<()> {
        if self
            .denied_tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(table)
        {
            return Err(Error::Auth(format!("permission denied for table {table}")));
        }
        if self
            .failing_tables
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(table)
        {
            return Err(Error::Persistence(format!(
                "constraint violation on {table}"
            )));
        }
        Ok(())
    }
}

fn with_row_defaults(mut row: Value) -> Value {
    if let Some(object) = row.as_object_mut() {
        if !object.contains_key("id") {
            object.insert("id".to_string(), json!(Uuid::new_v4()));
        }
        if !object.contains_key("created_at") {
            object.insert("created_at".to_string(), json!(Utc::now().to_rfc3339()));
        }
    }
    row
}

/// Stringified field value used for filter comparison and ordering.
fn field_text(row: &Value, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn matches_filters(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq(column, value) => field_text(row, column) == *value,
        Filter::Gte(column, value) => field_text(row, column).as_str() >= value.as_str(),
    })
}

fn compare_rows(a: &Value, b: &Value, column: &str) -> std::cmp::Ordering {
    let (ta, tb) = (field_text(a, column), field_text(b, column));
    match (ta.parse::<f64>(), tb.parse::<f64>()) {
        (Ok(na), Ok(nb)) => na.partial_cmp(&nb).unwrap_or(std::cmp::Ordering::Equal),
        _ => ta.cmp(&tb),
    }
}

/// Split a select expression on top-level commas, leaving embeds intact.
fn split_select(select: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in select.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Resolve `alias:table(cols)` embeds against the related table, joining on
/// the row's `{alias}_id` column.
fn apply_embeds(tables: &HashMap<String, Vec<Value>>, select: &str, row: &Value) -> Value {
    let mut out = row.clone();
    for part in split_select(select) {
        let Some((alias, rest)) = part.split_once(':') else {
            continue;
        };
        let Some((table, columns)) = rest.split_once('(') else {
            continue;
        };
        let alias = alias.trim();
        let columns = columns.trim_end_matches(')');
        let fk_column = format!("{alias}_id");

        let Some(fk) = row.get(&fk_column) else {
            continue;
        };
        let related = tables
            .get(table.trim())
            .and_then(|rows| rows.iter().find(|r| r.get("id") == Some(fk)));
        let Some(related) = related else { continue };

        let embedded = if columns.trim() == "*" {
            related.clone()
        } else {
            let mut object = Map::new();
            for column in columns.split(',') {
                let column = column.trim();
                if let Some(value) = related.get(column) {
                    object.insert(column.to_string(), value.clone());
                }
            }
            Value::Object(object)
        };

        if let Some(object) = out.as_object_mut() {
            object.insert(alias.to_string(), embedded);
        }
    }
    out
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let mut rows: Vec<Value> = tables
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_filters(row, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_rows(a, b, &order.column);
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        Ok(rows
            .iter()
            .map(|row| apply_embeds(&tables, &query.select, row))
            .collect())
    }

    async fn select_single(&self, query: &Query) -> Result<Value> {
        self.select(query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("no matching row in {}", query.table)))
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        self.check_write(table)?;
        Ok(self.push_row(table, row))
    }

    async fn update(&self, table: &str, id: Uuid, changes: Value) -> Result<Value> {
        self.check_write(table)?;

        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let rows = tables.entry(table.to_string()).or_default();
        let id_text = id.to_string();
        let row = rows
            .iter_mut()
            .find(|row| field_text(row, "id") == id_text)
            .ok_or_else(|| Error::NotFound(format!("no row {id} in {table}")))?;

        if let (Some(target), Some(patch)) = (row.as_object_mut(), changes.as_object()) {
            for (key, value) in patch {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(row.clone())
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value> {
        if self.rpc_denied.load(Ordering::SeqCst) {
            return Err(Error::Auth(format!(
                "permission denied for function {function}"
            )));
        }

        match function {
            "approve_registration" => {
                let id = args
                    .get("registration_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::Validation("registration_id is required".to_string()))?
                    .to_string();

                let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
                let rows = tables.entry("pending_registrations".to_string()).or_default();
                let row = rows
                    .iter_mut()
                    .find(|row| field_text(row, "id") == id)
                    .ok_or_else(|| Error::NotFound(format!("no registration {id}")))?;

                if let Some(object) = row.as_object_mut() {
                    object.insert("status".to_string(), json!("approved"));
                    object.insert("reviewed_at".to_string(), json!(Utc::now().to_rfc3339()));
                }
                Ok(row.clone())
            }
            other => Err(Error::Persistence(format!("unknown function {other}"))),
        }
    }
}

pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_uploads: AtomicBool,
    upload_attempts: AtomicUsize,
}

impl MemoryBlobStore {
    fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            fail_uploads: AtomicBool::new(false),
            upload_attempts: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent upload fail.
    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }

    /// Uploads attempted, including rejected ones.
    pub fn upload_attempts(&self) -> usize {
        self.upload_attempts.load(Ordering::SeqCst)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn contains(&self, bucket: &str, path: &str) -> bool {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&format!("{bucket}/{path}"))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        _content_type: &str,
        data: Vec<u8>,
    ) -> Result<String> {
        self.upload_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(Error::Storage("upload rejected".to_string()));
        }
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(format!("{bucket}/{path}"), data);
        Ok(path.to_string())
    }

    async fn remove(&self, bucket: &str, path: &str) -> Result<()> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&format!("{bucket}/{path}"))
            .map(|_| ())
            .ok_or_else(|| Error::Storage(format!("object not found: {bucket}/{path}")))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("memory://{bucket}/{path}")
    }
}
