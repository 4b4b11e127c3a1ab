//! In-memory port implementations shared by the core unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use workdesk_types::attachment::{Attachments, Upload};
use workdesk_types::error::{BlobError, RepositoryError, SessionStoreError};
use workdesk_types::estimate::{Estimate, EstimateFilter, EstimatePatch, NewEstimate};
use workdesk_types::message::{Message, MessageBody, NewMessage};
use workdesk_types::session::ChatSession;
use workdesk_types::work_order::{NewWorkOrder, WorkOrder, WorkOrderPatch, WorkOrderStatus};

use crate::repository::estimate::EstimateRepository;
use crate::repository::message::MessageRepository;
use crate::repository::resource::{
    AttachmentMode, PatchTx, RemovableResource, ResourceTx, TransactionalResource,
};
use crate::repository::work_order::WorkOrderRepository;
use crate::session::store::SessionStore;
use crate::storage::blob_store::BlobStore;

pub fn png(name: &str) -> Upload {
    Upload::new(name, "image/png", vec![0x89, 0x50, 0x4e, 0x47])
}

pub fn work_order_draft(owner_user_id: i64) -> NewWorkOrder {
    NewWorkOrder {
        owner_user_id,
        description: "Kitchen sink is leaking".to_string(),
        location: Some("Unit 4B".to_string()),
        scheduled_date: None,
    }
}

// ---------------------------------------------------------------------------
// Blobs
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryBlobs {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    puts: AtomicUsize,
    fail_pattern: Mutex<Option<String>>,
    fail_deletes: AtomicBool,
    put_delay: Mutex<Option<Duration>>,
}

impl MemoryBlobs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail every put whose key contains `pattern`.
    pub fn failing_on(pattern: &str) -> Arc<Self> {
        let blobs = Self::default();
        *blobs.fail_pattern.lock().unwrap() = Some(pattern.to_string());
        Arc::new(blobs)
    }

    pub fn set_put_delay(&self, delay: Duration) {
        *self.put_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

impl BlobStore for MemoryBlobs {
    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<String, BlobError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.put_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let fail = self
            .fail_pattern
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|p| key.contains(p));
        if fail {
            return Err(BlobError::Io(format!("injected failure for {key}")));
        }
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(key.to_string())
    }

    async fn signed_url(&self, reference: &str, ttl: Duration) -> Result<String, BlobError> {
        Ok(format!("https://blobs.test/{reference}?expires_in={}", ttl.as_secs()))
    }

    async fn delete(&self, reference: &str) -> Result<(), BlobError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BlobError::Io("injected delete failure".to_string()));
        }
        self.objects.lock().unwrap().remove(reference);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SessionTables {
    sessions: HashMap<String, (ChatSession, Instant)>,
    by_work_order: HashMap<i64, String>,
}

/// Single-lock session store driven by tokio's clock.
#[derive(Default)]
pub struct MemorySessions {
    tables: Mutex<SessionTables>,
}

impl MemorySessions {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl SessionTables {
    fn live(&self, session_id: &str) -> Option<&ChatSession> {
        self.sessions
            .get(session_id)
            .filter(|(_, expires)| *expires > Instant::now())
            .map(|(s, _)| s)
    }
}

impl SessionStore for MemorySessions {
    async fn create(&self, session: &ChatSession, ttl: Duration) -> Result<(), SessionStoreError> {
        let mut t = self.tables.lock().unwrap();
        if t.live(&session.session_id).is_some() {
            return Err(SessionStoreError::AlreadyExists);
        }
        if let Some(holder) = t.by_work_order.get(&session.work_order_id) {
            if t.live(holder).is_some() {
                return Err(SessionStoreError::WorkOrderInSession(session.work_order_id));
            }
        }
        t.sessions.insert(
            session.session_id.clone(),
            (session.clone(), Instant::now() + ttl),
        );
        t.by_work_order
            .insert(session.work_order_id, session.session_id.clone());
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<ChatSession, SessionStoreError> {
        let t = self.tables.lock().unwrap();
        t.live(session_id).cloned().ok_or(SessionStoreError::NotFound)
    }

    async fn refresh(&self, session_id: &str, ttl: Duration) -> Result<(), SessionStoreError> {
        let mut t = self.tables.lock().unwrap();
        match t.sessions.get_mut(session_id) {
            Some((_, expires)) if *expires > Instant::now() => {
                *expires = Instant::now() + ttl;
                Ok(())
            }
            _ => Err(SessionStoreError::NotFound),
        }
    }

    async fn delete(&self, session_id: &str) -> Result<(), SessionStoreError> {
        let mut t = self.tables.lock().unwrap();
        if let Some((session, _)) = t.sessions.remove(session_id) {
            if t.by_work_order.get(&session.work_order_id).map(String::as_str) == Some(session_id) {
                t.by_work_order.remove(&session.work_order_id);
            }
        }
        Ok(())
    }

    async fn release_work_order(&self, work_order_id: i64) -> Result<(), SessionStoreError> {
        let mut t = self.tables.lock().unwrap();
        if let Some(session_id) = t.by_work_order.remove(&work_order_id) {
            t.sessions.remove(&session_id);
        }
        Ok(())
    }

    async fn exists_for_work_order(&self, work_order_id: i64) -> Result<bool, SessionStoreError> {
        let t = self.tables.lock().unwrap();
        Ok(t
            .by_work_order
            .get(&work_order_id)
            .is_some_and(|sid| t.live(sid).is_some()))
    }

    async fn purge_expired(&self) -> Result<usize, SessionStoreError> {
        let mut t = self.tables.lock().unwrap();
        let now = Instant::now();
        let before = t.sessions.len();
        t.sessions.retain(|_, (_, expires)| *expires > now);
        let SessionTables {
            sessions,
            by_work_order,
        } = &mut *t;
        by_work_order.retain(|_, sid| sessions.contains_key(sid));
        Ok(before - sessions.len())
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// Row behaviour needed by the generic in-memory table.
pub trait FakeRow: Attachments + Clone + Send + Sync + 'static {
    type Draft: Send + 'static;
    type Patch: Send + 'static;
    const KIND: &'static str;
    const NOUN: &'static str;
    const MODE: AttachmentMode;

    fn from_draft(id: i64, draft: Self::Draft) -> Self;
    fn patch(&mut self, patch: Self::Patch);
    fn set_refs(&mut self, refs: &[String]);
}

/// A table whose transactions work on a private copy that replaces the
/// committed rows on commit.
pub struct FakeTable<T: FakeRow> {
    rows: Arc<Mutex<BTreeMap<i64, T>>>,
    next_id: Arc<AtomicI64>,
    fail_commit: Arc<AtomicBool>,
}

impl<T: FakeRow> FakeTable<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            rows: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: Arc::new(AtomicI64::new(1)),
            fail_commit: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn fail_commits(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn row(&self, id: i64) -> Option<T> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    /// Insert a committed row directly.
    pub fn seed(&self, draft: T::Draft) -> T {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let row = T::from_draft(id, draft);
        self.rows.lock().unwrap().insert(id, row.clone());
        row
    }

    fn snapshot(&self) -> Vec<T> {
        self.rows.lock().unwrap().values().cloned().collect()
    }
}

pub struct FakeTx<T: FakeRow> {
    rows: Arc<Mutex<BTreeMap<i64, T>>>,
    staged: BTreeMap<i64, T>,
    next_id: Arc<AtomicI64>,
    fail_commit: bool,
}

impl<T: FakeRow> ResourceTx for FakeTx<T> {
    type Entity = T;
    type Draft = T::Draft;

    async fn insert(&mut self, draft: T::Draft) -> Result<i64, RepositoryError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.staged.insert(id, T::from_draft(id, draft));
        Ok(id)
    }

    async fn fetch(&mut self, id: i64) -> Result<Option<T>, RepositoryError> {
        Ok(self.staged.get(&id).cloned())
    }

    async fn set_attachments(&mut self, id: i64, refs: &[String]) -> Result<(), RepositoryError> {
        let row = self.staged.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        row.set_refs(refs);
        Ok(())
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        if self.fail_commit {
            return Err(RepositoryError::Query("injected commit failure".to_string()));
        }
        *self.rows.lock().unwrap() = self.staged;
        Ok(())
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

impl<T: FakeRow> PatchTx for FakeTx<T> {
    type Patch = T::Patch;

    async fn apply(&mut self, id: i64, patch: T::Patch) -> Result<(), RepositoryError> {
        let row = self.staged.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        row.patch(patch);
        Ok(())
    }
}

impl<T: FakeRow> TransactionalResource for FakeTable<T> {
    type Tx = FakeTx<T>;
    const KIND: &'static str = T::KIND;
    const NOUN: &'static str = T::NOUN;
    const MODE: AttachmentMode = T::MODE;

    async fn begin(&self) -> Result<FakeTx<T>, RepositoryError> {
        Ok(FakeTx {
            rows: Arc::clone(&self.rows),
            staged: self.rows.lock().unwrap().clone(),
            next_id: Arc::clone(&self.next_id),
            fail_commit: self.fail_commit.load(Ordering::SeqCst),
        })
    }

    async fn find(&self, id: i64) -> Result<Option<T>, RepositoryError> {
        Ok(self.row(id))
    }
}

impl<T: FakeRow> RemovableResource for FakeTable<T> {
    async fn remove(&self, id: i64) -> Result<Vec<String>, RepositoryError> {
        let removed = self
            .rows
            .lock()
            .unwrap()
            .remove(&id)
            .ok_or(RepositoryError::NotFound)?;
        Ok(removed.attachment_refs())
    }
}

impl FakeRow for WorkOrder {
    type Draft = NewWorkOrder;
    type Patch = WorkOrderPatch;
    const KIND: &'static str = "work-orders";
    const NOUN: &'static str = "work order";
    const MODE: AttachmentMode = AttachmentMode::Append;

    fn from_draft(id: i64, draft: NewWorkOrder) -> Self {
        let now = Utc::now();
        WorkOrder {
            id,
            description: draft.description,
            location: draft.location,
            status: WorkOrderStatus::Draft,
            scheduled_date: draft.scheduled_date,
            owner_user_id: draft.owner_user_id,
            attachments: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn patch(&mut self, patch: WorkOrderPatch) {
        if let Some(d) = patch.description {
            self.description = d;
        }
        if let Some(l) = patch.location {
            self.location = Some(l);
        }
        if let Some(s) = patch.status {
            self.status = s;
        }
        if let Some(d) = patch.scheduled_date {
            self.scheduled_date = Some(d);
        }
        self.updated_at = Utc::now();
    }

    fn set_refs(&mut self, refs: &[String]) {
        self.attachments = refs.to_vec();
    }
}

impl FakeRow for Estimate {
    type Draft = NewEstimate;
    type Patch = EstimatePatch;
    const KIND: &'static str = "estimates";
    const NOUN: &'static str = "estimate";
    const MODE: AttachmentMode = AttachmentMode::ReplaceSingle;

    fn from_draft(id: i64, draft: NewEstimate) -> Self {
        let now = Utc::now();
        Estimate {
            id,
            work_order_id: draft.work_order_id,
            vendor_id: draft.vendor_id,
            cost: draft.cost,
            attachment: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn patch(&mut self, patch: EstimatePatch) {
        if let Some(v) = patch.vendor_id {
            self.vendor_id = v;
        }
        if let Some(c) = patch.cost {
            self.cost = c;
        }
        self.updated_at = Utc::now();
    }

    fn set_refs(&mut self, refs: &[String]) {
        self.attachment = refs.first().cloned();
    }
}

impl FakeRow for Message {
    type Draft = NewMessage;
    type Patch = ();
    const KIND: &'static str = "messages";
    const NOUN: &'static str = "message";
    const MODE: AttachmentMode = AttachmentMode::Append;

    fn from_draft(id: i64, draft: NewMessage) -> Self {
        Message {
            id,
            work_order_id: draft.work_order_id,
            user_id: draft.user_id,
            body: draft.body,
            metadata: draft.metadata,
            created_at: Utc::now(),
        }
    }

    fn patch(&mut self, _patch: ()) {}

    fn set_refs(&mut self, refs: &[String]) {
        self.body = MessageBody::Image {
            images: refs.to_vec(),
        };
    }
}

impl WorkOrderRepository for FakeTable<WorkOrder> {
    async fn get(&self, id: i64) -> Result<Option<WorkOrder>, RepositoryError> {
        Ok(self.row(id))
    }

    async fn list(&self, owner_user_id: Option<i64>) -> Result<Vec<WorkOrder>, RepositoryError> {
        let mut rows: Vec<WorkOrder> = self
            .snapshot()
            .into_iter()
            .filter(|w| owner_user_id.is_none_or(|o| w.owner_user_id == o))
            .collect();
        rows.reverse();
        Ok(rows)
    }
}

impl EstimateRepository for FakeTable<Estimate> {
    async fn get(&self, id: i64) -> Result<Option<Estimate>, RepositoryError> {
        Ok(self.row(id))
    }

    async fn list(&self, filter: &EstimateFilter) -> Result<Vec<Estimate>, RepositoryError> {
        let mut rows: Vec<Estimate> = self
            .snapshot()
            .into_iter()
            .filter(|e| filter.work_order_id.is_none_or(|w| e.work_order_id == w))
            .filter(|e| filter.vendor_id.is_none_or(|v| e.vendor_id == v))
            .collect();
        rows.reverse();
        if let Some(limit) = filter.limit {
            rows.truncate(limit.max(0) as usize);
        }
        Ok(rows)
    }
}

impl MessageRepository for FakeTable<Message> {
    async fn page(
        &self,
        work_order_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Message>, i64), RepositoryError> {
        let mut rows: Vec<Message> = self
            .snapshot()
            .into_iter()
            .filter(|m| m.work_order_id == work_order_id)
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = rows.len() as i64;
        let page = rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }
}
