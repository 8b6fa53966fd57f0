//! Per-client planning sessions
//!
//! Each session owns its own copy of the sensor tree (selection state) and a
//! `PlanningSession` holding the drawn area. Sessions are keyed by uuid and
//! live until deleted or left idle longer than the store's TTL.

use footprint_planner::{FootprintEngine, PlannerConfig, PlanningSession};
use sensor_tree::TreeSelectionModel;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

pub type SharedEngine = Arc<dyn FootprintEngine>;

/// Mutable state of one client session
#[derive(Clone)]
pub struct ClientSession {
    pub tree: TreeSelectionModel,
    pub planning: PlanningSession<SharedEngine>,
}

impl ClientSession {
    pub fn new(tree: TreeSelectionModel, engine: SharedEngine, config: PlannerConfig) -> Self {
        Self {
            tree,
            planning: PlanningSession::new(engine, config),
        }
    }
}

pub type SessionHandle = Arc<RwLock<ClientSession>>;

struct SessionEntry {
    handle: SessionHandle,
    /// Milliseconds since the store's epoch
    last_seen: AtomicU64,
}

pub struct SessionStore {
    epoch: Instant,
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    pub async fn create(&self, session: ClientSession) -> Uuid {
        let id = Uuid::new_v4();
        let entry = SessionEntry {
            handle: Arc::new(RwLock::new(session)),
            last_seen: AtomicU64::new(self.now_ms()),
        };
        self.sessions.write().await.insert(id, entry);
        id
    }

    /// Look up a session and mark it as used
    pub async fn get(&self, id: &Uuid) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        let entry = sessions.get(id)?;
        entry.last_seen.store(self.now_ms(), Ordering::Relaxed);
        Some(entry.handle.clone())
    }

    pub async fn remove(&self, id: &Uuid) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions unused for longer than `ttl`, returning how many went
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let now = self.now_ms();
        let ttl_ms = ttl.as_millis() as u64;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| {
            now.saturating_sub(entry.last_seen.load(Ordering::Relaxed)) <= ttl_ms
        });
        before - sessions.len()
    }

    /// Evict idle sessions every `every` until the gateway stops
    pub fn start_sweeper(self: Arc<Self>, ttl: Duration, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let evicted = self.evict_idle(ttl).await;
                if evicted > 0 {
                    info!(
                        "Evicted {} idle session(s), {} remain",
                        evicted,
                        self.count().await
                    );
                }
            }
        })
    }
}
