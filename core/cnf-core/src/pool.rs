//! Pool of reusable query sessions.
//!
//! Creating a session is the expensive part of a lookup (locating the
//! package manager, first-run source initialization), so sessions are kept in
//! a bounded free-list and handed out one caller at a time.
//!
//! ## Lifecycle
//!
//! ```text
//! create (lazy) → in-use → release: buffer cleared → idle → in-use → ...
//! ```
//!
//! A session that hit an environment error while invoking is dropped on
//! release instead of being returned to the idle set.

use crate::backend::{QueryBackend, WingetCli};
use crate::cancel::CancelToken;
use crate::config::CnfConfig;
use crate::error::{CnfError, Result};
use crate::types::{PackageQuery, PackageRecord};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    InUse,
}

/// A reusable query-execution context with a buffer of pending queries.
pub struct Session {
    id: u64,
    backend: Arc<dyn QueryBackend>,
    commands: Vec<PackageQuery>,
    state: SessionState,
    broken: bool,
}

impl Session {
    fn new(id: u64, backend: Arc<dyn QueryBackend>) -> Self {
        Self {
            id,
            backend,
            commands: Vec::new(),
            state: SessionState::Idle,
            broken: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn pending(&self) -> &[PackageQuery] {
        &self.commands
    }

    pub fn add_query(&mut self, query: PackageQuery) -> &mut Self {
        self.commands.push(query);
        self
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Runs the buffered queries in order and concatenates their results.
    /// The buffer is left intact; callers clear it or the pool does on release.
    pub fn invoke(&mut self, cancel: &CancelToken) -> Result<Vec<PackageRecord>> {
        if self.commands.is_empty() {
            return Err(CnfError::EmptyCommandBuffer);
        }

        let mut records = Vec::new();
        for query in &self.commands {
            match self.backend.execute(query, cancel) {
                Ok(mut batch) => records.append(&mut batch),
                Err(err) => {
                    if matches!(err, CnfError::Spawn { .. } | CnfError::Io { .. }) {
                        self.broken = true;
                    }
                    return Err(err);
                }
            }
        }
        Ok(records)
    }

    fn is_reusable(&self) -> bool {
        self.state == SessionState::InUse && !self.broken
    }
}

/// Produces the backend a new session runs its queries through.
pub trait SessionFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn QueryBackend>>;
}

/// Locates the package-manager CLI each time a session is created.
pub struct WingetSessionFactory {
    config: CnfConfig,
}

impl WingetSessionFactory {
    pub fn new(config: CnfConfig) -> Self {
        Self { config }
    }
}

impl SessionFactory for WingetSessionFactory {
    fn create(&self) -> Result<Arc<dyn QueryBackend>> {
        let cli = WingetCli::locate(&self.config)
            .map_err(|err| CnfError::SessionCreate(err.to_string()))?;
        Ok(Arc::new(cli))
    }
}

/// Hands out one shared backend; used when the backend is already built.
pub struct FixedSessionFactory {
    backend: Arc<dyn QueryBackend>,
}

impl FixedSessionFactory {
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        Self { backend }
    }
}

impl SessionFactory for FixedSessionFactory {
    fn create(&self) -> Result<Arc<dyn QueryBackend>> {
        Ok(Arc::clone(&self.backend))
    }
}

pub struct SessionPool {
    factory: Box<dyn SessionFactory>,
    idle: Mutex<Vec<Session>>,
    max_idle: usize,
    next_id: AtomicU64,
}

impl SessionPool {
    pub fn new(factory: Box<dyn SessionFactory>, max_idle: usize) -> Self {
        Self {
            factory,
            idle: Mutex::new(Vec::new()),
            max_idle: max_idle.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates one session up front and parks it in the idle set so the
    /// first lookup does not pay for creation.
    pub fn prewarm(&self) -> Result<()> {
        let session = self.checkout()?;
        self.release(session);
        Ok(())
    }

    /// Checks out a session guarded for automatic release.
    pub fn acquire(&self) -> Result<PooledSession<'_>> {
        let session = self.checkout()?;
        Ok(PooledSession {
            pool: self,
            session: Some(session),
        })
    }

    /// Checks out an idle session, creating one when none is idle.
    pub fn checkout(&self) -> Result<Session> {
        let reused = self.lock_idle().pop();
        let mut session = match reused {
            Some(session) => session,
            None => {
                let backend = self.factory.create()?;
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(session = id, backend = backend.name(), "Created query session");
                Session::new(id, backend)
            }
        };
        session.state = SessionState::InUse;
        Ok(session)
    }

    /// Clears the session and returns it to the idle set.
    ///
    /// Returns false when the session is not reusable or the idle set is
    /// full; the session is dropped in that case.
    pub fn release(&self, mut session: Session) -> bool {
        session.clear();
        if !session.is_reusable() {
            tracing::debug!(session = session.id, "Dropping unusable query session");
            return false;
        }
        session.state = SessionState::Idle;

        let mut idle = self.lock_idle();
        if idle.len() >= self.max_idle {
            return false;
        }
        idle.push(session);
        true
    }

    pub fn idle_count(&self) -> usize {
        self.lock_idle().len()
    }

    /// Number of sessions created so far.
    pub fn created_count(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst) - 1
    }

    fn lock_idle(&self) -> MutexGuard<'_, Vec<Session>> {
        // A panic while holding the lock cannot leave the free-list invalid.
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Checked-out session; returns itself to the pool when dropped.
pub struct PooledSession<'a> {
    pool: &'a SessionPool,
    session: Option<Session>,
}

impl Deref for PooledSession<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        self.session.as_ref().expect("session present until drop")
    }
}

impl DerefMut for PooledSession<'_> {
    fn deref_mut(&mut self) -> &mut Session {
        self.session.as_mut().expect("session present until drop")
    }
}

impl Drop for PooledSession<'_> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool.release(session);
        }
    }
}
