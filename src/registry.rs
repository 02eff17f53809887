use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{cursor::Connector, CancellationFlag, PollOutcome, QuerySession};

/// Identifies one logical query execution, e.g. a notebook paragraph.
pub type SessionId = String;

type FlagMap = Arc<Mutex<HashMap<SessionId, CancellationFlag>>>;

/// Live query sessions keyed by [`SessionId`].
///
/// A session is dropped from the registry as soon as it returns a final
/// outcome, so the next poll for the same id runs the statement afresh.
pub struct SessionRegistry<C: Connector + Clone> {
    connector: C,
    sessions: HashMap<SessionId, QuerySession<C>>,
    flags: FlagMap,
}

/// Cancels registry sessions from any thread.
#[derive(Clone, Debug)]
pub struct Canceller {
    flags: FlagMap,
}

impl Canceller {
    /// Requests cancellation of session `id`. Unknown ids are ignored.
    pub fn cancel(&self, id: &str) {
        if let Some(flag) = lock(&self.flags).get(id) {
            flag.cancel();
        }
    }
}

impl<C: Connector + Clone> SessionRegistry<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            sessions: HashMap::new(),
            flags: Arc::default(),
        }
    }

    pub fn canceller(&self) -> Canceller {
        Canceller {
            flags: self.flags.clone(),
        }
    }

    pub fn cancel(&self, id: &str) {
        self.canceller().cancel(id);
    }

    /// Number of sessions that have not reached a final outcome.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Polls session `id` with `sql`, creating the session on first use.
    pub async fn poll(&mut self, id: &str, sql: &str) -> PollOutcome {
        let connector = &self.connector;
        let flags = &self.flags;
        let session = self.sessions.entry(id.to_owned()).or_insert_with(|| {
            let session = QuerySession::new(connector.clone());
            lock(flags).insert(id.to_owned(), session.cancellation());
            session
        });

        let outcome = session.poll(sql).await;
        if outcome.is_final() {
            self.sessions.remove(id);
            lock(&self.flags).remove(id);
        }
        outcome
    }

    /// Aborts every live session, releasing its cursor.
    pub async fn close(&mut self) {
        for (_id, mut session) in self.sessions.drain() {
            session.abort().await;
        }
        lock(&self.flags).clear();
    }
}

fn lock(flags: &FlagMap) -> MutexGuard<'_, HashMap<SessionId, CancellationFlag>> {
    flags.lock().unwrap_or_else(PoisonError::into_inner)
}
