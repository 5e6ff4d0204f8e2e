//! In-memory session store with admission control and idle expiry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::SessionConfig;
use crate::observability::metrics;
use crate::sessions::clock::Clock;
use crate::sessions::session::{PendingSession, Session, SessionId};
use crate::sessions::SessionError;

/// Why a session left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Terminated,
    Expired,
    Shutdown,
}

impl Removal {
    fn as_str(self) -> &'static str {
        match self {
            Removal::Terminated => "terminated",
            Removal::Expired => "expired",
            Removal::Shutdown => "shutdown",
        }
    }
}

/// Bounded map of live sessions.
///
/// The map lock is never held across an await or while releasing a
/// session's resources.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
    clock: Arc<dyn Clock>,
    max_sessions: usize,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize, idle_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            clock,
            max_sessions,
            idle_timeout,
        }
    }

    pub fn from_config(config: &SessionConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            config.max_sessions,
            Duration::from_secs(config.idle_timeout_secs),
            clock,
        )
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether a handshake could currently be admitted.
    pub fn has_capacity(&self) -> bool {
        self.len() < self.max_sessions
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.lock().get(id).cloned()
    }

    /// Ids of all live sessions.
    pub fn ids(&self) -> Vec<SessionId> {
        self.lock().keys().cloned().collect()
    }

    /// Admit a pending session, minting its id.
    ///
    /// Capacity check and insert happen in one critical section. A rejected
    /// session is released before returning.
    pub fn admit(&self, pending: PendingSession) -> Result<Arc<Session>, SessionError> {
        let mut sessions = self.lock();
        if sessions.len() >= self.max_sessions {
            drop(sessions);
            tracing::warn!(
                max_sessions = self.max_sessions,
                "Session capacity exceeded, rejecting handshake"
            );
            if let Err(e) = pending.release() {
                tracing::warn!(error = %e, "Failed to release rejected session");
            }
            return Err(SessionError::CapacityExceeded {
                max: self.max_sessions,
            });
        }

        let mut id = SessionId::generate();
        while sessions.contains_key(&id) {
            id = SessionId::generate();
        }
        let session = Arc::new(pending.activate(id.clone(), self.clock.now()));
        sessions.insert(id, session.clone());
        metrics::record_active_sessions(sessions.len());
        drop(sessions);

        tracing::info!(session_id = %session.id(), "Session admitted");
        Ok(session)
    }

    /// Record activity on a session. Unknown ids are ignored.
    pub fn touch(&self, id: &SessionId) -> bool {
        match self.get(id) {
            Some(session) => {
                session.touch(self.clock.now());
                true
            }
            None => false,
        }
    }

    /// Remove a session and release what it owns. Returns false for unknown ids.
    pub fn terminate(&self, id: &SessionId) -> bool {
        self.remove_if(id, Removal::Terminated, |_| true)
    }

    /// Evict every session idle for longer than the timeout.
    ///
    /// Works on a snapshot; sessions admitted, touched or removed while the
    /// sweep runs are re-checked before eviction.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let candidates: Vec<SessionId> = self
            .lock()
            .values()
            .filter(|session| session.idle_for(now) > self.idle_timeout)
            .map(|session| session.id().clone())
            .collect();

        let mut evicted = 0;
        for id in candidates {
            let expired = self.remove_if(&id, Removal::Expired, |session| {
                session.idle_for(now) > self.idle_timeout
            });
            if expired {
                evicted += 1;
            }
        }

        if evicted > 0 {
            tracing::info!(evicted, remaining = self.len(), "Session sweep evicted idle sessions");
        } else {
            tracing::trace!(remaining = self.len(), "Session sweep found nothing to evict");
        }
        evicted
    }

    /// Terminate every session, e.g. on shutdown.
    pub fn terminate_all(&self) -> usize {
        let drained: Vec<Arc<Session>> = {
            let mut sessions = self.lock();
            let drained = sessions.drain().map(|(_, session)| session).collect();
            metrics::record_active_sessions(0);
            drained
        };
        let count = drained.len();
        for session in drained {
            release(&session, Removal::Shutdown);
        }
        count
    }

    fn remove_if<F>(&self, id: &SessionId, reason: Removal, predicate: F) -> bool
    where
        F: FnOnce(&Session) -> bool,
    {
        let removed = {
            let mut sessions = self.lock();
            let matches = sessions.get(id).is_some_and(|session| predicate(session));
            let removed = if matches { sessions.remove(id) } else { None };
            metrics::record_active_sessions(sessions.len());
            removed
        };

        match removed {
            Some(session) => {
                release(&session, reason);
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, Arc<Session>>> {
        self.sessions.lock().expect("session registry mutex poisoned")
    }
}

fn release(session: &Session, reason: Removal) {
    metrics::record_session_removed(reason.as_str());
    match session.release() {
        Ok(()) => tracing::info!(session_id = %session.id(), reason = reason.as_str(), "Session closed"),
        Err(e) => tracing::warn!(
            session_id = %session.id(),
            reason = reason.as_str(),
            error = %e,
            "Session teardown failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::handler::testing::RecordingHandler;
    use crate::sessions::clock::ManualClock;
    use crate::sessions::session::SessionState;

    const TIMEOUT: Duration = Duration::from_secs(60);

    fn registry(max: usize) -> (SessionRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (SessionRegistry::new(max, TIMEOUT, clock.clone()), clock)
    }

    fn pending() -> PendingSession {
        PendingSession::new(Arc::new(RecordingHandler::default()))
    }

    #[test]
    fn admit_until_capacity_then_reject() {
        let (registry, _) = registry(2);
        let a = registry.admit(pending()).unwrap();
        let b = registry.admit(pending()).unwrap();
        assert_ne!(a.id(), b.id());

        let rejected_handler = Arc::new(RecordingHandler::default());
        let err = registry
            .admit(PendingSession::new(rejected_handler.clone()))
            .unwrap_err();
        assert_eq!(err, SessionError::CapacityExceeded { max: 2 });
        assert_eq!(rejected_handler.close_calls(), 1);

        assert_eq!(registry.len(), 2);
        assert!(registry.contains(a.id()));
        assert!(registry.contains(b.id()));
        assert_eq!(a.state(), SessionState::Active);
        assert!(!registry.has_capacity());
    }

    #[test]
    fn touch_updates_activity() {
        let (registry, clock) = registry(4);
        let session = registry.admit(pending()).unwrap();
        let before = session.last_activity_at();

        clock.advance(Duration::from_secs(5));
        assert!(registry.touch(session.id()));
        assert_eq!(session.last_activity_at(), before + Duration::from_secs(5));
        assert_eq!(session.created_at(), before);

        assert!(!registry.touch(&SessionId::from("missing")));
    }

    #[test]
    fn terminate_releases_once() {
        let (registry, _) = registry(4);
        let handler = Arc::new(RecordingHandler::default());
        let session = registry.admit(PendingSession::new(handler.clone())).unwrap();

        assert!(registry.terminate(session.id()));
        assert!(!registry.terminate(session.id()));
        assert!(registry.is_empty());
        assert_eq!(handler.close_calls(), 1);
        assert_eq!(session.state(), SessionState::Terminated);
    }

    #[test]
    fn teardown_failure_does_not_block_siblings() {
        let (registry, clock) = registry(4);
        let failing = Arc::new(RecordingHandler::failing_close());
        let healthy = Arc::new(RecordingHandler::default());
        registry.admit(PendingSession::new(failing.clone())).unwrap();
        registry.admit(PendingSession::new(healthy.clone())).unwrap();

        clock.advance(TIMEOUT + Duration::from_secs(1));
        assert_eq!(registry.sweep(), 2);
        assert!(registry.is_empty());
        assert_eq!(failing.close_calls(), 1);
        assert_eq!(healthy.close_calls(), 1);
    }

    #[test]
    fn sweep_evicts_only_idle_sessions() {
        let (registry, clock) = registry(4);
        let stale = registry.admit(pending()).unwrap();
        clock.advance(Duration::from_secs(40));
        let fresh = registry.admit(pending()).unwrap();
        clock.advance(Duration::from_secs(30));

        assert_eq!(registry.sweep(), 1);
        assert!(!registry.contains(stale.id()));
        assert!(registry.contains(fresh.id()));

        // Nothing elapsed: second sweep is a no-op.
        assert_eq!(registry.sweep(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn activity_postpones_expiry() {
        let (registry, clock) = registry(4);
        let session = registry.admit(pending()).unwrap();
        clock.advance(Duration::from_secs(50));
        registry.touch(session.id());
        clock.advance(Duration::from_secs(50));

        assert_eq!(registry.sweep(), 0);
        clock.advance(Duration::from_secs(11));
        assert_eq!(registry.sweep(), 1);
    }

    #[test]
    fn exactly_at_timeout_is_kept() {
        let (registry, clock) = registry(4);
        registry.admit(pending()).unwrap();
        clock.advance(TIMEOUT);
        assert_eq!(registry.sweep(), 0);
    }

    #[test]
    fn terminate_all_drains() {
        let (registry, _) = registry(4);
        registry.admit(pending()).unwrap();
        registry.admit(pending()).unwrap();
        assert_eq!(registry.terminate_all(), 2);
        assert!(registry.is_empty());
        assert!(registry.has_capacity());
    }

    #[test]
    fn concurrent_admission_respects_capacity() {
        let (registry, _) = registry(8);
        let registry = Arc::new(registry);
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.admit(pending()).is_ok())
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 8);
        assert_eq!(registry.len(), 8);
    }
}
