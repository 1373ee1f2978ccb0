//! In-memory session storage.

use concierge_core::Session;
use parking_lot::RwLock;

use crate::error::Result;
use crate::SessionStore;

/// A non-durable `SessionStore`, for tests and ephemeral clients.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: RwLock<Option<Session>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding a session.
    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self {
            session: RwLock::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn read(&self) -> Result<Option<Session>> {
        Ok(self
            .session
            .read()
            .clone()
            .filter(|session| !session.credential.is_empty()))
    }

    fn replace(&self, session: &Session) -> Result<()> {
        *self.session.write() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.session.write() = None;
        Ok(())
    }
}
