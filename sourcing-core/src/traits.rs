//! Core trait definitions

use crate::error::SourcingResult;
use crate::types::Session;

/// Durable client-side storage for the session tokens
///
/// Implementations hold at most one session. Writes are last-write-wins and
/// `clear` must be idempotent.
pub trait TokenStore: Send + Sync {
    /// Read the stored session, if any
    fn load(&self) -> SourcingResult<Option<Session>>;

    /// Overwrite the stored session unconditionally
    fn save(&self, session: &Session) -> SourcingResult<()>;

    /// Remove every stored token
    fn clear(&self) -> SourcingResult<()>;
}
