use crate::DomainResult;

use super::BoxFuture;

/// Mutex per (actor, segregation_ref). `set_fifo_lock` is an atomic
/// try-acquire upsert: `false` means another worker already holds the key.
pub trait FifoLockRepository: Send + Sync {
    fn get_fifo_locks(&self, actor: &str) -> BoxFuture<'_, DomainResult<Vec<String>>>;

    fn set_fifo_lock(
        &self,
        actor: &str,
        segregation_ref: &str,
    ) -> BoxFuture<'_, DomainResult<bool>>;

    fn free_fifo_lock(
        &self,
        actor: &str,
        segregation_ref: &str,
    ) -> BoxFuture<'_, DomainResult<()>>;
}
