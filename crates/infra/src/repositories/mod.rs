mod memory;

pub use memory::{
    InMemoryApplicationRepository, InMemoryEventRecordRepository, InMemoryFifoLockRepository,
    InMemoryGrantRepository, MemoryStore, RetryPolicy,
};
