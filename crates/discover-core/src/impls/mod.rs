//! Implementations of the ports that live in-process.
//!
//! `FileQueue` is the production queue. The memory stores, the static
//! provider and the mailers back local runs and tests.

pub mod file_queue;
pub mod mailer;
pub mod memory_accounts;
pub mod memory_graph;
pub mod memory_lock;
pub mod memory_queue;
pub mod static_provider;

pub use self::file_queue::FileQueue;
pub use self::mailer::{LogMailer, MemoryMailer};
pub use self::memory_accounts::MemoryAccountStore;
pub use self::memory_graph::MemoryGraphStore;
pub use self::memory_lock::MemoryLockCache;
pub use self::memory_queue::MemoryQueue;
pub use self::static_provider::{ProviderCall, StaticProvider};
