//! Ports - seams between the orchestration core and the outside world.
//!
//! Every external collaborator is a trait here; `impls` holds the local
//! implementations and the binary wires production ones.

pub mod account_store;
pub mod clock;
pub mod graph_store;
pub mod id_generator;
pub mod lock_cache;
pub mod mailer;
pub mod provider;
pub mod queue;

pub use self::account_store::AccountStore;
pub use self::clock::{Clock, FixedClock, ManualClock, SystemClock};
pub use self::graph_store::{GraphStore, StoreError, SuggestionPolicy};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::lock_cache::{DedupLocks, LockCache, LockError, LockKey, LockKind, LockOutcome};
pub use self::mailer::{Mailer, MailerError};
pub use self::provider::{Page, Provider, ProviderError};
pub use self::queue::{QueueError, TaskQueue};
