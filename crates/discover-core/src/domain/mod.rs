//! Domain model: tasks and their stages, graph entities, suggestions.

pub mod account;
pub mod ids;
pub mod outcome;
pub mod repository;
pub mod suggestion;
pub mod task;
pub mod user;

pub use self::account::Account;
pub use self::ids::{CorrelationId, Id, IdMarker, SuggestionId};
pub use self::outcome::{Outcome, OutcomeKind};
pub use self::repository::{Repository, Stargazer, split_full_name};
pub use self::suggestion::{RenderedSuggestion, Suggestion, SuggestionItem, SuggestionKind};
pub use self::task::{Stage, Task};
pub use self::user::{StarredRepository, User};
