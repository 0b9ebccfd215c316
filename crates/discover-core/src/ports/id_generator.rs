//! IdGenerator port.

use rand::Rng;
use ulid::Ulid;

use crate::domain::{CorrelationId, SuggestionId};
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn generate_correlation_id(&self) -> CorrelationId;

    fn generate_suggestion_id(&self) -> SuggestionId;
}

/// ULID generator whose timestamp part comes from a [`Clock`].
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::thread_rng().r#gen())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_correlation_id(&self) -> CorrelationId {
        CorrelationId::from(self.next_ulid())
    }

    fn generate_suggestion_id(&self) -> SuggestionId {
        SuggestionId::from(self.next_ulid())
    }
}
