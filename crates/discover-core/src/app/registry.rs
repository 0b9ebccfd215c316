//! StageRegistry - stage ごとの handler 登録

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::StageHandler;
use crate::domain::Stage;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Handler for stage '{0}' is already registered")]
    AlreadyRegistered(Stage),
}

/// Dispatch table `Stage -> handler`.
#[derive(Default, Clone)]
pub struct StageRegistry {
    handlers: HashMap<Stage, Arc<dyn StageHandler>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        stage: Stage,
        handler: Arc<dyn StageHandler>,
    ) -> Result<(), RegistryError> {
        if self.handlers.contains_key(&stage) {
            return Err(RegistryError::AlreadyRegistered(stage));
        }
        self.handlers.insert(stage, handler);
        Ok(())
    }

    pub fn get(&self, stage: Stage) -> Option<Arc<dyn StageHandler>> {
        self.handlers.get(&stage).cloned()
    }

    /// Registered stages in declaration order.
    pub fn registered_stages(&self) -> Vec<Stage> {
        let mut stages: Vec<Stage> = self.handlers.keys().copied().collect();
        stages.sort();
        stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::handler::HandlerContext;
    use crate::domain::{Outcome, Task};
    use crate::error::DiscoverError;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl StageHandler for Noop {
        async fn handle(&self, _: &Task, _: &HandlerContext) -> Result<Outcome, DiscoverError> {
            Ok(Outcome::completed())
        }
    }

    #[test]
    fn register_then_get() {
        let mut registry = StageRegistry::new();
        registry.register(Stage::Repository, Arc::new(Noop)).unwrap();
        registry.register(Stage::Onboarding, Arc::new(Noop)).unwrap();

        assert!(registry.get(Stage::Repository).is_some());
        assert!(registry.get(Stage::Followee).is_none());
        assert_eq!(
            registry.registered_stages(),
            vec![Stage::Onboarding, Stage::Repository]
        );
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = StageRegistry::new();
        registry.register(Stage::User, Arc::new(Noop)).unwrap();
        let err = registry.register(Stage::User, Arc::new(Noop));
        assert!(matches!(err, Err(RegistryError::AlreadyRegistered(Stage::User))));
    }
}
