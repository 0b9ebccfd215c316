//! discover-core
//!
//! Crawl orchestration for the discover service.
//!
//! # Modules
//! - **domain**: tasks, stages, graph entities, suggestions, outcomes, ids
//! - **ports**: seams to the outside world (TaskQueue, LockCache, GraphStore,
//!   AccountStore, Provider, Mailer, Clock, IdGenerator)
//! - **impls**: port implementations (durable FileQueue, MemoryLockCache,
//!   in-memory stores, StaticProvider, LogMailer)
//! - **app**: the pipeline engine plus the crawl orchestrator and the
//!   extraction engine built on top of it
//! - **config**: plain configuration structs with their defaults

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;

pub use self::error::DiscoverError;
