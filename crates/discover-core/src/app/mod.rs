//! Application layer: the pipeline engine and the two pipelines built on it.

pub mod crawl;
pub mod extraction;
pub mod handler;
pub mod periodic;
pub mod pipeline;
pub mod queues;
pub mod registry;
pub mod status;

pub use self::crawl::{CrawlDeps, CrawlOrchestrator};
pub use self::extraction::{ExtractionDeps, ExtractionEngine};
pub use self::handler::{HandlerContext, StageHandler};
pub use self::periodic::{PeriodicJob, Schedule};
pub use self::pipeline::{BuildError, Pipeline, PipelineBuilder, ShutdownHandle};
pub use self::queues::QueueSet;
pub use self::registry::{RegistryError, StageRegistry};
pub use self::status::{PipelineStats, QueueDepth};
