// Validation pipeline - queue, dedup, workers, resolver, prober

pub mod dedup;
pub mod job;
pub mod prober;
pub mod queue;
pub mod resolver;
pub mod validate;
pub mod worker;

pub use dedup::Deduplicator;
pub use job::{normalize_name, JobStage, PipelineJob};
pub use prober::Prober;
pub use queue::{IngestQueue, IngestReceiver, OverflowPolicy};
pub use resolver::{is_private_ip, is_private_str, ResolveOutcome, Resolver};
pub use validate::{Validator, Verdict};
pub use worker::WorkerPool;
