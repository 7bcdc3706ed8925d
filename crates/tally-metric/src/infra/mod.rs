//! Collaborator implementations

pub mod memory;

pub use memory::{
    InMemoryBucketManager, InMemoryConfigRegistrar, InMemoryReportStore, InMemoryTaskScheduler,
    MemoryCollaborators, ScheduledTask, StaticProductLines,
};
