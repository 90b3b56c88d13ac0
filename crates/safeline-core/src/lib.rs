//! Safeline core
//!
//! The incident lifecycle engine, the public site resolver, the assignment
//! policy and the dashboard aggregation view, over pluggable Directory and
//! IncidentStore backends.

pub mod aggregation;
pub mod deadline;
pub mod directory;
pub mod engine;
pub mod error;
pub mod filter;
pub mod locks;
pub mod policy;
pub mod resolver;
pub mod store;
pub mod validation;

pub use aggregation::{
    AggregationResult, AggregationView, CompanyCount, IncidentSummary, SiteCount, StatsFilter,
    TrendBucket, TrendPoint,
};
pub use deadline::Deadline;
pub use directory::{Directory, DirectorySeed, InMemoryDirectory, PostgresDirectory};
pub use engine::LifecycleEngine;
pub use error::{
    FieldError, LifecycleError, LifecycleResult, StorageError, StorageResult, ValidationErrors,
};
pub use filter::{IncidentFilter, IncidentScope, Page};
pub use policy::{AssigneeRejection, AssignmentPolicy};
pub use resolver::PublicResolver;
pub use store::{InMemoryIncidentStore, IncidentStore, PostgresIncidentStore};
