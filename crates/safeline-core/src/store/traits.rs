//! Incident store trait definitions

use crate::error::StorageResult;
use crate::filter::IncidentScope;
use async_trait::async_trait;
use safeline_types::{Incident, IncidentId};

/// Durable incident storage
///
/// Incidents are never deleted. Every mutation is committed through
/// [`IncidentStore::update`] with the revision the caller read, so a
/// concurrent writer surfaces as `StorageError::Conflict` instead of a lost
/// update.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Store a new incident; `Conflict` if the ID is taken
    async fn insert(&self, incident: &Incident) -> StorageResult<()>;

    /// Get an incident by ID
    async fn get(&self, id: &IncidentId) -> StorageResult<Option<Incident>>;

    /// Replace an incident if its stored revision still equals
    /// `expected_revision`
    async fn update(&self, incident: &Incident, expected_revision: u64) -> StorageResult<()>;

    /// Incidents matching the scope, newest first
    async fn query(&self, scope: &IncidentScope) -> StorageResult<Vec<Incident>>;
}
