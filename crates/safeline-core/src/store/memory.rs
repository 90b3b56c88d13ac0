//! In-memory incident store

use super::traits::IncidentStore;
use crate::error::{StorageError, StorageResult};
use crate::filter::IncidentScope;
use async_trait::async_trait;
use safeline_types::{Incident, IncidentId, IncidentStatus, SiteRef};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    incidents: HashMap<IncidentId, Incident>,
    /// Secondary index on (site, status)
    by_site_status: HashMap<(SiteRef, IncidentStatus), HashSet<IncidentId>>,
}

impl Tables {
    fn index(&mut self, incident: &Incident) {
        self.by_site_status
            .entry((incident.site.clone(), incident.status()))
            .or_default()
            .insert(incident.id.clone());
    }

    fn unindex(&mut self, incident: &Incident) {
        let key = (incident.site.clone(), incident.status());
        if let Some(ids) = self.by_site_status.get_mut(&key) {
            ids.remove(&incident.id);
            if ids.is_empty() {
                self.by_site_status.remove(&key);
            }
        }
    }

    fn candidates<'a>(&'a self, scope: &IncidentScope) -> Vec<&'a Incident> {
        match &scope.site {
            Some(site) => {
                let statuses: &[IncidentStatus] = if scope.statuses.is_empty() {
                    &IncidentStatus::ALL
                } else {
                    &scope.statuses
                };
                statuses
                    .iter()
                    .filter_map(|status| self.by_site_status.get(&(site.clone(), *status)))
                    .flatten()
                    .filter_map(|id| self.incidents.get(id))
                    .collect()
            }
            None => self.incidents.values().collect(),
        }
    }
}

/// In-memory incident store for development and testing
#[derive(Debug, Default)]
pub struct InMemoryIncidentStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryIncidentStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.incidents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl IncidentStore for InMemoryIncidentStore {
    async fn insert(&self, incident: &Incident) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        if tables.incidents.contains_key(&incident.id) {
            return Err(StorageError::Conflict(format!(
                "incident {} already exists",
                incident.id
            )));
        }
        tables.index(incident);
        tables.incidents.insert(incident.id.clone(), incident.clone());
        Ok(())
    }

    async fn get(&self, id: &IncidentId) -> StorageResult<Option<Incident>> {
        let tables = self.tables.read().await;
        Ok(tables.incidents.get(id).cloned())
    }

    async fn update(&self, incident: &Incident, expected_revision: u64) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        let current = tables
            .incidents
            .get(&incident.id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("incident {}", incident.id)))?;

        if current.revision() != expected_revision {
            return Err(StorageError::Conflict(format!(
                "incident {} is at revision {}, expected {}",
                incident.id,
                current.revision(),
                expected_revision
            )));
        }

        tables.unindex(&current);
        tables.index(incident);
        tables.incidents.insert(incident.id.clone(), incident.clone());
        Ok(())
    }

    async fn query(&self, scope: &IncidentScope) -> StorageResult<Vec<Incident>> {
        let tables = self.tables.read().await;
        let mut matched: Vec<Incident> = tables
            .candidates(scope)
            .into_iter()
            .filter(|i| scope.matches(i))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.incident_number.cmp(&a.incident_number))
        });
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use safeline_types::{
        CompanyRef, EmployeeId, IncidentReport, IncidentType, OperationalStatus, ReportChannel,
        ReporterIdentity, Severity, SiteContext,
    };

    fn incident(site_code: &str) -> Incident {
        let site = SiteContext {
            site: SiteRef::new("SPC001", site_code),
            company: CompanyRef::new("1"),
            site_name: "Solar Park".to_string(),
            company_name: "Sun Power".to_string(),
            is_active: true,
            operational_status: OperationalStatus::Operational,
            enabled_forms: None,
        };
        Incident::report(
            &site,
            IncidentReport {
                incident_type: IncidentType::UnsafeAct,
                severity: Severity::Medium,
                description: "no harness".to_string(),
                location: "Roof".to_string(),
            },
            ReporterIdentity::Anonymous,
            ReportChannel::Staff,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryIncidentStore::new();
        let incident = incident("SPL001");
        store.insert(&incident).await.unwrap();

        assert_eq!(store.get(&incident.id).await.unwrap(), Some(incident.clone()));
        assert!(matches!(
            store.insert(&incident).await,
            Err(StorageError::Conflict(_))
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_checks_revision() {
        let store = InMemoryIncidentStore::new();
        let mut incident = incident("SPL001");
        store.insert(&incident).await.unwrap();

        let read_revision = incident.revision();
        incident
            .apply_assignment(EmployeeId::new("E1"), Utc::now())
            .unwrap();
        store.update(&incident, read_revision).await.unwrap();

        // A second writer holding the stale revision loses
        assert!(matches!(
            store.update(&incident, read_revision).await,
            Err(StorageError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_update_unknown_is_not_found() {
        let store = InMemoryIncidentStore::new();
        let incident = incident("SPL001");
        assert!(matches!(
            store.update(&incident, 1).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_site_status_index_follows_updates() {
        let store = InMemoryIncidentStore::new();
        let mut a = incident("SPL001");
        let b = incident("SPL002");
        store.insert(&a).await.unwrap();
        store.insert(&b).await.unwrap();

        let rev = a.revision();
        a.apply_assignment(EmployeeId::new("E1"), Utc::now()).unwrap();
        store.update(&a, rev).await.unwrap();

        let reported_at_site = IncidentScope {
            site: Some(SiteRef::new("SPC001", "SPL001")),
            statuses: vec![IncidentStatus::Reported],
            ..Default::default()
        };
        assert!(store.query(&reported_at_site).await.unwrap().is_empty());

        let assigned_at_site = IncidentScope {
            site: Some(SiteRef::new("SPC001", "SPL001")),
            statuses: vec![IncidentStatus::Assigned],
            ..Default::default()
        };
        let found = store.query(&assigned_at_site).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, a.id);

        let everything = store.query(&IncidentScope::default()).await.unwrap();
        assert_eq!(everything.len(), 2);
    }
}
