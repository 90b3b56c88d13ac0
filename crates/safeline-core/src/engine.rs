//! Incident lifecycle engine
//!
//! Owns incident creation, status changes and assignment. Every mutation runs
//! under the incident's lock, re-reads the stored incident, applies one edge
//! of the transition table and commits with the revision it read.

use crate::deadline::Deadline;
use crate::directory::Directory;
use crate::error::{LifecycleError, LifecycleResult, ValidationErrors};
use crate::filter::{IncidentFilter, Page};
use crate::locks::IncidentLocks;
use crate::policy::AssignmentPolicy;
use crate::resolver::PublicResolver;
use crate::store::IncidentStore;
use crate::validation;
use chrono::Utc;
use safeline_types::{
    Employee, EmployeeId, Incident, IncidentId, IncidentReport, IncidentStatus, ReportChannel,
    ReporterIdentity, SiteContext, SiteRef, TransitionError,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const SITE_UNAVAILABLE: &str = "site not found or inactive";

pub struct LifecycleEngine {
    directory: Arc<dyn Directory>,
    store: Arc<dyn IncidentStore>,
    resolver: PublicResolver,
    policy: AssignmentPolicy,
    locks: IncidentLocks,
    deadline: Deadline,
}

impl LifecycleEngine {
    pub fn new(
        directory: Arc<dyn Directory>,
        store: Arc<dyn IncidentStore>,
        deadline: Deadline,
    ) -> Self {
        Self {
            resolver: PublicResolver::new(directory.clone(), deadline),
            directory,
            store,
            policy: AssignmentPolicy::new(),
            locks: IncidentLocks::new(),
            deadline,
        }
    }

    pub fn resolver(&self) -> &PublicResolver {
        &self.resolver
    }

    pub fn store(&self) -> &Arc<dyn IncidentStore> {
        &self.store
    }

    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    // ── Submission ───────────────────────────────────────────────────

    /// Staff submission against an active site
    pub async fn submit(
        &self,
        site: &SiteRef,
        report: IncidentReport,
        reporter: ReporterIdentity,
    ) -> LifecycleResult<Incident> {
        self.submit_via(site, report, reporter, ReportChannel::Staff)
            .await
    }

    /// Unauthenticated submission from a scanned site code
    pub async fn submit_public(
        &self,
        site: &SiteRef,
        report: IncidentReport,
        reporter: ReporterIdentity,
    ) -> LifecycleResult<Incident> {
        self.submit_via(site, report, reporter, ReportChannel::PublicQr)
            .await
    }

    /// Anonymous submission over `channel`; no reporter fields are accepted
    pub async fn submit_anonymous(
        &self,
        site: &SiteRef,
        report: IncidentReport,
        channel: ReportChannel,
    ) -> LifecycleResult<Incident> {
        self.submit_via(site, report, ReporterIdentity::Anonymous, channel)
            .await
    }

    #[instrument(skip_all, fields(site = %site, channel = ?channel))]
    async fn submit_via(
        &self,
        site: &SiteRef,
        report: IncidentReport,
        reporter: ReporterIdentity,
        channel: ReportChannel,
    ) -> LifecycleResult<Incident> {
        let mut errors = validation::validate_report(&report, &reporter);

        let ctx = self.site_for_submission(site, &mut errors).await?;
        if let Some(ctx) = &ctx {
            if !ctx.accepts(report.incident_type) {
                errors.push(
                    "incident_type",
                    format!("{} reports are not enabled for this site", report.incident_type),
                );
            }
        }

        if let Err(errors) = errors.into_result() {
            debug!(errors = %errors, "Submission rejected");
            return Err(LifecycleError::Validation(errors));
        }
        let ctx = ctx.ok_or(LifecycleError::SiteUnavailable)?;

        let (report, reporter) = validation::normalize(report, reporter);
        let incident = Incident::report(&ctx, report, reporter, channel, Utc::now());

        self.deadline
            .run("insert_incident", self.store.insert(&incident))
            .await?;

        info!(
            incident_id = %incident.id,
            incident_number = %incident.incident_number,
            incident_type = %incident.incident_type,
            severity = %incident.severity,
            anonymous = incident.is_anonymous(),
            "Incident reported"
        );
        Ok(incident)
    }

    /// Resolve the site, recording an opaque `site` field error when it is
    /// missing or inactive. Faults propagate.
    async fn site_for_submission(
        &self,
        site: &SiteRef,
        errors: &mut ValidationErrors,
    ) -> LifecycleResult<Option<SiteContext>> {
        match self.resolver.resolve(site).await {
            Ok(ctx) => Ok(Some(ctx)),
            Err(LifecycleError::NotFound(_)) | Err(LifecycleError::Inactive(_)) => {
                errors.push("site", SITE_UNAVAILABLE);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Apply an explicit status change
    #[instrument(skip_all, fields(incident_id = %id, to = %to))]
    pub async fn set_status(
        &self,
        id: &IncidentId,
        to: IncidentStatus,
        note: Option<String>,
    ) -> LifecycleResult<Incident> {
        let _lock = self.locks.acquire(id).await;

        let mut incident = self.load(id).await?;
        let read_revision = incident.revision();
        let from = incident.status();
        let note = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

        incident
            .apply_status(to, note, Utc::now())
            .map_err(|err| self.rejected(id, err))?;

        self.commit(&incident, read_revision).await?;

        info!(incident_id = %id, from = %from, to = %to, "Incident status changed");
        Ok(incident)
    }

    /// Assign or reassign an incident
    #[instrument(skip_all, fields(incident_id = %id, employee = %employee_id))]
    pub async fn assign(
        &self,
        id: &IncidentId,
        employee_id: &EmployeeId,
    ) -> LifecycleResult<Incident> {
        let _lock = self.locks.acquire(id).await;

        let mut incident = self.load(id).await?;
        let read_revision = incident.revision();
        let from = incident.status();

        let employee = self
            .deadline
            .read("get_employee", || self.directory.get_employee(employee_id))
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("employee {}", employee_id)))?;

        // Eligibility before the state guard
        if let Err(reason) = self.policy.check(&incident.company, &employee) {
            warn!(
                incident_id = %id,
                employee = %employee_id,
                reason = %reason,
                "Assignment rejected"
            );
            return Err(LifecycleError::InvalidAssignee {
                employee: employee_id.clone(),
                reason,
            });
        }

        let previous = incident.assigned_to().cloned();
        incident
            .apply_assignment(employee.id.clone(), Utc::now())
            .map_err(|err| self.rejected(id, err))?;

        self.commit(&incident, read_revision).await?;

        info!(
            incident_id = %id,
            from = %from,
            to = %incident.status(),
            employee = %employee.id,
            previous = ?previous.as_ref().map(EmployeeId::as_str),
            "Incident assigned"
        );
        Ok(incident)
    }

    fn rejected(&self, id: &IncidentId, err: TransitionError) -> LifecycleError {
        debug!(incident_id = %id, error = %err, "Transition rejected");
        LifecycleError::InvalidTransition {
            from: err.from_status(),
            to: err.to_status(),
        }
    }

    async fn commit(&self, incident: &Incident, read_revision: u64) -> LifecycleResult<()> {
        self.deadline
            .run("update_incident", self.store.update(incident, read_revision))
            .await
            .inspect_err(|err| {
                if let LifecycleError::Conflict(_) = err {
                    warn!(incident_id = %incident.id, "Concurrent modification detected");
                }
            })
    }

    async fn load(&self, id: &IncidentId) -> LifecycleResult<Incident> {
        self.deadline
            .read("get_incident", || self.store.get(id))
            .await?
            .ok_or_else(|| LifecycleError::NotFound(format!("incident {}", id)))
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub async fn get(&self, id: &IncidentId) -> LifecycleResult<Incident> {
        self.load(id).await
    }

    /// Filtered, newest-first listing
    pub async fn list(&self, filter: &IncidentFilter) -> LifecycleResult<Page<Incident>> {
        let scoped = self
            .deadline
            .read("query_incidents", || self.store.query(&filter.scope))
            .await?;

        let now = Utc::now();
        let matched: Vec<Incident> = scoped
            .into_iter()
            .filter(|i| filter.matches_residual(i, now))
            .collect();

        Ok(Page::slice(matched, filter.limit(), filter.offset))
    }

    /// Employees who may currently be assigned the incident
    pub async fn eligible_assignees(&self, id: &IncidentId) -> LifecycleResult<Vec<Employee>> {
        let incident = self.load(id).await?;
        let employees = self
            .deadline
            .read("list_employees", || {
                self.directory.list_employees(&incident.company)
            })
            .await?;
        Ok(self.policy.eligible(&incident.company, employees))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::store::InMemoryIncidentStore;
    use safeline_types::{CompanyRef, IncidentType, OperationalStatus, Severity};

    async fn engine() -> (LifecycleEngine, Arc<InMemoryDirectory>) {
        let directory = Arc::new(InMemoryDirectory::new());
        directory
            .upsert_site(SiteContext {
                site: SiteRef::new("SPC001", "SPL001"),
                company: CompanyRef::new("1"),
                site_name: "Solar Park".to_string(),
                company_name: "Sun Power".to_string(),
                is_active: true,
                operational_status: OperationalStatus::Operational,
                enabled_forms: Some(vec![IncidentType::NearMiss, IncidentType::UnsafeAct]),
            })
            .await;
        directory
            .upsert_employee(Employee {
                id: EmployeeId::new("E1"),
                name: "Asha".to_string(),
                companies: vec![CompanyRef::new("1")],
                is_active: true,
                designation: None,
            })
            .await;

        let engine = LifecycleEngine::new(
            directory.clone(),
            Arc::new(InMemoryIncidentStore::new()),
            Deadline::default(),
        );
        (engine, directory)
    }

    fn report(incident_type: IncidentType) -> IncidentReport {
        IncidentReport {
            incident_type,
            severity: Severity::Low,
            description: "oil spill".to_string(),
            location: "Bay 3".to_string(),
        }
    }

    #[tokio::test]
    async fn test_disabled_form_is_rejected() {
        let (engine, _) = engine().await;
        let err = engine
            .submit_anonymous(
                &SiteRef::new("SPC001", "SPL001"),
                report(IncidentType::Emergency),
                ReportChannel::PublicQr,
            )
            .await
            .unwrap_err();
        match err {
            LifecycleError::Validation(errors) => assert!(errors.has("incident_type")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_site_and_field_errors_reported_together() {
        let (engine, _) = engine().await;
        let mut bad = report(IncidentType::NearMiss);
        bad.description = " ".to_string();

        let err = engine
            .submit(&SiteRef::new("SPC001", "MISSING"), bad, ReporterIdentity::Anonymous)
            .await
            .unwrap_err();
        match err {
            LifecycleError::Validation(errors) => {
                assert!(errors.has("site"));
                assert!(errors.has("description"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_channels() {
        let (engine, _) = engine().await;
        let site = SiteRef::new("SPC001", "SPL001");
        let staff = engine
            .submit(
                &site,
                report(IncidentType::UnsafeAct),
                ReporterIdentity::identified("Asha", "123"),
            )
            .await
            .unwrap();
        assert_eq!(staff.channel, ReportChannel::Staff);

        let public = engine
            .submit_public(&site, report(IncidentType::NearMiss), ReporterIdentity::Anonymous)
            .await
            .unwrap();
        assert_eq!(public.channel, ReportChannel::PublicQr);
    }

    #[tokio::test]
    async fn test_unknown_employee_is_not_found() {
        let (engine, _) = engine().await;
        let incident = engine
            .submit_anonymous(
                &SiteRef::new("SPC001", "SPL001"),
                report(IncidentType::NearMiss),
                ReportChannel::PublicQr,
            )
            .await
            .unwrap();
        let err = engine
            .assign(&incident.id, &EmployeeId::new("GHOST"))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_ineligible_reported_before_state_guard() {
        let (engine, directory) = engine().await;
        let incident = engine
            .submit_anonymous(
                &SiteRef::new("SPC001", "SPL001"),
                report(IncidentType::NearMiss),
                ReportChannel::PublicQr,
            )
            .await
            .unwrap();
        engine
            .set_status(&incident.id, IncidentStatus::Closed, None)
            .await
            .unwrap();

        directory.set_employee_active(&EmployeeId::new("E1"), false).await;
        let err = engine
            .assign(&incident.id, &EmployeeId::new("E1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::InvalidAssignee {
                reason: crate::policy::AssigneeRejection::Inactive,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_note_recorded_in_history() {
        let (engine, _) = engine().await;
        let incident = engine
            .submit_anonymous(
                &SiteRef::new("SPC001", "SPL001"),
                report(IncidentType::NearMiss),
                ReportChannel::PublicQr,
            )
            .await
            .unwrap();
        let closed = engine
            .set_status(
                &incident.id,
                IncidentStatus::Closed,
                Some(" duplicate of INC-1 ".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(
            closed.history().last().unwrap().note.as_deref(),
            Some("duplicate of INC-1")
        );
    }

    #[tokio::test]
    async fn test_eligible_assignees() {
        let (engine, directory) = engine().await;
        directory
            .upsert_employee(Employee {
                id: EmployeeId::new("X1"),
                name: "Other".to_string(),
                companies: vec![CompanyRef::new("2")],
                is_active: true,
                designation: None,
            })
            .await;
        let incident = engine
            .submit_anonymous(
                &SiteRef::new("SPC001", "SPL001"),
                report(IncidentType::NearMiss),
                ReportChannel::PublicQr,
            )
            .await
            .unwrap();

        let eligible = engine.eligible_assignees(&incident.id).await.unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, EmployeeId::new("E1"));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (engine, _) = engine().await;
        let site = SiteRef::new("SPC001", "SPL001");
        engine
            .submit_anonymous(&site, report(IncidentType::NearMiss), ReportChannel::PublicQr)
            .await
            .unwrap();
        let named = engine
            .submit(
                &site,
                report(IncidentType::UnsafeAct),
                ReporterIdentity::identified("Ravi Kumar", "555"),
            )
            .await
            .unwrap();

        let filter = IncidentFilter {
            anonymous: Some(false),
            ..Default::default()
        };
        let page = engine.list(&filter).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, named.id);

        let filter = IncidentFilter {
            search: Some("ravi".to_string()),
            ..Default::default()
        };
        assert_eq!(engine.list(&filter).await.unwrap().total, 1);

        let filter = IncidentFilter {
            limit: Some(1),
            ..Default::default()
        };
        let page = engine.list(&filter).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
    }
}
