//! Incident records and their lifecycle
//!
//! An [`Incident`] is created once in [`IncidentStatus::Reported`] and then
//! mutated only through [`Incident::apply_status`] and
//! [`Incident::apply_assignment`], both of which consult the transition table.
//! Each committed mutation bumps the revision and appends a history entry.

use crate::ids::{CompanyRef, EmployeeId, IncidentId};
use crate::site::{SiteContext, SiteRef};
use crate::transition::{self, Guard};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ── Enumerations ─────────────────────────────────────────────────────

/// Kind of safety observation being reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentType {
    UnsafeAct,
    UnsafeCondition,
    NearMiss,
    Emergency,
}

impl IncidentType {
    pub const ALL: [IncidentType; 4] = [
        IncidentType::UnsafeAct,
        IncidentType::UnsafeCondition,
        IncidentType::NearMiss,
        IncidentType::Emergency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentType::UnsafeAct => "UNSAFE_ACT",
            IncidentType::UnsafeCondition => "UNSAFE_CONDITION",
            IncidentType::NearMiss => "NEAR_MISS",
            IncidentType::Emergency => "EMERGENCY",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == raw)
    }

    /// Priority multiplier in percent
    fn priority_weight(&self) -> u32 {
        match self {
            IncidentType::UnsafeAct | IncidentType::Emergency => 100,
            IncidentType::NearMiss => 110,
            IncidentType::UnsafeCondition => 120,
        }
    }
}

impl fmt::Display for IncidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How serious the reported condition is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == raw)
    }

    fn priority_base(&self) -> u32 {
        match self {
            Severity::Low => 2,
            Severity::Medium => 4,
            Severity::High => 6,
            Severity::Critical => 8,
        }
    }

    /// Time an open incident may age before it counts as overdue
    fn response_window(&self) -> Duration {
        match self {
            Severity::Low => Duration::days(30),
            Severity::Medium => Duration::days(7),
            Severity::High => Duration::days(3),
            Severity::Critical => Duration::days(1),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an incident
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    Reported,
    Assigned,
    InProgress,
    Resolved,
    Closed,
}

impl IncidentStatus {
    pub const ALL: [IncidentStatus; 5] = [
        IncidentStatus::Reported,
        IncidentStatus::Assigned,
        IncidentStatus::InProgress,
        IncidentStatus::Resolved,
        IncidentStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Reported => "REPORTED",
            IncidentStatus::Assigned => "ASSIGNED",
            IncidentStatus::InProgress => "IN_PROGRESS",
            IncidentStatus::Resolved => "RESOLVED",
            IncidentStatus::Closed => "CLOSED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == raw)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, IncidentStatus::Closed)
    }

    /// Still awaiting resolution
    pub fn is_open(&self) -> bool {
        !matches!(self, IncidentStatus::Resolved | IncidentStatus::Closed)
    }

    /// Statuses in which an assignee must be present
    pub fn requires_assignee(&self) -> bool {
        matches!(
            self,
            IncidentStatus::Assigned | IncidentStatus::InProgress | IncidentStatus::Resolved
        )
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel through which a report arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportChannel {
    /// Public landing page reached by scanning a site QR code
    PublicQr,
    /// Entered by authenticated staff
    Staff,
}

// ── Reporter Identity ────────────────────────────────────────────────

/// Who filed the report.
///
/// Anonymity is the variant itself; an anonymous report cannot carry a name
/// or contact number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReporterIdentity {
    Anonymous,
    Identified {
        name: String,
        contact_number: String,
    },
}

impl ReporterIdentity {
    pub fn identified(name: impl Into<String>, contact_number: impl Into<String>) -> Self {
        ReporterIdentity::Identified {
            name: name.into(),
            contact_number: contact_number.into(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, ReporterIdentity::Anonymous)
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            ReporterIdentity::Anonymous => None,
            ReporterIdentity::Identified { name, .. } => Some(name),
        }
    }

    pub fn contact_number(&self) -> Option<&str> {
        match self {
            ReporterIdentity::Anonymous => None,
            ReporterIdentity::Identified { contact_number, .. } => Some(contact_number),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name().unwrap_or("Anonymous")
    }
}

// ── Report Fields ────────────────────────────────────────────────────

/// Caller-supplied fields of a new report, excluding reporter identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentReport {
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub description: String,
    pub location: String,
}

// ── History ──────────────────────────────────────────────────────────

/// Kind of change recorded in an incident's history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Reported,
    StatusChanged,
    Assigned,
    Reassigned,
}

/// One entry of an incident's audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,
    pub action: HistoryAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<IncidentStatus>,
    pub to: IncidentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee: Option<EmployeeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// ── Transition Errors ────────────────────────────────────────────────

/// A requested change has no permitted edge, or its guard failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("transition {from} -> {to} is not permitted")]
    NotPermitted {
        from: IncidentStatus,
        to: IncidentStatus,
    },

    #[error("transition {from} -> {to} requires an assignee")]
    MissingAssignee {
        from: IncidentStatus,
        to: IncidentStatus,
    },
}

impl TransitionError {
    pub fn from_status(&self) -> IncidentStatus {
        match self {
            TransitionError::NotPermitted { from, .. }
            | TransitionError::MissingAssignee { from, .. } => *from,
        }
    }

    pub fn to_status(&self) -> IncidentStatus {
        match self {
            TransitionError::NotPermitted { to, .. }
            | TransitionError::MissingAssignee { to, .. } => *to,
        }
    }
}

// ── Incident ─────────────────────────────────────────────────────────

/// A safety incident report and its lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    /// Unique incident identifier
    pub id: IncidentId,
    /// Human-readable incident number
    pub incident_number: String,
    /// Site the report was filed against
    pub site: SiteRef,
    /// Company owning the site at creation time
    pub company: CompanyRef,
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub description: String,
    pub location: String,
    pub reporter: ReporterIdentity,
    pub channel: ReportChannel,
    /// Derived from severity and type
    pub priority_score: u32,
    status: IncidentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    assigned_to: Option<EmployeeId>,
    revision: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    assigned_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

impl Incident {
    /// Create a new incident in `Reported` against a resolved site.
    ///
    /// Field validation is the caller's job; this only stamps identity,
    /// numbering and timestamps.
    pub fn report(
        site: &SiteContext,
        report: IncidentReport,
        reporter: ReporterIdentity,
        channel: ReportChannel,
        now: DateTime<Utc>,
    ) -> Self {
        let id = IncidentId::generate();
        let incident_number = incident_number(&site.site.site_code, report.incident_type, &id, now);
        let priority_score = priority_score(report.severity, report.incident_type);

        Self {
            id,
            incident_number,
            site: site.site.clone(),
            company: site.company.clone(),
            incident_type: report.incident_type,
            severity: report.severity,
            description: report.description,
            location: report.location,
            reporter,
            channel,
            priority_score,
            status: IncidentStatus::Reported,
            assigned_to: None,
            revision: 1,
            created_at: now,
            updated_at: now,
            assigned_at: None,
            resolved_at: None,
            closed_at: None,
            history: vec![HistoryEntry {
                at: now,
                action: HistoryAction::Reported,
                from: None,
                to: IncidentStatus::Reported,
                employee: None,
                note: None,
            }],
        }
    }

    pub fn status(&self) -> IncidentStatus {
        self.status
    }

    pub fn assigned_to(&self) -> Option<&EmployeeId> {
        self.assigned_to.as_ref()
    }

    /// Optimistic concurrency revision; bumped by every committed mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn assigned_at(&self) -> Option<DateTime<Utc>> {
        self.assigned_at
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn is_anonymous(&self) -> bool {
        self.reporter.is_anonymous()
    }

    /// Apply an explicit status change.
    ///
    /// Leaves the incident untouched when the edge is missing or its guard
    /// fails.
    pub fn apply_status(
        &mut self,
        to: IncidentStatus,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        let from = self.status;
        let edge = transition::status_change(from, to)
            .ok_or(TransitionError::NotPermitted { from, to })?;

        if edge.guard == Guard::RequiresAssignee && self.assigned_to.is_none() {
            return Err(TransitionError::MissingAssignee { from, to });
        }

        self.status = to;
        match to {
            IncidentStatus::Resolved if self.resolved_at.is_none() => {
                self.resolved_at = Some(now);
            }
            IncidentStatus::Closed if self.closed_at.is_none() => {
                self.closed_at = Some(now);
            }
            _ => {}
        }
        self.commit(HistoryEntry {
            at: now,
            action: HistoryAction::StatusChanged,
            from: Some(from),
            to,
            employee: None,
            note,
        });
        Ok(())
    }

    /// Apply an assignment whose assignee already passed the assignment policy.
    ///
    /// Advances `Reported` to `Assigned`; other assignable statuses keep their
    /// status and only change the assignee.
    pub fn apply_assignment(
        &mut self,
        employee: EmployeeId,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        let from = self.status;
        let edge = transition::assignment(from).ok_or(TransitionError::NotPermitted {
            from,
            to: IncidentStatus::Assigned,
        })?;

        let action = if self.assigned_to.is_some() {
            HistoryAction::Reassigned
        } else {
            HistoryAction::Assigned
        };

        self.status = edge.to;
        self.assigned_to = Some(employee.clone());
        self.assigned_at = Some(now);
        self.commit(HistoryEntry {
            at: now,
            action,
            from: Some(from),
            to: edge.to,
            employee: Some(employee),
            note: None,
        });
        Ok(())
    }

    fn commit(&mut self, entry: HistoryEntry) {
        self.updated_at = entry.at;
        self.revision += 1;
        self.history.push(entry);
    }

    /// Whole days since the report was filed
    pub fn age_in_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }

    /// Whether an open incident has exceeded its response window.
    ///
    /// Emergencies are due within four hours regardless of severity.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        if !self.status.is_open() {
            return false;
        }
        let window = if self.incident_type == IncidentType::Emergency {
            Duration::hours(4)
        } else {
            self.severity.response_window()
        };
        now - self.created_at > window
    }
}

const EMERGENCY_PRIORITY: u32 = 10;

/// Priority score: severity base weighted by incident type. Emergencies
/// score the top of the scale whatever the reported severity.
pub fn priority_score(severity: Severity, incident_type: IncidentType) -> u32 {
    if incident_type == IncidentType::Emergency {
        return EMERGENCY_PRIORITY;
    }
    severity.priority_base() * incident_type.priority_weight() / 100
}

fn incident_number(
    site_code: &str,
    incident_type: IncidentType,
    id: &IncidentId,
    now: DateTime<Utc>,
) -> String {
    let type_prefix = &incident_type.as_str()[..2];
    let suffix = &id.as_uuid().simple().to_string()[..4];
    format!(
        "INC-{}-{}-{}-{}",
        site_code,
        type_prefix,
        now.format("%Y%m%d%H%M%S"),
        suffix.to_uppercase()
    )
}
