//! Safeline domain types
//!
//! Shared vocabulary for the incident lifecycle: identifiers, directory
//! records, incidents and the transition table that governs them.

pub mod ids;
pub mod incident;
pub mod site;
pub mod transition;

pub use ids::{CompanyRef, EmployeeId, IncidentId};
pub use incident::{
    priority_score, HistoryAction, HistoryEntry, Incident, IncidentReport, IncidentStatus,
    IncidentType, ReportChannel, ReporterIdentity, Severity, TransitionError,
};
pub use site::{Employee, OperationalStatus, SiteContext, SiteRef};
pub use transition::{Guard, Transition, Trigger, TRANSITIONS};
