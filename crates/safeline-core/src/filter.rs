//! Incident listing filters and pagination

use chrono::{DateTime, Utc};
use safeline_types::{CompanyRef, Incident, IncidentStatus, IncidentType, Severity, SiteRef};
use serde::Serialize;

pub const DEFAULT_PAGE_LIMIT: usize = 50;
pub const MAX_PAGE_LIMIT: usize = 500;

/// Predicates a store can evaluate natively (indexed columns)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentScope {
    pub site: Option<SiteRef>,
    pub company: Option<CompanyRef>,
    pub statuses: Vec<IncidentStatus>,
    pub types: Vec<IncidentType>,
    pub severities: Vec<Severity>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl IncidentScope {
    pub fn matches(&self, incident: &Incident) -> bool {
        if let Some(site) = &self.site {
            if &incident.site != site {
                return false;
            }
        }
        if let Some(company) = &self.company {
            if &incident.company != company {
                return false;
            }
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&incident.status()) {
            return false;
        }
        if !self.types.is_empty() && !self.types.contains(&incident.incident_type) {
            return false;
        }
        if !self.severities.is_empty() && !self.severities.contains(&incident.severity) {
            return false;
        }
        if let Some(from) = self.created_from {
            if incident.created_at() < from {
                return false;
            }
        }
        if let Some(to) = self.created_to {
            if incident.created_at() > to {
                return false;
            }
        }
        true
    }
}

/// Full listing filter
#[derive(Debug, Clone, Default)]
pub struct IncidentFilter {
    pub scope: IncidentScope,
    pub anonymous: Option<bool>,
    pub assigned: Option<bool>,
    pub overdue: Option<bool>,
    /// Lowest priority score to include
    pub min_priority: Option<u32>,
    /// Case-insensitive substring of the assignee's employee id
    pub assigned_to: Option<String>,
    /// Case-insensitive substring over description, location, number and
    /// reporter name
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl IncidentFilter {
    /// Effective page size
    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    /// Predicates the store did not evaluate
    pub fn matches_residual(&self, incident: &Incident, now: DateTime<Utc>) -> bool {
        if let Some(anonymous) = self.anonymous {
            if incident.is_anonymous() != anonymous {
                return false;
            }
        }
        if let Some(assigned) = self.assigned {
            if incident.assigned_to().is_some() != assigned {
                return false;
            }
        }
        if let Some(overdue) = self.overdue {
            if incident.is_overdue(now) != overdue {
                return false;
            }
        }
        if let Some(min) = self.min_priority {
            if incident.priority_score < min {
                return false;
            }
        }
        if let Some(needle) = self.assigned_to.as_deref().map(str::trim) {
            if !needle.is_empty() {
                let needle = needle.to_lowercase();
                let hit = incident
                    .assigned_to()
                    .is_some_and(|e| e.as_str().to_lowercase().contains(&needle));
                if !hit {
                    return false;
                }
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                [
                    incident.description.as_str(),
                    incident.location.as_str(),
                    incident.incident_number.as_str(),
                    incident.reporter.name().unwrap_or_default(),
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&term))
            }
            _ => true,
        }
    }

    pub fn matches(&self, incident: &Incident, now: DateTime<Utc>) -> bool {
        self.scope.matches(incident) && self.matches_residual(incident, now)
    }
}

/// One page of a listing
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matches before pagination
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

impl<T> Page<T> {
    /// Slice an already filtered and ordered list
    pub fn slice(all: Vec<T>, limit: usize, offset: usize) -> Self {
        let total = all.len();
        let items = all.into_iter().skip(offset).take(limit).collect();
        Self {
            items,
            total,
            limit,
            offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safeline_types::{
        EmployeeId, IncidentReport, OperationalStatus, ReportChannel, ReporterIdentity,
        SiteContext,
    };

    fn incident(incident_type: IncidentType, severity: Severity) -> Incident {
        let site = SiteContext {
            site: SiteRef::new("SPC001", "SPL001"),
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
                incident_type,
                severity,
                description: "loose cable".to_string(),
                location: "Inverter 2".to_string(),
            },
            ReporterIdentity::Anonymous,
            ReportChannel::Staff,
            Utc::now(),
        )
    }

    #[test]
    fn test_min_priority() {
        let now = Utc::now();
        let low = incident(IncidentType::UnsafeAct, Severity::Low);
        let high = incident(IncidentType::UnsafeCondition, Severity::High);
        let filter = IncidentFilter {
            min_priority: Some(6),
            ..Default::default()
        };
        assert!(!filter.matches_residual(&low, now));
        assert!(filter.matches_residual(&high, now));
    }

    #[test]
    fn test_assigned_to_substring() {
        let now = Utc::now();
        let unassigned = incident(IncidentType::NearMiss, Severity::Medium);
        let mut assigned = incident(IncidentType::NearMiss, Severity::Medium);
        assigned
            .apply_assignment(EmployeeId::new("EMP-1001"), now)
            .unwrap();

        let filter = IncidentFilter {
            assigned_to: Some("emp-10".to_string()),
            ..Default::default()
        };
        assert!(filter.matches_residual(&assigned, now));
        assert!(!filter.matches_residual(&unassigned, now));

        let other = IncidentFilter {
            assigned_to: Some("EMP-2".to_string()),
            ..Default::default()
        };
        assert!(!other.matches_residual(&assigned, now));

        let blank = IncidentFilter {
            assigned_to: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(blank.matches_residual(&unassigned, now));
    }

    #[test]
    fn test_limit_clamped() {
        let mut filter = IncidentFilter::default();
        assert_eq!(filter.limit(), DEFAULT_PAGE_LIMIT);
        filter.limit = Some(0);
        assert_eq!(filter.limit(), 1);
        filter.limit = Some(10_000);
        assert_eq!(filter.limit(), MAX_PAGE_LIMIT);
    }

    #[test]
    fn test_page_slice() {
        let page = Page::slice((0..10).collect::<Vec<_>>(), 3, 8);
        assert_eq!(page.items, vec![8, 9]);
        assert_eq!(page.total, 10);
    }
}
