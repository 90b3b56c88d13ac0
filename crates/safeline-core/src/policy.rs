//! Assignment policy
//!
//! Decides which employees may hold an incident. The state side of an
//! assignment lives in the transition table; this module only judges people.

use safeline_types::{CompanyRef, Employee};
use serde::Serialize;
use std::fmt;

/// Reason an employee was refused as assignee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssigneeRejection {
    /// Employee record is deactivated
    Inactive,
    /// Employee belongs to another company than the incident's site
    CrossCompany,
}

impl fmt::Display for AssigneeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssigneeRejection::Inactive => f.write_str("employee is inactive"),
            AssigneeRejection::CrossCompany => {
                f.write_str("employee belongs to a different company")
            }
        }
    }
}

/// Active, same-company assignment rule
#[derive(Debug, Clone, Copy, Default)]
pub struct AssignmentPolicy;

impl AssignmentPolicy {
    pub fn new() -> Self {
        Self
    }

    /// Check one employee against the incident's company
    pub fn check(&self, company: &CompanyRef, employee: &Employee) -> Result<(), AssigneeRejection> {
        if !employee.is_active {
            return Err(AssigneeRejection::Inactive);
        }
        if !employee.works_for(company) {
            return Err(AssigneeRejection::CrossCompany);
        }
        Ok(())
    }

    /// Keep only eligible employees, ordered by name
    pub fn eligible(&self, company: &CompanyRef, employees: Vec<Employee>) -> Vec<Employee> {
        let mut eligible: Vec<Employee> = employees
            .into_iter()
            .filter(|e| self.check(company, e).is_ok())
            .collect();
        eligible.sort_by(|a, b| a.name.cmp(&b.name));
        eligible
    }
}
