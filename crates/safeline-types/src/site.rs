//! Site and employee records as seen through the directory
//!
//! The directory owns these records; the lifecycle engine only reads them.

use crate::ids::{CompanyRef, EmployeeId};
use crate::incident::IncidentType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Public address of a site: the code pair printed into its QR code
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteRef {
    pub company_code: String,
    pub site_code: String,
}

impl SiteRef {
    pub fn new(company_code: impl Into<String>, site_code: impl Into<String>) -> Self {
        Self {
            company_code: company_code.into(),
            site_code: site_code.into(),
        }
    }
}

impl fmt::Display for SiteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.company_code, self.site_code)
    }
}

/// Operational status of a plant site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationalStatus {
    #[default]
    Operational,
    Maintenance,
    Shutdown,
    Commissioning,
    Decommissioned,
}

impl OperationalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationalStatus::Operational => "OPERATIONAL",
            OperationalStatus::Maintenance => "MAINTENANCE",
            OperationalStatus::Shutdown => "SHUTDOWN",
            OperationalStatus::Commissioning => "COMMISSIONING",
            OperationalStatus::Decommissioned => "DECOMMISSIONED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "OPERATIONAL" => Some(OperationalStatus::Operational),
            "MAINTENANCE" => Some(OperationalStatus::Maintenance),
            "SHUTDOWN" => Some(OperationalStatus::Shutdown),
            "COMMISSIONING" => Some(OperationalStatus::Commissioning),
            "DECOMMISSIONED" => Some(OperationalStatus::Decommissioned),
            _ => None,
        }
    }
}

/// A site record resolved from the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteContext {
    /// Code pair identifying the site
    pub site: SiteRef,
    /// Owning company
    pub company: CompanyRef,
    /// Display name of the site
    pub site_name: String,
    /// Display name of the owning company
    pub company_name: String,
    /// Administrative activation flag; the only gate on public access
    pub is_active: bool,
    /// Plant operational status (informational)
    pub operational_status: OperationalStatus,
    /// Report forms enabled at this site; `None` means all. `Some` of an
    /// empty list enables none of ours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_forms: Option<Vec<IncidentType>>,
}

impl SiteContext {
    /// Whether the site accepts reports of the given type
    pub fn accepts(&self, incident_type: IncidentType) -> bool {
        match &self.enabled_forms {
            None => true,
            Some(forms) => forms.contains(&incident_type),
        }
    }

    /// Effective list of enabled forms
    pub fn enabled_forms(&self) -> Vec<IncidentType> {
        match &self.enabled_forms {
            None => IncidentType::ALL.to_vec(),
            Some(forms) => forms.clone(),
        }
    }

    pub fn is_operational(&self) -> bool {
        self.is_active && self.operational_status == OperationalStatus::Operational
    }
}

/// An employee record from the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    /// Companies the employee is posted to
    #[serde(default)]
    pub companies: Vec<CompanyRef>,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
}

impl Employee {
    pub fn works_for(&self, company: &CompanyRef) -> bool {
        self.companies.contains(company)
    }
}
