//! Field validation for new reports

use crate::error::ValidationErrors;
use safeline_types::{IncidentReport, ReporterIdentity};

pub const MAX_LOCATION_LEN: usize = 200;
pub const MAX_REPORTER_NAME_LEN: usize = 100;
pub const MAX_CONTACT_NUMBER_LEN: usize = 20;

fn require_text(errors: &mut ValidationErrors, field: &str, value: &str, max_len: Option<usize>) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.push(field, "must not be empty");
    } else if let Some(max) = max_len {
        if trimmed.chars().count() > max {
            errors.push(field, format!("must be at most {} characters", max));
        }
    }
}

/// Collect every field problem of a report and its reporter
pub fn validate_report(report: &IncidentReport, reporter: &ReporterIdentity) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    require_text(&mut errors, "description", &report.description, None);
    require_text(&mut errors, "location", &report.location, Some(MAX_LOCATION_LEN));

    if let ReporterIdentity::Identified {
        name,
        contact_number,
    } = reporter
    {
        require_text(&mut errors, "reporter_name", name, Some(MAX_REPORTER_NAME_LEN));
        require_text(
            &mut errors,
            "contact_number",
            contact_number,
            Some(MAX_CONTACT_NUMBER_LEN),
        );
    }

    errors
}

/// Trim free-text fields before storing
pub fn normalize(report: IncidentReport, reporter: ReporterIdentity) -> (IncidentReport, ReporterIdentity) {
    let report = IncidentReport {
        description: report.description.trim().to_string(),
        location: report.location.trim().to_string(),
        ..report
    };
    let reporter = match reporter {
        ReporterIdentity::Anonymous => ReporterIdentity::Anonymous,
        ReporterIdentity::Identified {
            name,
            contact_number,
        } => ReporterIdentity::identified(name.trim(), contact_number.trim()),
    };
    (report, reporter)
}
