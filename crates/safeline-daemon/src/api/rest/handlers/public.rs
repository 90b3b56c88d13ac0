//! Unauthenticated handlers behind the scanned site code

use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use safeline_types::{
    IncidentReport, IncidentStatus, IncidentType, OperationalStatus, ReportChannel,
    ReporterIdentity, Severity, SiteRef,
};
use serde::{Deserialize, Serialize};

/// What a reporter sees after scanning a site code
#[derive(Debug, Serialize)]
pub struct PublicSiteResponse {
    pub company_code: String,
    pub site_code: String,
    pub site_name: String,
    pub company_name: String,
    pub operational_status: OperationalStatus,
    pub enabled_forms: Vec<IncidentType>,
}

#[derive(Debug, Serialize)]
pub struct ValidateSiteResponse {
    pub valid: bool,
}

/// Public report form
#[derive(Debug, Deserialize)]
pub struct PublicSubmitRequest {
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub description: String,
    pub location: String,
    #[serde(default)]
    pub anonymous: bool,
    #[serde(default)]
    pub reporter_name: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
}

/// Acknowledgement returned to the public reporter
#[derive(Debug, Serialize)]
pub struct SubmissionReceipt {
    pub incident_number: String,
    pub status: IncidentStatus,
    pub anonymous: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Resolve a scanned site code
pub async fn resolve_site(
    State(state): State<AppState>,
    Path((company_code, site_code)): Path<(String, String)>,
) -> ApiResult<Json<PublicSiteResponse>> {
    let site = SiteRef::new(company_code, site_code);
    let ctx = state.engine.resolver().resolve_public(&site).await?;

    Ok(Json(PublicSiteResponse {
        enabled_forms: ctx.enabled_forms(),
        company_code: ctx.site.company_code,
        site_code: ctx.site.site_code,
        site_name: ctx.site_name,
        company_name: ctx.company_name,
        operational_status: ctx.operational_status,
    }))
}

/// Check a scanned site code without returning site details
pub async fn validate_site(
    State(state): State<AppState>,
    Path((company_code, site_code)): Path<(String, String)>,
) -> Json<ValidateSiteResponse> {
    let site = SiteRef::new(company_code, site_code);
    Json(ValidateSiteResponse {
        valid: state.engine.resolver().validate(&site).await,
    })
}

/// Submit a report from the public form
pub async fn submit_public_incident(
    State(state): State<AppState>,
    Path((company_code, site_code)): Path<(String, String)>,
    Json(req): Json<PublicSubmitRequest>,
) -> ApiResult<(StatusCode, Json<SubmissionReceipt>)> {
    let site = SiteRef::new(company_code, site_code);
    let report = IncidentReport {
        incident_type: req.incident_type,
        severity: req.severity,
        description: req.description,
        location: req.location,
    };

    // Reporter fields on an anonymous form are dropped
    let incident = if req.anonymous {
        state
            .engine
            .submit_anonymous(&site, report, ReportChannel::PublicQr)
            .await?
    } else {
        let reporter = ReporterIdentity::identified(
            req.reporter_name.unwrap_or_default(),
            req.contact_number.unwrap_or_default(),
        );
        state.engine.submit_public(&site, report, reporter).await?
    };
    state.stats.invalidate();

    tracing::info!(
        incident_id = %incident.id,
        incident_number = %incident.incident_number,
        site = %incident.site,
        "Public incident received"
    );

    Ok((
        StatusCode::CREATED,
        Json(SubmissionReceipt {
            anonymous: incident.is_anonymous(),
            status: incident.status(),
            created_at: incident.created_at(),
            incident_number: incident.incident_number,
        }),
    ))
}
