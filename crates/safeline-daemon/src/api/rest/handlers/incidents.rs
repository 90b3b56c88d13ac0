//! Staff incident handlers

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use safeline_core::{IncidentFilter, IncidentScope, Page};
use safeline_types::{
    CompanyRef, Employee, EmployeeId, Incident, IncidentId, IncidentReport, IncidentStatus,
    IncidentType, ReportChannel, ReporterIdentity, Severity, SiteRef,
};
use serde::{Deserialize, Serialize};

/// Incident with the derived fields the dashboard shows
#[derive(Debug, Serialize)]
pub struct IncidentResponse {
    #[serde(flatten)]
    pub incident: Incident,
    pub anonymous: bool,
    pub reporter_display_name: String,
    pub is_overdue: bool,
    pub age_in_days: i64,
}

impl From<Incident> for IncidentResponse {
    fn from(incident: Incident) -> Self {
        let now = Utc::now();
        Self {
            anonymous: incident.is_anonymous(),
            reporter_display_name: incident.reporter.display_name().to_string(),
            is_overdue: incident.is_overdue(now),
            age_in_days: incident.age_in_days(now),
            incident,
        }
    }
}

/// Staff submission
#[derive(Debug, Deserialize)]
pub struct CreateIncidentRequest {
    pub company_code: String,
    pub site_code: String,
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub description: String,
    pub location: String,
    pub reporter: ReporterIdentity,
}

/// Anonymous submission; reporter fields are not part of the form
#[derive(Debug, Deserialize)]
pub struct CreateAnonymousIncidentRequest {
    pub company_code: String,
    pub site_code: String,
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub description: String,
    pub location: String,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: IncidentStatus,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub employee_id: String,
}

/// Listing query; list-valued parameters are comma separated
#[derive(Debug, Default, Deserialize)]
pub struct ListIncidentsQuery {
    pub company: Option<String>,
    pub company_code: Option<String>,
    pub site_code: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub incident_type: Option<String>,
    pub severity: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub anonymous: Option<bool>,
    pub assigned: Option<bool>,
    pub overdue: Option<bool>,
    pub min_priority: Option<u32>,
    pub assigned_to: Option<String>,
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

fn parse_list<T>(
    raw: Option<&str>,
    param: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> ApiResult<Vec<T>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            parse(&s.to_ascii_uppercase())
                .ok_or_else(|| ApiError::BadRequest(format!("Invalid {}: {}", param, s)))
        })
        .collect()
}

impl ListIncidentsQuery {
    fn into_filter(self) -> ApiResult<IncidentFilter> {
        let site = match (self.company_code, self.site_code) {
            (Some(company_code), Some(site_code)) => Some(SiteRef::new(company_code, site_code)),
            (None, None) => None,
            _ => {
                return Err(ApiError::BadRequest(
                    "company_code and site_code must be given together".to_string(),
                ))
            }
        };

        let scope = IncidentScope {
            site,
            company: self.company.map(CompanyRef::new),
            statuses: parse_list(self.status.as_deref(), "status", IncidentStatus::parse)?,
            types: parse_list(self.incident_type.as_deref(), "type", IncidentType::parse)?,
            severities: parse_list(self.severity.as_deref(), "severity", Severity::parse)?,
            created_from: self.from,
            created_to: self.to,
        };

        Ok(IncidentFilter {
            scope,
            anonymous: self.anonymous,
            assigned: self.assigned,
            overdue: self.overdue,
            min_priority: self.min_priority,
            assigned_to: self.assigned_to,
            search: self.search,
            limit: self.limit,
            offset: self.offset.unwrap_or(0),
        })
    }
}

fn parse_incident_id(raw: &str) -> ApiResult<IncidentId> {
    IncidentId::parse(raw)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid incident id: {}", raw)))
}

/// Submit a report on behalf of a reporter
pub async fn create_incident(
    State(state): State<AppState>,
    Json(req): Json<CreateIncidentRequest>,
) -> ApiResult<(StatusCode, Json<IncidentResponse>)> {
    let site = SiteRef::new(req.company_code, req.site_code);
    let report = IncidentReport {
        incident_type: req.incident_type,
        severity: req.severity,
        description: req.description,
        location: req.location,
    };

    let incident = state.engine.submit(&site, report, req.reporter).await?;
    state.stats.invalidate();

    Ok((StatusCode::CREATED, Json(incident.into())))
}

/// Submit an anonymous report
pub async fn create_anonymous_incident(
    State(state): State<AppState>,
    Json(req): Json<CreateAnonymousIncidentRequest>,
) -> ApiResult<(StatusCode, Json<IncidentResponse>)> {
    let site = SiteRef::new(req.company_code, req.site_code);
    let report = IncidentReport {
        incident_type: req.incident_type,
        severity: req.severity,
        description: req.description,
        location: req.location,
    };

    let incident = state
        .engine
        .submit_anonymous(&site, report, ReportChannel::Staff)
        .await?;
    state.stats.invalidate();

    Ok((StatusCode::CREATED, Json(incident.into())))
}

/// Get an incident by ID
pub async fn get_incident(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<IncidentResponse>> {
    let id = parse_incident_id(&id)?;
    let incident = state.engine.get(&id).await?;
    Ok(Json(incident.into()))
}

/// List incidents, newest first
pub async fn list_incidents(
    State(state): State<AppState>,
    Query(query): Query<ListIncidentsQuery>,
) -> ApiResult<Json<Page<IncidentResponse>>> {
    let filter = query.into_filter()?;
    let page = state.engine.list(&filter).await?;

    Ok(Json(Page {
        items: page.items.into_iter().map(IncidentResponse::from).collect(),
        total: page.total,
        limit: page.limit,
        offset: page.offset,
    }))
}

/// Change an incident's status
pub async fn set_incident_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetStatusRequest>,
) -> ApiResult<Json<IncidentResponse>> {
    let id = parse_incident_id(&id)?;
    let incident = state.engine.set_status(&id, req.status, req.note).await?;
    state.stats.invalidate();
    Ok(Json(incident.into()))
}

/// Assign or reassign an incident
pub async fn assign_incident(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> ApiResult<Json<IncidentResponse>> {
    let id = parse_incident_id(&id)?;
    let employee_id = req.employee_id.trim();
    if employee_id.is_empty() {
        return Err(ApiError::BadRequest("employee_id must not be empty".to_string()));
    }

    let incident = state
        .engine
        .assign(&id, &EmployeeId::new(employee_id))
        .await?;
    state.stats.invalidate();
    Ok(Json(incident.into()))
}

/// Employees who may be assigned the incident
pub async fn list_assignees(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Employee>>> {
    let id = parse_incident_id(&id)?;
    let employees = state.engine.eligible_assignees(&id).await?;
    Ok(Json(employees))
}
