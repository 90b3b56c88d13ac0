//! Dashboard statistics handler

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use safeline_core::{AggregationResult, StatsFilter, TrendBucket};
use safeline_types::{CompanyRef, SiteRef};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub company: Option<String>,
    pub company_code: Option<String>,
    pub site_code: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub bucket: TrendBucket,
}

impl StatsQuery {
    fn into_filter(self) -> ApiResult<StatsFilter> {
        let site = match (self.company_code, self.site_code) {
            (Some(company_code), Some(site_code)) => Some(SiteRef::new(company_code, site_code)),
            (None, None) => None,
            _ => {
                return Err(ApiError::BadRequest(
                    "company_code and site_code must be given together".to_string(),
                ))
            }
        };

        Ok(StatsFilter {
            company: self.company.map(CompanyRef::new),
            site,
            from: self.from,
            to: self.to,
            bucket: self.bucket,
        })
    }
}

/// Counts, breakdowns and trend for the dashboard
pub async fn incident_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<AggregationResult>> {
    let filter = query.into_filter()?;
    let stats = state.stats.stats(&filter).await?;
    Ok(Json(AggregationResult::clone(&stats)))
}
