//! Dashboard aggregation view
//!
//! Read-only counts and trends over the incident store. Results are cached
//! per filter for a bounded interval.

use crate::deadline::Deadline;
use crate::error::{LifecycleError, LifecycleResult, ValidationErrors};
use crate::filter::IncidentScope;
use crate::store::IncidentStore;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, Utc};
use dashmap::DashMap;
use safeline_types::{
    CompanyRef, Incident, IncidentId, IncidentStatus, IncidentType, Severity, SiteRef,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_RANGE_DAYS: i64 = 30;
pub const MAX_TREND_BUCKETS: usize = 366;
/// Filters kept in the stats cache at once
pub const MAX_CACHED_FILTERS: usize = 64;
const TOP_SITES: usize = 10;
const TOP_COMPANIES: usize = 10;
const RECENT: usize = 5;

/// Width of a trend bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendBucket {
    #[default]
    Day,
    /// Monday-based weeks
    Week,
}

/// Scope of a statistics request
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StatsFilter {
    pub company: Option<CompanyRef>,
    pub site: Option<SiteRef>,
    /// Defaults to `DEFAULT_RANGE_DAYS` before `to`
    pub from: Option<DateTime<Utc>>,
    /// Defaults to now
    pub to: Option<DateTime<Utc>>,
    pub bucket: TrendBucket,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteCount {
    pub site: SiteRef,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyCount {
    pub company: CompanyRef,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    /// First day of the bucket
    pub start: NaiveDate,
    pub count: usize,
}

/// Compact listing entry for the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncidentSummary {
    pub id: IncidentId,
    pub incident_number: String,
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub site: SiteRef,
    pub reporter: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Incident> for IncidentSummary {
    fn from(incident: &Incident) -> Self {
        Self {
            id: incident.id.clone(),
            incident_number: incident.incident_number.clone(),
            incident_type: incident.incident_type,
            severity: incident.severity,
            status: incident.status(),
            site: incident.site.clone(),
            reporter: incident.reporter.display_name().to_string(),
            created_at: incident.created_at(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregationResult {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub bucket: TrendBucket,
    pub total: usize,
    pub open: usize,
    pub overdue: usize,
    pub anonymous: usize,
    pub by_status: BTreeMap<IncidentStatus, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_type: BTreeMap<IncidentType, usize>,
    pub by_site: Vec<SiteCount>,
    pub by_company: Vec<CompanyCount>,
    pub trend: Vec<TrendPoint>,
    pub recent: Vec<IncidentSummary>,
    pub generated_at: DateTime<Utc>,
}

impl TrendBucket {
    fn step_days(self) -> i64 {
        match self {
            TrendBucket::Day => 1,
            TrendBucket::Week => 7,
        }
    }
}

/// First day of the bucket holding `date`; `None` before the calendar's start
fn bucket_start(date: NaiveDate, bucket: TrendBucket) -> Option<NaiveDate> {
    match bucket {
        TrendBucket::Day => Some(date),
        TrendBucket::Week => date.checked_sub_signed(ChronoDuration::days(i64::from(
            date.weekday().num_days_from_monday(),
        ))),
    }
}

/// Number of buckets covering `from..=to`
fn bucket_count(from: NaiveDate, to: NaiveDate, bucket: TrendBucket) -> Option<usize> {
    let start = bucket_start(from, bucket)?;
    let days = to.signed_duration_since(start).num_days();
    if days < 0 {
        return Some(0);
    }
    usize::try_from(days / bucket.step_days() + 1).ok()
}

/// Bucket starts in `from..=to`; callers bound the range first
fn bucket_starts(from: NaiveDate, to: NaiveDate, bucket: TrendBucket) -> Vec<NaiveDate> {
    let step = ChronoDuration::days(bucket.step_days());
    let mut starts = Vec::new();
    let mut cursor = bucket_start(from, bucket);
    while let Some(day) = cursor.filter(|d| *d <= to) {
        starts.push(day);
        cursor = day.checked_add_signed(step);
    }
    starts
}

/// Resolve defaults and reject unusable ranges
fn effective_range(
    filter: &StatsFilter,
    now: DateTime<Utc>,
) -> LifecycleResult<(DateTime<Utc>, DateTime<Utc>)> {
    let to = filter.to.unwrap_or(now);
    let from = match filter.from {
        Some(from) => from,
        None => to
            .checked_sub_signed(ChronoDuration::days(DEFAULT_RANGE_DAYS))
            .ok_or_else(|| ValidationErrors::single("to", "out of range"))?,
    };

    if from > to {
        return Err(ValidationErrors::single("from", "must not be after to").into());
    }
    let buckets = bucket_count(from.date_naive(), to.date_naive(), filter.bucket)
        .ok_or_else(|| ValidationErrors::single("from", "out of range"))?;
    if buckets > MAX_TREND_BUCKETS {
        return Err(LifecycleError::Validation(ValidationErrors::single(
            "bucket",
            format!("range spans {} buckets, at most {} allowed", buckets, MAX_TREND_BUCKETS),
        )));
    }
    Ok((from, to))
}

/// Aggregate incidents already restricted to the range, newest first
pub fn aggregate(
    incidents: &[Incident],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    bucket: TrendBucket,
    now: DateTime<Utc>,
) -> AggregationResult {
    let mut by_status: BTreeMap<IncidentStatus, usize> =
        IncidentStatus::ALL.iter().map(|s| (*s, 0)).collect();
    let mut by_severity: BTreeMap<Severity, usize> =
        Severity::ALL.iter().map(|s| (*s, 0)).collect();
    let mut by_type: BTreeMap<IncidentType, usize> =
        IncidentType::ALL.iter().map(|t| (*t, 0)).collect();
    let mut per_site: HashMap<&SiteRef, usize> = HashMap::new();
    let mut per_company: HashMap<&CompanyRef, usize> = HashMap::new();
    let mut per_bucket: BTreeMap<NaiveDate, usize> =
        bucket_starts(from.date_naive(), to.date_naive(), bucket)
            .into_iter()
            .map(|d| (d, 0))
            .collect();

    let (mut open, mut overdue, mut anonymous) = (0, 0, 0);

    for incident in incidents {
        *by_status.entry(incident.status()).or_default() += 1;
        *by_severity.entry(incident.severity).or_default() += 1;
        *by_type.entry(incident.incident_type).or_default() += 1;
        *per_site.entry(&incident.site).or_default() += 1;
        *per_company.entry(&incident.company).or_default() += 1;

        if let Some(start) = bucket_start(incident.created_at().date_naive(), bucket) {
            if let Some(count) = per_bucket.get_mut(&start) {
                *count += 1;
            }
        }

        if incident.status().is_open() {
            open += 1;
        }
        if incident.is_overdue(now) {
            overdue += 1;
        }
        if incident.is_anonymous() {
            anonymous += 1;
        }
    }

    let mut by_site: Vec<SiteCount> = per_site
        .into_iter()
        .map(|(site, count)| SiteCount {
            site: site.clone(),
            count,
        })
        .collect();
    by_site.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.site.cmp(&b.site)));
    by_site.truncate(TOP_SITES);

    let mut by_company: Vec<CompanyCount> = per_company
        .into_iter()
        .map(|(company, count)| CompanyCount {
            company: company.clone(),
            count,
        })
        .collect();
    by_company.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.company.cmp(&b.company)));
    by_company.truncate(TOP_COMPANIES);

    let mut newest: Vec<&Incident> = incidents.iter().collect();
    newest.sort_by_key(|i| std::cmp::Reverse(i.created_at()));

    AggregationResult {
        from,
        to,
        bucket,
        total: incidents.len(),
        open,
        overdue,
        anonymous,
        by_status,
        by_severity,
        by_type,
        by_site,
        by_company,
        trend: per_bucket
            .into_iter()
            .map(|(start, count)| TrendPoint { start, count })
            .collect(),
        recent: newest.into_iter().take(RECENT).map(IncidentSummary::from).collect(),
        generated_at: now,
    }
}

struct CachedStats {
    computed_at: Instant,
    result: Arc<AggregationResult>,
}

/// Cached statistics over an incident store
pub struct AggregationView {
    store: Arc<dyn IncidentStore>,
    deadline: Deadline,
    ttl: Duration,
    cache: DashMap<StatsFilter, CachedStats>,
}

impl AggregationView {
    /// A zero `ttl` disables caching
    pub fn new(store: Arc<dyn IncidentStore>, deadline: Deadline, ttl: Duration) -> Self {
        Self {
            store,
            deadline,
            ttl,
            cache: DashMap::new(),
        }
    }

    pub async fn stats(&self, filter: &StatsFilter) -> LifecycleResult<Arc<AggregationResult>> {
        if !self.ttl.is_zero() {
            if let Some(hit) = self.cache.get(filter) {
                if hit.computed_at.elapsed() < self.ttl {
                    debug!("Serving cached incident stats");
                    return Ok(hit.result.clone());
                }
            }
        }

        let now = Utc::now();
        let (from, to) = effective_range(filter, now)?;
        let scope = IncidentScope {
            site: filter.site.clone(),
            company: filter.company.clone(),
            created_from: Some(from),
            created_to: Some(to),
            ..Default::default()
        };
        let incidents = self
            .deadline
            .read("query_incidents", || self.store.query(&scope))
            .await?;

        let result = Arc::new(aggregate(&incidents, from, to, filter.bucket, now));
        if !self.ttl.is_zero() {
            self.remember(filter, result.clone());
        }
        Ok(result)
    }

    fn remember(&self, filter: &StatsFilter, result: Arc<AggregationResult>) {
        let ttl = self.ttl;
        self.cache.retain(|_, cached| cached.computed_at.elapsed() < ttl);
        if self.cache.len() >= MAX_CACHED_FILTERS && !self.cache.contains_key(filter) {
            debug!(cached = self.cache.len(), "Stats cache full, not caching");
            return;
        }
        self.cache.insert(
            filter.clone(),
            CachedStats {
                computed_at: Instant::now(),
                result,
            },
        );
    }

    /// Filters currently cached
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Drop every cached snapshot
    pub fn invalidate(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryIncidentStore;
    use chrono::TimeZone;
    use safeline_types::{
        EmployeeId, IncidentReport, OperationalStatus, ReportChannel, ReporterIdentity,
        SiteContext,
    };

    fn incident_at(
        site_code: &str,
        incident_type: IncidentType,
        reporter: ReporterIdentity,
        at: DateTime<Utc>,
    ) -> Incident {
        let site = SiteContext {
            site: SiteRef::new("SPC001", site_code),
            company: CompanyRef::new("1"),
            site_name: site_code.to_string(),
            company_name: "Sun Power".to_string(),
            is_active: true,
            operational_status: OperationalStatus::Operational,
            enabled_forms: None,
        };
        Incident::report(
            &site,
            IncidentReport {
                incident_type,
                severity: Severity::High,
                description: "steam leak".to_string(),
                location: "Boiler".to_string(),
            },
            reporter,
            ReportChannel::Staff,
            at,
        )
    }

    #[test]
    fn test_week_buckets_start_monday() {
        // 2024-05-15 is a Wednesday
        let wed = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
        assert_eq!(
            bucket_start(wed, TrendBucket::Week),
            NaiveDate::from_ymd_opt(2024, 5, 13)
        );
        let end = NaiveDate::from_ymd_opt(2024, 5, 27).unwrap();
        let starts = bucket_starts(wed, end, TrendBucket::Week);
        assert_eq!(starts.len(), 3);
        assert_eq!(bucket_count(wed, end, TrendBucket::Week), Some(3));
        assert_eq!(bucket_count(wed, end, TrendBucket::Day), Some(13));
    }

    #[test]
    fn test_aggregate_counts_and_zero_fill() {
        let from = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 5, 7, 23, 0, 0).unwrap();

        let mut assigned = incident_at(
            "SPL001",
            IncidentType::NearMiss,
            ReporterIdentity::Anonymous,
            from + ChronoDuration::hours(2),
        );
        assigned
            .apply_assignment(EmployeeId::new("E1"), from + ChronoDuration::hours(3))
            .unwrap();
        let incidents = vec![
            incident_at(
                "SPL002",
                IncidentType::Emergency,
                ReporterIdentity::identified("Asha", "1"),
                from + ChronoDuration::days(3),
            ),
            assigned,
        ];

        let result = aggregate(&incidents, from, to, TrendBucket::Day, to);
        assert_eq!(result.total, 2);
        assert_eq!(result.open, 2);
        assert_eq!(result.anonymous, 1);
        assert_eq!(result.by_status.len(), IncidentStatus::ALL.len());
        assert_eq!(result.by_status[&IncidentStatus::Assigned], 1);
        assert_eq!(result.by_status[&IncidentStatus::Closed], 0);
        assert_eq!(result.by_type[&IncidentType::UnsafeAct], 0);
        assert_eq!(result.trend.len(), 7);
        assert_eq!(result.trend[0].count, 1);
        assert_eq!(result.trend[1].count, 0);
        assert_eq!(result.trend[3].count, 1);
        assert_eq!(result.by_site.len(), 2);
        assert_eq!(
            result.by_company,
            vec![CompanyCount {
                company: CompanyRef::new("1"),
                count: 2
            }]
        );
        assert_eq!(result.recent[0].site.site_code, "SPL002");
        // Emergency older than 4h is overdue
        assert_eq!(result.overdue, 2);
    }

    #[test]
    fn test_range_validation() {
        let now = Utc::now();
        let backwards = StatsFilter {
            from: Some(now),
            to: Some(now - ChronoDuration::days(1)),
            ..Default::default()
        };
        assert!(matches!(
            effective_range(&backwards, now),
            Err(LifecycleError::Validation(_))
        ));

        let too_long = StatsFilter {
            from: Some(now - ChronoDuration::days(800)),
            ..Default::default()
        };
        assert!(effective_range(&too_long, now).is_err());

        let weekly = StatsFilter {
            bucket: TrendBucket::Week,
            ..too_long
        };
        assert!(effective_range(&weekly, now).is_ok());

        let (from, to) = effective_range(&StatsFilter::default(), now).unwrap();
        assert_eq!(to, now);
        assert_eq!((to - from).num_days(), DEFAULT_RANGE_DAYS);
    }

    #[test]
    fn test_range_at_calendar_limits() {
        let now = Utc::now();
        let last = DateTime::<Utc>::MAX_UTC;
        let at_end = StatsFilter {
            from: Some(last),
            to: Some(last),
            ..Default::default()
        };
        let (from, to) = effective_range(&at_end, now).unwrap();
        let result = aggregate(&[], from, to, TrendBucket::Day, now);
        assert_eq!(result.trend.len(), 1);

        let weekly_end = StatsFilter {
            bucket: TrendBucket::Week,
            ..at_end
        };
        assert!(effective_range(&weekly_end, now).is_ok());

        let from_start = StatsFilter {
            from: Some(DateTime::<Utc>::MIN_UTC),
            ..Default::default()
        };
        assert!(matches!(
            effective_range(&from_start, now),
            Err(LifecycleError::Validation(_))
        ));
        let weekly_start = StatsFilter {
            bucket: TrendBucket::Week,
            ..from_start
        };
        assert!(matches!(
            effective_range(&weekly_start, now),
            Err(LifecycleError::Validation(_))
        ));

        let default_from_at_start = StatsFilter {
            to: Some(DateTime::<Utc>::MIN_UTC),
            ..Default::default()
        };
        assert!(matches!(
            effective_range(&default_from_at_start, now),
            Err(LifecycleError::Validation(_))
        ));
    }

    #[test]
    fn test_by_company_top_ten() {
        let from = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let incidents: Vec<Incident> = (0..12)
            .flat_map(|n| {
                let copies = if n == 7 { 3 } else { 1 };
                (0..copies).map(move |_| {
                    let mut incident = incident_at(
                        "SPL001",
                        IncidentType::UnsafeAct,
                        ReporterIdentity::Anonymous,
                        from,
                    );
                    incident.company = CompanyRef::new(format!("{:02}", n));
                    incident
                })
            })
            .collect();

        let result = aggregate(&incidents, from, from, TrendBucket::Day, from);
        assert_eq!(result.by_company.len(), 10);
        assert_eq!(result.by_company[0].company, CompanyRef::new("07"));
        assert_eq!(result.by_company[0].count, 3);
        assert_eq!(result.by_company[1].company, CompanyRef::new("00"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_cached_until_ttl() {
        let store = Arc::new(InMemoryIncidentStore::new());
        let view = AggregationView::new(store.clone(), Deadline::default(), Duration::from_secs(30));
        let filter = StatsFilter::default();

        assert_eq!(view.stats(&filter).await.unwrap().total, 0);

        store
            .insert(&incident_at(
                "SPL001",
                IncidentType::UnsafeAct,
                ReporterIdentity::Anonymous,
                Utc::now(),
            ))
            .await
            .unwrap();
        assert_eq!(view.stats(&filter).await.unwrap().total, 0);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(view.stats(&filter).await.unwrap().total, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_size_is_bounded() {
        let store = Arc::new(InMemoryIncidentStore::new());
        let view = AggregationView::new(store, Deadline::default(), Duration::from_secs(30));
        let to = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        for days in 0..200 {
            let filter = StatsFilter {
                from: Some(to - ChronoDuration::days(days)),
                to: Some(to),
                ..Default::default()
            };
            view.stats(&filter).await.unwrap();
        }
        assert_eq!(view.cached_len(), MAX_CACHED_FILTERS);

        tokio::time::advance(Duration::from_secs(31)).await;
        view.stats(&StatsFilter::default()).await.unwrap();
        assert_eq!(view.cached_len(), 1);
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_cache() {
        let store = Arc::new(InMemoryIncidentStore::new());
        let view = AggregationView::new(store.clone(), Deadline::default(), Duration::ZERO);
        let filter = StatsFilter::default();

        assert_eq!(view.stats(&filter).await.unwrap().total, 0);
        store
            .insert(&incident_at(
                "SPL001",
                IncidentType::UnsafeAct,
                ReporterIdentity::Anonymous,
                Utc::now(),
            ))
            .await
            .unwrap();
        assert_eq!(view.stats(&filter).await.unwrap().total, 1);
    }
}
