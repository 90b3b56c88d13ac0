//! PostgreSQL directory over the administration tables
//!
//! Reads `companies`, `entities`, `sites`, `employees` and
//! `employee_locations` as maintained by the administration system. Nothing
//! here writes.
//!
//! An employee belongs to the companies reached through their active site and
//! entity postings. Headquarters and company-wide postings name no company and
//! so grant none.

use super::traits::Directory;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use safeline_types::{
    CompanyRef, Employee, EmployeeId, IncidentType, OperationalStatus, SiteContext, SiteRef,
};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};
use std::time::Duration;

/// PostgreSQL-backed directory
#[derive(Debug, Clone)]
pub struct PostgresDirectory {
    pool: PgPool,
}

const SITE_QUERY: &str = r#"
    SELECT s.site_code, s.name AS site_name, s.is_active, s.operational_status,
           s.enabled_forms, c.id::TEXT AS company_id, c.company_code,
           c.name AS company_name
    FROM sites s
    JOIN entities e ON e.id = s.entity_id
    JOIN companies c ON c.id = e.company_id
    WHERE c.company_code = $1 AND s.site_code = $2
    LIMIT 1
"#;

const POSTINGS_CTE: &str = r#"
    WITH reach AS (
        SELECT l.employee_id AS pk, en.company_id::TEXT AS company_id
        FROM employee_locations l
        JOIN sites s ON l.location_type = 'site' AND s.id::TEXT = l.location_id
        JOIN entities en ON en.id = s.entity_id
        WHERE l.is_active
        UNION
        SELECT l.employee_id AS pk, en.company_id::TEXT AS company_id
        FROM employee_locations l
        JOIN entities en ON l.location_type = 'entity' AND en.id::TEXT = l.location_id
        WHERE l.is_active
    )
"#;

const EMPLOYEE_SELECT: &str = r#"
    SELECT e.employee_id, e.name, e.is_active, e.designation,
           COALESCE(
               array_agg(DISTINCT r.company_id) FILTER (WHERE r.company_id IS NOT NULL),
               '{}'::TEXT[]
           ) AS company_ids
    FROM employees e
    LEFT JOIN reach r ON r.pk = e.id
"#;

/// Decode a site's `enabled_forms` column.
///
/// A missing, null or empty list enables every form. A non-empty list keeps
/// the entries this service handles, so a list naming only other forms comes
/// back as `Some` of nothing.
pub(crate) fn parse_enabled_forms(raw: Option<&Value>) -> Option<Vec<IncidentType>> {
    let entries = raw?.as_array()?;
    if entries.is_empty() {
        return None;
    }
    Some(
        entries
            .iter()
            .filter_map(|v| v.as_str().and_then(IncidentType::parse))
            .collect(),
    )
}

impl PostgresDirectory {
    /// Connect to PostgreSQL
    pub async fn new(
        url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(connect_timeout_secs))
            .connect(url)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Share an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn site_from_row(row: &PgRow) -> StorageResult<SiteContext> {
        let get_str = |col: &str| -> StorageResult<String> {
            row.try_get(col).map_err(|e| StorageError::Query(e.to_string()))
        };

        let status_raw = get_str("operational_status")?;
        let operational_status = OperationalStatus::parse(&status_raw).ok_or_else(|| {
            StorageError::InvalidData(format!("unknown operational status: {}", status_raw))
        })?;

        let forms: Option<Value> = row
            .try_get("enabled_forms")
            .map_err(|e| StorageError::Query(e.to_string()))?;
        let enabled_forms = parse_enabled_forms(forms.as_ref());

        Ok(SiteContext {
            site: SiteRef::new(get_str("company_code")?, get_str("site_code")?),
            company: CompanyRef::new(get_str("company_id")?),
            site_name: get_str("site_name")?,
            company_name: get_str("company_name")?,
            is_active: row
                .try_get("is_active")
                .map_err(|e| StorageError::Query(e.to_string()))?,
            operational_status,
            enabled_forms,
        })
    }

    fn employee_from_row(row: &PgRow) -> StorageResult<Employee> {
        let map = |e: sqlx::Error| StorageError::Query(e.to_string());
        Ok(Employee {
            id: EmployeeId::new(row.try_get::<String, _>("employee_id").map_err(map)?),
            name: row.try_get("name").map_err(map)?,
            companies: row
                .try_get::<Vec<String>, _>("company_ids")
                .map_err(map)?
                .into_iter()
                .map(CompanyRef::new)
                .collect(),
            is_active: row.try_get("is_active").map_err(map)?,
            designation: row
                .try_get::<Option<String>, _>("designation")
                .map_err(map)?
                .filter(|d| !d.is_empty()),
        })
    }
}

#[async_trait]
impl Directory for PostgresDirectory {
    async fn get_site(&self, site: &SiteRef) -> StorageResult<Option<SiteContext>> {
        let row = sqlx::query(SITE_QUERY)
            .bind(&site.company_code)
            .bind(&site.site_code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        row.as_ref().map(Self::site_from_row).transpose()
    }

    async fn get_employee(&self, id: &EmployeeId) -> StorageResult<Option<Employee>> {
        let sql = format!(
            "{}{} WHERE e.employee_id = $1 GROUP BY e.id",
            POSTINGS_CTE, EMPLOYEE_SELECT
        );
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        row.as_ref().map(Self::employee_from_row).transpose()
    }

    async fn list_employees(&self, company: &CompanyRef) -> StorageResult<Vec<Employee>> {
        let sql = format!(
            "{}{} WHERE e.id IN (SELECT pk FROM reach WHERE company_id = $1) \
             GROUP BY e.id ORDER BY e.name",
            POSTINGS_CTE, EMPLOYEE_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(company.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        rows.iter().map(Self::employee_from_row).collect()
    }
}
