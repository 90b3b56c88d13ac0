//! PostgreSQL incident store
//!
//! Each incident is one row: the full document in `data` plus the columns
//! listings filter on. Updates are conditional on the stored revision.

use super::traits::IncidentStore;
use crate::error::{StorageError, StorageResult};
use crate::filter::IncidentScope;
use async_trait::async_trait;
use safeline_types::{Incident, IncidentId};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder, Row};
use std::time::Duration;

/// PostgreSQL-backed incident store
#[derive(Debug, Clone)]
pub struct PostgresIncidentStore {
    pool: PgPool,
}

impl PostgresIncidentStore {
    /// Connect to PostgreSQL and initialize schema
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

        Self::from_pool(pool).await
    }

    /// Use an existing pool and initialize schema
    pub async fn from_pool(pool: PgPool) -> Result<Self, StorageError> {
        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn initialize_schema(&self) -> Result<(), StorageError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS safety_incidents (
                id UUID PRIMARY KEY,
                incident_number TEXT NOT NULL UNIQUE,
                company_code TEXT NOT NULL,
                site_code TEXT NOT NULL,
                company_ref TEXT NOT NULL,
                status TEXT NOT NULL,
                incident_type TEXT NOT NULL,
                severity TEXT NOT NULL,
                revision BIGINT NOT NULL,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            );
            "#,
            r#"CREATE INDEX IF NOT EXISTS safety_incidents_site_status ON safety_incidents(company_code, site_code, status);"#,
            r#"CREATE INDEX IF NOT EXISTS safety_incidents_status_created ON safety_incidents(status, created_at DESC);"#,
            r#"CREATE INDEX IF NOT EXISTS safety_incidents_company ON safety_incidents(company_ref, created_at DESC);"#,
        ];

        for stmt in statements {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Query(e.to_string()))?;
        }

        Ok(())
    }

    fn to_json(incident: &Incident) -> Result<Value, StorageError> {
        serde_json::to_value(incident)
            .map_err(|e| StorageError::InvalidData(format!("json serialize error: {}", e)))
    }

    fn from_json(value: Value) -> Result<Incident, StorageError> {
        serde_json::from_value(value)
            .map_err(|e| StorageError::InvalidData(format!("json deserialize error: {}", e)))
    }

    fn revision_param(revision: u64) -> Result<i64, StorageError> {
        i64::try_from(revision)
            .map_err(|_| StorageError::InvalidData(format!("revision {} out of range", revision)))
    }
}

#[async_trait]
impl IncidentStore for PostgresIncidentStore {
    async fn insert(&self, incident: &Incident) -> StorageResult<()> {
        let data = Self::to_json(incident)?;

        let result = sqlx::query(
            r#"
            INSERT INTO safety_incidents
                (id, incident_number, company_code, site_code, company_ref, status,
                 incident_type, severity, revision, data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(incident.id.as_uuid())
        .bind(&incident.incident_number)
        .bind(&incident.site.company_code)
        .bind(&incident.site.site_code)
        .bind(incident.company.as_str())
        .bind(incident.status().as_str())
        .bind(incident.incident_type.as_str())
        .bind(incident.severity.as_str())
        .bind(Self::revision_param(incident.revision())?)
        .bind(data)
        .bind(incident.created_at())
        .bind(incident.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict(format!(
                "incident {} already exists",
                incident.id
            )));
        }
        Ok(())
    }

    async fn get(&self, id: &IncidentId) -> StorageResult<Option<Incident>> {
        let row = sqlx::query("SELECT data FROM safety_incidents WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        match row {
            Some(record) => {
                let data: Value = record
                    .try_get("data")
                    .map_err(|e| StorageError::Query(e.to_string()))?;
                Ok(Some(Self::from_json(data)?))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, incident: &Incident, expected_revision: u64) -> StorageResult<()> {
        let data = Self::to_json(incident)?;

        let result = sqlx::query(
            r#"
            UPDATE safety_incidents
            SET status = $2, revision = $3, data = $4, updated_at = $5
            WHERE id = $1 AND revision = $6
            "#,
        )
        .bind(incident.id.as_uuid())
        .bind(incident.status().as_str())
        .bind(Self::revision_param(incident.revision())?)
        .bind(data)
        .bind(incident.updated_at())
        .bind(Self::revision_param(expected_revision)?)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(e.to_string()))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Distinguish a missing row from a stale revision
        let exists = sqlx::query("SELECT 1 FROM safety_incidents WHERE id = $1")
            .bind(incident.id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?
            .is_some();

        if exists {
            Err(StorageError::Conflict(format!(
                "incident {} changed since revision {}",
                incident.id, expected_revision
            )))
        } else {
            Err(StorageError::NotFound(format!("incident {}", incident.id)))
        }
    }

    async fn query(&self, scope: &IncidentScope) -> StorageResult<Vec<Incident>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT data FROM safety_incidents WHERE TRUE");

        if let Some(site) = &scope.site {
            qb.push(" AND company_code = ")
                .push_bind(site.company_code.clone())
                .push(" AND site_code = ")
                .push_bind(site.site_code.clone());
        }
        if let Some(company) = &scope.company {
            qb.push(" AND company_ref = ")
                .push_bind(company.as_str().to_string());
        }
        if !scope.statuses.is_empty() {
            let statuses: Vec<String> = scope.statuses.iter().map(|s| s.as_str().to_string()).collect();
            qb.push(" AND status = ANY(").push_bind(statuses).push(")");
        }
        if !scope.types.is_empty() {
            let types: Vec<String> = scope.types.iter().map(|t| t.as_str().to_string()).collect();
            qb.push(" AND incident_type = ANY(").push_bind(types).push(")");
        }
        if !scope.severities.is_empty() {
            let severities: Vec<String> =
                scope.severities.iter().map(|s| s.as_str().to_string()).collect();
            qb.push(" AND severity = ANY(").push_bind(severities).push(")");
        }
        if let Some(from) = scope.created_from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = scope.created_to {
            qb.push(" AND created_at <= ").push_bind(to);
        }
        qb.push(" ORDER BY created_at DESC, incident_number DESC");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Query(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                let data: Value = row
                    .try_get("data")
                    .map_err(|e| StorageError::Query(e.to_string()))?;
                Self::from_json(data)
            })
            .collect()
    }
}
