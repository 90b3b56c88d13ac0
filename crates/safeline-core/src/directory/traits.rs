//! Directory trait definitions

use crate::error::StorageResult;
use async_trait::async_trait;
use safeline_types::{CompanyRef, Employee, EmployeeId, SiteContext, SiteRef};

/// Read-only view of the company, site and employee records
#[async_trait]
pub trait Directory: Send + Sync {
    /// Get a site by its exact (case-sensitive) code pair
    async fn get_site(&self, site: &SiteRef) -> StorageResult<Option<SiteContext>>;

    /// Get an employee by ID
    async fn get_employee(&self, id: &EmployeeId) -> StorageResult<Option<Employee>>;

    /// List every employee of a company, active or not
    async fn list_employees(&self, company: &CompanyRef) -> StorageResult<Vec<Employee>>;
}
