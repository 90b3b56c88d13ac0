//! In-memory directory for development and testing

use super::traits::Directory;
use crate::error::StorageResult;
use async_trait::async_trait;
use safeline_types::{
    CompanyRef, Employee, EmployeeId, IncidentType, OperationalStatus, SiteContext, SiteRef,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Fixture describing companies with their sites and employees
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub companies: Vec<CompanySeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompanySeed {
    pub id: String,
    pub company_code: String,
    pub name: String,
    #[serde(default)]
    pub sites: Vec<SiteSeed>,
    #[serde(default)]
    pub employees: Vec<EmployeeSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteSeed {
    pub site_code: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub operational_status: OperationalStatus,
    #[serde(default)]
    pub enabled_forms: Vec<IncidentType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmployeeSeed {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub designation: Option<String>,
}

fn default_true() -> bool {
    true
}

/// In-memory directory backed by `RwLock` maps
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    sites: Arc<RwLock<HashMap<SiteRef, SiteContext>>>,
    employees: Arc<RwLock<HashMap<EmployeeId, Employee>>>,
}

impl InMemoryDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from a fixture
    pub async fn from_seed(seed: DirectorySeed) -> Self {
        let directory = Self::new();
        for company in seed.companies {
            let company_ref = CompanyRef::new(company.id.as_str());
            for site in company.sites {
                directory
                    .upsert_site(SiteContext {
                        site: SiteRef::new(company.company_code.as_str(), site.site_code),
                        company: company_ref.clone(),
                        site_name: site.name,
                        company_name: company.name.clone(),
                        is_active: site.is_active,
                        operational_status: site.operational_status,
                        enabled_forms: Some(site.enabled_forms).filter(|f| !f.is_empty()),
                    })
                    .await;
            }
            for employee in company.employees {
                let id = EmployeeId::new(employee.id);
                let mut employees = directory.employees.write().await;
                // An employee listed under several companies is posted to each
                employees
                    .entry(id.clone())
                    .and_modify(|e| {
                        if !e.works_for(&company_ref) {
                            e.companies.push(company_ref.clone());
                        }
                    })
                    .or_insert_with(|| Employee {
                        id,
                        name: employee.name,
                        companies: vec![company_ref.clone()],
                        is_active: employee.is_active,
                        designation: employee.designation,
                    });
            }
        }
        directory
    }

    /// Create or replace a site record
    pub async fn upsert_site(&self, site: SiteContext) {
        let mut sites = self.sites.write().await;
        sites.insert(site.site.clone(), site);
    }

    /// Create or replace an employee record
    pub async fn upsert_employee(&self, employee: Employee) {
        let mut employees = self.employees.write().await;
        employees.insert(employee.id.clone(), employee);
    }

    /// Toggle a site's activation flag; returns false if the site is unknown
    pub async fn set_site_active(&self, site: &SiteRef, active: bool) -> bool {
        let mut sites = self.sites.write().await;
        match sites.get_mut(site) {
            Some(record) => {
                record.is_active = active;
                true
            }
            None => false,
        }
    }

    /// Toggle an employee's activation flag; returns false if unknown
    pub async fn set_employee_active(&self, id: &EmployeeId, active: bool) -> bool {
        let mut employees = self.employees.write().await;
        match employees.get_mut(id) {
            Some(record) => {
                record.is_active = active;
                true
            }
            None => false,
        }
    }

    pub async fn site_count(&self) -> usize {
        self.sites.read().await.len()
    }

    pub async fn employee_count(&self) -> usize {
        self.employees.read().await.len()
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn get_site(&self, site: &SiteRef) -> StorageResult<Option<SiteContext>> {
        let sites = self.sites.read().await;
        Ok(sites.get(site).cloned())
    }

    async fn get_employee(&self, id: &EmployeeId) -> StorageResult<Option<Employee>> {
        let employees = self.employees.read().await;
        Ok(employees.get(id).cloned())
    }

    async fn list_employees(&self, company: &CompanyRef) -> StorageResult<Vec<Employee>> {
        let employees = self.employees.read().await;
        Ok(employees
            .values()
            .filter(|e| e.works_for(company))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> DirectorySeed {
        serde_json::from_value(serde_json::json!({
            "companies": [{
                "id": "1",
                "company_code": "SPC001",
                "name": "Sun Power",
                "sites": [
                    { "site_code": "SPL001", "name": "Solar Park" },
                    { "site_code": "SPL002", "name": "Old Park", "is_active": false,
                      "operational_status": "DECOMMISSIONED" }
                ],
                "employees": [
                    { "id": "E1", "name": "Asha" },
                    { "id": "E2", "name": "Ravi", "is_active": false }
                ]
            }]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_from_seed() {
        let directory = InMemoryDirectory::from_seed(seed()).await;
        assert_eq!(directory.site_count().await, 2);
        assert_eq!(directory.employee_count().await, 2);

        let site = directory
            .get_site(&SiteRef::new("SPC001", "SPL001"))
            .await
            .unwrap()
            .unwrap();
        assert!(site.is_active);
        assert_eq!(site.company, CompanyRef::new("1"));
        assert_eq!(site.company_name, "Sun Power");

        let old = directory
            .get_site(&SiteRef::new("SPC001", "SPL002"))
            .await
            .unwrap()
            .unwrap();
        assert!(!old.is_active);
        assert_eq!(old.operational_status, OperationalStatus::Decommissioned);
    }

    #[tokio::test]
    async fn test_codes_are_case_sensitive() {
        let directory = InMemoryDirectory::from_seed(seed()).await;
        let site = directory
            .get_site(&SiteRef::new("spc001", "spl001"))
            .await
            .unwrap();
        assert!(site.is_none());
    }

    #[tokio::test]
    async fn test_list_employees_by_company() {
        let directory = InMemoryDirectory::from_seed(seed()).await;
        let employees = directory.list_employees(&CompanyRef::new("1")).await.unwrap();
        assert_eq!(employees.len(), 2);
        let none = directory.list_employees(&CompanyRef::new("2")).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_employee_listed_under_two_companies_is_posted_to_both() {
        let seed: DirectorySeed = serde_json::from_value(serde_json::json!({
            "companies": [
                { "id": "1", "company_code": "SPC001", "name": "Sun Power",
                  "sites": [{ "site_code": "SPL001", "name": "Solar Park", "enabled_forms": [] }],
                  "employees": [{ "id": "E9", "name": "Mira" }] },
                { "id": "2", "company_code": "WND002", "name": "Wind Co",
                  "employees": [{ "id": "E9", "name": "Mira" }] }
            ]
        }))
        .unwrap();
        let directory = InMemoryDirectory::from_seed(seed).await;
        assert_eq!(directory.employee_count().await, 1);
        for company in ["1", "2"] {
            let listed = directory.list_employees(&CompanyRef::new(company)).await.unwrap();
            assert_eq!(listed.len(), 1);
        }

        let site = directory
            .get_site(&SiteRef::new("SPC001", "SPL001"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(site.enabled_forms, None);
    }

    #[tokio::test]
    async fn test_toggle_activation() {
        let directory = InMemoryDirectory::from_seed(seed()).await;
        let site = SiteRef::new("SPC001", "SPL001");
        assert!(directory.set_site_active(&site, false).await);
        assert!(!directory.get_site(&site).await.unwrap().unwrap().is_active);
        assert!(!directory.set_site_active(&SiteRef::new("X", "Y"), false).await);
    }
}
