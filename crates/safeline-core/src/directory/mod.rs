//! Directory backends: read-only company, site and employee records

mod memory;
mod postgres;
mod traits;

pub use memory::{CompanySeed, DirectorySeed, EmployeeSeed, InMemoryDirectory, SiteSeed};
pub use postgres::PostgresDirectory;
pub use traits::Directory;
