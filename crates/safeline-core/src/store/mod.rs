//! Incident store backends

mod memory;
mod postgres;
mod traits;

pub use memory::InMemoryIncidentStore;
pub use postgres::PostgresIncidentStore;
pub use traits::IncidentStore;
