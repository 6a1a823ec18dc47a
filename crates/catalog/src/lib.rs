//! Catalog Lookup.
//!
//! Read-only collaborator of the order core: resolves products to the stations
//! that prepare them and tables to their area and status. The order services
//! are the only callers allowed to change a table's status.

pub mod in_memory;
pub mod product;
pub mod station;
pub mod table;

pub use in_memory::{CatalogError, CatalogSeed, InMemoryCatalog};
pub use product::{ProductCatalog, ProductId, ProductInfo};
pub use station::{Station, StationId, StationRoute, StationType};
pub use table::{TableId, TableInfo, TableRegistry, TableStatus};
