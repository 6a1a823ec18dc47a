use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::product::{ProductCatalog, ProductId, ProductInfo};
use crate::station::{Station, StationId, StationType};
use crate::table::{TableId, TableInfo, TableRegistry, TableStatus};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog seed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid catalog seed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("table {0} not found")]
    TableNotFound(TableId),

    #[error("catalog lock poisoned")]
    Poisoned,
}

/// Seed document for [`InMemoryCatalog`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub stations: Vec<Station>,
    #[serde(default)]
    pub products: Vec<ProductInfo>,
    #[serde(default)]
    pub tables: Vec<TableInfo>,
}

/// In-memory catalog for development, tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    stations: RwLock<HashMap<StationId, Station>>,
    products: RwLock<HashMap<ProductId, ProductInfo>>,
    tables: RwLock<HashMap<TableId, TableInfo>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: CatalogSeed) -> Self {
        let catalog = Self::new();
        for station in seed.stations {
            catalog.upsert_station(station);
        }
        for product in seed.products {
            catalog.upsert_product(product);
        }
        for table in seed.tables {
            catalog.upsert_table(table);
        }
        catalog
    }

    /// Load a JSON seed file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let seed: CatalogSeed = serde_json::from_str(&raw)?;
        tracing::info!(
            path = %path.as_ref().display(),
            stations = seed.stations.len(),
            products = seed.products.len(),
            tables = seed.tables.len(),
            "catalog seed loaded"
        );
        Ok(Self::from_seed(seed))
    }

    pub fn upsert_station(&self, station: Station) {
        if let Ok(mut stations) = self.stations.write() {
            stations.insert(station.id, station);
        }
    }

    pub fn upsert_product(&self, product: ProductInfo) {
        if let Ok(mut products) = self.products.write() {
            products.insert(product.id, product);
        }
    }

    pub fn upsert_table(&self, table: TableInfo) {
        if let Ok(mut tables) = self.tables.write() {
            tables.insert(table.id, table);
        }
    }

    pub fn products(&self) -> Vec<ProductInfo> {
        self.products
            .read()
            .map(|p| p.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn tables(&self) -> Vec<TableInfo> {
        self.tables
            .read()
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl ProductCatalog for InMemoryCatalog {
    fn product(&self, id: ProductId) -> Option<ProductInfo> {
        self.products.read().ok()?.get(&id).cloned()
    }

    fn station(&self, id: StationId) -> Option<Station> {
        self.stations.read().ok()?.get(&id).cloned()
    }

    fn stations_of_type(&self, station_type: StationType) -> Vec<Station> {
        let Ok(stations) = self.stations.read() else {
            return Vec::new();
        };
        let mut out: Vec<Station> = stations
            .values()
            .filter(|s| s.station_type == station_type)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

impl TableRegistry for InMemoryCatalog {
    fn resolve_table(&self, id: TableId) -> Option<TableInfo> {
        self.tables.read().ok()?.get(&id).cloned()
    }

    fn set_table_status(&self, id: TableId, status: TableStatus) -> Result<(), CatalogError> {
        let mut tables = self.tables.write().map_err(|_| CatalogError::Poisoned)?;
        let table = tables.get_mut(&id).ok_or(CatalogError::TableNotFound(id))?;
        table.status = status;
        Ok(())
    }
}
