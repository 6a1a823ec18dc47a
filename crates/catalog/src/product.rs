use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use brigade_core::impl_uuid_newtype;

use crate::station::{Station, StationId, StationRoute, StationType};

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(Uuid);

impl_uuid_newtype!(ProductId, "ProductId");

/// Catalog view of a sellable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub id: ProductId,
    pub name: String,
    /// Current list price. Orders capture it when the item is added.
    pub price: Decimal,
    /// Product -> Station assignment, in priority order.
    #[serde(default)]
    pub station_ids: Vec<StationId>,
}

/// Product and station lookups consumed by the order services.
pub trait ProductCatalog: Send + Sync {
    fn product(&self, id: ProductId) -> Option<ProductInfo>;

    fn station(&self, id: StationId) -> Option<Station>;

    fn stations_of_type(&self, station_type: StationType) -> Vec<Station>;

    /// Stations assigned to the product that actually exist.
    fn stations_for_product(&self, id: ProductId) -> Vec<Station> {
        self.product(id)
            .map(|p| p.station_ids.iter().filter_map(|sid| self.station(*sid)).collect())
            .unwrap_or_default()
    }

    /// First assigned station that exists; `None` means the product is unroutable.
    fn resolve_station(&self, id: ProductId) -> Option<StationRoute> {
        self.stations_for_product(id).first().map(Station::route)
    }
}

impl<C> ProductCatalog for std::sync::Arc<C>
where
    C: ProductCatalog + ?Sized,
{
    fn product(&self, id: ProductId) -> Option<ProductInfo> {
        (**self).product(id)
    }

    fn station(&self, id: StationId) -> Option<Station> {
        (**self).station(id)
    }

    fn stations_of_type(&self, station_type: StationType) -> Vec<Station> {
        (**self).stations_of_type(station_type)
    }

    fn stations_for_product(&self, id: ProductId) -> Vec<Station> {
        (**self).stations_for_product(id)
    }

    fn resolve_station(&self, id: ProductId) -> Option<StationRoute> {
        (**self).resolve_station(id)
    }
}
