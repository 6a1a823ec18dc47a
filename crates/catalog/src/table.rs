use serde::{Deserialize, Serialize};
use uuid::Uuid;

use brigade_core::impl_uuid_newtype;

use crate::in_memory::CatalogError;

/// Table identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(Uuid);

impl_uuid_newtype!(TableId, "TableId");

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStatus {
    Available,
    Occupied,
    Reserved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub id: TableId,
    pub name: String,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default = "default_status")]
    pub status: TableStatus,
}

fn default_status() -> TableStatus {
    TableStatus::Available
}

/// Table lookups. `set_table_status` is reserved for order open/close transitions.
pub trait TableRegistry: Send + Sync {
    fn resolve_table(&self, id: TableId) -> Option<TableInfo>;

    fn set_table_status(&self, id: TableId, status: TableStatus) -> Result<(), CatalogError>;
}

impl<R> TableRegistry for std::sync::Arc<R>
where
    R: TableRegistry + ?Sized,
{
    fn resolve_table(&self, id: TableId) -> Option<TableInfo> {
        (**self).resolve_table(id)
    }

    fn set_table_status(&self, id: TableId, status: TableStatus) -> Result<(), CatalogError> {
        (**self).set_table_status(id, status)
    }
}
