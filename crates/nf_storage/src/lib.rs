use std::path::Path;
use std::sync::Arc;

use nf_core::storage::PersistenceGateway;
use nf_core::Result;

pub mod backends;

pub use backends::*;

/// Persistence backend selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum StorageKind {
    #[default]
    Memory,
    Sqlite,
}

impl StorageKind {
    pub fn get_error_message(self) -> &'static str {
        match self {
            Self::Memory => "Memory storage should always be available",
            Self::Sqlite => "SQLite storage requires building with the `sqlite` feature",
        }
    }
}

/// Opens the requested backend. `database` is only used by SQLite.
#[cfg_attr(not(feature = "sqlite"), allow(unused_variables))]
pub async fn create_storage(
    kind: StorageKind,
    database: &Path,
) -> Result<Arc<dyn PersistenceGateway>> {
    match kind {
        StorageKind::Memory => Ok(Arc::new(InMemoryStorage::new())),
        #[cfg(feature = "sqlite")]
        StorageKind::Sqlite => Ok(Arc::new(SqliteStorage::new_with_path(database).await?)),
        #[cfg(not(feature = "sqlite"))]
        StorageKind::Sqlite => Err(nf_core::Error::Storage(
            kind.get_error_message().to_string(),
        )),
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, StorageKind};
}
