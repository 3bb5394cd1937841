pub mod disk;
pub mod memory;

pub use disk::FjallRateStore;
pub use memory::MemoryRateStore;

use crate::core::error::StoreError;
use crate::core::store::RateStore;
use std::path::Path;
use std::sync::Arc;

/// Opens the on-disk store at `path` and prepares its schema.
pub async fn open_store(path: &Path) -> Result<Arc<dyn RateStore>, StoreError> {
    let store: Arc<dyn RateStore> = Arc::new(FjallRateStore::open(path)?);
    store.create_schema().await?;
    Ok(store)
}
