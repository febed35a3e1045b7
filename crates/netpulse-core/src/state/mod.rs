// # ISP State Store Implementations
//
// Implementations of the IspStateStore trait for different persistence
// strategies.

pub mod file;
pub mod memory;

pub use file::FileIspStateStore;
pub use memory::MemoryIspStateStore;

use crate::config::StateStoreConfig;
use crate::traits::IspStateStore;

/// Build the store selected by configuration
///
/// Never fails: an unreadable file store cold-starts (see
/// [`FileIspStateStore::open`]).
pub async fn build_state_store(config: &StateStoreConfig) -> Box<dyn IspStateStore> {
    match config {
        StateStoreConfig::File { path } => Box::new(FileIspStateStore::open(path).await),
        StateStoreConfig::Memory => Box::new(MemoryIspStateStore::new()),
    }
}
