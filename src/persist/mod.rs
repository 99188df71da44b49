pub mod capabilities;
pub mod draft;
pub mod file;
pub mod memory;
pub mod repository;
pub mod scheduler;
pub mod snapshot;
pub mod store;

pub use capabilities::{ConfigColumn, StorageCapabilities, TileColumn};
pub use draft::{reconcile, DraftCache, DraftChoice};
pub use file::FileStore;
pub use memory::{MemoryStore, StoreOp};
pub use repository::{LoadSource, Loaded, MapRepository, Saved};
pub use scheduler::SaveQueue;
pub use snapshot::{normalize, normalize_with, to_document};
pub use store::{MapStore, ProjectKey, Row, StoreError, TableSchema, CONFIG_TABLE, TILES_TABLE};
