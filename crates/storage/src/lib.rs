pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::{CacheError, StorageError};
pub use memory::{MemoryCache, MemorySnapshot, MemoryStorage};
pub use record::{
    JobStatus, PropagationErrorRecord, PropagationJobRecord, RuleParts, StringModificationRecord,
};
pub use traits::{Cache, TaxonStorage};
