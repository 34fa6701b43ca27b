mod catalog;
mod error;
mod memory;
mod record;
mod traits;

pub mod conformance;

pub use catalog::{Book, Course, SubCourse, SubCourseRequirement};
pub use error::StorageError;
pub use memory::{MemoryCatalog, MemoryRecordStore};
pub use record::{
    timestamp_now, ApproverRole, ExperienceRecord, ExperienceStatus, RecordDetails, RecordFilter,
};
pub use traits::{CatalogStore, RecordStore};
