//! Dataset Bob Common Library
//!
//! リモート階層・分類ジョブの型とユーティリティ（I/Oなし）

pub mod defaults;
pub mod error;
pub mod job;
pub mod query;
pub mod types;

pub use error::{Error, Result};
pub use job::{ClassificationJob, JobState};
pub use query::EntryQuery;
pub use types::{Category, Dataset, LocalImage, RemoteEntry, RootFolder};
