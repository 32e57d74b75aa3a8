//! On-disk state shared by the engine and the validation harness: the result
//! archive a run leaves behind, and the baseline file runs are checked against.
//! Both are bincode, and both are replaced atomically on write.

pub mod archive;
pub mod atomic;
pub mod baseline;
pub mod error;

pub use archive::{DiagnosticRecord, Frame, ResultArchive, ResultStore};
pub use atomic::write_atomic;
pub use baseline::{BaselineEntry, BaselineStore};
pub use error::StoreError;
