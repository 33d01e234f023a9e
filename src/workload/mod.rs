//! Per-chunk workloads run on the worker pool.
//!
//! Both workloads read the lines a [`Chunk`](crate::chunk::Chunk) owns and
//! parse them with [`parse_record`](crate::record::parse_record); they differ
//! only in what they emit:
//!
//! * [`aggregate`] folds valid records into a local [`Partial`](crate::Partial),
//! * [`scan`] keeps the raw lines that satisfy a [`ScanFilter`](scan::ScanFilter).
//!
//! Workers never touch shared state, so any number of them can run at once.

pub mod aggregate;
pub mod scan;

pub use aggregate::aggregate_chunk;
pub use scan::{scan_chunk, ScanFilter};
