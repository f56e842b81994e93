/// Longest processing time first partitioning
mod balance;
pub use balance::{balance, report, Bin};

/// Scoped worker threads building indexes
mod parallel;
pub use parallel::{LoadReport, ParallelLoader, WorkerFailure, DEFAULT_THREADS};
