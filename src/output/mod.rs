pub mod snapshot_log;
pub mod summary_csv;
