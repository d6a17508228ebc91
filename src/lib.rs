pub mod config;
pub mod format;
pub mod logging;
pub mod monitor;
pub mod output;
pub mod system;
pub mod tree;
