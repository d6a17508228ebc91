//! Pure process-forest algorithms over one cycle's samples. Nothing here
//! touches the OS or the filesystem.

pub mod aggregate;
pub mod forest;
pub mod node;
pub mod target;
