pub mod collector;
pub mod counters;
pub mod platform;
pub mod sampler;
pub mod snapshot;
pub mod source;
