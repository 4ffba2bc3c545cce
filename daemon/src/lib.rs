pub mod audit;
pub mod collector;
pub mod config;
pub mod detector;
pub mod error;
pub mod executor;
pub mod sampler;
pub mod watchdog;
