pub mod config;
pub mod error;
pub mod log;
pub mod round_schedule;
