pub mod schedule;
pub mod system;
