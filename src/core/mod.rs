pub mod app_config;
pub mod scheduler;
pub mod system;
