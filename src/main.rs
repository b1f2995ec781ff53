use crate::core::system::System;

mod core;
mod interface;
mod r#macro;
mod model;
mod platform;
mod utils;

#[tokio::main]
async fn main() {
    let config = match System::initialize().await {
        Ok(config) => config,
        Err(error) => {
            error.log();
            std::process::exit(1);
        }
    };

    let result = System::run(&config).await;
    System::terminate().await;

    if let Err(error) = result {
        error.log();
        std::process::exit(1);
    }
}
