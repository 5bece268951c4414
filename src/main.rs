use clap::Parser;
use std::error::Error;
use subnet_ipam::cli::{run, Cli};
use subnet_ipam::Config;

fn main() -> Result<(), Box<dyn Error>> {
    // Do as little as possible in main.rs as it can't contain any tests
    dotenv::dotenv().ok();
    let config = Config::from_env();
    log4rs::init_file(&config.log_config, Default::default())
        .map_err(|e| format!("Error initializing log4rs from {}: {e}", config.log_config))?;
    log::info!("#Start main()");

    let cli = Cli::parse();
    run(cli, config)
}
