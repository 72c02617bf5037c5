// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use clap::Parser;
use cli::{Cli, Commands};

mod cli;
mod commands;
mod logging;

fn main() -> Result<()> {
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init()?;

    let args = Cli::parse();

    match args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
        Commands::GenKey => {
            println!("{}", tollgate_core::vault::Vault::generate_key());
        }
        Commands::Activate(cmd) => commands::block_on(commands::activate(&args.db, cmd))?,
        Commands::Suspend(cmd) => commands::block_on(commands::suspend(&args.db, cmd))?,
        Commands::SetUpstream(cmd) => commands::block_on(commands::set_upstream(&args.db, cmd))?,
    }

    Ok(())
}
