use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use flow_query_gateway::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    // `start` sets up tracing itself, from the loaded configuration
    let command = args.get_command();
    if !matches!(command, cli::Commands::Start) {
        init_tracing("warn", false);
    }

    match command {
        cli::Commands::Start => commands::start::execute(&args.config).await?,
        cli::Commands::Test => commands::test::execute(&args.config).await?,
        cli::Commands::Config { action } => match action {
            cli::ConfigCommands::Show => commands::config::show(&args.config)?,
            cli::ConfigCommands::Validate => commands::config::validate(&args.config)?,
        },
        cli::Commands::Version => {
            println!("Flow Query Gateway v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
