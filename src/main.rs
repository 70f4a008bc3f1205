use clap::Parser;
use tracing_subscriber::EnvFilter;

use vulnagent::cli::{self, commands::LogFormat, exit, Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    match cli.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(!cli.no_color)
            .with_writer(std::io::stderr)
            .init(),
    }
    if cli.no_color {
        console::set_colors_enabled(false);
    }

    let outcome = match cli.command {
        Commands::Scan(args) => cli::scan::handle_scan(args, cli.quiet).await.map(|r| exit::for_result(&r)),
        Commands::Validate(args) => cli::validate::handle_validate(&args.config).await.map(|_| exit::SUCCESS),
    };

    let exit_code = outcome.unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        exit::for_error(&e)
    });
    std::process::exit(exit_code);
}
