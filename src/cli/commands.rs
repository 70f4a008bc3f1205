use clap::{Args, Parser, Subcommand, ValueEnum};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

#[derive(Parser)]
#[command(
    name = "vulnagent",
    version,
    long_version = LONG_VERSION,
    about = "Autonomous LLM-driven web vulnerability scanner"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a target URL
    Scan(ScanArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ScanArgs {
    /// Target web application URL
    pub target: String,

    /// YAML configuration file (defaults to ./.vulnagent.yaml, then ~/.config/vulnagent/config.yaml)
    #[arg(short, long)]
    pub config: Option<String>,

    /// LLM provider id or alias: anthropic, openai, gemini, openrouter, local, ...
    #[arg(long)]
    pub llm: Option<String>,

    /// LLM model identifier
    #[arg(long)]
    pub model: Option<String>,

    /// Comma-separated host patterns the scan may contact
    #[arg(short, long, value_delimiter = ',')]
    pub whitelist: Vec<String>,

    /// Upper bound on oracle steps
    #[arg(long)]
    pub max_steps: Option<u32>,

    /// Write the scan result as JSON to this file
    #[arg(short, long)]
    pub output: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Config file to validate
    pub config: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_args() {
        let cli = Cli::try_parse_from([
            "vulnagent",
            "-vv",
            "scan",
            "http://127.0.0.1:8080",
            "--whitelist",
            "example.com,*.example.org",
            "--max-steps",
            "12",
            "--llm",
            "openai",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_format, LogFormat::Text);
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.target, "http://127.0.0.1:8080");
                assert_eq!(args.whitelist, vec!["example.com", "*.example.org"]);
                assert_eq!(args.max_steps, Some(12));
                assert_eq!(args.llm.as_deref(), Some("openai"));
                assert!(args.output.is_none());
            }
            Commands::Validate(_) => panic!("expected scan"),
        }
    }

    #[test]
    fn test_validate_requires_path() {
        assert!(Cli::try_parse_from(["vulnagent", "validate"]).is_err());
        let cli = Cli::try_parse_from(["vulnagent", "--log-format", "json", "validate", "cfg.yaml"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}
