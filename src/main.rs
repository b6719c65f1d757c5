mod config;
mod display;
mod error;
mod github;
mod output;
mod roster;

use clap::Parser;
use config::{RosterConfig, MAX_JOBS};
use error::Result;
use github::GithubClient;
use output::{OutputFormat, RecordWriter};

#[derive(Parser, Debug)]
#[command(
    name = "github-org-users",
    version,
    about = "Export the members of a GitHub organization as CSV or JSON",
    after_help = "The access token is read from GITHUB_API_KEY (or GITHUB_TOKEN) and needs the read:org scope."
)]
pub struct Cli {
    /// Organization whose members to list
    #[arg(value_name = "ORG_NAME")]
    pub org: String,

    /// Output format [default: csv]
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Fetch each member's full profile (adds the name column)
    #[arg(long)]
    pub fetch_full_user: bool,

    /// Maximum concurrent profile lookups [default: 1]
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=MAX_JOBS as i64))]
    pub jobs: Option<u8>,

    /// Members requested per page (1-100) [default: 100]
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub per_page: Option<u8>,

    /// GitHub REST API base URL (for GitHub Enterprise Server)
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Show progress and rate limit on stderr
    #[arg(long)]
    pub verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    let result = tokio::select! {
        result = run(&cli) => result,
        Ok(()) = tokio::signal::ctrl_c() => {
            display::error("interrupted");
            std::process::exit(130);
        }
    };

    match result {
        Ok(()) => {}
        Err(e) if e.is_broken_pipe() => {}
        Err(e) => {
            display::error(&e.to_string());
            std::process::exit(1);
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = RosterConfig::resolve(cli, config::load_config()?, |key| {
        std::env::var(key).ok()
    })?;
    let client = GithubClient::new(
        &config.token,
        config.api_url.as_deref(),
        config.per_page,
        config.verbose,
    )?;

    let stdout = std::io::stdout().lock();
    let mut out = RecordWriter::new(stdout, config.format, config.fetch_full_user);
    roster::export(&client, &config, &mut out).await?;

    client.check_rate_limit_if_verbose().await;

    Ok(())
}
