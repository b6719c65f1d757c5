use crate::error::{Result, RosterError};
use crate::output::OutputFormat;
use crate::Cli;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Environment variables consulted for the access token, in order.
pub const TOKEN_ENV_VARS: [&str; 2] = ["GITHUB_API_KEY", "GITHUB_TOKEN"];
pub const API_URL_ENV_VAR: &str = "GITHUB_API_URL";

pub const DEFAULT_PER_PAGE: u8 = 100;
pub const MAX_JOBS: u8 = 32;

/// On-disk settings. Every section is optional.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub github: GithubConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct AuthConfig {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct DefaultsConfig {
    pub format: Option<OutputFormat>,
    pub fetch_full_user: Option<bool>,
    pub jobs: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
pub struct GithubConfig {
    pub api_url: Option<String>,
}

/// Everything one run needs, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterConfig {
    pub org: String,
    pub token: String,
    pub format: OutputFormat,
    pub fetch_full_user: bool,
    pub jobs: usize,
    pub per_page: u8,
    pub api_url: Option<String>,
    pub verbose: bool,
}

impl RosterConfig {
    /// Merge command-line flags, environment and config file.
    ///
    /// Flags win over the environment, which wins over the file. The token is
    /// checked here so a missing credential fails before any request is made.
    pub fn resolve(
        cli: &Cli,
        config: Config,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let org = cli.org.trim();
        if org.is_empty() {
            return Err(RosterError::Usage(
                "organization name must not be empty".into(),
            ));
        }

        let token = TOKEN_ENV_VARS
            .iter()
            .filter_map(|&var| env(var))
            .chain(config.auth.token)
            .map(|t| t.trim().to_string())
            .find(|t| !t.is_empty())
            .ok_or(RosterError::AuthConfig)?;

        let jobs = match cli.jobs.or(config.defaults.jobs) {
            Some(n) if (1..=MAX_JOBS).contains(&n) => n,
            Some(n) => {
                return Err(RosterError::Config(format!(
                    "jobs must be between 1 and {MAX_JOBS}, got {n}"
                )))
            }
            None => 1,
        };

        let api_url = cli
            .api_url
            .clone()
            .or_else(|| env(API_URL_ENV_VAR))
            .or(config.github.api_url)
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        Ok(Self {
            org: org.to_string(),
            token,
            format: cli
                .format
                .or(config.defaults.format)
                .unwrap_or_default(),
            fetch_full_user: cli.fetch_full_user
                || config.defaults.fetch_full_user.unwrap_or(false),
            jobs: usize::from(jobs),
            per_page: cli.per_page.unwrap_or(DEFAULT_PER_PAGE),
            api_url,
            verbose: cli.verbose,
        })
    }
}

pub fn config_path() -> Result<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg)
            .join("github-org-users")
            .join("config.toml");
        return Ok(path);
    }

    let home = dirs::home_dir()
        .ok_or_else(|| RosterError::Config("Cannot find home directory".into()))?;
    Ok(home
        .join(".config")
        .join("github-org-users")
        .join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(&path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}
