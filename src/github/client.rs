use super::{MemberDirectory, MemberPage, MemberSummary, UserProfile};
use crate::display;
use crate::error::{Result, RosterError};
use octocrab::service::middleware::retry::RetryConfig;
use octocrab::{Octocrab, Page};
use serde::Deserialize;

pub struct GithubClient {
    octocrab: Octocrab,
    per_page: u8,
    verbose: bool,
}

#[derive(Debug, Deserialize)]
pub struct RateLimit {
    pub resources: RateLimitResources,
}

#[derive(Debug, Deserialize)]
pub struct RateLimitResources {
    pub core: RateLimitResource,
}

#[derive(Debug, Deserialize)]
pub struct RateLimitResource {
    pub limit: u64,
    pub remaining: u64,
    pub reset: i64,
}

impl GithubClient {
    pub fn new(token: &str, api_url: Option<&str>, per_page: u8, verbose: bool) -> Result<Self> {
        // Every request is sent exactly once.
        let mut builder = Octocrab::builder()
            .personal_token(token.to_string())
            .add_retry_config(RetryConfig::None);
        if let Some(url) = api_url {
            builder = builder
                .base_uri(url)
                .map_err(|e| RosterError::Config(format!("Invalid API URL {url}: {e}")))?;
        }
        let octocrab = builder
            .build()
            .map_err(|e| RosterError::GitHub(e.to_string()))?;
        Ok(Self {
            octocrab,
            per_page,
            verbose,
        })
    }

    pub async fn get_rate_limit(&self) -> Result<RateLimit> {
        let rate_limit: RateLimit = self.octocrab.get("/rate_limit", None::<&()>).await?;
        Ok(rate_limit)
    }

    pub async fn check_rate_limit_if_verbose(&self) {
        if !self.verbose {
            return;
        }
        match self.get_rate_limit().await {
            Ok(rl) => {
                let core = &rl.resources.core;
                let reset = chrono::DateTime::from_timestamp(core.reset, 0)
                    .map(|dt| dt.format("%H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| core.reset.to_string());
                if core.remaining < 100 {
                    display::warn(&format!(
                        "Only {} API calls remaining (resets at {reset})",
                        core.remaining
                    ));
                } else {
                    display::debug(
                        true,
                        &format!(
                            "Rate limit: {}/{} remaining (resets at {reset})",
                            core.remaining, core.limit
                        ),
                    );
                }
            }
            Err(e) => display::debug(true, &format!("Could not check rate limit: {e}")),
        }
    }
}

impl MemberDirectory for GithubClient {
    async fn list_members(&self, org: &str, page: u32) -> Result<MemberPage> {
        let response: Page<MemberSummary> = self
            .octocrab
            .get(
                format!("/orgs/{}/members", urlencoding::encode(org)),
                Some(&[
                    ("per_page", self.per_page.to_string()),
                    ("page", page.to_string()),
                ]),
            )
            .await
            .map_err(|e| RosterError::api(format!("listing members of {org} (page {page})"), e))?;

        if response.items.iter().any(|m| m.login.is_empty()) {
            return Err(RosterError::GitHub(format!(
                "listing members of {org} (page {page}): member without a login"
            )));
        }

        let next = response.next.as_ref().map(ToString::to_string);
        Ok(MemberPage {
            members: response.items,
            next_page: next_page_number(next.as_deref(), page),
        })
    }

    async fn get_user(&self, login: &str) -> Result<UserProfile> {
        let user: UserProfile = self
            .octocrab
            .get(format!("/users/{}", urlencoding::encode(login)), None::<&()>)
            .await
            .map_err(|e| RosterError::api(format!("fetching user {login}"), e))?;

        if user.login.is_empty() {
            return Err(RosterError::GitHub(format!(
                "fetching user {login}: profile without a login"
            )));
        }
        Ok(user)
    }
}

/// Page number carried by a `rel="next"` link, or `0` when there is none.
///
/// A next link without a `page` parameter falls back to `current + 1`.
fn next_page_number(next: Option<&str>, current: u32) -> u32 {
    let Some(link) = next else {
        return 0;
    };
    link.split_once('?')
        .map(|(_, query)| query)
        .unwrap_or_default()
        .split('&')
        .find_map(|pair| pair.strip_prefix("page=")?.parse().ok())
        .unwrap_or(current + 1)
}
