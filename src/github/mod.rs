mod client;

pub use client::GithubClient;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry of `GET /orgs/{org}/members`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemberSummary {
    pub login: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// A member as emitted: either the listing entry or the full `GET /users/{login}` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub login: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl UserProfile {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    /// Drops fields GitHub reported as `null`.
    pub fn without_nulls(mut self) -> Self {
        self.fields.retain(|_, value| !value.is_null());
        self
    }
}

impl From<MemberSummary> for UserProfile {
    fn from(member: MemberSummary) -> Self {
        Self {
            login: member.login,
            name: None,
            fields: member.fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MemberPage {
    pub members: Vec<MemberSummary>,
    /// Page number to request next, `0` when this was the last page.
    pub next_page: u32,
}

/// The two upstream operations the roster needs.
#[allow(async_fn_in_trait)]
pub trait MemberDirectory {
    async fn list_members(&self, org: &str, page: u32) -> Result<MemberPage>;

    async fn get_user(&self, login: &str) -> Result<UserProfile>;
}
