//! GitHub REST and GraphQL lookups. Only used when a token is configured.

use crate::adapters::http::ApiClient;
use crate::domain::model::SponsorshipData;
use crate::utils::error::{AnalyzerError, Result};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;

const MEMBERS_PER_PAGE: u32 = 100;
const MEMBERS_MAX_PAGES: u32 = 50;

const SPONSORSHIPS_QUERY: &str = r#"
query($org: String!, $cursor: String) {
  organization(login: $org) {
    sponsorshipsAsSponsor(first: 100, after: $cursor) {
      pageInfo { hasNextPage endCursor }
      nodes {
        isActive
        sponsorable {
          ... on User { login }
          ... on Organization { login }
        }
      }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct Member {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<GraphQlData>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlData {
    organization: Option<Organization>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Organization {
    sponsorships_as_sponsor: Connection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection {
    page_info: PageInfo,
    #[serde(default)]
    nodes: Vec<Option<SponsorshipNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SponsorshipNode {
    #[serde(default)]
    is_active: bool,
    #[serde(default)]
    sponsorable: Option<Sponsorable>,
}

#[derive(Debug, Deserialize)]
struct Sponsorable {
    #[serde(default)]
    login: Option<String>,
}

pub struct GitHubClient {
    api: ApiClient,
    base_url: String,
}

impl GitHubClient {
    pub fn new(api: ApiClient, base_url: impl Into<String>, token: &str) -> Self {
        Self {
            api: api.with_bearer_token(token),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn request_count(&self) -> u64 {
        self.api.request_count()
    }

    pub async fn org_members(&self, org: &str) -> Result<HashSet<String>> {
        let url = format!("{}/orgs/{}/members", self.base_url, urlencoding::encode(org));
        let members: Vec<Member> = self
            .api
            .paginate(&url, &[], MEMBERS_PER_PAGE, MEMBERS_MAX_PAGES)
            .await?;

        tracing::debug!("GitHub reports {} members for {}", members.len(), org);
        Ok(members.into_iter().map(|m| m.login.to_lowercase()).collect())
    }

    pub async fn org_sponsorships(&self, org: &str) -> Result<SponsorshipData> {
        let url = format!("{}/graphql", self.base_url);
        let mut data = SponsorshipData::default();
        let mut cursor: Option<String> = None;

        loop {
            let body = json!({
                "query": SPONSORSHIPS_QUERY,
                "variables": { "org": org, "cursor": cursor },
            });

            let Some(response) = self.api.post_json::<GraphQlResponse, _>(&url, &body).await? else {
                break;
            };

            if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
                let message = errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(AnalyzerError::GraphQl { message });
            }

            let Some(connection) = response
                .data
                .and_then(|d| d.organization)
                .map(|o| o.sponsorships_as_sponsor)
            else {
                break;
            };

            for node in connection.nodes.into_iter().flatten() {
                if let Some(login) = node.sponsorable.and_then(|s| s.login) {
                    data.record(login, node.is_active);
                }
            }

            match connection.page_info.end_cursor {
                Some(next) if connection.page_info.has_next_page => cursor = Some(next),
                _ => break,
            }
        }

        tracing::debug!(
            "GitHub GraphQL: {} active, {} past sponsorships for {}",
            data.current.len(),
            data.past.len(),
            org
        );
        Ok(data)
    }
}
