//! GraphQL client for the node ranking provider.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::credential::CredentialStore;
use crate::errors::RefreshError;
use crate::models::Node;

use super::PROVIDER_ID;

/// Default HTTP request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const RANKING_QUERY: &str = r#"
query NodeRankings($first: Int!, $after: String) {
  rankings(first: $first, after: $after) {
    edges {
      node {
        pubKey
        alias
        capacity
        channels
        rank
        rankChange
        uptimePercentage
        successRate
        avgRoutingFee
        feeRates
      }
    }
    pageInfo {
      endCursor
      hasNextPage
    }
  }
}
"#;

/// One page of the cursor-based listing.
#[derive(Clone, Debug, PartialEq)]
pub struct RankingPage {
    pub nodes: Vec<Node>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Transport for the ranking listing.
#[async_trait]
pub trait RankingClient: Send + Sync {
    async fn fetch_page(
        &self,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<RankingPage, RefreshError>;
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<RankingData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RankingData {
    rankings: RankingConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RankingConnection {
    #[serde(default)]
    edges: Vec<RankingEdge>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
struct RankingEdge {
    node: Node,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    end_cursor: Option<String>,
    #[serde(default)]
    has_next_page: bool,
}

/// reqwest-backed GraphQL client.
///
/// The bearer token is read from the shared [`CredentialStore`] on every
/// request so a rotated credential takes effect on the next page.
pub struct GraphQlRankingClient {
    client: Client,
    endpoint: String,
    credential: CredentialStore,
}

impl GraphQlRankingClient {
    pub fn new(endpoint: &str, credential: CredentialStore) -> Result<Self, RefreshError> {
        if endpoint.trim().is_empty() {
            return Err(RefreshError::ConfigInvalid(
                "ranking endpoint is empty".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                RefreshError::ConfigInvalid(format!("Failed to initialize HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credential,
        })
    }

    fn auth_header(&self) -> Result<HeaderValue, RefreshError> {
        let token = self.credential.current();
        if token.trim().is_empty() {
            return Err(RefreshError::CredentialMissing(
                "ranking API token".to_string(),
            ));
        }
        HeaderValue::from_str(&format!("Bearer {}", token.trim())).map_err(|e| {
            RefreshError::CredentialInvalid {
                provider: PROVIDER_ID.to_string(),
                message: format!("Invalid access token format: {}", e),
            }
        })
    }
}

#[async_trait]
impl RankingClient for GraphQlRankingClient {
    async fn fetch_page(
        &self,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<RankingPage, RefreshError> {
        debug!("[{}] POST {} (after {:?})", PROVIDER_ID, self.endpoint, cursor);

        let body = json!({
            "query": RANKING_QUERY,
            "variables": { "first": page_size, "after": cursor },
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header(AUTHORIZATION, self.auth_header()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| RefreshError::Transport {
                provider: PROVIDER_ID.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RefreshError::ParseFailure {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to read response: {}", e),
                transport_related: true,
            })?;

        if let Some(err) = classify_status(status, &text) {
            return Err(err);
        }
        parse_page(&text)
    }
}

/// Map a non-success HTTP status to an error.
fn classify_status(status: StatusCode, body: &str) -> Option<RefreshError> {
    if status.is_success() {
        return None;
    }
    let excerpt: String = body.chars().take(200).collect();
    let err = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RefreshError::CredentialInvalid {
            provider: PROVIDER_ID.to_string(),
            message: format!("HTTP {}: {}", status, excerpt),
        },
        StatusCode::TOO_MANY_REQUESTS => RefreshError::AdmissionDenied {
            provider: PROVIDER_ID.to_string(),
        },
        _ => RefreshError::Transport {
            provider: PROVIDER_ID.to_string(),
            message: format!("HTTP {}: {}", status, excerpt),
        },
    };
    Some(err)
}

/// Decode one GraphQL response body into a page.
fn parse_page(body: &str) -> Result<RankingPage, RefreshError> {
    let response: GraphQlResponse = serde_json::from_str(body).map_err(|e| {
        RefreshError::parse(PROVIDER_ID, format!("Failed to parse response: {}", e))
    })?;

    if let Some(first) = response.errors.first() {
        return Err(classify_graphql_error(&first.message));
    }

    let connection = response
        .data
        .ok_or_else(|| RefreshError::parse(PROVIDER_ID, "response has neither data nor errors"))?
        .rankings;

    Ok(RankingPage {
        nodes: connection.edges.into_iter().map(|edge| edge.node).collect(),
        next_cursor: connection.page_info.end_cursor,
        has_more: connection.page_info.has_next_page,
    })
}

fn classify_graphql_error(message: &str) -> RefreshError {
    let lower = message.to_lowercase();
    if lower.contains("unauthor") || lower.contains("authenticat") || lower.contains("forbidden")
    {
        RefreshError::CredentialInvalid {
            provider: PROVIDER_ID.to_string(),
            message: message.to_string(),
        }
    } else if lower.contains("rate limit") || lower.contains("too many requests") {
        RefreshError::AdmissionDenied {
            provider: PROVIDER_ID.to_string(),
        }
    } else {
        RefreshError::Transport {
            provider: PROVIDER_ID.to_string(),
            message: message.to_string(),
        }
    }
}
