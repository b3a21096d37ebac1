use std::fmt;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use famebot_core::{CoreError, TwitterApiError};

use crate::oauth;
use crate::TwitterCredentials;

const TWITTER_API_BASE: &str = "https://api.twitter.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RATE_LIMIT_WAIT_SECS: u64 = 60;

/// Service-assigned tweet id, kept as the string the API returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TweetId(pub String);

impl fmt::Display for TweetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tweet {
    pub id: TweetId,
    pub text: String,
}

#[derive(Debug, Serialize)]
struct CreateTweetRequest {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<Reply>,
}

#[derive(Debug, Serialize)]
struct Reply {
    in_reply_to_tweet_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateTweetResponse {
    data: Tweet,
}

/// Posting client for the v2 API, signing each request with OAuth 1.0a
/// user context.
pub struct TwitterClient {
    http_client: Client,
    credentials: TwitterCredentials,
    wait_on_rate_limit: bool,
}

impl TwitterClient {
    /// Client that sleeps out rate-limit windows and re-sends, matching
    /// how the bot is meant to run unattended.
    pub fn new(credentials: TwitterCredentials) -> Self {
        Self::with_rate_limit_wait(credentials, true)
    }

    /// With `wait_on_rate_limit` off, a 429 response becomes
    /// `TwitterApiError::RateLimitExceeded` instead of a sleep.
    pub fn with_rate_limit_wait(credentials: TwitterCredentials, wait_on_rate_limit: bool) -> Self {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http_client,
            credentials,
            wait_on_rate_limit,
        }
    }

    pub async fn create_tweet(
        &self,
        text: &str,
        in_reply_to: Option<&TweetId>,
    ) -> Result<Tweet, CoreError> {
        let url = format!("{}/2/tweets", TWITTER_API_BASE);
        let request = CreateTweetRequest {
            text: text.to_string(),
            reply: in_reply_to.map(|id| Reply {
                in_reply_to_tweet_id: id.0.clone(),
            }),
        };

        loop {
            // Nonce and timestamp are single-use; every attempt needs a
            // fresh signature.
            let authorization = oauth::authorization_header(&self.credentials, "POST", &url, &[]);

            let start_time = Instant::now();
            let response = match self
                .http_client
                .post(&url)
                .header("Authorization", authorization)
                .json(&request)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    error!("Network error posting tweet: {}", e);
                    if e.is_timeout() {
                        return Err(CoreError::TwitterApi(TwitterApiError::RequestTimeout));
                    }
                    return Err(CoreError::Network(e));
                }
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait = rate_limit_wait(&response);
                if self.wait_on_rate_limit {
                    let reset_at = chrono::Local::now()
                        + chrono::Duration::seconds(wait.as_secs() as i64);
                    warn!(
                        "Rate limited; sleeping {}s (until {})",
                        wait.as_secs(),
                        reset_at.format("%H:%M:%S")
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }
                return Err(CoreError::TwitterApi(TwitterApiError::RateLimitExceeded {
                    retry_after: wait.as_secs(),
                }));
            }

            if status == StatusCode::CREATED {
                let payload: CreateTweetResponse = response.json().await.map_err(|e| {
                    error!("Failed to parse tweet response: {}", e);
                    CoreError::TwitterApi(TwitterApiError::InvalidResponse {
                        details: "Failed to parse tweet response".to_string(),
                    })
                })?;
                debug!(
                    "Posted tweet {} in {:?}",
                    payload.data.id,
                    start_time.elapsed()
                );
                return Ok(payload.data);
            }

            let body = response.text().await.unwrap_or_default();
            error!("Tweet post failed with status {}: {}", status, body);
            return Err(map_error_status(status, &body));
        }
    }
}

fn map_error_status(status: StatusCode, body: &str) -> CoreError {
    let error = match status.as_u16() {
        401 => TwitterApiError::AuthenticationFailed {
            reason: error_detail(body).unwrap_or_else(|| "OAuth credentials rejected".to_string()),
        },
        403 => TwitterApiError::Forbidden {
            detail: error_detail(body).unwrap_or_else(|| "request refused".to_string()),
        },
        code if status.is_server_error() => TwitterApiError::ServerError { status_code: code },
        _ => TwitterApiError::InvalidResponse {
            details: format!("Unexpected status {}", status),
        },
    };
    CoreError::TwitterApi(error)
}

/// v2 error bodies carry `detail` and `title` fields.
fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("detail")
        .or_else(|| value.get("title"))?
        .as_str()
        .map(str::to_string)
}

/// Wait derived from `x-rate-limit-reset` (epoch seconds), falling back to
/// `retry-after`, falling back to a flat default.
fn rate_limit_wait(response: &reqwest::Response) -> Duration {
    if let Some(reset) = header_u64(response, "x-rate-limit-reset") {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        return Duration::from_secs(reset.saturating_sub(now).max(1));
    }
    if let Some(retry_after) = header_u64(response, "retry-after") {
        return Duration::from_secs(retry_after.max(1));
    }
    Duration::from_secs(DEFAULT_RATE_LIMIT_WAIT_SECS)
}

fn header_u64(response: &reqwest::Response, name: &str) -> Option<u64> {
    response.headers().get(name)?.to_str().ok()?.parse().ok()
}
