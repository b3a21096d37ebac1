mod api;
mod oauth;
mod thread;

#[cfg(test)]
mod tests;

pub use api::{Tweet, TweetId, TwitterClient};
pub use thread::{PostClient, ThreadPoster};

/// The five credential values the developer portal hands out for an
/// app + user pair. Posting signs with the four OAuth 1.0a user-context
/// values; the bearer token only authenticates app-only read endpoints.
#[derive(Debug, Clone)]
pub struct TwitterCredentials {
    pub api_key: String,
    pub api_secret_key: String,
    pub bearer_token: String,
    pub access_token: String,
    pub access_token_secret: String,
}
