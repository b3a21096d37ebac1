use tracing::{error, info};

use famebot_core::CoreError;

use crate::api::{Tweet, TweetId, TwitterClient};

/// Seam between the thread workflow and the wire client. Tests run the
/// workflow against a scripted poster instead of the live API.
pub trait PostClient {
    async fn create_tweet(
        &self,
        text: &str,
        in_reply_to: Option<&TweetId>,
    ) -> Result<Tweet, CoreError>;
}

impl PostClient for TwitterClient {
    async fn create_tweet(
        &self,
        text: &str,
        in_reply_to: Option<&TweetId>,
    ) -> Result<Tweet, CoreError> {
        TwitterClient::create_tweet(self, text, in_reply_to).await
    }
}

/// Splits generated copy on `#` and posts the pieces as a reply chain.
pub struct ThreadPoster<C> {
    client: C,
}

impl<C: PostClient> ThreadPoster<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Posts each `#`-separated segment in order, threading every post
    /// under the one before it. Segments are posted verbatim and the split
    /// keeps empty segments, so a leading `#` yields an empty first post.
    ///
    /// On a failed segment the error is returned immediately; segments
    /// already posted stay up, there is no rollback.
    pub async fn post_thread(&self, text: &str) -> Result<Vec<TweetId>, CoreError> {
        let segments: Vec<&str> = text.split('#').collect();
        info!("Posting thread with {} segments", segments.len());

        let mut posted: Vec<TweetId> = Vec::with_capacity(segments.len());
        for (position, segment) in segments.iter().enumerate() {
            match self.client.create_tweet(segment, posted.last()).await {
                Ok(tweet) => {
                    info!(
                        "Posted thread segment {} of {}",
                        position + 1,
                        segments.len()
                    );
                    posted.push(tweet.id);
                }
                Err(e) => {
                    error!(
                        "Failed to post thread segment {} of {}: {}",
                        position + 1,
                        segments.len(),
                        e
                    );
                    return Err(e);
                }
            }
        }

        Ok(posted)
    }
}
