use candidate_store::CandidateStore;
use famebot_core::{BotConfig, CoreError};
use gemini_client::{GeminiClient, GeminiConfig};
use twitter_client::{ThreadPoster, TwitterClient, TwitterCredentials};

use crate::bot::{Bot, RunOutcome};

mod bot;

#[tokio::main]
async fn main() -> Result<(), CoreError> {
    tracing_subscriber::fmt()
        .with_env_filter("famebot=debug,candidate_store=debug,gemini_client=debug,twitter_client=debug")
        .init();

    tracing::info!("Starting famebot");

    let config = BotConfig::from_env()?;

    let store = CandidateStore::new(config.candidates_path, config.tweet_log_path);
    let generator = GeminiClient::new(GeminiConfig {
        api_key: config.gemini_api_key,
        model: config.gemini_model,
    });
    let poster = ThreadPoster::new(TwitterClient::new(TwitterCredentials {
        api_key: config.twitter_api_key,
        api_secret_key: config.twitter_api_secret_key,
        bearer_token: config.twitter_bearer_token,
        access_token: config.twitter_access_token,
        access_token_secret: config.twitter_access_token_secret,
    }));

    let bot = Bot::new(store, generator, poster);
    match bot.run().await? {
        RunOutcome::Posted { subject, tweets } => {
            tracing::info!("Posted a {}-part thread about {}", tweets.len(), subject);
        }
        RunOutcome::Exhausted => {
            tracing::info!("Nothing to do; every candidate is already covered");
        }
        RunOutcome::Failed { subject } => {
            tracing::warn!("Run failed while processing {}; name left unlogged", subject);
        }
    }

    Ok(())
}
