use candidate_store::CandidateStore;
use famebot_core::{CoreError, Subject};
use gemini_client::ContentGenerator;
use tracing::{error, info};
use twitter_client::{PostClient, ThreadPoster, TweetId};

/// What a single invocation did.
#[derive(Debug)]
pub enum RunOutcome {
    /// A thread went out and the subject is now in the log.
    Posted {
        subject: Subject,
        tweets: Vec<TweetId>,
    },
    /// Every candidate has been covered already.
    Exhausted,
    /// Generation or posting failed; the subject stays unlogged.
    Failed { subject: Subject },
}

pub struct Bot<G, C> {
    store: CandidateStore,
    generator: G,
    poster: ThreadPoster<C>,
}

impl<G: ContentGenerator, C: PostClient> Bot<G, C> {
    pub fn new(store: CandidateStore, generator: G, poster: ThreadPoster<C>) -> Self {
        Self {
            store,
            generator,
            poster,
        }
    }

    /// One pick-generate-post-record cycle.
    ///
    /// Candidate-source failures propagate. Everything after a successful
    /// pick sits inside one recovery boundary: on error the subject stays
    /// unlogged and the run reports `Failed` instead of returning an error,
    /// so the process still exits cleanly. A thread that failed partway
    /// leaves its posted prefix up, and the subject can be drawn again on
    /// a later run.
    pub async fn run(&self) -> Result<RunOutcome, CoreError> {
        let Some(subject) = self.store.pick_unprocessed().await? else {
            info!("No more candidates left to post about");
            return Ok(RunOutcome::Exhausted);
        };

        info!("Selected {} for this run", subject);

        match self.process(&subject).await {
            Ok(tweets) => Ok(RunOutcome::Posted { subject, tweets }),
            Err(e) => {
                error!("Error processing {}: {}", subject, e);
                Ok(RunOutcome::Failed { subject })
            }
        }
    }

    async fn process(&self, subject: &Subject) -> Result<Vec<TweetId>, CoreError> {
        let text = self.generator.generate(subject).await?;
        let tweets = self.poster.post_thread(&text).await?;
        self.store.mark_processed(subject).await?;
        Ok(tweets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use tempfile::TempDir;

    use famebot_core::{LlmError, StoreError, TwitterApiError};
    use twitter_client::Tweet;

    struct CannedGenerator {
        reply: Result<String, LlmError>,
        calls: Arc<Mutex<usize>>,
    }

    impl CannedGenerator {
        fn returning(text: &str) -> (Self, Arc<Mutex<usize>>) {
            Self::with_reply(Ok(text.to_string()))
        }

        fn failing() -> (Self, Arc<Mutex<usize>>) {
            Self::with_reply(Err(LlmError::ContentFiltered {
                reason: "SAFETY".to_string(),
            }))
        }

        fn with_reply(reply: Result<String, LlmError>) -> (Self, Arc<Mutex<usize>>) {
            let calls = Arc::new(Mutex::new(0));
            let generator = Self {
                reply,
                calls: calls.clone(),
            };
            (generator, calls)
        }
    }

    impl ContentGenerator for CannedGenerator {
        async fn generate(&self, _subject: &Subject) -> Result<String, CoreError> {
            *self.calls.lock().unwrap() += 1;
            self.reply.clone().map_err(CoreError::from)
        }
    }

    struct CountingPoster {
        posted: Arc<Mutex<Vec<String>>>,
        fail_at: Option<usize>,
    }

    impl CountingPoster {
        fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
            Self::failing_at(None)
        }

        fn failing_at(position: impl Into<Option<usize>>) -> (Self, Arc<Mutex<Vec<String>>>) {
            let posted = Arc::new(Mutex::new(Vec::new()));
            let poster = Self {
                posted: posted.clone(),
                fail_at: position.into(),
            };
            (poster, posted)
        }
    }

    impl PostClient for CountingPoster {
        async fn create_tweet(
            &self,
            text: &str,
            _in_reply_to: Option<&TweetId>,
        ) -> Result<Tweet, CoreError> {
            let mut posted = self.posted.lock().unwrap();
            let position = posted.len();
            posted.push(text.to_string());

            if self.fail_at == Some(position) {
                return Err(CoreError::TwitterApi(TwitterApiError::ServerError {
                    status_code: 503,
                }));
            }

            Ok(Tweet {
                id: TweetId(format!("tweet-{}", position)),
                text: text.to_string(),
            })
        }
    }

    struct Fixture {
        _dir: TempDir,
        log_path: PathBuf,
        store: CandidateStore,
    }

    fn fixture(csv: &str, log: Option<&str>) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let candidates_path = dir.path().join("celebrities.csv");
        let log_path = dir.path().join("tweet_log.txt");
        std::fs::write(&candidates_path, csv).expect("write csv");
        if let Some(contents) = log {
            std::fs::write(&log_path, contents).expect("write log");
        }
        let store = CandidateStore::new(&candidates_path, &log_path);
        Fixture {
            _dir: dir,
            log_path,
            store,
        }
    }

    #[tokio::test]
    async fn test_run_posts_and_logs_subject() {
        let fx = fixture("Name\nAda Lovelace\n", None);
        let (generator, _) = CannedGenerator::returning("Head#Body#Fact");
        let (poster, posted) = CountingPoster::new();
        let bot = Bot::new(fx.store, generator, ThreadPoster::new(poster));

        let outcome = bot.run().await.expect("run succeeds");

        match outcome {
            RunOutcome::Posted { subject, tweets } => {
                assert_eq!(subject.name, "Ada Lovelace");
                assert_eq!(tweets.len(), 3);
            }
            other => panic!("expected Posted, got {:?}", other),
        }
        assert_eq!(posted.lock().unwrap().len(), 3);

        let log = std::fs::read_to_string(&fx.log_path).expect("log written");
        assert_eq!(log, "Ada Lovelace\n");
    }

    #[tokio::test]
    async fn test_exhausted_candidates() {
        let fx = fixture("Name\nAda Lovelace\n", Some("Ada Lovelace\n"));
        let (generator, generator_calls) = CannedGenerator::returning("Head#Body");
        let (poster, posted) = CountingPoster::new();
        let bot = Bot::new(fx.store, generator, ThreadPoster::new(poster));

        let outcome = bot.run().await.expect("run succeeds");

        assert!(matches!(outcome, RunOutcome::Exhausted));
        assert_eq!(*generator_calls.lock().unwrap(), 0);
        assert!(posted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_leaves_unlogged() {
        let fx = fixture("Name\nAda Lovelace\n", None);
        let (generator, _) = CannedGenerator::failing();
        let (poster, posted) = CountingPoster::new();
        let bot = Bot::new(fx.store, generator, ThreadPoster::new(poster));

        let outcome = bot.run().await.expect("run recovers");

        match outcome {
            RunOutcome::Failed { subject } => assert_eq!(subject.name, "Ada Lovelace"),
            other => panic!("expected Failed, got {:?}", other),
        }
        assert!(posted.lock().unwrap().is_empty());
        assert!(!fx.log_path.exists());
    }

    #[tokio::test]
    async fn test_posting_failure_leaves_unlogged() {
        let fx = fixture("Name\nAda Lovelace\n", None);
        let (generator, _) = CannedGenerator::returning("Head#Body#Fact");
        let (poster, posted) = CountingPoster::failing_at(1);
        let bot = Bot::new(fx.store, generator, ThreadPoster::new(poster));

        let outcome = bot.run().await.expect("run recovers");

        assert!(matches!(outcome, RunOutcome::Failed { .. }));
        // First segment went out, the second failed, the third was never tried.
        assert_eq!(posted.lock().unwrap().len(), 2);
        assert!(!fx.log_path.exists());
    }

    #[tokio::test]
    async fn test_missing_candidate_file_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CandidateStore::new(
            dir.path().join("celebrities.csv"),
            dir.path().join("tweet_log.txt"),
        );
        let (generator, _) = CannedGenerator::returning("Head");
        let (poster, _) = CountingPoster::new();
        let bot = Bot::new(store, generator, ThreadPoster::new(poster));

        let err = bot.run().await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Store(StoreError::CandidateSourceNotFound { .. })
        ));
    }
}
