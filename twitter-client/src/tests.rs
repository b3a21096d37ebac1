use std::sync::{Arc, Mutex};

use famebot_core::{CoreError, TwitterApiError};

use crate::{PostClient, ThreadPoster, Tweet, TweetId};

#[derive(Debug, Clone, PartialEq)]
struct RecordedCall {
    text: String,
    in_reply_to: Option<String>,
}

type CallLog = Arc<Mutex<Vec<RecordedCall>>>;

/// Scripted poster that records every call and can fail at one position.
struct ScriptedPoster {
    calls: CallLog,
    fail_at: Option<usize>,
}

impl ScriptedPoster {
    fn new() -> (Self, CallLog) {
        Self::failing_at(None)
    }

    fn failing_at(position: impl Into<Option<usize>>) -> (Self, CallLog) {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        let poster = Self {
            calls: calls.clone(),
            fail_at: position.into(),
        };
        (poster, calls)
    }
}

impl PostClient for ScriptedPoster {
    async fn create_tweet(
        &self,
        text: &str,
        in_reply_to: Option<&TweetId>,
    ) -> Result<Tweet, CoreError> {
        let mut calls = self.calls.lock().unwrap();
        let position = calls.len();
        calls.push(RecordedCall {
            text: text.to_string(),
            in_reply_to: in_reply_to.map(|id| id.0.clone()),
        });

        if self.fail_at == Some(position) {
            return Err(CoreError::TwitterApi(TwitterApiError::Forbidden {
                detail: "You are not allowed to create a Tweet with duplicate content.".to_string(),
            }));
        }

        Ok(Tweet {
            id: TweetId(format!("tweet-{}", position)),
            text: text.to_string(),
        })
    }
}

fn recorded(calls: &CallLog) -> Vec<RecordedCall> {
    calls.lock().unwrap().clone()
}

#[test]
fn test_thread_posting() {
    let (scripted, _calls) = ScriptedPoster::new();
    let poster = ThreadPoster::new(scripted);

    let ids = tokio_test::block_on(
        poster.post_thread("How Emma Stone Rose to Fame#Did you know...#Fun fact: ..."),
    )
    .expect("thread posted");

    assert_eq!(
        ids,
        vec![
            TweetId("tweet-0".to_string()),
            TweetId("tweet-1".to_string()),
            TweetId("tweet-2".to_string()),
        ]
    );
}

#[test]
fn test_segments_reply_to_previous() {
    let (scripted, calls) = ScriptedPoster::new();
    let poster = ThreadPoster::new(scripted);

    tokio_test::block_on(poster.post_thread("Head#Body#Fact")).expect("thread posted");

    let calls = recorded(&calls);
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].text, "Head");
    assert_eq!(calls[0].in_reply_to, None);
    assert_eq!(calls[1].text, "Body");
    assert_eq!(calls[1].in_reply_to, Some("tweet-0".to_string()));
    assert_eq!(calls[2].text, "Fact");
    assert_eq!(calls[2].in_reply_to, Some("tweet-1".to_string()));
}

#[test]
fn test_single_segment_thread() {
    let (scripted, calls) = ScriptedPoster::new();
    let poster = ThreadPoster::new(scripted);

    let ids = tokio_test::block_on(poster.post_thread("Just one post, no separators"))
        .expect("thread posted");

    assert_eq!(ids.len(), 1);
    assert_eq!(recorded(&calls)[0].in_reply_to, None);
}

#[test]
fn test_empty_segments_preserved() {
    let (scripted, calls) = ScriptedPoster::new();
    let poster = ThreadPoster::new(scripted);

    tokio_test::block_on(poster.post_thread("#Body#")).expect("thread posted");

    let texts: Vec<String> = recorded(&calls).into_iter().map(|call| call.text).collect();
    assert_eq!(texts, vec!["", "Body", ""]);
}

#[test]
fn test_failure_stops_thread() {
    let (scripted, calls) = ScriptedPoster::failing_at(1);
    let poster = ThreadPoster::new(scripted);

    let err = tokio_test::block_on(poster.post_thread("Head#Body#Fact")).unwrap_err();

    assert!(matches!(
        err,
        CoreError::TwitterApi(TwitterApiError::Forbidden { .. })
    ));

    // The failing segment was attempted, the one after it never was.
    let calls = recorded(&calls);
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].text, "Body");
}

#[test]
fn test_first_segment_failure() {
    let (scripted, calls) = ScriptedPoster::failing_at(0);
    let poster = ThreadPoster::new(scripted);

    let err = tokio_test::block_on(poster.post_thread("Head#Body")).unwrap_err();

    assert!(matches!(err, CoreError::TwitterApi(_)));
    assert_eq!(recorded(&calls).len(), 1);
}
