use std::collections::HashSet;
use std::path::PathBuf;

use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use famebot_core::{CoreError, StoreError, Subject};


/// Row shape for the candidate CSV. Only the `Name` column is read;
/// extra columns are ignored.
#[derive(Debug, Deserialize)]
struct CandidateRecord {
    #[serde(rename = "Name")]
    name: String,
}

/// Flat-file store of candidate subjects plus the append-only log of
/// subjects the bot has already posted about.
///
/// Both files are re-read on every call, so edits made between runs are
/// picked up without restarting anything. The store assumes one bot
/// invocation at a time; nothing guards the log file against concurrent
/// writers.
#[derive(Debug, Clone)]
pub struct CandidateStore {
    candidates_path: PathBuf,
    log_path: PathBuf,
}

impl CandidateStore {
    pub fn new(candidates_path: impl Into<PathBuf>, log_path: impl Into<PathBuf>) -> Self {
        Self {
            candidates_path: candidates_path.into(),
            log_path: log_path.into(),
        }
    }

    /// Pick one subject uniformly at random among the candidates that do
    /// not yet appear in the processed log.
    ///
    /// Returns `Ok(None)` once every candidate has been covered. This is
    /// a pure read: the log is only written by `mark_processed`, after a
    /// thread has actually been posted.
    pub async fn pick_unprocessed(&self) -> Result<Option<Subject>, CoreError> {
        let candidates = self.load_candidates().await?;
        let processed = self.load_processed().await?;

        let mut available: Vec<Subject> = candidates
            .into_iter()
            .filter(|subject| !processed.contains(&subject.name))
            .collect();

        debug!(
            "{} candidates available after filtering {} processed names",
            available.len(),
            processed.len()
        );

        if available.is_empty() {
            return Ok(None);
        }

        let index = fastrand::usize(..available.len());
        Ok(Some(available.swap_remove(index)))
    }

    /// Append the subject's name to the processed log, creating the file
    /// on first use. Names are matched exactly (case-sensitive) when the
    /// log is read back, and membership is set semantics, so a duplicate
    /// line is harmless.
    pub async fn mark_processed(&self, subject: &Subject) -> Result<(), CoreError> {
        let mut log = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await?;
        log.write_all(format!("{}\n", subject.name).as_bytes())
            .await?;

        info!(
            "Marked {} as processed in {}",
            subject.name,
            self.log_path.display()
        );
        Ok(())
    }

    async fn load_candidates(&self) -> Result<Vec<Subject>, CoreError> {
        let bytes = match tokio::fs::read(&self.candidates_path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::CandidateSourceNotFound {
                    path: self.candidates_path.display().to_string(),
                }
                .into());
            }
            Err(err) => return Err(err.into()),
        };

        let mut reader = csv::Reader::from_reader(bytes.as_slice());

        // Checked up front so a header-only file still gets the typed
        // error instead of silently yielding zero candidates.
        let headers = reader.headers().map_err(StoreError::from)?.clone();
        if !headers.iter().any(|column| column == "Name") {
            return Err(StoreError::MissingNameColumn {
                path: self.candidates_path.display().to_string(),
            }
            .into());
        }

        let mut candidates = Vec::new();
        for record in reader.deserialize::<CandidateRecord>() {
            let record = record.map_err(StoreError::from)?;
            candidates.push(Subject::new(record.name));
        }

        debug!(
            "Loaded {} candidates from {}",
            candidates.len(),
            self.candidates_path.display()
        );
        Ok(candidates)
    }

    async fn load_processed(&self) -> Result<HashSet<String>, CoreError> {
        match tokio::fs::read_to_string(&self.log_path).await {
            Ok(contents) => Ok(contents.lines().map(str::to_string).collect()),
            // A log that does not exist yet simply means nothing has been
            // posted so far.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(HashSet::new()),
            Err(err) => Err(err.into()),
        }
    }
}
