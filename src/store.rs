//! Persistent record of links that were already delivered.
//!
//! The record is a plain UTF-8 text file with one URL per line. It is read once
//! at the start of a cycle and rewritten once at the end; a missing file is the
//! normal first-run state, not an error.
//!
//! Writes go to a sibling `*.tmp` file that is then renamed over the record, so
//! an interrupted write leaves the previous record intact.

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Links already delivered, in the order they were first recorded.
///
/// Membership is exact string equality. Links are only ever added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentSet {
    order: Vec<String>,
    members: HashSet<String>,
}

impl SentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, link: &str) -> bool {
        self.members.contains(link)
    }

    /// Add a link; returns `false` if it was already present.
    pub fn insert(&mut self, link: impl Into<String>) -> bool {
        let link = link.into();
        if self.members.contains(&link) {
            return false;
        }
        self.members.insert(link.clone());
        self.order.push(link);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Parse the record format: one link per line, trimmed, blanks ignored.
    pub fn from_record(text: &str) -> Self {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// Render the record format: every link followed by a newline.
    pub fn to_record(&self) -> String {
        let mut out = String::new();
        for link in self.iter() {
            out.push_str(link);
            out.push('\n');
        }
        out
    }
}

impl<S: Into<String>> FromIterator<S> for SentSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = SentSet::new();
        set.extend(iter);
        set
    }
}

impl<S: Into<String>> Extend<S> for SentSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for link in iter {
            self.insert(link);
        }
    }
}

/// File-backed storage for a [`SentSet`].
#[derive(Debug, Clone)]
pub struct SentStore {
    path: PathBuf,
}

impl SentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the record, returning an empty set if the file does not exist yet.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub async fn load(&self) -> Result<SentSet, StoreError> {
        match fs::read_to_string(&self.path).await {
            Ok(text) => {
                let set = SentSet::from_record(&text);
                info!(count = set.len(), "Loaded sent links");
                Ok(set)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No sent-links record yet; starting empty");
                Ok(SentSet::new())
            }
            Err(source) => Err(StoreError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Overwrite the record with `set`.
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    pub async fn save(&self, set: &SentSet) -> Result<(), StoreError> {
        let tmp = self.tmp_path();
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        let written = match fs::write(&tmp, set.to_record()).await {
            Ok(()) => fs::rename(&tmp, &self.path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            // A partial temp file must not outlive a failed save.
            let _ = fs::remove_file(&tmp).await;
            return Err(write_err(e));
        }

        info!(count = set.len(), "Saved sent links");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
