//! Personal ratings persisted across sessions.
//!
//! The whole rating map lives in a single named record. Every read reloads
//! the record and every write rewrites it, so edits made by another writer
//! between two calls are picked up instead of clobbered.

use crate::error::VoteError;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

pub const VOTE_RECORD: &str = "movie_votes";
pub const STAR_COUNT: usize = 5;

/// A personal rating: an even integer in 2..=10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Score(u8);

impl Score {
    pub const ALL: [Score; STAR_COUNT] = [Score(2), Score(4), Score(6), Score(8), Score(10)];

    /// Zero-based star position to score: index 2 is a 6.
    pub fn from_star_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn filled_stars(self) -> usize {
        usize::from(self.0 / 2)
    }

    pub fn description(self) -> &'static str {
        match self.0 {
            2 => "최악이예요",
            4 => "별로예요",
            6 => "보통이에요",
            8 => "재미있어요",
            _ => "명작이에요",
        }
    }
}

impl TryFrom<u8> for Score {
    type Error = VoteError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (2..=10).contains(&value) && value % 2 == 0 {
            Ok(Score(value))
        } else {
            Err(VoteError::InvalidScore(value))
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whole-record key/value persistence.
pub trait RecordStorage: Send + Sync {
    fn read(&self, name: &str) -> Result<Option<String>, VoteError>;
    fn write(&self, name: &str, contents: &str) -> Result<(), VoteError>;
}

/// Stores each record as `<dir>/<name>.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

impl RecordStorage for FileStorage {
    fn read(&self, name: &str) -> Result<Option<String>, VoteError> {
        match fs::read_to_string(self.path(name)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, name: &str, contents: &str) -> Result<(), VoteError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(name);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-process storage, shared by clones.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    records: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStorage for MemoryStorage {
    fn read(&self, name: &str) -> Result<Option<String>, VoteError> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(name).cloned())
    }

    fn write(&self, name: &str, contents: &str) -> Result<(), VoteError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.insert(name.to_string(), contents.to_string());
        Ok(())
    }
}

#[derive(Clone)]
pub struct VoteStore {
    storage: Arc<dyn RecordStorage>,
    record: String,
}

impl fmt::Debug for VoteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoteStore")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

impl VoteStore {
    pub fn new(storage: Arc<dyn RecordStorage>) -> Self {
        Self::with_record(storage, VOTE_RECORD)
    }

    pub fn with_record(storage: Arc<dyn RecordStorage>, record: impl Into<String>) -> Self {
        Self {
            storage,
            record: record.into(),
        }
    }

    /// Current rating for a movie. Unreadable or malformed records count as unrated.
    pub fn get(&self, movie_id: i32) -> Option<Score> {
        let votes = match self.load() {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to read vote record '{}': {}", self.record, e);
                return None;
            }
        };
        let raw = votes.get(&movie_id.to_string()).copied()?;
        match Score::try_from(raw) {
            Ok(score) => Some(score),
            Err(_) => {
                warn!(movie_id, raw, "Ignoring out-of-range stored score");
                None
            }
        }
    }

    pub fn set(&self, movie_id: i32, score: Score) -> Result<(), VoteError> {
        let mut votes = self.load()?;
        votes.insert(movie_id.to_string(), score.value());
        let serialized = serde_json::to_string(&votes)?;
        self.storage.write(&self.record, &serialized)?;
        info!(movie_id, score = score.value(), "Saved vote");
        Ok(())
    }

    /// Full map as currently persisted, keyed by stringified movie id.
    pub fn all(&self) -> BTreeMap<String, u8> {
        self.load().unwrap_or_default()
    }

    fn load(&self) -> Result<BTreeMap<String, u8>, VoteError> {
        let Some(contents) = self.storage.read(&self.record)? else {
            return Ok(BTreeMap::new());
        };
        match serde_json::from_str(&contents) {
            Ok(votes) => Ok(votes),
            Err(e) => {
                warn!(
                    "Vote record '{}' is malformed, treating as empty: {}",
                    self.record, e
                );
                debug!(contents = %contents, "Malformed vote record");
                Ok(BTreeMap::new())
            }
        }
    }
}
