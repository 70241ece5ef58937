use std::collections::HashMap;
use std::path::PathBuf;

/// Persisted nickname -> overall win count mapping.
///
/// Snapshot failures are never fatal: an unreadable or missing file starts
/// the ledger empty, and a failed write leaves the in-memory scores
/// authoritative until the next one succeeds.
#[derive(Debug)]
pub struct ScoreLedger {
    path: PathBuf,
    scores: HashMap<String, u32>,
}

impl ScoreLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scores: HashMap::new(),
        }
    }

    /// Replace the in-memory map with the snapshot on disk, if there is one.
    pub fn load(&mut self) {
        match std::fs::read(&self.path) {
            Ok(bytes) => match bincode::deserialize(&bytes) {
                Ok(scores) => {
                    self.scores = scores;
                    tracing::info!("Loaded {} player scores", self.scores.len());
                }
                Err(e) => tracing::warn!("Ignoring unreadable score snapshot: {e}"),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Could not read score snapshot: {e}"),
        }
    }

    /// Write the whole map out.
    pub fn save(&self) {
        match bincode::serialize(&self.scores) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(&self.path, bytes) {
                    tracing::warn!("Could not write score snapshot: {e}");
                }
            }
            Err(e) => tracing::warn!("Could not encode score snapshot: {e}"),
        }
    }

    pub fn get(&self, nickname: &str) -> u32 {
        self.scores.get(nickname).copied().unwrap_or(0)
    }

    /// Make sure a newly registered player has an entry, keeping any count
    /// carried over from an earlier session.
    pub fn ensure(&mut self, nickname: &str) {
        self.scores.entry(nickname.to_owned()).or_insert(0);
    }

    pub fn increment(&mut self, nickname: &str) {
        *self.scores.entry(nickname.to_owned()).or_insert(0) += 1;
        self.save();
    }

    /// Administrative overwrite.
    pub fn set(&mut self, nickname: &str, value: u32) {
        self.scores.insert(nickname.to_owned(), value);
        self.save();
    }
}
