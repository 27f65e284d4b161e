//! Score sink with a local leaderboard
//!
//! Tracks the running score of the current session and keeps the top 10
//! final scores. Persisted to LocalStorage on web.

use serde::{Deserialize, Serialize};

use crate::sim::ScoreSink;

/// Maximum number of final scores to keep
pub const MAX_HIGH_SCORES: usize = 10;

/// A finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub score: u64,
    /// Session seed, so a run can be replayed
    pub seed: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreBoard {
    /// Sorted descending by score
    pub entries: Vec<ScoreEntry>,
    /// Seed of the session currently being scored
    #[serde(skip)]
    seed: u64,
    #[serde(skip)]
    running: u64,
    #[serde(skip)]
    finished: Option<u64>,
    #[serde(skip)]
    last_rank: Option<usize>,
}

impl ScoreBoard {
    /// LocalStorage key (used only in wasm32)
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "orb_merge_scores";

    pub fn new() -> Self {
        Self::default()
    }

    /// Start scoring a new session; the leaderboard is kept
    pub fn begin(&mut self, seed: u64) {
        self.seed = seed;
        self.running = 0;
        self.finished = None;
        self.last_rank = None;
    }

    pub fn running(&self) -> u64 {
        self.running
    }

    /// Final score of the current session, once it is over
    pub fn finished(&self) -> Option<u64> {
        self.finished
    }

    /// Rank the last final score achieved (1-indexed)
    pub fn last_rank(&self) -> Option<usize> {
        self.last_rank
    }

    /// Best score on the board
    pub fn best(&self) -> Option<u64> {
        self.entries.first().map(|e| e.score)
    }

    /// Check if a score would make the board
    pub fn qualifies(&self, score: u64) -> bool {
        if score == 0 {
            return false;
        }
        if self.entries.len() < MAX_HIGH_SCORES {
            return true;
        }
        self.entries.last().is_none_or(|e| score > e.score)
    }

    /// Insert a score if it qualifies; returns the rank achieved
    pub fn add_score(&mut self, score: u64, seed: u64) -> Option<usize> {
        if !self.qualifies(score) {
            return None;
        }
        let entry = ScoreEntry { score, seed };
        // Ties go below existing entries
        let rank = match self.entries.iter().position(|e| score > e.score) {
            Some(i) => {
                self.entries.insert(i, entry);
                i + 1
            }
            None => {
                self.entries.push(entry);
                self.entries.len()
            }
        };
        self.entries.truncate(MAX_HIGH_SCORES);
        Some(rank)
    }

    /// Load the leaderboard from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage
            && let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY)
            && let Ok(board) = serde_json::from_str::<ScoreBoard>(&json)
        {
            log::info!("Loaded {} scores", board.entries.len());
            return board;
        }

        log::info!("No scores found, starting fresh");
        Self::new()
    }

    /// Save the leaderboard to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage
            && let Ok(json) = serde_json::to_string(self)
        {
            let _ = storage.set_item(Self::STORAGE_KEY, &json);
            log::info!("Scores saved ({} entries)", self.entries.len());
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::new()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}

impl ScoreSink for ScoreBoard {
    fn on_score_delta(&mut self, points: u64) {
        if self.finished.is_some() {
            log::warn!("score delta {} after game over ignored", points);
            return;
        }
        self.running += points;
    }

    fn on_game_over(&mut self, final_score: u64) {
        if self.finished.is_some() {
            log::warn!("duplicate game over ({}) ignored", final_score);
            return;
        }
        if final_score != self.running {
            log::warn!(
                "final score {} differs from running total {}",
                final_score,
                self.running
            );
        }
        self.finished = Some(final_score);
        self.last_rank = self.add_score(final_score, self.seed);
        self.save();
    }
}
