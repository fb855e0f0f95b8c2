//! Per-course learning progress, persisted as a flat string map.
//!
//! Keys per course:
//!
//! - `course-{id}-progress`: integer percent, 0..=100
//! - `course-{id}-position`: playback position in seconds
//! - `course-{id}-watch-time`: accumulated forward playback in seconds
//!
//! Values that are missing or do not parse read as 0. Writes go to disk
//! best effort: a failed flush is logged and the in-memory value kept.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::RwLock;

use college_types::CourseId;

use crate::mint::COMPLETE_PROGRESS;

const PROGRESS_FILE: &str = "progress.json";

fn progress_key(course_id: CourseId) -> String {
    format!("course-{}-progress", course_id)
}

fn position_key(course_id: CourseId) -> String {
    format!("course-{}-position", course_id)
}

fn watch_time_key(course_id: CourseId) -> String {
    format!("course-{}-watch-time", course_id)
}

/// Default storage directory: `$COLLEGE_STORAGE_DIR`, else `~/.web3-college`.
pub fn default_storage_dir() -> PathBuf {
    std::env::var("COLLEGE_STORAGE_DIR")
        .ok()
        .filter(|dir| !dir.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".web3-college")
        })
}

pub struct ProgressStore {
    path: Option<PathBuf>,
    values: RwLock<BTreeMap<String, String>>,
}

impl ProgressStore {
    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: RwLock::new(BTreeMap::new()),
        }
    }

    /// Open (or start) `progress.json` under `dir`.
    ///
    /// A missing file is an empty store. A corrupt file is logged and
    /// treated as empty.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create storage dir {}", dir.display()))?;
        let path = dir.join(PROGRESS_FILE);
        let values = if path.exists() {
            let json = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable progress file");
                BTreeMap::new()
            })
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: Some(path),
            values: RwLock::new(values),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::open(&default_storage_dir())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: impl ToString) {
        self.values.write().insert(key.to_string(), value.to_string());
        if let Err(e) = self.flush() {
            tracing::warn!(key, error = %e, "failed to persist progress");
        }
    }

    fn get_f64(&self, key: &str) -> f64 {
        self.get(key)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }

    /// Write the whole map to disk.
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&*self.values.read())?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn progress(&self, course_id: CourseId) -> u8 {
        self.get(&progress_key(course_id))
            .and_then(|v| v.trim().parse::<u8>().ok())
            .map(|p| p.min(COMPLETE_PROGRESS))
            .unwrap_or(0)
    }

    pub fn position(&self, course_id: CourseId) -> f64 {
        self.get_f64(&position_key(course_id))
    }

    pub fn watch_time(&self, course_id: CourseId) -> f64 {
        self.get_f64(&watch_time_key(course_id))
    }

    pub fn is_complete(&self, course_id: CourseId) -> bool {
        self.progress(course_id) >= COMPLETE_PROGRESS
    }

    /// Account for playback reaching `current_time` of a `duration`-second video.
    ///
    /// Returns the stored progress afterwards.
    pub fn record_playback(&self, course_id: CourseId, current_time: f64, duration: f64) -> u8 {
        let complete = self.is_complete(course_id);
        if !complete {
            let delta = current_time - self.position(course_id);
            if delta > 0.0 {
                let watched = self.watch_time(course_id) + delta;
                self.set(&watch_time_key(course_id), watched);
            }
        }
        self.set(&position_key(course_id), current_time);

        if complete || duration <= 0.0 || !duration.is_finite() {
            return self.progress(course_id);
        }
        let ratio = self.watch_time(course_id) / duration * 100.0;
        let computed = ratio.round().clamp(0.0, COMPLETE_PROGRESS as f64) as u8;
        if computed > self.progress(course_id) {
            tracing::debug!(course_id, progress = computed, "progress advanced");
            self.set(&progress_key(course_id), computed);
        }
        self.progress(course_id)
    }

    /// Playback reached the end.
    pub fn mark_complete(&self, course_id: CourseId) {
        self.set(&position_key(course_id), 0);
        self.set(&progress_key(course_id), COMPLETE_PROGRESS);
    }

    /// Playback restarted from zero.
    pub fn restart(&self, course_id: CourseId) {
        self.set(&position_key(course_id), 0);
        if !self.is_complete(course_id) {
            self.set(&watch_time_key(course_id), 0);
        }
    }
}
