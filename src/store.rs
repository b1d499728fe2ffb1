/// Durable repeat counters
///
/// Holds group → period key → category → key → count in memory and writes
/// the whole document to a JSON file after every recorded repeat.
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::RwLock;

use crate::error::StoreError;
use crate::period::{self, PeriodKeys, TOTAL_KEY};

/// Metric category of a counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Users who repeated someone
    Repeaters,
    /// Users whose message got repeated
    Victims,
    /// Repeated texts
    Words,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Repeaters, Category::Victims, Category::Words];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Repeaters => "repeaters",
            Self::Victims => "victims",
            Self::Words => "words",
        }
    }

    /// Whether keys of this category are user ids (as opposed to text).
    pub fn is_user_keyed(&self) -> bool {
        !matches!(self, Self::Words)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "repeaters" | "users" => Ok(Self::Repeaters),
            "victims" => Ok(Self::Victims),
            "words" => Ok(Self::Words),
            other => Err(format!(
                "unknown category '{}', expected repeaters, victims or words",
                other
            )),
        }
    }
}

/// Counters for one (group, period key) combination.
///
/// The repeater map is stored under `users` on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    #[serde(rename = "users", default)]
    pub repeaters: BTreeMap<String, u64>,
    #[serde(default)]
    pub victims: BTreeMap<String, u64>,
    #[serde(default)]
    pub words: BTreeMap<String, u64>,
}

impl Bucket {
    pub fn is_empty(&self) -> bool {
        self.repeaters.is_empty() && self.victims.is_empty() && self.words.is_empty()
    }

    pub fn category(&self, category: Category) -> &BTreeMap<String, u64> {
        match category {
            Category::Repeaters => &self.repeaters,
            Category::Victims => &self.victims,
            Category::Words => &self.words,
        }
    }

    fn apply(&mut self, repeater: &str, victim: &str, text: &str, max_words: Option<usize>) {
        bump(&mut self.repeaters, repeater, None);
        bump(&mut self.victims, victim, None);
        bump(&mut self.words, text, max_words);
    }
}

/// Increment `key`, evicting the weakest entry first when a new key would
/// push the map past `cap`.
fn bump(counts: &mut BTreeMap<String, u64>, key: &str, cap: Option<usize>) {
    if let Some(count) = counts.get_mut(key) {
        *count = count.saturating_add(1);
        return;
    }

    if let Some(cap) = cap {
        while counts.len() >= cap.max(1) {
            // Lowest count goes first; among equals, the greatest key.
            let weakest = counts
                .iter()
                .min_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
                .map(|(k, _)| k.clone());
            match weakest {
                Some(k) => {
                    tracing::debug!("Evicting word counter '{}' (cap {})", k, cap);
                    counts.remove(&k);
                }
                None => break,
            }
        }
    }

    counts.insert(key.to_owned(), 1);
}

type GroupData = BTreeMap<String, Bucket>;

/// On-disk document: group id → period key → bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreData {
    pub groups: BTreeMap<String, GroupData>,
}

/// Per-group overview used by the status command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    pub group_id: String,
    pub buckets: usize,
    pub total_repeats: u64,
}

struct State {
    data: StoreData,
    /// Memory holds increments not yet on disk
    dirty: bool,
}

/// Repeat counters with write-through JSON persistence.
///
/// A single lock guards the document and is held through the flush, so
/// the file always reflects a state that existed in memory.
pub struct AggregateStore {
    path: PathBuf,
    max_words_per_bucket: Option<usize>,
    state: RwLock<State>,
}

impl AggregateStore {
    /// Load the store from `path`. A missing file yields an empty store; an
    /// unreadable or unparsable one is an error.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<StoreData>(&content).map_err(|source| {
                StoreError::Corrupt {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("No store file at {}, starting empty", path.display());
                StoreData::default()
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.clone(),
                    source,
                })
            }
        };

        tracing::info!(
            "Loaded repeat store from {} ({} groups)",
            path.display(),
            data.groups.len()
        );

        Ok(Self {
            path,
            max_words_per_bucket: None,
            state: RwLock::new(State { data, dirty: false }),
        })
    }

    /// Cap the number of distinct words kept per bucket.
    pub fn with_max_words_per_bucket(mut self, cap: Option<usize>) -> Self {
        self.max_words_per_bucket = cap;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply one repeat event to all four period buckets, then flush.
    ///
    /// On a flush failure the increments stay in memory, the store is marked
    /// dirty and the error is returned; the next successful flush writes them.
    pub fn record(
        &self,
        group_id: i64,
        keys: &PeriodKeys,
        repeater_id: i64,
        victim_id: i64,
        text: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;

        let repeater = repeater_id.to_string();
        let victim = victim_id.to_string();
        let group = state.data.groups.entry(group_id.to_string()).or_default();
        for key in keys.iter() {
            group
                .entry(key.to_string())
                .or_default()
                .apply(&repeater, &victim, text, self.max_words_per_bucket);
        }
        state.dirty = true;

        tracing::debug!(
            "Recorded repeat in group {}: {} repeated {} ({:?})",
            group_id,
            repeater_id,
            victim_id,
            text
        );

        self.flush_locked(&mut state)
    }

    /// Write the current state to disk if anything is pending.
    pub fn flush(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        if !state.dirty {
            return Ok(());
        }
        self.flush_locked(&mut state)
    }

    pub fn is_dirty(&self) -> bool {
        self.state.read().map(|s| s.dirty).unwrap_or(true)
    }

    /// Read-only copy of one bucket; empty when nothing was recorded there.
    pub fn snapshot(&self, group_id: i64, period_key: &str) -> Result<Bucket, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state
            .data
            .groups
            .get(&group_id.to_string())
            .and_then(|group| group.get(period_key))
            .cloned()
            .unwrap_or_default())
    }

    /// Copy of the whole document.
    pub fn data(&self) -> Result<StoreData, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.data.clone())
    }

    /// Overview of every stored group, ordered by group id.
    pub fn summary(&self) -> Result<Vec<GroupSummary>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state
            .data
            .groups
            .iter()
            .map(|(group_id, periods)| GroupSummary {
                group_id: group_id.clone(),
                buckets: periods.len(),
                total_repeats: periods
                    .get(TOTAL_KEY)
                    .map(|bucket| bucket.repeaters.values().sum())
                    .unwrap_or(0),
            })
            .collect())
    }

    /// Drop day and month buckets whose period ended before `cutoff`, then
    /// flush. `total` and year buckets are kept. Returns the number of
    /// buckets removed.
    pub fn prune_before(&self, cutoff: NaiveDate) -> Result<usize, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;

        let mut removed = 0;
        for periods in state.data.groups.values_mut() {
            let before = periods.len();
            periods.retain(|key, _| match period::period_end(key) {
                Some(end) => end >= cutoff,
                None => true,
            });
            removed += before - periods.len();
        }

        if removed == 0 {
            return Ok(0);
        }

        tracing::info!("Pruned {} buckets closed before {}", removed, cutoff);
        state.dirty = true;
        self.flush_locked(&mut state)?;
        Ok(removed)
    }

    fn flush_locked(&self, state: &mut State) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&state.data)?;
        match write_atomic(&self.path, &json) {
            Ok(()) => {
                state.dirty = false;
                Ok(())
            }
            Err(source) => {
                tracing::error!(
                    "Failed to persist repeat store to {}: {}",
                    self.path.display(),
                    source
                );
                Err(StoreError::Persist {
                    path: self.path.clone(),
                    source,
                })
            }
        }
    }
}

/// Replace `path` with `content` via a sibling temp file and rename.
fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut tmp_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "store".into());
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp_path, path)
}
