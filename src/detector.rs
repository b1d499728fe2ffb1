//! Repeat detection: one "last message" slot per group.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Most recent non-empty message seen in a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastMessage {
    pub text: String,
    pub author_id: i64,
}

/// Result of classifying one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NotRepeat,
    /// Same text as the previous message, different author.
    /// `victim_id` is the author of that previous message.
    Repeat { victim_id: i64 },
}

/// Volatile per-group memory of the previous message.
///
/// Slots live in a sharded map: classifying for different groups only
/// contends when they hash to the same shard, and calls for the same group
/// are serialized by the entry lock.
#[derive(Debug, Default)]
pub struct RepeatDetector {
    slots: DashMap<i64, LastMessage>,
}

impl RepeatDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a message and advance the group's slot.
    ///
    /// Empty text never repeats and leaves the slot untouched. Every other
    /// message replaces the slot, whether or not it was a repeat, so in a
    /// chain the victim is always the immediately preceding author.
    pub fn classify(&self, group_id: i64, user_id: i64, text: &str) -> Outcome {
        if text.trim().is_empty() {
            return Outcome::NotRepeat;
        }

        match self.slots.entry(group_id) {
            Entry::Occupied(mut entry) => {
                let last = entry.get_mut();
                let outcome = if last.text == text && last.author_id != user_id {
                    Outcome::Repeat {
                        victim_id: last.author_id,
                    }
                } else {
                    Outcome::NotRepeat
                };
                if last.text != text {
                    last.text = text.to_owned();
                }
                last.author_id = user_id;
                outcome
            }
            Entry::Vacant(entry) => {
                entry.insert(LastMessage {
                    text: text.to_owned(),
                    author_id: user_id,
                });
                Outcome::NotRepeat
            }
        }
    }

    /// Current slot for a group, if any message was seen since start.
    pub fn last_message(&self, group_id: i64) -> Option<LastMessage> {
        self.slots.get(&group_id).map(|slot| slot.value().clone())
    }
}
