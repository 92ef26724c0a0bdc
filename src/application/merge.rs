//! Merge of a fresh export with a previous one.
//!
//! Messages are matched on [`MessageKey`] (minute, sender, body hash). The
//! k-th fresh message with a key pairs with the k-th old block with that key,
//! so repeated identical messages keep their multiplicity. The walk follows
//! the fresh order:
//!
//! - a paired message emits every old block up to and including its partner,
//!   in the old rendering;
//! - an unpaired message first emits old blocks from earlier minutes and
//!   unpaired old blocks of the same minute, then itself;
//! - old blocks left at the end are appended.
//!
//! Nothing from the old transcript is ever dropped.

use std::collections::{HashMap, VecDeque};

use crate::domain::{ExportUnit, MessageKey, TranscriptBlock, TranscriptEntry};

use super::renderer::{render_block, RenderOptions};

/// Counts from one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Messages present in both, kept in their old rendering.
    pub shared: usize,
    /// Fresh messages the old export lacked.
    pub added: usize,
    /// Old blocks with no fresh counterpart, kept unchanged.
    pub retained: usize,
}

/// Key of a fresh message as it will read back from the transcript.
fn fresh_key(entry: &TranscriptEntry, opts: &RenderOptions) -> Option<MessageKey> {
    match entry {
        TranscriptEntry::Fresh(msg) => {
            TranscriptBlock::from_text(&render_block(msg, opts)).map(|b| b.key)
        }
        TranscriptEntry::Prior(block) => Some(block.key.clone()),
    }
}

/// Combine `unit` (this run) with `prior` (blocks of the previous export).
#[must_use]
pub fn merge(
    unit: ExportUnit,
    prior: Vec<TranscriptBlock>,
    opts: &RenderOptions,
) -> (ExportUnit, MergeStats) {
    let mut stats = MergeStats::default();
    if prior.is_empty() {
        stats.added = unit.entries.len();
        return (unit, stats);
    }

    let mut by_key: HashMap<&MessageKey, VecDeque<usize>> = HashMap::new();
    for (idx, block) in prior.iter().enumerate() {
        by_key.entry(&block.key).or_default().push_back(idx);
    }

    let keys: Vec<Option<MessageKey>> = unit.entries.iter().map(|e| fresh_key(e, opts)).collect();
    let mut old_paired = vec![false; prior.len()];
    let partners: Vec<Option<usize>> = keys
        .iter()
        .map(|key| {
            let idx = key
                .as_ref()
                .and_then(|k| by_key.get_mut(k))
                .and_then(VecDeque::pop_front)?;
            old_paired[idx] = true;
            Some(idx)
        })
        .collect();
    drop(by_key);

    let mut old: Vec<Option<TranscriptBlock>> = prior.into_iter().map(Some).collect();
    let mut cursor = 0;
    let mut entries = Vec::with_capacity(old.len() + unit.entries.len());

    for ((entry, key), partner) in unit.entries.into_iter().zip(keys).zip(partners) {
        if let Some(target) = partner {
            while cursor <= target {
                emit_old(&mut old, &old_paired, cursor, &mut entries, &mut stats);
                cursor += 1;
            }
            continue;
        }

        if let Some(key) = key {
            while cursor < old_paired.len() {
                let Some(block_minute) = old_minute(&old, cursor) else {
                    break;
                };
                let earlier = block_minute < key.minute;
                let same_minute_orphan = block_minute == key.minute && !old_paired[cursor];
                if !(earlier || same_minute_orphan) {
                    break;
                }
                emit_old(&mut old, &old_paired, cursor, &mut entries, &mut stats);
                cursor += 1;
            }
        }
        stats.added += 1;
        entries.push(entry);
    }

    while cursor < old_paired.len() {
        emit_old(&mut old, &old_paired, cursor, &mut entries, &mut stats);
        cursor += 1;
    }

    (
        ExportUnit {
            conversation: unit.conversation,
            entries,
        },
        stats,
    )
}

fn emit_old(
    old: &mut [Option<TranscriptBlock>],
    paired: &[bool],
    idx: usize,
    entries: &mut Vec<TranscriptEntry>,
    stats: &mut MergeStats,
) {
    if let Some(block) = old.get_mut(idx).and_then(Option::take) {
        if paired[idx] {
            stats.shared += 1;
        } else {
            stats.retained += 1;
        }
        entries.push(TranscriptEntry::Prior(block));
    }
}

fn old_minute(old: &[Option<TranscriptBlock>], idx: usize) -> Option<chrono::NaiveDateTime> {
    old.get(idx)?.as_ref().map(|b| b.key.minute)
}
