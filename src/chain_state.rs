//! [E] `LocalChainState`: mutable, rollback-capable history of
//! [`ChainStateAt`] values (§4.E). Single writer, many readers.

use std::collections::VecDeque;

use parking_lot::Mutex;
use thiserror::Error;

use crate::tx::{ChainPoint, ChainSlot, UTxO};

/// The Head-relevant UTxO slice at a given chain point.
///
/// `recorded_at` is `None` only for the genesis/initial state (§3).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChainStateAt {
    /// Thread/commit/initial outputs known at this point.
    pub utxo: UTxO,
    /// The chain point this state was recorded at, or `None` for genesis.
    pub recorded_at: Option<ChainPoint>,
}

impl ChainStateAt {
    /// The genesis state: empty UTxO, no recorded point.
    pub fn genesis() -> Self {
        ChainStateAt {
            utxo: UTxO::new(),
            recorded_at: None,
        }
    }

    fn slot(&self) -> Option<ChainSlot> {
        self.recorded_at.map(|p| p.slot)
    }
}

/// An ordered, non-empty sequence of [`ChainStateAt`], newest last.
///
/// Invariant: slots strictly increasing; the tail is the current state; the
/// head is a pinned safety anchor that is never rolled past (§3).
#[derive(Debug, Clone)]
pub struct ChainStateHistory {
    entries: VecDeque<ChainStateAt>,
}

impl ChainStateHistory {
    /// Start a new history anchored at `anchor`.
    pub fn new(anchor: ChainStateAt) -> Self {
        ChainStateHistory {
            entries: VecDeque::from([anchor]),
        }
    }

    /// The current (newest) state.
    pub fn current(&self) -> &ChainStateAt {
        self.entries.back().expect("history is never empty")
    }

    /// The pinned safety anchor (oldest entry).
    pub fn anchor(&self) -> &ChainStateAt {
        self.entries.front().expect("history is never empty")
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &ChainStateAt> {
        self.entries.iter()
    }
}

/// Error returned by [`LocalChainState::push_new`] when the pushed state does
/// not strictly advance the current slot.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("pushed chain state does not strictly advance past the current slot")]
pub struct NonMonotonicPush;

/// [E] `LocalChainState`: the single owner of the current
/// [`ChainStateHistory`] (§4.E, §9 design note "global mutable state").
///
/// All operations are atomic with respect to each other; the underlying
/// container is never exposed, only the four operations below.
pub struct LocalChainState {
    history: Mutex<ChainStateHistory>,
}

impl LocalChainState {
    /// Start tracking from `anchor` (typically [`ChainStateAt::genesis`] or a
    /// state recovered from the persisted layout of §6).
    pub fn new(anchor: ChainStateAt) -> Self {
        LocalChainState {
            history: Mutex::new(ChainStateHistory::new(anchor)),
        }
    }

    /// The current (newest) state.
    pub fn get_latest(&self) -> ChainStateAt {
        self.history.lock().current().clone()
    }

    /// Push a new state. Errors if `state` has no recorded slot, or if it
    /// does not strictly exceed the current slot. The very first push after
    /// genesis (whose slot is `None`) is always accepted, since genesis has
    /// nothing to compare against.
    pub fn push_new(&self, state: ChainStateAt) -> Result<(), NonMonotonicPush> {
        let mut history = self.history.lock();
        let current_slot = history.current().slot();
        let new_slot = state.slot().ok_or(NonMonotonicPush)?;
        match current_slot {
            Some(cur) if new_slot <= cur => Err(NonMonotonicPush),
            _ => {
                history.entries.push_back(state);
                Ok(())
            }
        }
    }

    /// Drop every entry with slot greater than `to_slot`; the last
    /// remaining entry becomes current and is returned.
    ///
    /// If `to_slot` predates the pinned anchor, the anchor is returned
    /// unchanged — the caller treats this as a hard rollback limit (§4.E).
    /// Idempotent: rolling back twice to the same slot returns the same
    /// state both times (§8 property 5).
    pub fn rollback(&self, to_slot: ChainSlot) -> ChainStateAt {
        let mut history = self.history.lock();
        if history.anchor().slot().map_or(false, |anchor_slot| to_slot < anchor_slot) {
            return history.anchor().clone();
        }
        while history.entries.len() > 1 {
            let newest_slot = history
                .entries
                .back()
                .expect("non-empty")
                .slot()
                .expect("non-genesis entries always have a slot");
            if newest_slot <= to_slot {
                break;
            }
            history.entries.pop_back();
        }
        history.current().clone()
    }

    /// A snapshot of the full history, oldest first.
    pub fn history(&self) -> ChainStateHistory {
        self.history.lock().clone()
    }
}
