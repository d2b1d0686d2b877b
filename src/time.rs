//! [A] `TimeHandle`: bidirectional slot/UTC conversion backed by a cached
//! era-history summary (§4.A).

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::tx::ChainSlot;

/// Wall-clock time, represented as milliseconds since the Unix epoch so it
/// round-trips exactly through the CBOR/JSON boundaries without floating
/// point drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct UtcTime(pub i64);

impl UtcTime {
    /// `UtcTime` for "now", per the host clock.
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        UtcTime(since_epoch.as_millis() as i64)
    }

    /// Add a duration, in seconds, returning a new `UtcTime`.
    pub fn plus_secs(self, secs: u64) -> Self {
        UtcTime(self.0 + secs as i64 * 1000)
    }
}

/// One era boundary: the slot/time pair at which an era starts, plus the
/// era's slot length and the number of slots in it (`None` for the final,
/// open-ended era).
#[derive(Debug, Clone, Copy)]
pub struct EraBound {
    /// First slot of this era.
    pub start_slot: ChainSlot,
    /// Wall-clock time of `start_slot`.
    pub start_time: UtcTime,
    /// Slot length within this era.
    pub slot_length_ms: u64,
    /// Number of slots in this era, or `None` if it is still ongoing (the horizon).
    pub slot_count: Option<u64>,
}

/// A cached era-history summary, as would be fetched from the node's local
/// state query protocol. Read-only once loaded (§3): a stale handle must be
/// replaced, never mutated, by acquiring a fresh one (§4.A).
#[derive(Debug, Clone)]
pub struct EraHistory {
    bounds: Arc<Vec<EraBound>>,
}

/// Time conversion failed because the requested point fell outside the
/// interpretable window of the cached era history.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("past horizon: requested point is outside the interpretable era-history window")]
pub struct PastHorizon;

impl EraHistory {
    /// Build a history from a list of era bounds, oldest first.
    pub fn new(bounds: Vec<EraBound>) -> Self {
        EraHistory {
            bounds: Arc::new(bounds),
        }
    }

    fn era_for_slot(&self, slot: ChainSlot) -> Option<&EraBound> {
        self.bounds
            .iter()
            .rev()
            .find(|era| era.start_slot <= slot)
    }

    fn era_for_time(&self, time: UtcTime) -> Option<&EraBound> {
        self.bounds
            .iter()
            .rev()
            .find(|era| era.start_time <= time)
    }

    /// Convert a slot to UTC time, failing with [`PastHorizon`] if `slot`
    /// falls beyond the last era's known slot count.
    pub fn slot_to_utc(&self, slot: ChainSlot) -> Result<UtcTime, PastHorizon> {
        let era = self.era_for_slot(slot).ok_or(PastHorizon)?;
        if let Some(count) = era.slot_count {
            if slot.0 >= era.start_slot.0 + count {
                return Err(PastHorizon);
            }
        }
        let delta_slots = slot.0 - era.start_slot.0;
        let delta_ms = delta_slots * era.slot_length_ms;
        Ok(UtcTime(era.start_time.0 + delta_ms as i64))
    }

    /// Convert a UTC time to the slot containing it, failing with
    /// [`PastHorizon`] if `time` precedes the first era or is beyond the
    /// known horizon of the last one.
    pub fn slot_from_utc(&self, time: UtcTime) -> Result<ChainSlot, PastHorizon> {
        let era = self.era_for_time(time).ok_or(PastHorizon)?;
        if time < era.start_time {
            return Err(PastHorizon);
        }
        let delta_ms = (time.0 - era.start_time.0) as u64;
        let delta_slots = delta_ms / era.slot_length_ms;
        if let Some(count) = era.slot_count {
            if delta_slots >= count {
                return Err(PastHorizon);
            }
        }
        Ok(ChainSlot(era.start_slot.0 + delta_slots))
    }
}

/// Bidirectional slot/UTC conversion handle (§4.A).
///
/// A fresh `TimeHandle` must be acquired (cheaply — it is an `Arc` clone of
/// the cached [`EraHistory`]) before each user-visible time computation so a
/// stale cache can never silently produce a wrong deadline; see the callers
/// in [`crate::poster`] and [`crate::chain_sync`].
#[derive(Debug, Clone)]
pub struct TimeHandle {
    history: EraHistory,
    now: UtcTime,
}

impl TimeHandle {
    /// Acquire a fresh handle from the given era history, anchored at `now`.
    pub fn acquire(history: EraHistory, now: UtcTime) -> Self {
        TimeHandle { history, now }
    }

    /// The slot and UTC time corresponding to "now".
    pub fn current_point_in_time(&self) -> Result<(ChainSlot, UtcTime), PastHorizon> {
        let slot = self.history.slot_from_utc(self.now)?;
        Ok((slot, self.now))
    }

    /// Convert a UTC time to a slot.
    pub fn slot_from_utc(&self, t: UtcTime) -> Result<ChainSlot, PastHorizon> {
        self.history.slot_from_utc(t)
    }

    /// Convert a slot to a UTC time.
    pub fn slot_to_utc(&self, s: ChainSlot) -> Result<UtcTime, PastHorizon> {
        self.history.slot_to_utc(s)
    }
}

/// Environment collaborator: produces a fresh [`TimeHandle`], reading
/// whatever cache the node maintains for the era history (§6, downward
/// interfaces).
pub trait GetTimeHandle: Send + Sync {
    /// Acquire a fresh `TimeHandle`.
    fn get_time_handle(&self) -> TimeHandle;
}
