//! Crate-wide fatal error types: failures a chain-sync consumer cannot
//! recover from by retrying (§4.F, §6).

use thiserror::Error;

use crate::tx::ChainSlot;

/// A fatal failure in the chain-sync path (§4.F): the caller should stop
/// following the chain rather than retry, since retrying cannot fix either
/// variant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FatalChainSyncError {
    /// A slot fell outside the interpretable window of the cached era
    /// history while handling a roll-forward or roll-backward event.
    #[error("time conversion exception at slot {slot}: {reason}")]
    TimeConversionException {
        /// The slot that could not be converted.
        slot: ChainSlot,
        /// Human-readable reason from the underlying [`crate::time::PastHorizon`].
        reason: String,
    },
    /// The node asked to roll back past the pinned safety anchor; this can
    /// only happen if the node's local chain state was corrupted or loaded
    /// from an inconsistent checkpoint, since no real chain reorg reaches
    /// that far back once an anchor has been acknowledged.
    #[error("requested rollback to slot {requested} predates the safety anchor at slot {anchor}")]
    RollbackPastSafetyAnchor {
        /// Slot the rollback targeted.
        requested: ChainSlot,
        /// Slot of the pinned safety anchor.
        anchor: ChainSlot,
    },
    /// A roll-forward point did not strictly advance the chain state history;
    /// this indicates the upstream chain-sync client delivered points out of
    /// order, violating the [`crate::chain_sync::ChainSyncHandler`] sequencing
    /// contract.
    #[error("roll-forward to slot {slot} does not strictly advance the chain state")]
    NonMonotonicRollForward {
        /// The slot that failed to advance the chain state history.
        slot: ChainSlot,
    },
}
