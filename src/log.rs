//! Structured log events emitted alongside [`tracing`] spans (§8 property 9:
//! every logged event has a stable, serializable shape).
//!
//! Grounded in the teacher's use of `tracing` for wallet-state transitions;
//! here we additionally give the event set a `Serialize` shape so a log
//! sink (or a test) can assert on its structure rather than scrape text.

use serde::Serialize;

use crate::tx::{ChainPoint, HeadId};

/// One structured logging event a Hydra node's chain layer emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tag", rename_all = "camelCase")]
pub enum DirectChainLog {
    /// A [`crate::api::PostChainTx`] request was handed to the poster.
    ToPost {
        /// Head this event concerns.
        head_id: HeadId,
    },
    /// A transaction was submitted to the network.
    PostedTx {
        /// Head this event concerns.
        head_id: HeadId,
        /// Chain point the transaction targeted, if known ahead of submission.
        point: Option<ChainPoint>,
    },
    /// Submission of a transaction failed.
    PostTxFailed {
        /// Head this event concerns.
        head_id: HeadId,
        /// Human-readable failure reason.
        reason: String,
    },
    /// A rollback was handled.
    RolledBack {
        /// Chain point rolled back to.
        point: ChainPoint,
    },
    /// The wallet's UTxO snapshot was refreshed.
    WalletUtxoUpdated {
        /// Number of UTxOs now tracked.
        utxo_count: usize,
    },
}
