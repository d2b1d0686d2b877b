//! Protocol-level API surface (§4.D "Conversion to protocol events", §6):
//! the chain-independent events and requests the rest of a Hydra node sees,
//! decoupled from the raw [`crate::tx::observe::HeadObservation`] shape.

use thiserror::Error;

use crate::time::UtcTime;
use crate::tx::{ChainSlot, HeadId, HeadSeed, Party, Tx, TxIn, UTxO};

/// A request to post one of the seven Head transactions, as handed to
/// [`crate::poster::ChainPoster::post_tx`] (§4.G).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostChainTx {
    /// Post an `InitTx` seeding a new Head.
    InitTx {
        /// Input to consume as the Head seed.
        seed_input: TxIn,
        /// Parties and contestation period for this Head instance.
        parameters: crate::config::HeadParameters,
    },
    /// Post a `CommitTx` locking `utxo` into the Head.
    CommitTx {
        /// Head to commit into.
        head_id: HeadId,
        /// UTxO the caller wants locked.
        utxo: UTxO,
    },
    /// Post an `AbortTx`.
    AbortTx {
        /// Head to abort.
        head_id: HeadId,
        /// Seed input originally consumed by `InitTx`.
        seed_input: TxIn,
    },
    /// Post a `CollectComTx`.
    CollectComTx {
        /// Head to collect commits for.
        head_id: HeadId,
    },
    /// Post a `CloseTx`.
    CloseTx {
        /// Head to close.
        head_id: HeadId,
        /// Snapshot to close with.
        snapshot: crate::tx::Snapshot,
    },
    /// Post a `ContestTx`.
    ContestTx {
        /// Head to contest.
        head_id: HeadId,
        /// Snapshot to contest with.
        snapshot: crate::tx::Snapshot,
    },
    /// Post a `FanoutTx`.
    FanoutTx {
        /// Head to fan out.
        head_id: HeadId,
    },
}

/// A Head lifecycle transition as seen by the rest of the node, after
/// [`crate::tx::observe::convert_observation`] has translated a raw
/// [`crate::tx::observe::HeadObservation`] (§4.D).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnChainTx {
    /// `InitTx` observed.
    OnInitTx {
        /// The new Head's identifier.
        head_id: HeadId,
        /// The seed input this Head was derived from.
        head_seed: HeadSeed,
        /// Contestation period recorded on chain.
        contestation_period: crate::tx::ContestationPeriod,
        /// Parties recorded on chain.
        parties: Vec<Party>,
    },
    /// `CommitTx` observed.
    OnCommitTx {
        /// The committing party.
        party: Party,
        /// The UTxO they committed.
        committed: UTxO,
    },
    /// `AbortTx` observed.
    OnAbortTx,
    /// `CollectComTx` observed.
    OnCollectComTx {
        /// The new, unified initial UTxO.
        utxo: UTxO,
    },
    /// `CloseTx` observed.
    OnCloseTx {
        /// The Head this close belongs to.
        head_id: HeadId,
        /// Snapshot number recorded in the close.
        snapshot_number: u64,
        /// Contestation deadline.
        contestation_deadline: UtcTime,
    },
    /// `ContestTx` observed.
    OnContestTx {
        /// The newly-recorded snapshot number.
        snapshot_number: u64,
    },
    /// `FanoutTx` observed.
    OnFanoutTx,
}

/// The stream of events a chain-sync consumer sees (§4.F, §8 property 1):
/// `id` is strictly increasing across every variant, independent of whether
/// it carries an observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    /// A transaction observation at a given chain point.
    Observation {
        /// Monotonically increasing event id.
        id: u64,
        /// Chain point the observation was made at.
        point: crate::tx::ChainPoint,
        /// The protocol-level event observed.
        on_chain_tx: OnChainTx,
    },
    /// A rollback to `point`.
    Rollback {
        /// Monotonically increasing event id.
        id: u64,
        /// Chain point rolled back to.
        point: crate::tx::ChainPoint,
    },
    /// A synchronization tick carrying no observation, emitted so that a
    /// listener's last-seen event id keeps advancing even through blocks
    /// with nothing Head-relevant in them.
    Tick {
        /// Monotonically increasing event id.
        id: u64,
        /// Current chain time.
        time: UtcTime,
    },
}

impl ChainEvent {
    /// This event's id, regardless of variant.
    pub fn id(&self) -> u64 {
        match self {
            ChainEvent::Observation { id, .. } => *id,
            ChainEvent::Rollback { id, .. } => *id,
            ChainEvent::Tick { id, .. } => *id,
        }
    }
}

/// Failure posting a [`PostChainTx`] request (§6): the wallet's
/// [`crate::wallet::CoverFeeErr`] mapped to its named counterpart per the
/// §4.G mapping table, alongside construction/submission failures specific
/// to the poster itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PostTxError {
    /// No seed input was available to build an `InitTx` with.
    #[error("no seed input available to initialize a Head")]
    NoSeedInput,
    /// The seed input or Head parameters given to `InitTx` failed validation
    /// (e.g. an empty party list).
    #[error("invalid seed for head: {head_seed}")]
    InvalidSeed {
        /// The seed the `InitTx` request was built from.
        head_seed: HeadSeed,
    },
    /// The wallet has no UTxO at all to draw fees from.
    #[error("no fuel UTxO found in the wallet")]
    NoFuelUTXOFound,
    /// The wallet's UTxOs cannot cover the requested outputs plus fee.
    #[error("not enough fuel to cover the transaction")]
    NotEnoughFuel,
    /// A script failed to execute while the wallet balanced the transaction.
    #[error("script at redeemer {redeemer_ptr} failed in wallet: {failure_reason}")]
    ScriptFailedInWallet {
        /// Index of the failing redeemer pointer.
        redeemer_ptr: usize,
        /// Human-readable failure reason from the script evaluator.
        failure_reason: String,
    },
    /// A wallet balancing failure not covered by a more specific variant.
    #[error("internal wallet error: {reason}")]
    InternalWalletError {
        /// The Head-relevant UTxO the wallet was balancing against.
        head_utxo: UTxO,
        /// Human-readable failure reason.
        reason: String,
        /// The unbalanced transaction the wallet failed to cover.
        tx: Tx,
    },
    /// Constructing the `CloseTx` failed.
    #[error("failed to construct CloseTx")]
    FailedToConstructCloseTx,
    /// Constructing the `AbortTx` failed.
    #[error("failed to construct AbortTx")]
    FailedToConstructAbortTx,
    /// The requested UTxO to commit intersects the wallet's own UTxO.
    #[error("refusing to commit a UTxO that is also controlled by the node's wallet")]
    SpendingNodeUtxoForbidden,
    /// No initial output was found for our party; `Init` must be observed first.
    #[error("no initial output for our party found; Init must be observed first")]
    NoInitialOutputForParty(HeadId),
    /// No Head thread output was found in the state needed to build the request.
    #[error("no Head thread output found for head {0}")]
    NoThreadOutput(HeadId),
    /// `CollectCom`/`Contest` requested from a lifecycle state that does not
    /// permit it.
    #[error("transaction type not permitted in the current Head state for {0}")]
    InvalidStateToPost(HeadId),
    /// A contest or close snapshot did not supersede the one already on chain.
    #[error("snapshot {given} does not supersede currently closed snapshot {current}")]
    SnapshotNotNewer {
        /// Snapshot number currently recorded as closed.
        current: u64,
        /// Snapshot number given in the request.
        given: u64,
    },
    /// Time conversion failed while computing a validity interval.
    #[error("time conversion failed while posting: {0}")]
    TimeConversionFailed(#[from] crate::time::PastHorizon),
    /// The injected [`crate::poster::SubmitTx`] collaborator rejected submission.
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),
}
