//! [F] `ChainSyncHandler` (§4.F): the callback contract a chain-following
//! client drives as new blocks roll forward or a reorg rolls backward.
//!
//! Grounded in the teacher's updater/apply pattern (`updater.rs`), extended
//! with the rollback leg `nervosnetwork-ckb`'s `chain::switch` module models
//! for its own local best-chain tracking.

use tracing::{info, warn};

use crate::api::{ChainEvent, OnChainTx};
use crate::chain_state::{ChainStateAt, LocalChainState};
use crate::config::{NetworkId, ScriptRegistry};
use crate::error::FatalChainSyncError;
use crate::time::{GetTimeHandle, PastHorizon};
use crate::tx::observe::{convert_observation, observe_all};
use crate::tx::{ChainPoint, ChainSlot, Tx, UTxO};

/// Sequencing guarantees a [`ChainSyncHandler`] caller must uphold (§4.F):
/// every `on_roll_forward` for point `p` is followed either by another
/// `on_roll_forward` for a point after `p`, or by an `on_roll_backward` to a
/// point at or before `p` — never silently skipped or delivered out of order.
pub trait ChainSyncHandler: Send + Sync {
    /// A new block rolled forward, carrying the Head-relevant transactions
    /// in it (already filtered to only those touching our script registry
    /// by the caller's node-side client, a collaborator out of scope here).
    fn on_roll_forward(
        &self,
        point: ChainPoint,
        txs: &[Tx],
    ) -> Result<Vec<ChainEvent>, FatalChainSyncError>;

    /// A reorg rolled the chain back to `point`.
    fn on_roll_backward(&self, point: ChainPoint) -> Result<ChainEvent, FatalChainSyncError>;
}

/// The concrete [`ChainSyncHandler`] driving a single node's local state:
/// folds observed transactions into [`LocalChainState`], converts raw
/// observations to [`OnChainTx`] events, and hands back a monotonically
/// numbered [`ChainEvent`] stream (§8 property 1).
pub struct DirectChainSyncHandler {
    network_id: NetworkId,
    scripts: ScriptRegistry,
    state: LocalChainState,
    time: std::sync::Arc<dyn GetTimeHandle>,
    next_event_id: std::sync::atomic::AtomicU64,
}

impl DirectChainSyncHandler {
    /// Start a handler anchored at `genesis`, using `time` to stamp
    /// [`ChainEvent::Tick`] events with the current wall-clock time.
    pub fn new(
        network_id: NetworkId,
        scripts: ScriptRegistry,
        genesis: ChainStateAt,
        time: std::sync::Arc<dyn GetTimeHandle>,
    ) -> Self {
        DirectChainSyncHandler {
            network_id,
            scripts,
            state: LocalChainState::new(genesis),
            time,
            next_event_id: std::sync::atomic::AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_event_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
    }

    /// The current Head-relevant chain state, for constructors to read.
    pub fn current_state(&self) -> ChainStateAt {
        self.state.get_latest()
    }
}

impl ChainSyncHandler for DirectChainSyncHandler {
    fn on_roll_forward(
        &self,
        point: ChainPoint,
        txs: &[Tx],
    ) -> Result<Vec<ChainEvent>, FatalChainSyncError> {
        let previous = self.state.get_latest();
        // Constructors and observers share the same UTxO space, so a
        // transaction may spend outputs produced earlier in this same
        // block; `observe_all` threads the UTxO through each tx in order,
        // and any output it creates is visible to `resolved_inputs` as soon
        // as it lands in `current`.
        let resolved_inputs: UTxO = previous.utxo.clone();
        let (next_utxo, observations) =
            observe_all(self.network_id, &self.scripts, &resolved_inputs, &previous.utxo, txs);

        let next_state = ChainStateAt {
            utxo: next_utxo,
            recorded_at: Some(point),
        };
        self.state
            .push_new(next_state)
            .map_err(|_| FatalChainSyncError::NonMonotonicRollForward { slot: point.slot })?;

        let time = self.time.get_time_handle();
        let now = time.slot_to_utc(point.slot).map_err(|PastHorizon| {
            FatalChainSyncError::TimeConversionException {
                slot: point.slot,
                reason: "slot is outside the interpretable era-history window".to_string(),
            }
        })?;

        let mut events = Vec::with_capacity(observations.len() + 1);
        events.push(ChainEvent::Tick {
            id: self.next_id(),
            time: now,
        });
        for observation in observations {
            if let Some(on_chain_tx) = convert_observation(observation) {
                log_observation(&on_chain_tx);
                events.push(ChainEvent::Observation {
                    id: self.next_id(),
                    point,
                    on_chain_tx,
                });
            }
        }
        Ok(events)
    }

    fn on_roll_backward(&self, point: ChainPoint) -> Result<ChainEvent, FatalChainSyncError> {
        let anchor = self.state.history().anchor().clone();
        if let Some(anchor_point) = anchor.recorded_at {
            if point.slot < anchor_point.slot {
                return Err(FatalChainSyncError::RollbackPastSafetyAnchor {
                    requested: point.slot,
                    anchor: anchor_point.slot,
                });
            }
        }
        self.state.rollback(point.slot);
        warn!(event = ?crate::log::DirectChainLog::RolledBack { point }, "rolled back");
        Ok(ChainEvent::Rollback {
            id: self.next_id(),
            point,
        })
    }
}

fn log_observation(on_chain_tx: &OnChainTx) {
    match on_chain_tx {
        OnChainTx::OnInitTx { head_id, .. } => info!(%head_id, "observed InitTx"),
        OnChainTx::OnCommitTx { party, .. } => info!(?party, "observed CommitTx"),
        OnChainTx::OnAbortTx => info!("observed AbortTx"),
        OnChainTx::OnCollectComTx { .. } => info!("observed CollectComTx"),
        OnChainTx::OnCloseTx { head_id, .. } => info!(%head_id, "observed CloseTx"),
        OnChainTx::OnContestTx { snapshot_number } => info!(snapshot_number, "observed ContestTx"),
        OnChainTx::OnFanoutTx => info!("observed FanoutTx"),
    }
}
