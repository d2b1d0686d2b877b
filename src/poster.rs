//! [G] `ChainPoster` (§4.G): assembles a [`crate::api::PostChainTx`] request
//! into a signed, fee-covered transaction and hands it to an injected
//! [`SubmitTx`] collaborator.
//!
//! Grounded in the teacher's `Finalizer` (assembling a buildable transaction
//! from parts, then handing it off) with submission itself modeled as an
//! injected async boundary, the shape `nervosnetwork-ckb`'s RPC-facing
//! submission path uses for its own network collaborator.

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::api::{PostChainTx, PostTxError};
use crate::chain_state::LocalChainState;
use crate::config::ChainContext;
use crate::log::DirectChainLog;
use crate::time::GetTimeHandle;
use crate::tx::{construct, HeadId, HeadSeed, Tx, UTxO};
use crate::wallet::{CoverFeeErr, TinyWallet};

/// The [`HeadId`] a [`PostChainTx`] request concerns, for logging (every
/// variant but `InitTx` already carries one; `InitTx` derives it from the
/// seed it is about to consume, the same way [`construct::initialize`] does).
fn head_id_for(req: &PostChainTx) -> HeadId {
    match req {
        PostChainTx::InitTx { seed_input, .. } => HeadId::from_seed_tx_id(&seed_input.tx_id),
        PostChainTx::CommitTx { head_id, .. }
        | PostChainTx::AbortTx { head_id, .. }
        | PostChainTx::CollectComTx { head_id }
        | PostChainTx::CloseTx { head_id, .. }
        | PostChainTx::ContestTx { head_id, .. }
        | PostChainTx::FanoutTx { head_id } => *head_id,
    }
}

/// Maps a [`CoverFeeErr`] to its named [`PostTxError`] counterpart (§4.G
/// mapping table), threading through the Head-relevant UTxO the wallet was
/// balancing against so `InternalWalletError` carries enough context for a
/// caller to retry or report.
fn map_cover_fee_err(err: CoverFeeErr, head_utxo: UTxO) -> PostTxError {
    match err {
        CoverFeeErr::NoFuelUtxoFound => PostTxError::NoFuelUTXOFound,
        CoverFeeErr::NotEnoughFunds { .. } => PostTxError::NotEnoughFuel,
        CoverFeeErr::ScriptExecutionFailed { ptr, reason } => PostTxError::ScriptFailedInWallet {
            redeemer_ptr: ptr,
            failure_reason: reason,
        },
        CoverFeeErr::Other { reason, tx } => PostTxError::InternalWalletError { head_utxo, reason, tx },
    }
}

/// Environment collaborator: submits a fully-signed transaction to the
/// network (§6, downward interfaces). Left abstract since actual submission
/// requires a node connection out of scope for this layer.
#[async_trait]
pub trait SubmitTx: Send + Sync {
    /// Submit `tx`, failing with a human-readable reason on rejection.
    async fn submit(&self, tx: &Tx) -> Result<(), String>;
}

/// [G] `ChainPoster`: the write path of a Hydra node's chain layer (§4.G).
pub struct ChainPoster {
    ctx: ChainContext,
    wallet: std::sync::Arc<TinyWallet>,
    state: std::sync::Arc<LocalChainState>,
    time: std::sync::Arc<dyn GetTimeHandle>,
    submit: std::sync::Arc<dyn SubmitTx>,
}

impl ChainPoster {
    /// Build a poster wired to the given collaborators.
    pub fn new(
        ctx: ChainContext,
        wallet: std::sync::Arc<TinyWallet>,
        state: std::sync::Arc<LocalChainState>,
        time: std::sync::Arc<dyn GetTimeHandle>,
        submit: std::sync::Arc<dyn SubmitTx>,
    ) -> Self {
        ChainPoster {
            ctx,
            wallet,
            state,
            time,
            submit,
        }
    }

    /// Draft a `CommitTx` for `user_utxo` without posting it, so a caller
    /// can inspect or sign it externally before submission (§4.G).
    ///
    /// Fails with [`PostTxError::SpendingNodeUtxoForbidden`] if `user_utxo`
    /// intersects the wallet's own UTxO.
    pub fn draft_commit_tx(&self, head_id: HeadId, user_utxo: &UTxO) -> Result<Tx, PostTxError> {
        let state = self.state.get_latest();
        let owned = self.wallet.owned_inputs();
        let unsigned = construct::commit(&self.ctx, &state, head_id, user_utxo, &owned).map_err(|err| {
            match err {
                construct::CommitErr::SpendingNodeUtxoForbidden => PostTxError::SpendingNodeUtxoForbidden,
                construct::CommitErr::NoInitialOutputForParty => {
                    PostTxError::NoInitialOutputForParty(head_id)
                }
            }
        })?;
        let balanced = self
            .wallet
            .cover_fee(&state.utxo, unsigned)
            .map_err(|err| map_cover_fee_err(err, state.utxo.clone()))?;
        Ok(self.wallet.sign(balanced))
    }

    /// `post_tx(req)` (§4.G): build, balance, sign, and submit the requested
    /// transaction.
    #[instrument(skip(self, req))]
    pub async fn post_tx(&self, req: PostChainTx) -> Result<(), PostTxError> {
        let head_id = head_id_for(&req);
        info!(event = ?DirectChainLog::ToPost { head_id }, "posting transaction");
        let tx = self.build(req)?;
        match self.submit.submit(&tx).await {
            Ok(()) => {
                info!(event = ?DirectChainLog::PostedTx { head_id, point: None }, "submitted transaction");
                Ok(())
            }
            Err(reason) => {
                info!(event = ?DirectChainLog::PostTxFailed { head_id, reason: reason.clone() }, "submission failed");
                Err(PostTxError::SubmissionRejected(reason))
            }
        }
    }

    fn build(&self, req: PostChainTx) -> Result<Tx, PostTxError> {
        let state = self.state.get_latest();
        let unsigned = match req {
            PostChainTx::InitTx { seed_input, parameters } => {
                construct::initialize(&self.ctx, &parameters, seed_input).map_err(|err| match err {
                    construct::InitializeErr::NoParties => PostTxError::InvalidSeed {
                        head_seed: HeadSeed::from_tx_in(seed_input),
                    },
                })?
            }
            PostChainTx::CommitTx { head_id, utxo } => {
                let owned = self.wallet.owned_inputs();
                construct::commit(&self.ctx, &state, head_id, &utxo, &owned).map_err(|err| match err {
                    construct::CommitErr::SpendingNodeUtxoForbidden => PostTxError::SpendingNodeUtxoForbidden,
                    construct::CommitErr::NoInitialOutputForParty => {
                        PostTxError::NoInitialOutputForParty(head_id)
                    }
                })?
            }
            PostChainTx::AbortTx { seed_input, .. } => {
                construct::abort(&self.ctx, crate::tx::HeadState::Initial, seed_input, &state)
                    .map_err(|_| PostTxError::FailedToConstructAbortTx)?
            }
            PostChainTx::CollectComTx { head_id } => construct::collect(&self.ctx, &state, head_id)
                .map_err(|_| PostTxError::NoThreadOutput(head_id))?,
            PostChainTx::CloseTx { head_id, snapshot } => {
                let params = self.head_parameters();
                let (current_slot, now) = self.time.get_time_handle().current_point_in_time()?;
                let upper = construct::upper_bound(now, params.contestation_period, |t| {
                    self.time.get_time_handle().slot_from_utc(t)
                })?;
                construct::close(&self.ctx, &state, head_id, &params, &snapshot, current_slot, upper)
                    .map_err(|_| PostTxError::FailedToConstructCloseTx)?
            }
            PostChainTx::ContestTx { head_id, snapshot } => {
                let params = self.head_parameters();
                let head_state = self.head_state_from(&state, head_id)?;
                let (_, now) = self.time.get_time_handle().current_point_in_time()?;
                let upper = construct::upper_bound(now, params.contestation_period, |t| {
                    self.time.get_time_handle().slot_from_utc(t)
                })?;
                construct::contest(&self.ctx, &state, head_id, head_state, &params, &snapshot, upper).map_err(
                    |err| match err {
                        construct::ContestErr::SnapshotNotNewer { current, given } => {
                            PostTxError::SnapshotNotNewer { current, given }
                        }
                        _ => PostTxError::InvalidStateToPost(head_id),
                    },
                )?
            }
            PostChainTx::FanoutTx { head_id } => {
                let (deadline_slot, _) = self.time.get_time_handle().current_point_in_time()?;
                construct::fanout(&self.ctx, &state, &state.utxo, deadline_slot)
                    .map_err(|_| PostTxError::NoThreadOutput(head_id))?
            }
        };

        let balanced = self
            .wallet
            .cover_fee(&state.utxo, unsigned)
            .map_err(|err| map_cover_fee_err(err, state.utxo.clone()))?;
        Ok(self.wallet.sign(balanced))
    }

    /// Placeholder for the Head parameters a real poster would read back
    /// from its own in-memory record of the `Init` observation; out of
    /// scope here since `HeadParameters` is not part of `ChainStateAt`.
    fn head_parameters(&self) -> crate::config::HeadParameters {
        crate::config::HeadParameters {
            parties: vec![self.ctx.our_party.clone()],
            contestation_period: self.ctx.default_contestation_period,
        }
    }

    fn head_state_from(
        &self,
        state: &crate::chain_state::ChainStateAt,
        head_id: HeadId,
    ) -> Result<crate::tx::HeadState, PostTxError> {
        let closed = state.utxo.values().find_map(|out| {
            let datum = out.datum.as_ref()?;
            if datum.tag != crate::tx::DatumTag::HeadClosed || datum.payload.len() < 44 {
                return None;
            }
            let snapshot_number = u64::from_be_bytes(datum.payload[28..36].try_into().ok()?);
            let contestation_deadline =
                crate::tx::ChainSlot(u64::from_be_bytes(datum.payload[36..44].try_into().ok()?));
            Some(crate::tx::HeadState::Closed {
                snapshot_number,
                contestation_deadline,
            })
        });
        closed.ok_or(PostTxError::InvalidStateToPost(head_id))
    }
}
