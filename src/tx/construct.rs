//! [C] Transaction Constructors (§4.C): pure functions from
//! `(ChainContext, ChainState, request) -> Result<Tx, ConstructionErr>`.
//!
//! Grounded in the teacher's `TxBuilder` shape (`builder.rs` in `bdk_tx`):
//! params are assembled, then a single step produces the unbalanced `Tx`.
//! Unlike the teacher's general-purpose builder (many recipients, many fee
//! policies), every Hydra transaction here has one fixed shape, so each
//! operation is a free function rather than a shared generic builder type.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::chain_state::ChainStateAt;
use crate::config::{ChainContext, HeadParameters};
use crate::time::UtcTime;
use crate::tx::{
    Address, ChainSlot, Datum, DatumTag, HeadId, HeadSeed, HeadState, Party, Snapshot, Tx, TxIn,
    TxOut, Value, UTxO,
};

fn head_thread_output(
    ctx: &ChainContext,
    head_id: HeadId,
    datum: Datum,
    value: Value,
) -> TxOut {
    TxOut {
        address: head_script_address(ctx),
        value,
        datum: Some(datum),
        reference_script: None,
    }
}

fn head_script_address(ctx: &ChainContext) -> Address {
    Address(ctx.scripts.head.0.to_vec())
}

fn initial_script_address(ctx: &ChainContext) -> Address {
    Address(ctx.scripts.initial.0.to_vec())
}

fn commit_script_address(ctx: &ChainContext) -> Address {
    Address(ctx.scripts.commit.0.to_vec())
}

fn encode_parties(parties: &[Party]) -> Vec<u8> {
    parties.iter().flat_map(|p| p.vkey.0).collect()
}

/// The thread output is seeded with one lovelace per party plus a constant,
/// standing in for the minimum a thread UTxO must carry to be spendable;
/// the exact figure is a ledger protocol-parameter concern out of scope here.
const THREAD_OUTPUT_BASE_VALUE: u64 = 2_000_000;

/// `initialize`: creates the head thread output carrying
/// `(parties, cp, headId = hash(seedInput))` plus one initial output per
/// party, consuming `seedInput` (§4.C).
pub fn initialize(
    ctx: &ChainContext,
    params: &HeadParameters,
    seed_input: TxIn,
) -> Result<Tx, InitializeErr> {
    if params.parties.is_empty() {
        return Err(InitializeErr::NoParties);
    }
    let head_id = HeadId::from_seed_tx_id(&seed_input.tx_id);
    let mut payload = head_id.as_bytes().to_vec();
    payload.extend_from_slice(&params.contestation_period.as_secs().to_be_bytes());
    payload.extend(encode_parties(&params.parties));

    let thread_out = head_thread_output(
        ctx,
        head_id,
        Datum {
            tag: DatumTag::HeadInitial,
            payload,
        },
        Value(THREAD_OUTPUT_BASE_VALUE),
    );

    let mut outputs = vec![thread_out];
    for party in &params.parties {
        outputs.push(TxOut {
            address: initial_script_address(ctx),
            value: Value::ZERO,
            datum: Some(Datum {
                tag: DatumTag::PartyInitial,
                payload: party.vkey.0.to_vec(),
            }),
            reference_script: None,
        });
    }

    Ok(Tx::unsigned(vec![seed_input], outputs))
}

/// Errors refusing `initialize` (§4.C preconditions).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InitializeErr {
    /// `HeadParameters.parties` was empty; a Head needs at least one party.
    #[error("cannot initialize a Head with no parties")]
    NoParties,
}

/// `commit`: spends our initial output, locks `userUtxo`'s value in a commit
/// output whose datum encodes `(party, committed)` (§4.C).
///
/// Fails with [`CommitErr::SpendingNodeUtxoForbidden`] if any input in
/// `user_utxo` is also owned by the wallet, preventing fuel from being
/// double-counted as a commit.
pub fn commit(
    ctx: &ChainContext,
    chain_state: &ChainStateAt,
    head_id: HeadId,
    user_utxo: &UTxO,
    wallet_owned_inputs: &BTreeSet<TxIn>,
) -> Result<Tx, CommitErr> {
    if user_utxo.keys().any(|txin| wallet_owned_inputs.contains(txin)) {
        return Err(CommitErr::SpendingNodeUtxoForbidden);
    }

    let our_initial = find_our_initial_output(chain_state, ctx, head_id)
        .ok_or(CommitErr::NoInitialOutputForParty)?;

    let committed_value: Value = user_utxo.values().map(|o| o.value).sum();
    let commit_out = TxOut {
        address: commit_script_address(ctx),
        value: committed_value,
        datum: Some(Datum {
            tag: DatumTag::PartyCommit,
            payload: ctx.our_party.vkey.0.to_vec(),
        }),
        reference_script: None,
    };

    let mut inputs = vec![our_initial];
    inputs.extend(user_utxo.keys().copied());

    Ok(Tx::unsigned(inputs, vec![commit_out]))
}

fn find_our_initial_output(
    chain_state: &ChainStateAt,
    ctx: &ChainContext,
    _head_id: HeadId,
) -> Option<TxIn> {
    chain_state
        .utxo
        .iter()
        .find(|(_, out)| {
            out.datum.as_ref().is_some_and(|d| {
                d.tag == DatumTag::PartyInitial && d.payload == ctx.our_party.vkey.0
            })
        })
        .map(|(txin, _)| *txin)
}

/// Errors refusing `commit` (§4.C).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommitErr {
    /// An input of `userUtxo` is controlled by the wallet; committing it
    /// would double-count wallet fuel as a user commit.
    #[error("refusing to commit a UTxO that is also controlled by the node's wallet")]
    SpendingNodeUtxoForbidden,
    /// No initial output for our party was found in the current chain state;
    /// `commit` is only legal once `Init` has been observed.
    #[error("no initial output for our party found; Init must be observed first")]
    NoInitialOutputForParty,
}

/// `abort`: only legal while in `Initial`; refunds committed UTxOs to their
/// owners and burns the thread token (§4.C).
pub fn abort(
    _ctx: &ChainContext,
    head_state: HeadState,
    seed_tx_in: TxIn,
    chain_state: &ChainStateAt,
) -> Result<Tx, AbortErr> {
    if !matches!(head_state, HeadState::Initial) {
        return Err(AbortErr::NotInInitialState);
    }

    let thread_in = find_thread_input(chain_state, DatumTag::HeadInitial)
        .ok_or(AbortErr::NoThreadOutput)?;

    let mut inputs = vec![thread_in, seed_tx_in];
    let mut outputs = Vec::new();
    for (txin, out) in &chain_state.utxo {
        if out.datum.as_ref().is_some_and(|d| d.tag == DatumTag::PartyCommit) {
            inputs.push(*txin);
            outputs.push(TxOut {
                address: out.address.clone(),
                value: out.value,
                datum: None,
                reference_script: None,
            });
        }
    }

    Ok(Tx::unsigned(inputs, outputs))
}

/// Errors refusing `abort` (§4.C).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AbortErr {
    /// `abort` is only legal in the `Initial` lifecycle state.
    #[error("Abort is only legal from the Initial state")]
    NotInInitialState,
    /// No thread output was found to consume.
    #[error("no Head thread output found in the current chain state")]
    NoThreadOutput,
}

fn find_thread_input(chain_state: &ChainStateAt, tag: DatumTag) -> Option<TxIn> {
    chain_state
        .utxo
        .iter()
        .find(|(_, out)| out.datum.as_ref().is_some_and(|d| d.tag == tag))
        .map(|(txin, _)| *txin)
}

/// `collect`: consumes all commit outputs plus the thread, producing a new
/// thread output carrying the union of all committed UTxOs as initial `U₀`
/// (§4.C).
///
/// Per the Open Question decision in `SPEC_FULL.md` §9, the committed UTxO
/// set is derived entirely from `chain_state` (the observer-maintained
/// Head-relevant slice), never from a separately-tracked in-memory field.
pub fn collect(ctx: &ChainContext, chain_state: &ChainStateAt, head_id: HeadId) -> Result<Tx, CollectErr> {
    let thread_in =
        find_thread_input(chain_state, DatumTag::HeadInitial).ok_or(CollectErr::NoThreadOutput)?;

    let mut inputs = vec![thread_in];
    let mut committed_value = Value::ZERO;
    for (txin, out) in &chain_state.utxo {
        if out.datum.as_ref().is_some_and(|d| d.tag == DatumTag::PartyCommit) {
            inputs.push(*txin);
            committed_value = committed_value + out.value;
        }
    }

    let new_thread = head_thread_output(
        ctx,
        head_id,
        Datum {
            tag: DatumTag::HeadOpen,
            payload: head_id.as_bytes().to_vec(),
        },
        committed_value + Value(THREAD_OUTPUT_BASE_VALUE),
    );

    Ok(Tx::unsigned(inputs, vec![new_thread]))
}

/// Errors refusing `collect` (§4.C).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollectErr {
    /// No thread output was found to consume.
    #[error("no Head thread output found in the current chain state")]
    NoThreadOutput,
}

/// The upper bound of a constructor's validity interval, computed as
/// `min(cp, maxGraceTime)` past `now` (§4.C).
pub fn upper_bound(
    now: UtcTime,
    contestation_period: crate::tx::ContestationPeriod,
    slot_from_utc: impl FnOnce(UtcTime) -> Result<ChainSlot, crate::time::PastHorizon>,
) -> Result<(ChainSlot, UtcTime), crate::time::PastHorizon> {
    let delay = contestation_period.clamped_to_grace();
    let upper_time = now.plus_secs(delay);
    let upper_slot = slot_from_utc(upper_time)?;
    Ok((upper_slot, upper_time))
}

/// `close`: validity interval `[currentSlot, upperSlot]`; datum records
/// `snapshot.number` and `contestationDeadline = upperTime + cp` (§4.C).
pub fn close(
    ctx: &ChainContext,
    chain_state: &ChainStateAt,
    head_id: HeadId,
    params: &HeadParameters,
    snapshot: &Snapshot,
    current_slot: ChainSlot,
    upper_bound: (ChainSlot, UtcTime),
) -> Result<Tx, CloseErr> {
    let thread_in =
        find_thread_input(chain_state, DatumTag::HeadOpen).ok_or(CloseErr::NoThreadOutput)?;

    let (upper_slot, upper_time) = upper_bound;
    let deadline = upper_time.plus_secs(params.contestation_period.as_secs());

    let mut payload = head_id.as_bytes().to_vec();
    payload.extend_from_slice(&snapshot.number.to_be_bytes());
    payload.extend_from_slice(&deadline.0.to_be_bytes());

    let new_thread = head_thread_output(
        ctx,
        head_id,
        Datum {
            tag: DatumTag::HeadClosed,
            payload,
        },
        Value(THREAD_OUTPUT_BASE_VALUE),
    );

    let mut tx = Tx::unsigned(vec![thread_in], vec![new_thread]);
    tx.validity_interval = Some((current_slot, upper_slot));
    Ok(tx)
}

/// Errors refusing `close` (§4.C).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CloseErr {
    /// No open thread output was found to consume.
    #[error("no open Head thread output found in the current chain state")]
    NoThreadOutput,
}

/// `contest`: only legal with `snapshot.number > currentClosedSnapshot.number`;
/// extends the deadline by `cp` (§4.C).
pub fn contest(
    ctx: &ChainContext,
    chain_state: &ChainStateAt,
    head_id: HeadId,
    head_state: HeadState,
    params: &HeadParameters,
    snapshot: &Snapshot,
    upper_bound: (ChainSlot, UtcTime),
) -> Result<Tx, ContestErr> {
    let HeadState::Closed {
        snapshot_number: current_number,
        ..
    } = head_state
    else {
        return Err(ContestErr::NotClosed);
    };
    if snapshot.number <= current_number {
        return Err(ContestErr::SnapshotNotNewer {
            current: current_number,
            given: snapshot.number,
        });
    }

    let thread_in =
        find_thread_input(chain_state, DatumTag::HeadClosed).ok_or(ContestErr::NoThreadOutput)?;

    let (upper_slot, upper_time) = upper_bound;
    let new_deadline = upper_time.plus_secs(params.contestation_period.as_secs());

    let mut payload = head_id.as_bytes().to_vec();
    payload.extend_from_slice(&snapshot.number.to_be_bytes());
    payload.extend_from_slice(&new_deadline.0.to_be_bytes());

    let new_thread = head_thread_output(
        ctx,
        head_id,
        Datum {
            tag: DatumTag::HeadClosed,
            payload,
        },
        Value(THREAD_OUTPUT_BASE_VALUE),
    );

    let mut tx = Tx::unsigned(vec![thread_in], vec![new_thread]);
    tx.validity_interval = Some((ChainSlot(0), upper_slot));
    Ok(tx)
}

/// Errors refusing `contest` (§4.C).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContestErr {
    /// `contest` is only legal from the `Closed` state.
    #[error("Contest is only legal from the Closed state")]
    NotClosed,
    /// The given snapshot does not supersede the currently closed one.
    #[error("snapshot {given} does not supersede currently closed snapshot {current}")]
    SnapshotNotNewer {
        /// Snapshot number currently recorded as closed.
        current: u64,
        /// Snapshot number given in the request.
        given: u64,
    },
    /// No closed thread output was found to consume.
    #[error("no closed Head thread output found in the current chain state")]
    NoThreadOutput,
}

/// `fanout`: validity lower bound `>= deadlineSlot`; distributes
/// `U₀ ⊕ snapshotDiff` to original addresses (§4.C).
///
/// `utxo` is the Head-relevant slice read from `chain_state` (§9 Open
/// Question decision); it still carries the thread's own closed output, so
/// that one entry is excluded from the payout rather than handed back to
/// itself as one of the distributed outputs.
pub fn fanout(
    ctx: &ChainContext,
    chain_state: &ChainStateAt,
    utxo: &UTxO,
    deadline_slot: ChainSlot,
) -> Result<Tx, FanoutErr> {
    let thread_in =
        find_thread_input(chain_state, DatumTag::HeadClosed).ok_or(FanoutErr::NoThreadOutput)?;

    let outputs: Vec<TxOut> = utxo
        .values()
        .filter(|out| out.address.0 != ctx.scripts.head.0)
        .cloned()
        .collect();
    let mut tx = Tx::unsigned(vec![thread_in], outputs);
    tx.validity_interval = Some((deadline_slot, ChainSlot(u64::MAX)));
    Ok(tx)
}

/// Errors refusing `fanout` (§4.C).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FanoutErr {
    /// No closed thread output was found to consume.
    #[error("no closed Head thread output found in the current chain state")]
    NoThreadOutput,
}
