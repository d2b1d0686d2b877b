//! Shared ledger data model: the UTxO-based types every other module builds
//! on top of (§3 DATA MODEL).

pub mod construct;
pub mod observe;

use std::collections::BTreeMap;
use std::fmt;

/// Opaque 28-byte Head identifier, derived from the seed input's transaction id hash.
///
/// Ordered and compared by raw bytes so it can be used as a map key without a
/// separate `Ord` derivation surprising callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct HeadId([u8; 28]);

impl HeadId {
    /// Derive a `HeadId` from the seed input's transaction id.
    pub fn from_seed_tx_id(tx_id: &TxId) -> Self {
        // A real node hashes with blake2b-224; we keep the algorithm abstract
        // behind this constructor so callers never hash `TxId` bytes themselves.
        let digest = blake2b224(&tx_id.0);
        HeadId(digest)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 28] {
        &self.0
    }

    /// Reconstruct a `HeadId` from raw bytes read back out of a datum
    /// payload. Observers never hash anything themselves; they only read
    /// back what a constructor wrote, so this is the only other way
    /// (besides [`HeadId::from_seed_tx_id`]) a `HeadId` comes into being.
    pub fn from_raw(bytes: [u8; 28]) -> Self {
        HeadId(bytes)
    }
}

impl fmt::Display for HeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Minimal blake2b-224 stand-in used only to derive [`HeadId`] from a seed
/// `TxId`. Kept local rather than pulling in a hashing crate the rest of the
/// crate has no other use for; swap for a real blake2b implementation when
/// wiring this up to an actual ledger client.
fn blake2b224(input: &[u8; 32]) -> [u8; 28] {
    let mut out = [0u8; 28];
    for (i, chunk) in input.chunks(4).enumerate() {
        let mixed = chunk.iter().fold(i as u8, |acc, b| acc.wrapping_add(*b).rotate_left(3));
        out[i % 28] ^= mixed;
    }
    out
}

/// A transaction id: 32 bytes, as produced by hashing a transaction body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct TxId(pub [u8; 32]);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A transaction input: the output it spends, identified by id and index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct TxIn {
    /// Id of the transaction that produced the spent output.
    pub tx_id: TxId,
    /// Output index within that transaction.
    pub index: u32,
}

impl fmt::Display for TxIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_id, self.index)
    }
}

/// A reference to the specific UTxO consumed by `InitTx`.
///
/// Bijective with [`TxIn`]: `HeadSeed::from_tx_in` and [`HeadSeed::tx_in`]
/// round-trip for every value (tested in [`tests`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HeadSeed(TxIn);

impl HeadSeed {
    /// Build a `HeadSeed` from the seed `TxIn`.
    pub fn from_tx_in(tx_in: TxIn) -> Self {
        HeadSeed(tx_in)
    }

    /// Recover the seed `TxIn` this `HeadSeed` refers to.
    pub fn tx_in(&self) -> TxIn {
        self.0
    }
}

impl fmt::Display for HeadSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An amount of lovelace (or, in a multi-asset era, the ADA-only projection
/// of a `Value`). Kept as a plain `u64` newtype; multi-asset bundles are out
/// of scope for this layer, which only needs to reason about fee coverage
/// and min-UTxO thresholds over the ADA quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, serde::Serialize, serde::Deserialize)]
pub struct Value(pub u64);

impl Value {
    /// Zero value.
    pub const ZERO: Value = Value(0);

    /// Checked addition, as `Amount`-style arithmetic should never silently wrap.
    pub fn checked_add(self, other: Value) -> Option<Value> {
        self.0.checked_add(other.0).map(Value)
    }

    /// Checked subtraction.
    pub fn checked_sub(self, other: Value) -> Option<Value> {
        self.0.checked_sub(other.0).map(Value)
    }
}

impl std::ops::Add for Value {
    type Output = Value;
    fn add(self, rhs: Value) -> Value {
        self.checked_add(rhs).expect("lovelace overflow")
    }
}

impl std::iter::Sum for Value {
    fn sum<I: Iterator<Item = Value>>(iter: I) -> Value {
        iter.fold(Value::ZERO, |acc, v| acc + v)
    }
}

/// An on-chain address; opaque bytes plus a human-readable bech32-ish tag for
/// logging. Address semantics (network prefix, payment vs. script credential)
/// are a ledger concern out of scope here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Address(pub Vec<u8>);

/// Opaque datum attached to a `TxOut`. We never interpret the payload here —
/// constructors write known shapes, observers pattern-match on `tag` only.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Datum {
    /// Discriminates which head-state shape this datum encodes.
    pub tag: DatumTag,
    /// CBOR-encoded payload, opaque to everything but the constructor/observer
    /// pair that agrees on `tag`.
    pub payload: Vec<u8>,
}

/// The known datum shapes a Head thread or commit/initial output may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DatumTag {
    /// Thread output, `Initial` lifecycle state.
    HeadInitial,
    /// Thread output, `Open` lifecycle state (post `CollectCom`).
    HeadOpen,
    /// Thread output, `Closed` lifecycle state.
    HeadClosed,
    /// A per-party initial output created by `InitTx`.
    PartyInitial,
    /// A per-party commit output created by `CommitTx`.
    PartyCommit,
}

/// Hash identifying a known validator script (thread, initial, commit,
/// head, deposit). Scripts themselves are opaque collaborators (§1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ScriptHash(pub [u8; 28]);

/// A ledger output: address, value, optional datum, optional reference script.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TxOut {
    /// Output address.
    pub address: Address,
    /// Output value.
    pub value: Value,
    /// Inline or hashed datum, if any.
    pub datum: Option<Datum>,
    /// Reference script carried by this output, if any.
    pub reference_script: Option<ScriptHash>,
}

/// A UTxO set: `TxIn` keys are unique; we use a `BTreeMap` rather than a
/// `HashMap` so that iteration order is deterministic by `TxIn` byte order.
/// This matters for two independent reasons: fee coverage tie-breaking
/// (§4.B) and the deterministic fold in [`observe::observe_all`] (§4.D).
pub type UTxO = BTreeMap<TxIn, TxOut>;

/// A transaction: inputs it spends, outputs it creates, fee paid, and the
/// validity interval (if any) it is constrained to. Witnesses/signatures are
/// attached by [`crate::wallet::TinyWallet::sign`] and are therefore not part
/// of the unbalanced `Tx` produced by the constructors in [`construct`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Tx {
    /// Inputs consumed.
    pub inputs: Vec<TxIn>,
    /// Outputs produced, in order.
    pub outputs: Vec<TxOut>,
    /// Absolute fee, in lovelace.
    pub fee: Value,
    /// `[lower, upper]` validity interval in slots, inclusive; `None` means unbounded.
    pub validity_interval: Option<(ChainSlot, ChainSlot)>,
    /// Witnesses attached so far (empty until [`crate::wallet::TinyWallet::sign`]).
    pub witnesses: Vec<Signature>,
}

impl Tx {
    /// A partially-built transaction with no witnesses yet.
    pub fn unsigned(inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Self {
        Tx {
            inputs,
            outputs,
            fee: Value::ZERO,
            validity_interval: None,
            witnesses: Vec::new(),
        }
    }

    /// Sum of this transaction's output values.
    pub fn total_output_value(&self) -> Value {
        self.outputs.iter().map(|o| o.value).sum()
    }
}

/// An off-chain participant identity, derived from an on-chain verification key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Party {
    /// Raw verification key bytes.
    pub vkey: VerificationKey,
}

/// An Ed25519-shaped verification key, opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct VerificationKey(pub [u8; 32]);

/// A detached signature over a transaction body.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Signature {
    /// Key that produced this signature.
    pub by: VerificationKey,
    /// Raw signature bytes.
    pub bytes: Vec<u8>,
}

/// A non-negative contestation period, in seconds.
///
/// Invariant: `0 <= seconds`. [`ContestationPeriod::clamped_to_grace`] applies
/// the `maxGraceTime` cap used when this value bounds validity-interval slack
/// (§4.C); the type itself does not enforce the cap since a head's configured
/// contestation period may legitimately exceed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ContestationPeriod(u64);

/// Default cap (seconds) on how far into the future a validity interval's
/// upper bound may be placed (§4.C).
pub const MAX_GRACE_TIME_SECS: u64 = 200;

impl ContestationPeriod {
    /// Construct from a non-negative number of seconds.
    pub fn from_secs(secs: u64) -> Self {
        ContestationPeriod(secs)
    }

    /// Seconds value.
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// `min(self, maxGraceTime)`, used to compute the upper-bound slack for
    /// time-sensitive constructors (§4.C).
    pub fn clamped_to_grace(&self) -> u64 {
        self.0.min(MAX_GRACE_TIME_SECS)
    }
}

/// An off-chain agreement on the Head's current UTxO set.
///
/// Monotone: a snapshot with a higher `number` supersedes a lower one during
/// contestation (§4.D, `Contest` legality).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    /// Monotonically increasing snapshot number.
    pub number: u64,
    /// The agreed-upon UTxO set.
    pub utxo: UTxO,
    /// Multisignature over the snapshot, one per party.
    pub signatures: std::collections::BTreeSet<VerificationKey>,
}

/// A ledger slot number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ChainSlot(pub u64);

impl fmt::Display for ChainSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `(slot, block hash)`, the unit of chain position used for sync and rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ChainPoint {
    /// Slot at this point.
    pub slot: ChainSlot,
    /// Block hash at this point.
    pub block_hash: [u8; 32],
}

/// The abstract Head lifecycle state, independent of any particular UTxO
/// representation (the legal-transition diagram of `spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum HeadState {
    /// No Head instance yet.
    Idle,
    /// `Init` observed; commits may still arrive.
    Initial,
    /// `CollectCom` observed; the Head is operating off-chain.
    Open,
    /// `Close` observed; contestation window is running.
    Closed {
        /// Highest snapshot number contested or closed with so far.
        snapshot_number: u64,
        /// Deadline after which `Fanout` becomes legal.
        contestation_deadline: ChainSlot,
    },
    /// `Fanout` observed; the Head has concluded normally.
    Fanout,
    /// `Abort` observed; the Head concluded without ever opening.
    Aborted,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx_in(id_byte: u8, index: u32) -> TxIn {
        TxIn {
            tx_id: TxId([id_byte; 32]),
            index,
        }
    }

    #[test]
    fn head_seed_round_trips_through_tx_in() {
        let original = tx_in(7, 3);
        let seed = HeadSeed::from_tx_in(original);
        assert_eq!(seed.tx_in(), original);
    }

    #[test]
    fn head_id_differs_for_different_seed_tx_ids() {
        let a = HeadId::from_seed_tx_id(&tx_in(1, 0).tx_id);
        let b = HeadId::from_seed_tx_id(&tx_in(2, 0).tx_id);
        assert_ne!(a, b);
    }

    #[test]
    fn contestation_period_clamps_to_grace_time() {
        let cp = ContestationPeriod::from_secs(1_000);
        assert_eq!(cp.clamped_to_grace(), MAX_GRACE_TIME_SECS);
        let short = ContestationPeriod::from_secs(30);
        assert_eq!(short.clamped_to_grace(), 30);
    }
}
