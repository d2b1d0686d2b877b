//! `ChainContext`: immutable, per-Head configuration (§3), plus the
//! validation the out-of-scope CLI/config layer relies on before handing one
//! to the rest of the crate.

use thiserror::Error;

use crate::tx::{ContestationPeriod, Party, ScriptHash, VerificationKey};

/// Network identifier (mainnet / a specific testnet magic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum NetworkId {
    /// Cardano mainnet.
    Mainnet,
    /// A testnet, identified by its network magic.
    Testnet(u32),
}

/// Hashes of the validator scripts this node's Head instances are built on.
/// Loaded read-only at startup (§3); never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ScriptRegistry {
    /// The thread/state-machine validator.
    pub head: ScriptHash,
    /// The per-party initial-output validator.
    pub initial: ScriptHash,
    /// The commit-output validator.
    pub commit: ScriptHash,
}

/// Immutable per-Head configuration, created once at node start and shared
/// by reference thereafter (§3).
///
/// Per the Open Question decision in `SPEC_FULL.md` §9 ("static cardano keys
/// in `ChainContext`"), this does **not** hold all parties' verification
/// keys — those arrive per-`InitTx` request as an explicit argument to
/// [`crate::tx::construct::initialize`]. `ChainContext` only holds
/// configuration that is genuinely independent of which Head instance is
/// being built.
#[derive(Debug, Clone)]
pub struct ChainContext {
    /// Network this node is operating on.
    pub network_id: NetworkId,
    /// Our own party identity.
    pub our_party: Party,
    /// Our on-chain participant verification key (may equal `our_party.vkey`
    /// or be a distinct on-chain-only key, depending on deployment).
    pub our_participant_vkey: VerificationKey,
    /// Default contestation period applied when a request does not specify one.
    pub default_contestation_period: ContestationPeriod,
    /// Known validator script hashes.
    pub scripts: ScriptRegistry,
}

/// `ChainContext` failed validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainContextError {
    /// The configured default contestation period exceeds what a node
    /// should reasonably offer (protects against a misconfigured, effectively
    /// infinite contestation window).
    #[error("default contestation period {0} seconds is unreasonably large")]
    ContestationPeriodTooLarge(u64),
}

/// Upper bound (seconds) past which a configured contestation period is
/// almost certainly a configuration mistake rather than an intentional
/// choice (it is still valid ledger-side; we just refuse to default to it).
const MAX_REASONABLE_CONTESTATION_PERIOD_SECS: u64 = 30 * 24 * 3600;

impl ChainContext {
    /// Validate this context, as the out-of-scope configuration layer
    /// should do once before handing it to the rest of the crate.
    pub fn validate(&self) -> Result<(), ChainContextError> {
        let secs = self.default_contestation_period.as_secs();
        if secs > MAX_REASONABLE_CONTESTATION_PERIOD_SECS {
            return Err(ChainContextError::ContestationPeriodTooLarge(secs));
        }
        Ok(())
    }
}

/// The parameters fixed at `Init` time: the ordered list of parties and the
/// contestation period for this specific Head instance.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HeadParameters {
    /// Ordered list of parties, fixed for the lifetime of the Head.
    pub parties: Vec<Party>,
    /// Contestation period for this Head instance.
    pub contestation_period: ContestationPeriod,
}
