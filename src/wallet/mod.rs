//! [B] `TinyWallet` (§4.B): tracks a set of UTxOs controlled by a payment
//! key, covers fees, balances change, signs.

pub mod coin_selection;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::info;

use crate::log::DirectChainLog;
use crate::tx::{Signature, Tx, TxIn, TxOut, UTxO, Value, VerificationKey};
use coin_selection::{select_for_fee_coverage, NotEnoughFunds};

/// A keypair's public half plus whatever the environment needs to produce a
/// witness; the signing operation itself is delegated to an injected
/// [`Signer`] (the actual key store is an out-of-scope collaborator, §1).
pub trait Signer: Send + Sync {
    /// This signer's verification key.
    fn vkey(&self) -> VerificationKey;
    /// Produce a signature over the given transaction body bytes.
    fn sign_tx(&self, tx: &Tx) -> Signature;
}

/// [B] `TinyWallet`: owns a mutable snapshot of UTxOs addressable by our
/// payment key plus the signing key (§4.B). Updated on every roll-forward by
/// [`crate::chain_sync::ChainSyncHandler`] (add outputs to us, remove spent
/// inputs of ours).
pub struct TinyWallet {
    signer: std::sync::Arc<dyn Signer>,
    utxo: RwLock<UTxO>,
    /// Wallet-estimated fee rate (lovelace per byte); a stand-in for a
    /// protocol parameter fetched from the node's cached ledger parameters.
    fee_rate_per_byte: u64,
}

impl TinyWallet {
    /// Start a wallet with no known UTxOs; `signer` provides our payment key.
    pub fn new(signer: std::sync::Arc<dyn Signer>, fee_rate_per_byte: u64) -> Self {
        TinyWallet {
            signer,
            utxo: RwLock::new(UTxO::new()),
            fee_rate_per_byte,
        }
    }

    /// Apply a roll-forward observation to our UTxO snapshot: add outputs
    /// that pay to us, remove inputs we controlled that were just spent.
    pub fn apply_roll_forward(&self, spent: &[TxIn], produced: &[(TxIn, TxOut)]) {
        let our_vkey = self.signer.vkey();
        let mut utxo = self.utxo.write();
        for txin in spent {
            utxo.remove(txin);
        }
        for (txin, out) in produced {
            if is_ours(out, &our_vkey) {
                utxo.insert(*txin, out.clone());
            }
        }
        info!(event = ?DirectChainLog::WalletUtxoUpdated { utxo_count: utxo.len() }, "wallet UTxO snapshot updated");
    }

    /// `get_utxo() -> UTxO` (§4.B).
    pub fn get_utxo(&self) -> UTxO {
        self.utxo.read().clone()
    }

    /// `get_seed_input() -> Option<TxIn>` (§4.B): any one controlled input
    /// suitable as the Head seed; `None` iff the wallet is empty.
    pub fn get_seed_input(&self) -> Option<TxIn> {
        self.utxo.read().keys().next().copied()
    }

    /// The set of `TxIn`s this wallet currently controls, for the
    /// `SpendingNodeUtxoForbidden` check in [`crate::tx::construct::commit`]
    /// and [`crate::poster::ChainPoster::draft_commit_tx`].
    pub fn owned_inputs(&self) -> std::collections::BTreeSet<TxIn> {
        self.utxo.read().keys().copied().collect()
    }

    /// `cover_fee(knownUtxo, partialTx) -> Result<Tx, CoverFeeErr>` (§4.B).
    ///
    /// `known_utxo` is the set of script-locked inputs the caller already
    /// knows about, so fee estimation can price their script execution; we
    /// fold their combined weight into the base weight priced before any
    /// wallet inputs are added.
    pub fn cover_fee(&self, known_utxo: &UTxO, partial_tx: Tx) -> Result<Tx, CoverFeeErr> {
        let snapshot = self.utxo.read();
        if snapshot.is_empty() {
            return Err(CoverFeeErr::NoFuelUtxoFound);
        }
        // `partial_tx` may already consume one of our own UTxOs (e.g. as a
        // Head seed input); excluding it here keeps coin selection from
        // picking the same UTxO again as fee fuel.
        let already_spent: std::collections::BTreeSet<_> = partial_tx.inputs.iter().copied().collect();
        let utxo: UTxO = snapshot
            .iter()
            .filter(|(txin, _)| !already_spent.contains(*txin))
            .map(|(txin, out)| (*txin, out.clone()))
            .collect();

        let base_weight = estimate_weight(&partial_tx, known_utxo);
        let outputs_total = partial_tx.total_output_value();

        let coverage = select_for_fee_coverage(&utxo, outputs_total, base_weight, self.fee_rate_per_byte)
            .map_err(|NotEnoughFunds { available, required }| CoverFeeErr::NotEnoughFunds {
                available,
                required,
            })?;

        let mut balanced = partial_tx;
        balanced.inputs.extend(coverage.selected_inputs.iter().copied());
        balanced.fee = coverage.fee;
        if let Some(change) = coverage.change {
            balanced.outputs.push(TxOut {
                address: change_address(&self.signer.vkey()),
                value: change,
                datum: None,
                reference_script: None,
            });
        }
        Ok(balanced)
    }

    /// `sign(tx) -> Tx` (§4.B): attach our witness; pure w.r.t. wallet state.
    pub fn sign(&self, mut tx: Tx) -> Tx {
        let signature = self.signer.sign_tx(&tx);
        tx.witnesses.push(signature);
        tx
    }
}

fn is_ours(out: &TxOut, vkey: &VerificationKey) -> bool {
    out.address.0 == vkey.0
}

fn change_address(vkey: &VerificationKey) -> crate::tx::Address {
    crate::tx::Address(vkey.0.to_vec())
}

/// A rough per-byte weight estimate for a partial transaction plus the
/// script-locked inputs the caller told us about, so the initial fee
/// estimate already prices their execution cost before any wallet inputs
/// are added (§4.B).
fn estimate_weight(tx: &Tx, known_utxo: &UTxO) -> u64 {
    const OVERHEAD_BYTES: u64 = 160;
    const OUTPUT_BYTES: u64 = 50;
    const KNOWN_INPUT_BYTES: u64 = 220; // includes an estimate of script execution cost

    let existing_inputs = tx.inputs.len() as u64;
    let known_inputs = known_utxo.len() as u64;
    let outputs = tx.outputs.len() as u64;

    OVERHEAD_BYTES
        + existing_inputs * coin_selection::ESTIMATED_INPUT_WEIGHT_BYTES
        + known_inputs * KNOWN_INPUT_BYTES
        + outputs * OUTPUT_BYTES
}

/// Errors returned by [`TinyWallet::cover_fee`] (§4.B).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoverFeeErr {
    /// The wallet has no UTxO at all to draw fees from.
    #[error("no fuel UTxO found in the wallet")]
    NoFuelUtxoFound,
    /// The wallet's UTxOs cannot cover the requested outputs plus fee.
    #[error("not enough funds: {available} available, {required} required")]
    NotEnoughFunds {
        /// Lovelace available.
        available: u64,
        /// Lovelace required.
        required: u64,
    },
    /// A script failed to execute during fee estimation.
    #[error("script execution failed at input {ptr}: {reason}")]
    ScriptExecutionFailed {
        /// Index of the failing redeemer pointer.
        ptr: usize,
        /// Human-readable failure reason from the script evaluator.
        reason: String,
    },
    /// Any other balancing failure not covered above.
    #[error("wallet balancing error: {reason}")]
    Other {
        /// Human-readable failure reason.
        reason: String,
        /// The transaction the wallet was attempting to balance when it failed.
        tx: Tx,
    },
}
