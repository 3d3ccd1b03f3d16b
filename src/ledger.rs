//! UTXO ledger: live outputs plus the processed-transaction log
//!
//! The ledger is only ever mutated through [`Ledger::apply_accepted`] and
//! [`Ledger::record_outcome`], both driven by the validator.

use crate::error::{ConsensusError, Result};
use crate::types::*;
use std::collections::HashSet;

/// Immutable copy of the ledger for the query surface
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub utxos: UtxoSet,
    pub processed: Vec<(String, ValidationOutcome)>,
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    utxos: UtxoSet,
    processed: Vec<(String, ValidationOutcome)>,
    recorded: HashSet<String>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from loaded UTXOs; the first occurrence of an outpoint wins
    pub fn from_utxos(utxos: impl IntoIterator<Item = UTXO>) -> Self {
        let mut ledger = Self::new();
        for utxo in utxos {
            if ledger.utxos.contains_key(&utxo.outpoint) {
                log::warn!("ignoring duplicate UTXO {}", utxo.outpoint);
                continue;
            }
            ledger.utxos.insert(utxo.outpoint.clone(), utxo);
        }
        ledger
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&UTXO> {
        self.utxos.get(outpoint)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.utxos.contains_key(outpoint)
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    pub fn utxos(&self) -> &UtxoSet {
        &self.utxos
    }

    pub fn processed(&self) -> &[(String, ValidationOutcome)] {
        &self.processed
    }

    pub fn is_recorded(&self, txid: &str) -> bool {
        self.recorded.contains(txid)
    }

    /// Atomically spend `consumed` and create `produced` under `txid`.
    ///
    /// Every consumed outpoint must be live and no produced outpoint may
    /// already exist. Both are checked before anything is touched, so an
    /// `Err` leaves the ledger unchanged.
    pub fn apply_accepted(&mut self, txid: &str, consumed: &[OutPoint], produced: &[TransactionOutput]) -> Result<()> {
        if let Some(missing) = consumed.iter().find(|op| !self.utxos.contains_key(*op)) {
            return Err(ConsensusError::ContractViolation(format!(
                "{} spends {} which is not in the UTXO set",
                txid, missing
            )));
        }

        let mut created = HashSet::with_capacity(produced.len());
        for output in produced {
            let outpoint = OutPoint::new(txid, output.index);
            let live = self.utxos.contains_key(&outpoint) && !consumed.contains(&outpoint);
            if live || !created.insert(outpoint.clone()) {
                return Err(ConsensusError::ContractViolation(format!(
                    "{} would create {} twice",
                    txid, outpoint
                )));
            }
        }

        for outpoint in consumed {
            self.utxos.remove(outpoint);
        }
        for output in produced {
            let utxo = UTXO::from_output(txid, output);
            self.utxos.insert(utxo.outpoint.clone(), utxo);
        }
        Ok(())
    }

    /// Append an outcome; returns `false` without recording if `txid` is
    /// already in the log
    pub fn record_outcome(&mut self, txid: &str, outcome: ValidationOutcome) -> bool {
        if !self.recorded.insert(txid.to_string()) {
            return false;
        }
        self.processed.push((txid.to_string(), outcome));
        true
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            utxos: self.utxos.clone(),
            processed: self.processed.clone(),
        }
    }
}
