//! Transaction and UTXO snapshot loading
//!
//! Snapshots are JSON documents of the form `{"transactions": [...]}` and
//! `{"utxos": [...]}`. Duplicate records are dropped at load time; the first
//! occurrence wins.

use crate::error::{ConsensusError, Result};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionSnapshot {
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UtxoSnapshot {
    pub utxos: Vec<UTXO>,
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| ConsensusError::Snapshot(format!("{}: {}", path.display(), e)))
}

/// Parse a transaction snapshot, dropping repeated txids
pub fn parse_transactions(json: &str) -> Result<Vec<Transaction>> {
    let snapshot: TransactionSnapshot =
        serde_json::from_str(json).map_err(|e| ConsensusError::Snapshot(format!("transactions: {}", e)))?;

    let mut seen = HashSet::new();
    let mut transactions = Vec::with_capacity(snapshot.transactions.len());
    for tx in snapshot.transactions {
        if !seen.insert(tx.txid.clone()) {
            log::warn!("ignoring duplicate transaction {}", tx.txid);
            continue;
        }
        transactions.push(tx);
    }
    Ok(transactions)
}

/// Parse a UTXO snapshot. Duplicates are kept here and resolved by
/// [`Ledger::from_utxos`](crate::ledger::Ledger::from_utxos).
///
/// Values may be JSON integers or decimals; negative values are rejected.
pub fn parse_utxos(json: &str) -> Result<Vec<UTXO>> {
    let snapshot: UtxoSnapshot =
        serde_json::from_str(json).map_err(|e| ConsensusError::Snapshot(format!("utxos: {}", e)))?;
    if let Some(utxo) = snapshot.utxos.iter().find(|u| u.value < Amount::ZERO) {
        return Err(ConsensusError::Snapshot(format!(
            "utxos: negative value {} at {}",
            utxo.value, utxo.outpoint
        )));
    }
    Ok(snapshot.utxos)
}

pub fn load_transactions(path: impl AsRef<Path>) -> Result<Vec<Transaction>> {
    parse_transactions(&read(path.as_ref())?)
}

pub fn load_utxos(path: impl AsRef<Path>) -> Result<Vec<UTXO>> {
    parse_utxos(&read(path.as_ref())?)
}
