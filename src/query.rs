//! Query surface over a ledger snapshot

use crate::error::{ConsensusError, Result};
use crate::ledger::LedgerSnapshot;
use crate::types::ValidationOutcome;

/// Help text listing the accepted queries
pub const QUERY_HELP: &str = "snapshot transactions: processed transactions and their validity\n\
                              snapshot utxoset: current UTXO set";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Transactions,
    UtxoSet,
}

impl Query {
    pub fn parse(line: &str) -> Result<Self> {
        match line.trim() {
            "snapshot transactions" => Ok(Query::Transactions),
            "snapshot utxoset" => Ok(Query::UtxoSet),
            other => Err(ConsensusError::InvalidQuery(other.to_string())),
        }
    }
}

/// Render the answer to `query` as output lines
pub fn render(query: Query, snapshot: &LedgerSnapshot) -> Vec<String> {
    match query {
        Query::Transactions => snapshot
            .processed
            .iter()
            .enumerate()
            .map(|(i, (txid, outcome))| match outcome {
                ValidationOutcome::Passed => {
                    format!("transaction{}: {}, validity check: {}", i, txid, outcome.label())
                }
                ValidationOutcome::Failed(reason) => {
                    format!("transaction{}: {}, validity check: {} ({})", i, txid, outcome.label(), reason)
                }
            })
            .collect(),
        Query::UtxoSet => snapshot
            .utxos
            .values()
            .enumerate()
            .map(|(i, utxo)| {
                format!(
                    "utxo{}: {}, {}, {}, {}",
                    i, utxo.outpoint.txid, utxo.outpoint.index, utxo.value, utxo.script_pubkey
                )
            })
            .collect(),
    }
}
