//! # UTXO-Consensus
//!
//! Transaction acceptance for a UTXO ledger: a batch of transactions is
//! validated against an unspent-output snapshot, and each accepted
//! transaction atomically moves value from the outputs it spends to the
//! outputs it creates.
//!
//! ## Architecture
//!
//! The crate is layered, leaves first:
//! - [`signature`]: signing digest and ECDSA verification (secp256k1)
//! - [`script`]: stack machine running unlocking + locking scripts
//! - [`ledger`]: the UTXO set and the processed-transaction log
//! - [`validation`]: the state-transition function tying them together
//!
//! [`snapshot`] and [`query`] sit at the edges: loading JSON snapshots and
//! answering `snapshot transactions` / `snapshot utxoset`.
//!
//! ## Design Principles
//!
//! 1. **Explicit State**: the ledger is a value passed to the validator, never ambient
//! 2. **Rejections Are Values**: a failing transaction is a recorded outcome, not an error
//! 3. **Sequential Commit**: later transactions see the effects of earlier ones
//! 4. **Exact Version Pinning**: consensus-critical cryptography is pinned
//!
//! ## Usage
//!
//! ```rust
//! use utxo_consensus::FullNode;
//! use utxo_consensus::types::*;
//!
//! let mut node = FullNode::new(vec![UTXO {
//!     outpoint: OutPoint::new("genesis", 0),
//!     value: Amount::from(100),
//!     script_pubkey: "TRUE".to_string(),
//! }]);
//! let tx = Transaction {
//!     txid: "spend".to_string(),
//!     hash: None,
//!     version: 1,
//!     size: None,
//!     locktime: 0,
//!     inputs: vec![TransactionInput {
//!         prevout: OutPoint::new("genesis", 0),
//!         script_sig: String::new(),
//!     }],
//!     outputs: vec![TransactionOutput {
//!         value: Amount::from(90),
//!         index: 0,
//!         script_pubkey: "TRUE".to_string(),
//!     }],
//!     blockhash: None,
//!     confirmations: None,
//!     time: None,
//!     blocktime: None,
//! };
//! let summary = node.process(&[tx]).unwrap();
//! assert_eq!(summary.passed, 1);
//! ```

pub mod types;
pub mod constants;
pub mod opcodes;
pub mod crypto;
pub mod signature;
pub mod script;
pub mod ledger;
pub mod transaction;
pub mod validation;
pub mod snapshot;
pub mod query;
pub mod error;

// Re-export commonly used types
pub use types::*;
pub use constants::*;
pub use error::{ConsensusError, Result};
pub use ledger::{Ledger, LedgerSnapshot};
pub use validation::BatchSummary;

use std::path::Path;

/// A validating node over an in-memory ledger
///
/// # Examples
///
/// ```
/// use utxo_consensus::FullNode;
///
/// let node = FullNode::new(vec![]);
/// assert!(node.snapshot().utxos.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct FullNode {
    ledger: Ledger,
}

impl FullNode {
    /// Create a node whose ledger starts from `utxos`
    pub fn new(utxos: impl IntoIterator<Item = UTXO>) -> Self {
        Self {
            ledger: Ledger::from_utxos(utxos),
        }
    }

    /// Load both snapshots and validate every transaction
    pub fn from_files(transactions: impl AsRef<Path>, utxos: impl AsRef<Path>) -> Result<Self> {
        let utxos = snapshot::load_utxos(utxos)?;
        let transactions = snapshot::load_transactions(transactions)?;
        let mut node = Self::new(utxos);
        node.process(&transactions)?;
        Ok(node)
    }

    /// Validate `transactions` in order, committing the ones that pass
    pub fn process(&mut self, transactions: &[Transaction]) -> Result<BatchSummary> {
        validation::validate_batch(&mut self.ledger, transactions)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }

    /// Answer a textual query such as `snapshot utxoset`
    pub fn query(&self, line: &str) -> Result<Vec<String>> {
        let parsed = query::Query::parse(line)?;
        Ok(query::render(parsed, &self.snapshot()))
    }
}
