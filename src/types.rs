//! Core ledger types for transaction validation
//!
//! Wire types use the field names of the JSON snapshots (`vin`, `vout`,
//! `scriptSig`, `scriptPubKey`, ...) so they can be deserialized directly.

use crate::opcodes::Opcode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Amount type: non-negative value, integral or decimal.
///
/// Snapshots carry plain JSON numbers such as `100` or `0.001`; they are
/// read into an exact decimal so conservation sums never round.
pub type Amount = Decimal;

/// Whitespace-tokenized script text
pub type ScriptText = String;

/// OutPoint: identifies one output of one transaction
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: String,
    #[serde(rename = "vout")]
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: impl Into<String>, index: u32) -> Self {
        Self {
            txid: txid.into(),
            index,
        }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// Transaction Input: outpoint being spent plus unlocking script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    #[serde(flatten)]
    pub prevout: OutPoint,
    #[serde(rename = "scriptSig", default)]
    pub script_sig: ScriptText,
}

/// Transaction Output: value locked by a script at a given index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub value: Amount,
    #[serde(rename = "n")]
    pub index: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pubkey: ScriptText,
}

/// Transaction record as found in a snapshot.
///
/// The optional fields are opaque payload: they are not interpreted by the
/// engine but they are part of what gets signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub txid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default)]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default)]
    pub locktime: u32,
    #[serde(rename = "vin")]
    pub inputs: Vec<TransactionInput>,
    #[serde(rename = "vout")]
    pub outputs: Vec<TransactionOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockhash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmations: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocktime: Option<u64>,
}

impl Transaction {
    /// Outpoints consumed by this transaction, in input order
    pub fn consumed_outpoints(&self) -> Vec<OutPoint> {
        self.inputs.iter().map(|i| i.prevout.clone()).collect()
    }

    /// Outpoint that output `output` will occupy once accepted
    pub fn outpoint_of(&self, output: &TransactionOutput) -> OutPoint {
        OutPoint::new(self.txid.clone(), output.index)
    }
}

/// UTXO: a live, spendable output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UTXO {
    #[serde(flatten)]
    pub outpoint: OutPoint,
    pub value: Amount,
    #[serde(rename = "scriptPubKey")]
    pub script_pubkey: ScriptText,
}

impl UTXO {
    /// UTXO created by output `output` of transaction `txid`
    pub fn from_output(txid: &str, output: &TransactionOutput) -> Self {
        Self {
            outpoint: OutPoint::new(txid, output.index),
            value: output.value,
            script_pubkey: output.script_pubkey.clone(),
        }
    }
}

/// UTXO Set: OutPoint → UTXO, ordered for deterministic snapshots
pub type UtxoSet = BTreeMap<OutPoint, UTXO>;

/// Why a transaction was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// A consumed outpoint is not in the UTXO set
    UtxoNotFound { outpoint: OutPoint },
    /// Inputs are worth less than the declared outputs
    InsufficientAmount { input: Amount, output: Amount },
    /// A script condition failed; `None` means the script completed but did
    /// not leave exactly one `TRUE` on the stack
    ScriptExecutionFailed { input: usize, opcode: Option<Opcode> },
    /// The script itself is malformed (underflow, limits, unbalanced IF)
    EngineFault { input: usize, message: String },
    /// Structural problem with the transaction itself
    MalformedTransaction(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::UtxoNotFound { outpoint } => write!(f, "utxo not found: {}", outpoint),
            FailureReason::InsufficientAmount { input, output } => {
                write!(f, "insufficient amount: inputs {} < outputs {}", input, output)
            }
            FailureReason::ScriptExecutionFailed {
                input,
                opcode: Some(op),
            } => write!(f, "script failed at {} (input {})", op, input),
            FailureReason::ScriptExecutionFailed { input, opcode: None } => {
                write!(f, "script left an unsatisfied stack (input {})", input)
            }
            FailureReason::EngineFault { input, message } => {
                write!(f, "engine fault: {} (input {})", message, input)
            }
            FailureReason::MalformedTransaction(msg) => write!(f, "malformed transaction: {}", msg),
        }
    }
}

/// Validation outcome recorded against a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Passed,
    Failed(FailureReason),
}

impl ValidationOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, ValidationOutcome::Passed)
    }

    /// Short label used by the query surface
    pub fn label(&self) -> &'static str {
        match self {
            ValidationOutcome::Passed => "passed",
            ValidationOutcome::Failed(_) => "failed",
        }
    }
}
