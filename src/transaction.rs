//! Transaction structure and input checks
//!
//! These run before any script is executed: a transaction that fails here is
//! rejected without touching the script engine.

use crate::ledger::Ledger;
use crate::types::*;
use std::collections::HashSet;

fn malformed(msg: String) -> ValidationOutcome {
    ValidationOutcome::Failed(FailureReason::MalformedTransaction(msg))
}

/// CheckTransaction: 𝒯𝒳 → {valid, invalid}
///
/// A transaction tx = (ins, outs) is well formed if and only if:
/// 1. |ins| > 0 ∧ |outs| > 0
/// 2. no outpoint appears twice in ins
/// 3. no output index appears twice in outs
/// 4. ∀o ∈ outs: o.value ≥ 0
pub fn check_transaction(tx: &Transaction) -> ValidationOutcome {
    // 1. Check inputs and outputs are not empty
    if tx.inputs.is_empty() || tx.outputs.is_empty() {
        return malformed("Empty inputs or outputs".to_string());
    }

    // 2. An outpoint can only be spent once
    let mut spent = HashSet::with_capacity(tx.inputs.len());
    for (i, input) in tx.inputs.iter().enumerate() {
        if !spent.insert(&input.prevout) {
            return malformed(format!("Input {} spends {} twice", i, input.prevout));
        }
    }

    // 3. Output indices identify outputs
    let mut indices = HashSet::with_capacity(tx.outputs.len());
    for output in &tx.outputs {
        if !indices.insert(output.index) {
            return malformed(format!("Duplicate output index {}", output.index));
        }
    }

    // 4. Values are non-negative
    if let Some(output) = tx.outputs.iter().find(|o| o.value < Amount::ZERO) {
        return malformed(format!("Negative value {} at output {}", output.value, output.index));
    }

    ValidationOutcome::Passed
}

/// CheckTxInputs: 𝒯𝒳 × 𝒰𝒮 → {valid, invalid} × ℚ
///
/// For transaction tx with UTXO set us:
/// 1. If ∃i ∈ ins: i.prevout ∉ us: return (invalid, 0)
/// 2. Let total_in = Σᵢ us(i.prevout).value
/// 3. Let total_out = Σₒ o.value
/// 4. If total_in < total_out: return (invalid, 0)
/// 5. Return (valid, total_in - total_out)
///
/// Sums are exact; one that exceeds the decimal range rejects the transaction.
pub fn check_tx_inputs(tx: &Transaction, ledger: &Ledger) -> (ValidationOutcome, Amount) {
    let mut total_input_value = Amount::ZERO;

    for input in &tx.inputs {
        let Some(utxo) = ledger.get(&input.prevout) else {
            return (
                ValidationOutcome::Failed(FailureReason::UtxoNotFound {
                    outpoint: input.prevout.clone(),
                }),
                Amount::ZERO,
            );
        };
        total_input_value = match total_input_value.checked_add(utxo.value) {
            Some(total) => total,
            None => return (malformed("Input value overflow".to_string()), Amount::ZERO),
        };
    }

    let total_output_value = match tx
        .outputs
        .iter()
        .try_fold(Amount::ZERO, |total, o| total.checked_add(o.value))
    {
        Some(total) => total,
        None => return (malformed("Output value overflow".to_string()), Amount::ZERO),
    };

    if total_input_value < total_output_value {
        return (
            ValidationOutcome::Failed(FailureReason::InsufficientAmount {
                input: total_input_value,
                output: total_output_value,
            }),
            Amount::ZERO,
        );
    }

    let fee = total_input_value - total_output_value;
    (ValidationOutcome::Passed, fee)
}
