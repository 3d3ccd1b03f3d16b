//! State transition: validate transactions and commit them to the ledger
//!
//! Transactions are processed strictly in batch order. Each one is checked
//! in isolation; a rejection is recorded and the batch moves on. The only
//! errors that escape are ledger contract violations, which mean the checks
//! below and the ledger disagree.

use crate::error::{ConsensusError, Result};
use crate::ledger::Ledger;
use crate::script::verify_script;
use crate::transaction::{check_transaction, check_tx_inputs};
use crate::types::*;

/// Tally of a processed batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub passed: usize,
    pub failed: usize,
    /// Transactions whose txid already had an outcome
    pub skipped: usize,
}

/// Run every input's unlocking script against the output it spends.
///
/// All inputs must be present in `ledger`. Stops at the first failing input.
pub fn check_scripts(tx: &Transaction, ledger: &Ledger) -> ValidationOutcome {
    for (i, input) in tx.inputs.iter().enumerate() {
        let Some(utxo) = ledger.get(&input.prevout) else {
            return ValidationOutcome::Failed(FailureReason::UtxoNotFound {
                outpoint: input.prevout.clone(),
            });
        };

        match verify_script(&input.script_sig, &utxo.script_pubkey, tx) {
            Ok(result) if result.success => {
                log::debug!("{} input {} unlocked {}", tx.txid, i, input.prevout);
            }
            Ok(result) => {
                return ValidationOutcome::Failed(FailureReason::ScriptExecutionFailed {
                    input: i,
                    opcode: result.failing_opcode,
                });
            }
            Err(e) => {
                let message = match e {
                    ConsensusError::ScriptExecution(message) => message,
                    other => other.to_string(),
                };
                return ValidationOutcome::Failed(FailureReason::EngineFault { input: i, message });
            }
        }
    }
    ValidationOutcome::Passed
}

/// Outputs of `tx` that would land on an outpoint that is already live
fn check_outputs_unclaimed(tx: &Transaction, ledger: &Ledger) -> ValidationOutcome {
    for output in &tx.outputs {
        let outpoint = tx.outpoint_of(output);
        if ledger.contains(&outpoint) && !tx.inputs.iter().any(|i| i.prevout == outpoint) {
            return ValidationOutcome::Failed(FailureReason::MalformedTransaction(format!(
                "Output {} already exists",
                outpoint
            )));
        }
    }
    ValidationOutcome::Passed
}

fn evaluate(tx: &Transaction, ledger: &Ledger) -> ValidationOutcome {
    let outcome = check_transaction(tx);
    if !outcome.is_passed() {
        return outcome;
    }

    let (outcome, fee) = check_tx_inputs(tx, ledger);
    if !outcome.is_passed() {
        return outcome;
    }
    log::debug!("{} leaves {} unclaimed", tx.txid, fee);

    let outcome = check_outputs_unclaimed(tx, ledger);
    if !outcome.is_passed() {
        return outcome;
    }

    check_scripts(tx, ledger)
}

/// Validate one transaction and, if it passes, commit it.
///
/// Returns `None` when the txid was already processed.
pub fn process_transaction(ledger: &mut Ledger, tx: &Transaction) -> Result<Option<ValidationOutcome>> {
    if ledger.is_recorded(&tx.txid) {
        log::debug!("skipping already processed transaction {}", tx.txid);
        return Ok(None);
    }

    let outcome = evaluate(tx, ledger);
    match &outcome {
        ValidationOutcome::Passed => {
            ledger.apply_accepted(&tx.txid, &tx.consumed_outpoints(), &tx.outputs)?;
            log::info!("transaction {} passed", tx.txid);
        }
        ValidationOutcome::Failed(reason) => {
            log::info!("transaction {} failed: {}", tx.txid, reason);
        }
    }

    ledger.record_outcome(&tx.txid, outcome.clone());
    Ok(Some(outcome))
}

/// Process a batch in order, isolating each transaction
pub fn validate_batch(ledger: &mut Ledger, transactions: &[Transaction]) -> Result<BatchSummary> {
    let mut summary = BatchSummary::default();
    for tx in transactions {
        match process_transaction(ledger, tx)? {
            Some(ValidationOutcome::Passed) => summary.passed += 1,
            Some(ValidationOutcome::Failed(_)) => summary.failed += 1,
            None => summary.skipped += 1,
        }
    }
    log::info!(
        "processed batch: {} passed, {} failed, {} skipped",
        summary.passed,
        summary.failed,
        summary.skipped
    );
    Ok(summary)
}
