//! Script execution engine
//!
//! A script is the unlocking words of an input followed by the locking words
//! of the output it spends, run on a single stack of strings:
//! 1. Initialize stack S = ∅ and conditional frames F = ∅
//! 2. For each token t:
//!    - If |S| > L_stack or operation count > L_ops: fault
//!    - If every frame in F is enabled, execute t; otherwise only track
//!      IF/ELSE/ENDIF nesting
//!    - A failed *VERIFY aborts the script
//! 3. Succeed iff F = ∅ and S = [TRUE]

use crate::constants::*;
use crate::crypto::{hash160_hex, stack_item_bytes};
use crate::error::{ConsensusError, Result};
use crate::opcodes::{tokenize, Opcode, Token};
use crate::signature::verify_signature;
use crate::types::Transaction;

/// Outcome of running a script to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptResult {
    pub success: bool,
    /// Opcode whose condition failed, if any. On an unsatisfied final stack
    /// with no failed condition this is `None`.
    pub failing_opcode: Option<Opcode>,
}

impl ScriptResult {
    pub fn passed() -> Self {
        Self {
            success: true,
            failing_opcode: None,
        }
    }

    pub fn failed(opcode: Option<Opcode>) -> Self {
        Self {
            success: false,
            failing_opcode: opcode,
        }
    }
}

/// How a token stream ended, before the final stack check
enum Completion {
    Finished,
    Aborted(Opcode),
}

struct Interpreter<'a> {
    tx: &'a Transaction,
    stack: &'a mut Vec<String>,
    frames: Vec<bool>,
    op_count: usize,
    failing_opcode: Option<Opcode>,
}

impl<'a> Interpreter<'a> {
    fn new(tx: &'a Transaction, stack: &'a mut Vec<String>) -> Self {
        Self {
            tx,
            stack,
            frames: Vec::new(),
            op_count: 0,
            failing_opcode: None,
        }
    }

    fn executing(&self) -> bool {
        self.frames.iter().all(|enabled| *enabled)
    }

    fn fault(op: Opcode, msg: &str) -> ConsensusError {
        ConsensusError::ScriptExecution(format!("{}: {}", op, msg))
    }

    fn pop(&mut self, op: Opcode) -> Result<String> {
        self.stack.pop().ok_or_else(|| Self::fault(op, "stack underflow"))
    }

    fn push(&mut self, item: String) -> Result<()> {
        self.stack.push(item);
        if self.stack.len() > MAX_STACK_SIZE {
            return Err(ConsensusError::ScriptExecution("Stack overflow".to_string()));
        }
        Ok(())
    }

    fn push_bool(&mut self, value: bool) -> Result<()> {
        self.push(if value { TRUE_LITERAL } else { FALSE_LITERAL }.to_string())
    }

    fn pop_count(&mut self, op: Opcode) -> Result<usize> {
        let item = self.pop(op)?;
        item.parse::<usize>()
            .map_err(|_| Self::fault(op, &format!("expected a count, found {:?}", item)))
    }

    fn run(&mut self, tokens: &[Token]) -> Result<Completion> {
        if tokens.len() > MAX_SCRIPT_SIZE {
            return Err(ConsensusError::ScriptExecution(format!(
                "Script too large: {} tokens",
                tokens.len()
            )));
        }

        for token in tokens {
            match token {
                Token::Data(item) => {
                    if self.executing() {
                        self.push(item.clone())?;
                    }
                }
                Token::Op(op) => {
                    self.op_count += 1;
                    if self.op_count > MAX_SCRIPT_OPS {
                        return Err(ConsensusError::ScriptExecution("Operation limit exceeded".to_string()));
                    }
                    if !op.is_conditional() && !self.executing() {
                        continue;
                    }
                    if !self.execute_opcode(*op)? {
                        log::trace!("script aborted at {}", op);
                        return Ok(Completion::Aborted(*op));
                    }
                }
            }
        }

        if !self.frames.is_empty() {
            return Err(ConsensusError::ScriptExecution("IF without matching ENDIF".to_string()));
        }
        Ok(Completion::Finished)
    }

    /// Execute a single opcode; `Ok(false)` aborts the script
    fn execute_opcode(&mut self, op: Opcode) -> Result<bool> {
        match op {
            Opcode::Dup => {
                let top = self
                    .stack
                    .last()
                    .cloned()
                    .ok_or_else(|| Self::fault(op, "stack underflow"))?;
                self.push(top)?;
                Ok(true)
            }

            Opcode::Hash => {
                let item = self.pop(op)?;
                self.push(hash160_hex(&stack_item_bytes(&item)))?;
                Ok(true)
            }

            Opcode::Equal => {
                let a = self.pop(op)?;
                let b = self.pop(op)?;
                let equal = a == b;
                if !equal {
                    self.failing_opcode = Some(op);
                }
                self.push_bool(equal)?;
                Ok(true)
            }

            Opcode::EqualVerify => {
                let a = self.pop(op)?;
                let b = self.pop(op)?;
                Ok(a == b)
            }

            Opcode::CheckSig | Opcode::CheckSigVerify => {
                let pubkey = self.pop(op)?;
                let signature = self.pop(op)?;
                let valid = verify_signature(self.tx, &signature, &pubkey);
                if op == Opcode::CheckSigVerify {
                    return Ok(valid);
                }
                if !valid {
                    self.failing_opcode = Some(op);
                }
                self.push_bool(valid)?;
                Ok(true)
            }

            Opcode::CheckMultiSig | Opcode::CheckMultiSigVerify => {
                let satisfied = self.check_multisig(op)?;
                if op == Opcode::CheckMultiSigVerify {
                    return Ok(satisfied);
                }
                if !satisfied {
                    self.failing_opcode = Some(op);
                }
                self.push_bool(satisfied)?;
                Ok(true)
            }

            Opcode::If => {
                let enabled = if self.executing() {
                    let item = self.pop(op)?;
                    parse_condition(&item).ok_or_else(|| Self::fault(op, &format!("expected a boolean, found {:?}", item)))?
                } else {
                    false
                };
                self.frames.push(enabled);
                Ok(true)
            }

            Opcode::Else => {
                let frame = self
                    .frames
                    .last_mut()
                    .ok_or_else(|| Self::fault(op, "without matching IF"))?;
                *frame = !*frame;
                Ok(true)
            }

            Opcode::EndIf => {
                self.frames.pop().ok_or_else(|| Self::fault(op, "without matching IF"))?;
                Ok(true)
            }
        }
    }

    /// Stack: [sig1] ... [sigm] [m] [pubkey1] ... [pubkeyn] [n]
    ///
    /// Each signature, in order, takes the first unused key that verifies
    /// it. Satisfied iff all m signatures find a key.
    fn check_multisig(&mut self, op: Opcode) -> Result<bool> {
        let n = self.pop_count(op)?;
        if n > MAX_PUBKEYS_PER_MULTISIG {
            return Err(Self::fault(op, &format!("too many public keys: {}", n)));
        }
        let mut pubkeys = Vec::with_capacity(n);
        for _ in 0..n {
            pubkeys.push(self.pop(op)?);
        }
        pubkeys.reverse();

        let m = self.pop_count(op)?;
        if m > n {
            return Err(Self::fault(op, &format!("{} signatures required from {} keys", m, n)));
        }
        let mut signatures = Vec::with_capacity(m);
        for _ in 0..m {
            signatures.push(self.pop(op)?);
        }
        signatures.reverse();

        let mut used = vec![false; n];
        for signature in &signatures {
            let matched = pubkeys
                .iter()
                .enumerate()
                .find(|(i, pubkey)| !used[*i] && verify_signature(self.tx, signature, pubkey))
                .map(|(i, _)| i);
            match matched {
                Some(i) => used[i] = true,
                None => return Ok(false),
            }
        }
        Ok(true)
    }
}

/// IF operand: TRUE/FALSE, or a decimal integer where non-zero is true
fn parse_condition(item: &str) -> Option<bool> {
    match item {
        TRUE_LITERAL => Some(true),
        FALSE_LITERAL => Some(false),
        _ => item.parse::<i64>().ok().map(|n| n != 0),
    }
}

/// EvalScript: run `tokens` on `stack`.
///
/// `Err` means the script is malformed (engine fault); a script that runs
/// but does not authorize spending is `Ok` with `success == false`.
pub fn eval_script(tokens: &[Token], stack: &mut Vec<String>, tx: &Transaction) -> Result<ScriptResult> {
    let mut interpreter = Interpreter::new(tx, stack);
    let completion = interpreter.run(tokens)?;
    let failing_opcode = interpreter.failing_opcode;

    match completion {
        Completion::Aborted(op) => Ok(ScriptResult::failed(Some(op))),
        Completion::Finished if stack.len() == 1 && stack[0] == TRUE_LITERAL => Ok(ScriptResult::passed()),
        Completion::Finished => Ok(ScriptResult::failed(failing_opcode)),
    }
}

/// Expected script hash if `locking` is exactly `HASH <hash> EQUALVERIFY`
pub fn p2sh_script_hash(locking: &[Token]) -> Option<&str> {
    match locking {
        [Token::Op(Opcode::Hash), Token::Data(hash), Token::Op(Opcode::EqualVerify)] => Some(hash.as_str()),
        _ => None,
    }
}

/// Two-phase evaluation of a script-hash output.
///
/// Phase 1 checks the HASH160 of the raw unlocking text against
/// `expected_hash`. Phase 2 runs that text as a locking script of its own
/// against an empty unlocking script.
pub fn verify_p2sh(redeem_script: &str, expected_hash: &str, tx: &Transaction) -> Result<ScriptResult> {
    let redeem_script = redeem_script.trim();
    if hash160_hex(redeem_script.as_bytes()) != expected_hash.to_ascii_lowercase() {
        return Ok(ScriptResult::failed(Some(Opcode::EqualVerify)));
    }

    let mut stack = Vec::new();
    eval_script(&tokenize(redeem_script), &mut stack, tx)
}

/// VerifyScript: does `script_sig` unlock `script_pubkey` for `tx`?
pub fn verify_script(script_sig: &str, script_pubkey: &str, tx: &Transaction) -> Result<ScriptResult> {
    let locking = tokenize(script_pubkey);
    if let Some(expected_hash) = p2sh_script_hash(&locking) {
        return verify_p2sh(script_sig, expected_hash, tx);
    }

    let mut tokens = tokenize(script_sig);
    tokens.extend(locking);
    let mut stack = Vec::new();
    eval_script(&tokens, &mut stack, tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::sign_transaction;
    use crate::types::*;
    use secp256k1::{PublicKey, Secp256k1, SecretKey};

    fn empty_tx() -> Transaction {
        Transaction {
            txid: "t".to_string(),
            hash: None,
            version: 1,
            size: None,
            locktime: 0,
            inputs: vec![TransactionInput {
                prevout: OutPoint::new("prev", 0),
                script_sig: String::new(),
            }],
            outputs: vec![TransactionOutput {
                value: Amount::from(1),
                index: 0,
                script_pubkey: "TRUE".to_string(),
            }],
            blockhash: None,
            confirmations: None,
            time: None,
            blocktime: None,
        }
    }

    fn keypair(byte: u8) -> (SecretKey, String) {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[byte; 32]).unwrap();
        (sk, hex::encode(PublicKey::from_secret_key(&secp, &sk).serialize()))
    }

    fn run(script: &str) -> Result<ScriptResult> {
        let tx = empty_tx();
        let mut stack = Vec::new();
        eval_script(&tokenize(script), &mut stack, &tx)
    }

    #[test]
    fn test_single_true_succeeds() {
        assert_eq!(run("TRUE").unwrap(), ScriptResult::passed());
    }

    #[test]
    fn test_extra_items_fail() {
        let result = run("TRUE TRUE").unwrap();
        assert!(!result.success);
        assert_eq!(result.failing_opcode, None);
    }

    #[test]
    fn test_dup_and_equal() {
        let tx = empty_tx();
        let mut stack = Vec::new();
        let result = eval_script(&tokenize("abc DUP EQUAL"), &mut stack, &tx).unwrap();
        assert!(result.success);
        assert_eq!(stack, vec![TRUE_LITERAL.to_string()]);
    }

    #[test]
    fn test_equal_mismatch_records_opcode() {
        let tx = empty_tx();
        let mut stack = Vec::new();
        let result = eval_script(&tokenize("a b EQUAL"), &mut stack, &tx).unwrap();
        assert_eq!(result, ScriptResult::failed(Some(Opcode::Equal)));
        assert_eq!(stack, vec![FALSE_LITERAL.to_string()]);
    }

    #[test]
    fn test_equalverify_aborts() {
        let tx = empty_tx();
        let mut stack = Vec::new();
        let result = eval_script(&tokenize("a b EQUALVERIFY TRUE"), &mut stack, &tx).unwrap();
        assert_eq!(result, ScriptResult::failed(Some(Opcode::EqualVerify)));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_hash_pushes_hash160_hex() {
        let tx = empty_tx();
        let mut stack = Vec::new();
        eval_script(&tokenize("00ff HASH"), &mut stack, &tx).unwrap();
        assert_eq!(stack, vec![hash160_hex(&[0x00, 0xff])]);
    }

    #[test]
    fn test_underflow_is_fault() {
        assert!(matches!(run("DUP"), Err(ConsensusError::ScriptExecution(_))));
        assert!(matches!(run("a EQUAL"), Err(ConsensusError::ScriptExecution(_))));
        assert!(matches!(run("HASH"), Err(ConsensusError::ScriptExecution(_))));
        assert!(matches!(run("a CHECKSIG"), Err(ConsensusError::ScriptExecution(_))));
    }

    #[test]
    fn test_if_else_branches() {
        assert!(run("TRUE IF TRUE ELSE FALSE ENDIF").unwrap().success);
        assert!(!run("FALSE IF TRUE ELSE FALSE ENDIF").unwrap().success);
        assert!(run("FALSE IF FALSE ELSE TRUE ENDIF").unwrap().success);
        assert!(run("1 IF TRUE ENDIF").unwrap().success);
    }

    #[test]
    fn test_nested_conditionals() {
        // Outer false: inner branches are skipped entirely, including ELSE
        assert!(run("FALSE IF TRUE IF FALSE ELSE FALSE ENDIF ELSE TRUE ENDIF").unwrap().success);
        assert!(run("TRUE IF FALSE IF FALSE ELSE TRUE ENDIF ENDIF").unwrap().success);
        assert!(!run("TRUE IF TRUE IF FALSE ENDIF ENDIF").unwrap().success);
    }

    #[test]
    fn test_skipped_branch_does_not_execute() {
        // DUP on an empty stack would fault if executed
        assert!(run("FALSE IF DUP DUP ENDIF TRUE").unwrap().success);
    }

    #[test]
    fn test_unbalanced_conditionals_fault() {
        assert!(run("TRUE IF TRUE").is_err());
        assert!(run("TRUE ELSE").is_err());
        assert!(run("TRUE ENDIF").is_err());
        assert!(run("maybe IF TRUE ENDIF").is_err());
    }

    #[test]
    fn test_unknown_word_is_literal() {
        let tx = empty_tx();
        let mut stack = Vec::new();
        eval_script(&tokenize("RETURN dup"), &mut stack, &tx).unwrap();
        assert_eq!(stack, vec!["RETURN".to_string(), "dup".to_string()]);
    }

    #[test]
    fn test_checksig() {
        let tx = empty_tx();
        let (sk, pk) = keypair(0x01);
        let sig = sign_transaction(&tx, &sk).unwrap();

        let result = verify_script(&format!("{} {}", sig, pk), "CHECKSIG", &tx).unwrap();
        assert!(result.success);

        let (_, other) = keypair(0x02);
        let result = verify_script(&format!("{} {}", sig, other), "CHECKSIG", &tx).unwrap();
        assert_eq!(result, ScriptResult::failed(Some(Opcode::CheckSig)));
    }

    #[test]
    fn test_checksigverify_aborts() {
        let tx = empty_tx();
        let (_, pk) = keypair(0x01);
        let result = verify_script(&format!("deadbeef {}", pk), "CHECKSIGVERIFY TRUE", &tx).unwrap();
        assert_eq!(result, ScriptResult::failed(Some(Opcode::CheckSigVerify)));
    }

    #[test]
    fn test_p2pkh() {
        let tx = empty_tx();
        let (sk, pk) = keypair(0x05);
        let sig = sign_transaction(&tx, &sk).unwrap();
        let pk_hash = hash160_hex(&hex::decode(&pk).unwrap());
        let locking = format!("DUP HASH {} EQUALVERIFY CHECKSIG", pk_hash);

        assert!(verify_script(&format!("{} {}", sig, pk), &locking, &tx).unwrap().success);

        let (_, wrong) = keypair(0x06);
        let result = verify_script(&format!("{} {}", sig, wrong), &locking, &tx).unwrap();
        assert_eq!(result, ScriptResult::failed(Some(Opcode::EqualVerify)));
    }

    #[test]
    fn test_multisig_zero_of_n() {
        let (_, pk1) = keypair(0x01);
        let (_, pk2) = keypair(0x02);
        assert!(run(&format!("0 {} {} 2 CHECKMULTISIG", pk1, pk2)).unwrap().success);
        assert!(run("0 0 CHECKMULTISIG").unwrap().success);
    }

    #[test]
    fn test_multisig_two_of_three() {
        let tx = empty_tx();
        let (sk1, pk1) = keypair(0x01);
        let (_, pk2) = keypair(0x02);
        let (sk3, pk3) = keypair(0x03);
        let sig1 = sign_transaction(&tx, &sk1).unwrap();
        let sig3 = sign_transaction(&tx, &sk3).unwrap();

        let unlocking = format!("{} {}", sig1, sig3);
        let locking = format!("2 {} {} {} 3 CHECKMULTISIG", pk1, pk2, pk3);
        assert!(verify_script(&unlocking, &locking, &tx).unwrap().success);

        // Signature order does not need to follow key order
        let unlocking = format!("{} {}", sig3, sig1);
        assert!(verify_script(&unlocking, &locking, &tx).unwrap().success);
    }

    #[test]
    fn test_multisig_key_used_once() {
        let tx = empty_tx();
        let (sk1, pk1) = keypair(0x01);
        let (_, pk2) = keypair(0x02);
        let sig1 = sign_transaction(&tx, &sk1).unwrap();

        let unlocking = format!("{} {}", sig1, sig1);
        let locking = format!("2 {} {} 2 CHECKMULTISIG", pk1, pk2);
        let result = verify_script(&unlocking, &locking, &tx).unwrap();
        assert_eq!(result, ScriptResult::failed(Some(Opcode::CheckMultiSig)));
    }

    #[test]
    fn test_multisig_verify_aborts() {
        let tx = empty_tx();
        let (_, pk1) = keypair(0x01);
        let locking = format!("1 {} 1 CHECKMULTISIGVERIFY TRUE", pk1);
        let result = verify_script("bogus", &locking, &tx).unwrap();
        assert_eq!(result, ScriptResult::failed(Some(Opcode::CheckMultiSigVerify)));
    }

    #[test]
    fn test_multisig_malformed_counts() {
        assert!(run("x 1 CHECKMULTISIG").is_err());
        assert!(run("3 a b 2 CHECKMULTISIG").is_err());
        assert!(run("21 CHECKMULTISIG").is_err());
    }

    #[test]
    fn test_p2sh_pattern_detection() {
        assert_eq!(p2sh_script_hash(&tokenize("HASH abcd EQUALVERIFY")), Some("abcd"));
        assert_eq!(p2sh_script_hash(&tokenize("DUP HASH abcd EQUALVERIFY")), None);
        assert_eq!(p2sh_script_hash(&tokenize("HASH abcd EQUAL")), None);
    }

    #[test]
    fn test_p2sh_two_phase() {
        let tx = empty_tx();
        let redeem = "a a EQUAL";
        let locking = format!("HASH {} EQUALVERIFY", hash160_hex(redeem.as_bytes()));
        assert!(verify_script(redeem, &locking, &tx).unwrap().success);

        let other = "a b EQUAL";
        let result = verify_script(other, &locking, &tx).unwrap();
        assert_eq!(result, ScriptResult::failed(Some(Opcode::EqualVerify)));
    }

    #[test]
    fn test_p2sh_embedded_script_can_fail() {
        let tx = empty_tx();
        let redeem = "a b EQUAL";
        let locking = format!("HASH {} EQUALVERIFY", hash160_hex(redeem.as_bytes()));
        let result = verify_script(redeem, &locking, &tx).unwrap();
        assert_eq!(result, ScriptResult::failed(Some(Opcode::Equal)));
    }

    #[test]
    fn test_operation_count_limit() {
        let script = vec!["TRUE DUP EQUAL"; MAX_SCRIPT_OPS].join(" ");
        assert!(run(&script).is_err());
    }

    #[test]
    fn test_stack_overflow() {
        let script = vec!["x"; MAX_STACK_SIZE + 1].join(" ");
        assert!(run(&script).is_err());
    }

    #[test]
    fn test_script_size_limit() {
        let tx = empty_tx();
        let tokens = vec![Token::Op(Opcode::Else); MAX_SCRIPT_SIZE + 1];
        let mut stack = Vec::new();
        assert!(eval_script(&tokens, &mut stack, &tx).is_err());
    }
}
