//! Opcode set and script tokenizer
//!
//! Scripts are whitespace-separated words. A word naming an opcode (with or
//! without the `OP_` prefix) becomes [`Token::Op`]; every other word is data
//! and is pushed verbatim.

use std::fmt;

/// Closed set of opcodes understood by the script engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Dup,
    Hash,
    Equal,
    EqualVerify,
    CheckSig,
    CheckSigVerify,
    CheckMultiSig,
    CheckMultiSigVerify,
    If,
    Else,
    EndIf,
}

impl Opcode {
    pub const ALL: [Opcode; 11] = [
        Opcode::Dup,
        Opcode::Hash,
        Opcode::Equal,
        Opcode::EqualVerify,
        Opcode::CheckSig,
        Opcode::CheckSigVerify,
        Opcode::CheckMultiSig,
        Opcode::CheckMultiSigVerify,
        Opcode::If,
        Opcode::Else,
        Opcode::EndIf,
    ];

    /// Canonical script spelling
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Dup => "DUP",
            Opcode::Hash => "HASH",
            Opcode::Equal => "EQUAL",
            Opcode::EqualVerify => "EQUALVERIFY",
            Opcode::CheckSig => "CHECKSIG",
            Opcode::CheckSigVerify => "CHECKSIGVERIFY",
            Opcode::CheckMultiSig => "CHECKMULTISIG",
            Opcode::CheckMultiSigVerify => "CHECKMULTISIGVERIFY",
            Opcode::If => "IF",
            Opcode::Else => "ELSE",
            Opcode::EndIf => "ENDIF",
        }
    }

    /// Parse an opcode name, accepting an optional `OP_` prefix
    pub fn from_name(word: &str) -> Option<Self> {
        let bare = word.strip_prefix("OP_").unwrap_or(word);
        Self::ALL.iter().copied().find(|op| op.name() == bare)
    }

    /// Conditional opcodes are processed even inside a skipped branch
    pub fn is_conditional(self) -> bool {
        matches!(self, Opcode::If | Opcode::Else | Opcode::EndIf)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One script word
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Op(Opcode),
    Data(String),
}

impl Token {
    pub fn parse(word: &str) -> Self {
        match Opcode::from_name(word) {
            Some(op) => Token::Op(op),
            None => Token::Data(word.to_string()),
        }
    }
}

/// Split a script into tokens
pub fn tokenize(script: &str) -> Vec<Token> {
    script.split_ascii_whitespace().map(Token::parse).collect()
}
