//! Script engine limits and literal spellings

/// Maximum number of tokens in a single script
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Maximum stack size during script execution
pub const MAX_STACK_SIZE: usize = 1000;

/// Maximum number of executed (non-literal) operations in a script
pub const MAX_SCRIPT_OPS: usize = 201;

/// Maximum number of public keys accepted by CHECKMULTISIG
pub const MAX_PUBKEYS_PER_MULTISIG: usize = 20;

/// Stack literal for a true value
pub const TRUE_LITERAL: &str = "TRUE";

/// Stack literal for a false value
pub const FALSE_LITERAL: &str = "FALSE";

/// Length of a hash160 digest in bytes
pub const HASH160_LEN: usize = 20;
