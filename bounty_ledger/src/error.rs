use solana_program::{decode_error::DecodeError, program_error::ProgramError};
use thiserror::Error;

/// How a caller should react to a rejected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any mutation; resubmit with corrected input.
    Validation,
    /// Caller or signer lacks permission; never retried automatically.
    Authorization,
    /// Re-read current state (fresh nonce, released lock) before retrying.
    Concurrency,
    /// Business-rule rejection.
    Economic,
    /// Missing or corrupt accounts.
    Fatal,
}

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid instruction")]
    InvalidInstruction,

    #[error("Input value is invalid")]
    InvalidInput,

    #[error("Input string exceeds maximum length")]
    InputTooLong,

    #[error("Invalid timestamp")]
    InvalidTimestamp,

    #[error("Timestamp is outside acceptable range")]
    TimestampOutOfRange,

    #[error("Invalid public key")]
    InvalidPubkey,

    #[error("Invalid session ID format")]
    InvalidSessionId,

    #[error("Invalid pricing parameters")]
    InvalidParameters,

    #[error("Split rates must sum to 100")]
    InvalidSplitConfiguration,

    #[error("Unauthorized access")]
    Unauthorized,

    #[error("Unauthorized backend authority")]
    UnauthorizedBackend,

    #[error("Reentrancy detected - operation already in progress")]
    ReentrancyDetected,

    #[error("Invalid nonce")]
    InvalidNonce,

    #[error("Insufficient payment amount")]
    InsufficientPayment,

    #[error("Insufficient buyback balance")]
    InsufficientBuybackBalance,

    #[error("Emergency recovery amount exceeds maximum allowed")]
    RecoveryAmountExceedsLimit,

    #[error("Emergency recovery cooldown is still active")]
    RecoveryCooldownActive,

    #[error("Insufficient funds for operation")]
    InsufficientFunds,

    #[error("Bounty not found")]
    BountyNotFound,

    #[error("Bounty is not active")]
    BountyInactive,

    #[error("Ledger configuration not initialized")]
    ConfigNotFound,

    #[error("Ledger is not active")]
    ConfigInactive,

    #[error("Account already initialized")]
    AlreadyInitialized,

    #[error("Entry already recorded for this nonce")]
    EntryAlreadyRecorded,

    #[error("Invalid transaction signature")]
    InvalidSignature,

    #[error("Invalid account data")]
    InvalidAccountData,

    #[error("Blockhash not found or expired")]
    BlockhashNotFound,

    #[error("Transaction already processed")]
    AlreadyProcessed,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        use LedgerError::*;
        match self {
            InvalidInstruction | InvalidInput | InputTooLong | InvalidTimestamp
            | TimestampOutOfRange | InvalidPubkey | InvalidSessionId | InvalidParameters
            | InvalidSplitConfiguration | InvalidSignature | BlockhashNotFound => ErrorKind::Validation,
            Unauthorized | UnauthorizedBackend | AlreadyProcessed => ErrorKind::Authorization,
            ReentrancyDetected | InvalidNonce => ErrorKind::Concurrency,
            InsufficientPayment | InsufficientBuybackBalance | RecoveryAmountExceedsLimit
            | RecoveryCooldownActive | InsufficientFunds | BountyInactive | ConfigInactive
            | EntryAlreadyRecorded | AlreadyInitialized => ErrorKind::Economic,
            BountyNotFound | ConfigNotFound | InvalidAccountData => ErrorKind::Fatal,
        }
    }
}

impl From<LedgerError> for ProgramError {
    fn from(e: LedgerError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for LedgerError {
    fn type_of() -> &'static str {
        "LedgerError"
    }
}
