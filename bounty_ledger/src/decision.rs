//! Evaluator decisions and their signing format.
//!
//! Signing bytes, version 1. Integers are little-endian; each string is a u32
//! byte length followed by its UTF-8 bytes.
//!
//! | field                | encoding               |
//! |----------------------|------------------------|
//! | domain tag           | `bounty-ledger/decision/v1` |
//! | `bounty_id`          | u64                    |
//! | `winner`             | 32 bytes               |
//! | `nonce`              | u64                    |
//! | `user_id`            | u64                    |
//! | `timestamp`          | i64                    |
//! | `success`            | u8 (0 or 1)            |
//! | `session_id`         | string                 |
//! | `user_message`       | string                 |
//! | `evaluator_response` | string                 |
//!
//! The evaluator signs the SHA-256 of these bytes with ed25519. Both sides
//! must go through [`DecisionPayload::signing_bytes`]; the ledger never
//! reconstructs the layout elsewhere.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{hash::hash, program_error::ProgramError, pubkey::Pubkey};
use solana_sdk::signature::{Keypair, Signature, Signer};

use crate::{
    constants::{MAX_MESSAGE_LENGTH, MAX_SESSION_ID_LENGTH, TIMESTAMP_TOLERANCE},
    error::LedgerError,
};

pub const DECISION_DOMAIN_V1: &[u8] = b"bounty-ledger/decision/v1";

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct DecisionPayload {
    pub bounty_id: u64,
    pub winner: Pubkey,
    pub nonce: u64,
    pub user_id: u64,
    pub timestamp: i64,
    pub success: bool,
    pub session_id: String,
    pub user_message: String,
    pub evaluator_response: String,
}

impl DecisionPayload {
    /// Stateless checks, run before any signature work.
    pub fn validate(&self, now: i64) -> Result<(), ProgramError> {
        if self.user_message.len() > MAX_MESSAGE_LENGTH
            || self.evaluator_response.len() > MAX_MESSAGE_LENGTH
            || self.session_id.len() > MAX_SESSION_ID_LENGTH
        {
            return Err(LedgerError::InputTooLong.into());
        }
        if !is_valid_session_id(&self.session_id) {
            return Err(LedgerError::InvalidSessionId.into());
        }
        if self.user_id == 0 {
            return Err(LedgerError::InvalidInput.into());
        }
        if self.timestamp <= 0 {
            return Err(LedgerError::InvalidTimestamp.into());
        }
        if self.timestamp > now || now.saturating_sub(self.timestamp) > TIMESTAMP_TOLERANCE {
            return Err(LedgerError::TimestampOutOfRange.into());
        }
        Ok(())
    }

    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            DECISION_DOMAIN_V1.len()
                + 8 + 32 + 8 + 8 + 8 + 1
                + 12
                + self.session_id.len()
                + self.user_message.len()
                + self.evaluator_response.len(),
        );
        out.extend_from_slice(DECISION_DOMAIN_V1);
        out.extend_from_slice(&self.bounty_id.to_le_bytes());
        out.extend_from_slice(self.winner.as_ref());
        out.extend_from_slice(&self.nonce.to_le_bytes());
        out.extend_from_slice(&self.user_id.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.push(u8::from(self.success));
        for field in [&self.session_id, &self.user_message, &self.evaluator_response] {
            out.extend_from_slice(&(field.len() as u32).to_le_bytes());
            out.extend_from_slice(field.as_bytes());
        }
        out
    }

    pub fn hash(&self) -> [u8; 32] {
        hash(&self.signing_bytes()).to_bytes()
    }

    /// Evaluator side: sign the payload hash.
    pub fn sign(&self, evaluator: &Keypair) -> [u8; 64] {
        let signature = evaluator.sign_message(&self.hash());
        let mut out = [0u8; 64];
        out.copy_from_slice(signature.as_ref());
        out
    }
}

pub fn is_valid_session_id(session_id: &str) -> bool {
    (1..=MAX_SESSION_ID_LENGTH).contains(&session_id.len())
        && session_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

pub fn verify_decision_signature(
    decision_hash: &[u8; 32],
    signature: &[u8; 64],
    backend_authority: &[u8; 32],
) -> Result<(), ProgramError> {
    if Signature::from(*signature).verify(backend_authority, decision_hash) {
        Ok(())
    } else {
        Err(LedgerError::UnauthorizedBackend.into())
    }
}
