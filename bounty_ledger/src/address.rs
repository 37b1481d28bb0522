//! Deterministic account addressing.
//!
//! Every account is located by hashing its seeds under the owning program id,
//! so clients can find any pool, nonce, or entry record without a lookup table.

use solana_program::{hash::hashv, pubkey::Pubkey};

use crate::constants::{
    BUYBACK_SEED, CONFIG_SEED, CUSTODY_SEED, ENTRY_SEED, NONCE_SEED, POOL_SEED, TOKEN_SEED,
};

pub fn derive_address(seeds: &[&[u8]], owner: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(seeds, owner).0
}

pub fn config_address(program_id: &Pubkey) -> Pubkey {
    derive_address(&[CONFIG_SEED], program_id)
}

pub fn buyback_tracker_address(program_id: &Pubkey) -> Pubkey {
    derive_address(&[BUYBACK_SEED], program_id)
}

pub fn pool_address(program_id: &Pubkey, bounty_id: u64) -> Pubkey {
    derive_address(&[POOL_SEED, &bounty_id.to_le_bytes()], program_id)
}

/// Session ids may exceed the 32-byte seed limit, so the seed is their hash.
pub fn session_hash(session_id: &str) -> [u8; 32] {
    hashv(&[session_id.as_bytes()]).to_bytes()
}

pub fn nonce_address(program_id: &Pubkey, session_id: &str) -> Pubkey {
    derive_address(&[NONCE_SEED, &session_hash(session_id)], program_id)
}

pub fn entry_address(program_id: &Pubkey, bounty_id: u64, payer: &Pubkey, entry_nonce: u64) -> Pubkey {
    derive_address(
        &[
            ENTRY_SEED,
            &bounty_id.to_le_bytes(),
            payer.as_ref(),
            &entry_nonce.to_le_bytes(),
        ],
        program_id,
    )
}

/// Token account holding `holder`'s balance.
pub fn token_account_address(program_id: &Pubkey, holder: &Pubkey) -> Pubkey {
    derive_address(&[TOKEN_SEED, holder.as_ref()], program_id)
}

/// Program-derived key that owns the pool and buyback token accounts and
/// the mint. Returns the bump needed to sign for it.
pub fn custody_authority(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[CUSTODY_SEED], program_id)
}
