//! Entry price escalation: `floor(base_price × 1.0078^total_entries)`.
//!
//! The ratio is held as the exact fraction 5039/5000 and the whole product is
//! evaluated over arbitrary-precision integers before a single truncation, so
//! the result is the mathematical floor for every `N` rather than an
//! accumulation of per-step rounding.

use num_bigint::BigUint;
use solana_program::program_error::ProgramError;

use crate::{
    constants::{ESCALATION_DENOMINATOR, ESCALATION_NUMERATOR},
    error::LedgerError,
};

/// `1.0078^5710 > u64::MAX`, so any larger entry count overflows for every
/// non-zero base price.
pub const OVERFLOW_ENTRY_COUNT: u64 = 5710;

pub fn required_price(base_price: u64, total_entries: u64) -> Result<u64, ProgramError> {
    if base_price == 0 {
        return Err(LedgerError::InvalidParameters.into());
    }
    if total_entries == 0 {
        return Ok(base_price);
    }
    if total_entries >= OVERFLOW_ENTRY_COUNT {
        return Err(ProgramError::ArithmeticOverflow);
    }

    // Below OVERFLOW_ENTRY_COUNT, so the exponent fits a u32.
    let n = total_entries as u32;
    let price = BigUint::from(base_price) * BigUint::from(ESCALATION_NUMERATOR).pow(n)
        / BigUint::from(ESCALATION_DENOMINATOR).pow(n);
    u64::try_from(price).map_err(|_| ProgramError::ArithmeticOverflow)
}
