use parking_lot::Mutex;
use solana_program::{msg, program_error::ProgramError, pubkey::Pubkey};

use crate::{error::LedgerError, state::Pool, store::AccountStore};

/// Holds a pool's `is_processing` flag for the lifetime of one operation.
///
/// The flag is persisted, so a second operation on the same pool observes it
/// and fails with `ReentrancyDetected` instead of waiting. It is cleared on
/// drop, which runs on every exit path including `?` and panics.
pub struct PoolGuard<'a> {
    store: &'a Mutex<AccountStore>,
    pool_key: Pubkey,
}

impl<'a> PoolGuard<'a> {
    pub fn acquire(store: &'a Mutex<AccountStore>, pool_key: Pubkey) -> Result<Self, ProgramError> {
        let mut accounts = store.lock();
        let mut pool: Pool = accounts
            .load(&pool_key)?
            .ok_or(LedgerError::BountyNotFound)?;
        if pool.is_processing {
            msg!("Pool {} is already processing", pool.bounty_id);
            return Err(LedgerError::ReentrancyDetected.into());
        }
        pool.is_processing = true;
        accounts.save(&pool_key, &pool)?;
        Ok(Self { store, pool_key })
    }
}

impl Drop for PoolGuard<'_> {
    fn drop(&mut self) {
        let mut accounts = self.store.lock();
        match accounts.load::<Pool>(&self.pool_key) {
            Ok(Some(mut pool)) => {
                pool.is_processing = false;
                if accounts.save(&self.pool_key, &pool).is_err() {
                    msg!("Failed to release pool {}", self.pool_key);
                }
            }
            _ => msg!("Pool {} vanished while locked", self.pool_key),
        }
    }
}
