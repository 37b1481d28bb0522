//! The ledger handle shared by every caller.
//!
//! Lock order is store, then audit log. The store lock is held only for the
//! duration of a single staged transaction; pool-level exclusion across a
//! whole operation comes from [`PoolGuard`]. The status cache is locked on
//! its own, only while a transaction is admitted.

use parking_lot::Mutex;
use solana_program::{
    clock::Clock, entrypoint::ProgramResult, hash::Hash, msg, program_error::ProgramError,
    pubkey::Pubkey,
};
use solana_sdk::transaction::Transaction;

use crate::{
    address::{buyback_tracker_address, config_address, entry_address, nonce_address, pool_address},
    audit::{AuditLog, AuditRecord, LedgerEvent},
    error::LedgerError,
    guard::PoolGuard,
    state::{BuybackTracker, Entry, GlobalConfig, LedgerAccount, NonceRecord, Pool},
    store::{AccountStore, StagedTransaction},
    transaction::StatusCache,
};

pub struct Ledger {
    program_id: Pubkey,
    store: Mutex<AccountStore>,
    audit: Mutex<AuditLog>,
    status: Mutex<StatusCache>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self::with_program_id(crate::id())
    }

    pub fn with_program_id(program_id: Pubkey) -> Self {
        Self {
            program_id,
            store: Mutex::new(AccountStore::new(program_id)),
            audit: Mutex::new(AuditLog::new()),
            status: Mutex::new(StatusCache::new()),
        }
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    /// Marks the pool as processing until the returned guard drops.
    pub fn lock_pool(&self, bounty_id: u64) -> Result<PoolGuard<'_>, ProgramError> {
        PoolGuard::acquire(&self.store, pool_address(&self.program_id, bounty_id))
    }

    /// Blockhash for new transactions. It stays valid for
    /// [`MAX_BLOCKHASH_AGE`](crate::constants::MAX_BLOCKHASH_AGE) seconds.
    pub fn latest_blockhash(&self, clock: &Clock) -> Hash {
        self.status.lock().latest_blockhash(clock.unix_timestamp)
    }

    /// Accepts `transaction` once, while its blockhash is recent.
    pub(crate) fn admit(&self, transaction: &Transaction, clock: &Clock) -> ProgramResult {
        let signature = transaction
            .signatures
            .first()
            .ok_or(ProgramError::MissingRequiredSignature)?;
        self.status
            .lock()
            .admit(*signature, &transaction.message.recent_blockhash, clock.unix_timestamp)
    }

    /// Runs `op` against a staged view of the store. Its writes and events
    /// land together if it returns `Ok`, and not at all otherwise.
    pub(crate) fn execute<R>(
        &self,
        signers: &[Pubkey],
        op: impl FnOnce(&mut StagedTransaction) -> Result<R, ProgramError>,
    ) -> Result<R, ProgramError> {
        let mut store = self.store.lock();
        let mut tx = StagedTransaction::new(&store, signers);
        let result = op(&mut tx)?;
        let changes = tx.into_changes();
        self.audit.lock().append_all(changes.events)?;
        store.apply(changes.writes);
        Ok(result)
    }

    /// Issues funds that arrived from outside the ledger to `owner`.
    pub fn deposit(&self, owner: &Pubkey, amount: u64, clock: &Clock) -> Result<u64, ProgramError> {
        if amount == 0 {
            return Err(LedgerError::InvalidInput.into());
        }
        if *owner == Pubkey::default() {
            return Err(LedgerError::InvalidPubkey.into());
        }
        self.execute(&[], |tx| {
            let config: GlobalConfig =
                tx.load_required(&config_address(tx.program_id()), LedgerError::ConfigNotFound)?;
            let new_balance = tx.mint_to(&config.mint, owner, amount)?;
            msg!("Deposited {} to {}", amount, owner);
            tx.emit(LedgerEvent::Deposited {
                owner: *owner,
                amount,
                new_balance,
                timestamp: clock.unix_timestamp,
            });
            Ok(new_balance)
        })
    }

    fn view<T: LedgerAccount>(&self, key: &Pubkey) -> Result<Option<T>, ProgramError> {
        self.store.lock().load(key)
    }

    pub fn config(&self) -> Result<Option<GlobalConfig>, ProgramError> {
        self.view(&config_address(&self.program_id))
    }

    pub fn pool(&self, bounty_id: u64) -> Result<Option<Pool>, ProgramError> {
        self.view(&pool_address(&self.program_id, bounty_id))
    }

    pub fn nonce(&self, session_id: &str) -> Result<Option<NonceRecord>, ProgramError> {
        self.view(&nonce_address(&self.program_id, session_id))
    }

    pub fn buyback_tracker(&self) -> Result<Option<BuybackTracker>, ProgramError> {
        self.view(&buyback_tracker_address(&self.program_id))
    }

    pub fn entry(&self, bounty_id: u64, payer: &Pubkey, entry_nonce: u64) -> Result<Option<Entry>, ProgramError> {
        self.view(&entry_address(&self.program_id, bounty_id, payer, entry_nonce))
    }

    pub fn token_balance(&self, owner: &Pubkey) -> Result<u64, ProgramError> {
        let store = self.store.lock();
        StagedTransaction::new(&store, &[]).token_balance(owner)
    }

    pub fn audit_records(&self) -> Vec<AuditRecord> {
        self.audit.lock().records().to_vec()
    }

    pub fn audit_head(&self) -> [u8; 32] {
        self.audit.lock().head()
    }

    pub fn verify_audit(&self) -> Result<(), u64> {
        self.audit.lock().verify()
    }

    /// Copy of every account, for comparing state across operations.
    pub fn snapshot(&self) -> AccountStore {
        self.store.lock().clone()
    }
}
