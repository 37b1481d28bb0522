//! Account storage and all-or-nothing account transactions.
//!
//! Operations never write to [`AccountStore`] directly. They stage reads and
//! writes in a [`StagedTransaction`] and hand the resulting [`AccountChanges`]
//! back to the ledger, which applies them in one step only if the whole
//! operation succeeded.
//!
//! Token balances live in SPL token accounts. Every change to them goes
//! through the token program's own processor, invoked the way a program
//! would invoke it cross-program: the transaction's signers sign, and the
//! ledger signs for its custody key with seeds.

use std::collections::HashMap;

use solana_program::{
    account_info::AccountInfo, entrypoint::ProgramResult, instruction::Instruction, msg,
    program_error::ProgramError, program_pack::Pack, pubkey::Pubkey, rent::Rent, sysvar,
};
use solana_sdk::account::{create_account_with_fields, Account};
use spl_token::{
    error::TokenError,
    state::{Account as TokenAccount, Mint},
};

use crate::{
    address::{custody_authority, token_account_address},
    audit::LedgerEvent,
    constants::{CUSTODY_SEED, MINT_DECIMALS},
    error::LedgerError,
    state::LedgerAccount,
};

fn decode<T: LedgerAccount>(program_id: &Pubkey, account: &Account) -> Result<T, ProgramError> {
    if account.owner != *program_id {
        return Err(ProgramError::IncorrectProgramId);
    }
    let value = T::try_from_slice(&account.data).map_err(|_| ProgramError::from(LedgerError::InvalidAccountData))?;
    if value.version() != T::VERSION {
        return Err(LedgerError::InvalidAccountData.into());
    }
    Ok(value)
}

fn encode<T: LedgerAccount>(program_id: &Pubkey, value: &T) -> Result<Account, ProgramError> {
    let data = borsh::to_vec(value).map_err(|_| ProgramError::from(LedgerError::InvalidAccountData))?;
    Ok(Account {
        lamports: Rent::default().minimum_balance(data.len()),
        data,
        owner: *program_id,
        executable: false,
        rent_epoch: 0,
    })
}

fn token_error(error: ProgramError) -> ProgramError {
    match error {
        ProgramError::Custom(code) if code == TokenError::InsufficientFunds as u32 => {
            LedgerError::InsufficientFunds.into()
        }
        ProgramError::Custom(code) if code == TokenError::OwnerMismatch as u32 => LedgerError::Unauthorized.into(),
        ProgramError::Custom(code) => {
            msg!("Token program rejected the instruction with code {}", code);
            LedgerError::InvalidAccountData.into()
        }
        other => other,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountStore {
    program_id: Pubkey,
    accounts: HashMap<Pubkey, Account>,
}

impl AccountStore {
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            accounts: HashMap::new(),
        }
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn get(&self, key: &Pubkey) -> Option<&Account> {
        self.accounts.get(key)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn load<T: LedgerAccount>(&self, key: &Pubkey) -> Result<Option<T>, ProgramError> {
        self.get(key).map(|account| decode(&self.program_id, account)).transpose()
    }

    /// Writes outside a staged transaction. Only the reentrancy guard uses this.
    pub(crate) fn save<T: LedgerAccount>(&mut self, key: &Pubkey, value: &T) -> ProgramResult {
        let account = encode(&self.program_id, value)?;
        self.accounts.insert(*key, account);
        Ok(())
    }

    pub(crate) fn apply(&mut self, writes: HashMap<Pubkey, Account>) {
        self.accounts.extend(writes);
    }
}

/// Staged writes and events of one successful operation.
#[derive(Debug, Default)]
pub struct AccountChanges {
    pub writes: HashMap<Pubkey, Account>,
    pub events: Vec<LedgerEvent>,
}

pub struct StagedTransaction<'a> {
    base: &'a AccountStore,
    signers: &'a [Pubkey],
    changes: AccountChanges,
}

impl<'a> StagedTransaction<'a> {
    /// `signers` are the verified signers of the transaction being executed.
    pub fn new(base: &'a AccountStore, signers: &'a [Pubkey]) -> Self {
        Self {
            base,
            signers,
            changes: AccountChanges::default(),
        }
    }

    pub fn program_id(&self) -> &Pubkey {
        self.base.program_id()
    }

    fn account(&self, key: &Pubkey) -> Option<&Account> {
        self.changes.writes.get(key).or_else(|| self.base.get(key))
    }

    pub fn exists(&self, key: &Pubkey) -> bool {
        self.account(key).is_some()
    }

    pub fn load<T: LedgerAccount>(&self, key: &Pubkey) -> Result<Option<T>, ProgramError> {
        self.account(key)
            .map(|account| decode(self.program_id(), account))
            .transpose()
    }

    pub fn load_required<T: LedgerAccount>(&self, key: &Pubkey, missing: LedgerError) -> Result<T, ProgramError> {
        self.load(key)?.ok_or_else(|| missing.into())
    }

    pub fn save<T: LedgerAccount>(&mut self, key: &Pubkey, value: &T) -> ProgramResult {
        if let Some(existing) = self.account(key) {
            if existing.owner != *self.program_id() {
                msg!("Account {} is not owned by the ledger", key);
                return Err(ProgramError::IncorrectProgramId);
            }
        }
        let account = encode(self.program_id(), value)?;
        self.changes.writes.insert(*key, account);
        Ok(())
    }

    pub fn create<T: LedgerAccount>(&mut self, key: &Pubkey, value: &T) -> ProgramResult {
        if self.exists(key) {
            return Err(LedgerError::AlreadyInitialized.into());
        }
        self.save(key, value)
    }

    pub fn emit(&mut self, event: LedgerEvent) {
        self.changes.events.push(event);
    }

    pub fn into_changes(self) -> AccountChanges {
        self.changes
    }

    /// Zeroed, rent-exempt account of `space` bytes assigned to `owner`.
    fn allocate(&mut self, key: &Pubkey, space: usize, owner: &Pubkey) -> ProgramResult {
        if self.exists(key) {
            return Err(LedgerError::AlreadyInitialized.into());
        }
        self.changes.writes.insert(
            *key,
            Account {
                lamports: Rent::default().minimum_balance(space),
                data: vec![0; space],
                owner: *owner,
                executable: false,
                rent_epoch: 0,
            },
        );
        Ok(())
    }

    /// Runs a token program instruction against the staged accounts.
    ///
    /// An account marked as signer must be one of the transaction's signers
    /// or the address derived from one of `signer_seeds`.
    pub fn invoke_signed(&mut self, instruction: &Instruction, signer_seeds: &[&[&[u8]]]) -> ProgramResult {
        if instruction.program_id != spl_token::id() {
            return Err(ProgramError::IncorrectProgramId);
        }
        let derived = signer_seeds
            .iter()
            .map(|seeds| Pubkey::create_program_address(seeds, self.program_id()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ProgramError::InvalidSeeds)?;

        let mut accounts: Vec<(Pubkey, bool, bool, Account)> = Vec::with_capacity(instruction.accounts.len());
        for meta in &instruction.accounts {
            if accounts.iter().any(|(key, ..)| *key == meta.pubkey) {
                return Err(ProgramError::InvalidArgument);
            }
            if meta.is_signer && !self.signers.contains(&meta.pubkey) && !derived.contains(&meta.pubkey) {
                msg!("{} must sign", meta.pubkey);
                return Err(ProgramError::MissingRequiredSignature);
            }
            let account = if meta.pubkey == sysvar::rent::id() {
                create_account_with_fields(&Rent::default(), (1, 0))
            } else {
                self.account(&meta.pubkey).cloned().unwrap_or_default()
            };
            accounts.push((meta.pubkey, meta.is_signer, meta.is_writable, account));
        }

        {
            let infos: Vec<AccountInfo> = accounts
                .iter_mut()
                .map(|(key, is_signer, is_writable, account)| {
                    let Account {
                        lamports,
                        data,
                        owner,
                        executable,
                        rent_epoch,
                    } = account;
                    AccountInfo::new(key, *is_signer, *is_writable, lamports, data, owner, *executable, *rent_epoch)
                })
                .collect();
            spl_token::processor::Processor::process(&instruction.program_id, &infos, &instruction.data)
                .map_err(token_error)?;
        }

        for (key, _, is_writable, account) in accounts {
            if is_writable {
                self.changes.writes.insert(key, account);
            }
        }
        Ok(())
    }

    /// Creates and initializes `mint`, with the custody key as mint authority.
    pub fn create_mint(&mut self, mint: &Pubkey) -> ProgramResult {
        let (custody, _) = custody_authority(self.program_id());
        self.allocate(mint, Mint::LEN, &spl_token::id())?;
        let ix = spl_token::instruction::initialize_mint(&spl_token::id(), mint, &custody, None, MINT_DECIMALS)?;
        self.invoke_signed(&ix, &[])
    }

    /// Token account of `holder`, created and initialized for `owner` on first use.
    pub fn open_token_account(&mut self, mint: &Pubkey, holder: &Pubkey, owner: &Pubkey) -> Result<Pubkey, ProgramError> {
        let key = token_account_address(self.program_id(), holder);
        if self.exists(&key) {
            return Ok(key);
        }
        self.allocate(&key, TokenAccount::LEN, &spl_token::id())?;
        let ix = spl_token::instruction::initialize_account(&spl_token::id(), &key, mint, owner)?;
        self.invoke_signed(&ix, &[])?;
        Ok(key)
    }

    pub fn token_balance(&self, holder: &Pubkey) -> Result<u64, ProgramError> {
        let key = token_account_address(self.program_id(), holder);
        match self.account(&key) {
            Some(account) => Ok(TokenAccount::unpack(&account.data)?.amount),
            None => Ok(0),
        }
    }

    /// Issues `amount` of `mint` to `holder` for funds that entered custody.
    pub fn mint_to(&mut self, mint: &Pubkey, holder: &Pubkey, amount: u64) -> Result<u64, ProgramError> {
        let key = self.open_token_account(mint, holder, holder)?;
        let (custody, bump) = custody_authority(self.program_id());
        let ix = spl_token::instruction::mint_to_checked(&spl_token::id(), mint, &key, &custody, &[], amount, MINT_DECIMALS)?;
        self.invoke_signed(&ix, &[&[CUSTODY_SEED, &[bump]]])?;
        self.token_balance(holder)
    }

    /// Moves `amount` of `mint` from `from`'s token account to `to`'s.
    /// `authority` must own the source account and sign.
    pub fn transfer(
        &mut self,
        mint: &Pubkey,
        from: &Pubkey,
        to: &Pubkey,
        authority: &Pubkey,
        amount: u64,
        signer_seeds: &[&[&[u8]]],
    ) -> ProgramResult {
        if amount == 0 || from == to {
            return Ok(());
        }
        let source = token_account_address(self.program_id(), from);
        if !self.exists(&source) {
            return Err(LedgerError::InsufficientFunds.into());
        }
        let destination = self.open_token_account(mint, to, to)?;
        let ix = spl_token::instruction::transfer_checked(
            &spl_token::id(),
            &source,
            mint,
            &destination,
            authority,
            &[],
            amount,
            MINT_DECIMALS,
        )?;
        self.invoke_signed(&ix, signer_seeds)?;
        msg!("Transferred {} from {} to {}", amount, from, to);
        Ok(())
    }

    /// [`transfer`](Self::transfer) out of an account the custody key owns.
    pub fn transfer_from_custody(&mut self, mint: &Pubkey, from: &Pubkey, to: &Pubkey, amount: u64) -> ProgramResult {
        let (custody, bump) = custody_authority(self.program_id());
        self.transfer(mint, from, to, &custody, amount, &[&[CUSTODY_SEED, &[bump]]])
    }
}
