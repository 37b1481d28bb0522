//! Audit events and the append-only, hash-chained log that records them.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{hash::hashv, msg, program_error::ProgramError, pubkey::Pubkey};

use crate::{error::LedgerError, state::SplitRates};

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    ConfigInitialized {
        authority: Pubkey,
        destinations: [Pubkey; 4],
        buyback_target: Pubkey,
        rates: SplitRates,
        backend_authority: [u8; 32],
        payout_cap: Option<u64>,
        timestamp: i64,
    },
    PoolInitialized {
        bounty_id: u64,
        base_price: u64,
        authority: Pubkey,
        timestamp: i64,
    },
    EntryProcessed {
        bounty_id: u64,
        payer: Pubkey,
        entry_nonce: u64,
        amount: u64,
        price_required: u64,
        shares: [u64; 4],
        new_pool_balance: u64,
        total_entries: u64,
        timestamp: i64,
    },
    DecisionRecorded {
        bounty_id: u64,
        session_id: String,
        nonce: u64,
        user_id: u64,
        success: bool,
        winner: Pubkey,
        amount_paid: u64,
        signer: Pubkey,
        decision_hash: [u8; 32],
        timestamp: i64,
    },
    WinnerPaid {
        bounty_id: u64,
        winner: Pubkey,
        amount: u64,
        remaining_pool_balance: u64,
        timestamp: i64,
    },
    BuybackExecuted {
        authority: Pubkey,
        target: Pubkey,
        amount: u64,
        remaining_accumulated: u64,
        total_executed: u64,
        timestamp: i64,
    },
    EmergencyRecovered {
        bounty_id: u64,
        authority: Pubkey,
        amount: u64,
        max_allowed: u64,
        remaining_pool_balance: u64,
        timestamp: i64,
    },
    BackendAuthorityRotated {
        authority: Pubkey,
        previous: [u8; 32],
        backend_authority: [u8; 32],
        timestamp: i64,
    },
    AuthorityTransferred {
        previous: Pubkey,
        new_authority: Pubkey,
        timestamp: i64,
    },
    PoolActiveSet {
        bounty_id: u64,
        is_active: bool,
        authority: Pubkey,
        timestamp: i64,
    },
    ConfigActiveSet {
        is_active: bool,
        authority: Pubkey,
        timestamp: i64,
    },
    Deposited {
        owner: Pubkey,
        amount: u64,
        new_balance: u64,
        timestamp: i64,
    },
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub sequence: u64,
    pub prev_hash: [u8; 32],
    pub event: LedgerEvent,
    pub hash: [u8; 32],
}

impl AuditRecord {
    fn digest(sequence: u64, prev_hash: &[u8; 32], event: &LedgerEvent) -> Result<[u8; 32], ProgramError> {
        let event_bytes = borsh::to_vec(event).map_err(|_| LedgerError::InvalidAccountData)?;
        Ok(hashv(&[&sequence.to_le_bytes(), prev_hash, &event_bytes]).to_bytes())
    }
}

#[derive(Debug, Default)]
pub struct AuditLog {
    records: Vec<AuditRecord>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash of the latest record; all zeroes for an empty log.
    pub fn head(&self) -> [u8; 32] {
        self.records.last().map(|r| r.hash).unwrap_or_default()
    }

    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn append(&mut self, event: LedgerEvent) -> Result<[u8; 32], ProgramError> {
        self.append_all(vec![event])
    }

    /// Appends `events` in order, or none of them.
    pub fn append_all(&mut self, events: Vec<LedgerEvent>) -> Result<[u8; 32], ProgramError> {
        let mut prev_hash = self.head();
        let mut staged = Vec::with_capacity(events.len());
        for (offset, event) in events.into_iter().enumerate() {
            let sequence = (self.records.len() + offset) as u64;
            let hash = AuditRecord::digest(sequence, &prev_hash, &event)?;
            staged.push(AuditRecord {
                sequence,
                prev_hash,
                event,
                hash,
            });
            prev_hash = hash;
        }
        for record in &staged {
            msg!("Event #{}: {:?}", record.sequence, record.event);
        }
        self.records.extend(staged);
        Ok(prev_hash)
    }

    /// Recomputes the chain; returns the sequence of the first record that
    /// does not match.
    pub fn verify(&self) -> Result<(), u64> {
        let mut prev_hash = [0u8; 32];
        for (i, record) in self.records.iter().enumerate() {
            let sequence = i as u64;
            let expected = AuditRecord::digest(sequence, &prev_hash, &record.event).map_err(|_| sequence)?;
            if record.sequence != sequence || record.prev_hash != prev_hash || record.hash != expected {
                return Err(sequence);
            }
            prev_hash = record.hash;
        }
        Ok(())
    }
}
