use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::pubkey::Pubkey;

pub const CONFIG_VERSION_V1: u8 = 1;
pub const POOL_VERSION_V1: u8 = 1;
pub const NONCE_VERSION_V1: u8 = 1;
pub const BUYBACK_VERSION_V1: u8 = 1;
pub const ENTRY_VERSION_V1: u8 = 1;

/// Borsh account layout with a leading version byte.
pub trait LedgerAccount: BorshSerialize + BorshDeserialize {
    const VERSION: u8;

    fn version(&self) -> u8;
}

macro_rules! versioned {
    ($ty:ty, $version:expr) => {
        impl LedgerAccount for $ty {
            const VERSION: u8 = $version;

            fn version(&self) -> u8 {
                self.version
            }
        }
    };
}

/// Percentages applied to every entry payment, in destination order.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitRates {
    pub pool: u8,
    pub operational: u8,
    pub buyback: u8,
    pub staking: u8,
}

impl SplitRates {
    pub const fn new(pool: u8, operational: u8, buyback: u8, staking: u8) -> Self {
        Self {
            pool,
            operational,
            buyback,
            staking,
        }
    }

    pub fn total(&self) -> u16 {
        self.as_array().iter().map(|r| u16::from(*r)).sum()
    }

    pub fn as_array(&self) -> [u8; 4] {
        [self.pool, self.operational, self.buyback, self.staking]
    }
}

impl Default for SplitRates {
    fn default() -> Self {
        Self::new(60, 20, 10, 10)
    }
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct GlobalConfig {
    pub version: u8,
    pub authority: Pubkey,           // Program authority, co-signs admin operations
    pub pool_wallet: Pubkey,         // Custody of every pool share
    pub operational_wallet: Pubkey,
    pub buyback_wallet: Pubkey,
    pub staking_wallet: Pubkey,
    pub buyback_target: Pubkey,      // Receives executed buybacks
    pub mint: Pubkey,                // Currency of every token balance
    pub rates: SplitRates,
    pub backend_authority: [u8; 32], // Evaluator ed25519 key
    pub payout_cap: Option<u64>,     // None pays the whole pool balance
    pub is_active: bool,
}
versioned!(GlobalConfig, CONFIG_VERSION_V1);

impl GlobalConfig {
    pub fn backend_authority_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.backend_authority)
    }

    pub fn destinations(&self) -> [Pubkey; 4] {
        [
            self.pool_wallet,
            self.operational_wallet,
            self.buyback_wallet,
            self.staking_wallet,
        ]
    }
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    pub version: u8,
    pub bounty_id: u64,
    pub base_price: u64,         // Smallest currency unit
    pub pool_balance: u64,       // Pool shares in minus payouts and recoveries out
    pub total_entries: u64,      // Monotonic
    pub is_active: bool,
    pub created_at: i64,
    pub is_processing: bool,     // Reentrancy guard
    pub last_recovery_time: i64, // 0 until the first emergency recovery
    pub total_paid_out: u64,
}
versioned!(Pool, POOL_VERSION_V1);

impl Pool {
    pub fn new(bounty_id: u64, base_price: u64, created_at: i64) -> Self {
        Self {
            version: POOL_VERSION_V1,
            bounty_id,
            base_price,
            pool_balance: 0,
            total_entries: 0,
            is_active: true,
            created_at,
            is_processing: false,
            last_recovery_time: 0,
            total_paid_out: 0,
        }
    }
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct NonceRecord {
    pub version: u8,
    pub session_hash: [u8; 32],
    pub nonce: u64,
}
versioned!(NonceRecord, NONCE_VERSION_V1);

impl NonceRecord {
    pub fn new(session_hash: [u8; 32]) -> Self {
        Self {
            version: NONCE_VERSION_V1,
            session_hash,
            nonce: 0,
        }
    }

    pub fn expected_next(&self) -> Option<u64> {
        self.nonce.checked_add(1)
    }
}

#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct BuybackTracker {
    pub version: u8,
    pub accumulated: u64,     // Allocated from entries, not yet executed
    pub total_executed: u64,
    pub last_executed_at: i64,
}
versioned!(BuybackTracker, BUYBACK_VERSION_V1);

impl BuybackTracker {
    pub fn new() -> Self {
        Self {
            version: BUYBACK_VERSION_V1,
            ..Self::default()
        }
    }
}

/// One accepted payment. Written once, never updated.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub version: u8,
    pub bounty_id: u64,
    pub payer: Pubkey,
    pub entry_nonce: u64,
    pub amount_paid: u64,
    pub price_required: u64,
    pub pool_share: u64,
    pub operational_share: u64,
    pub buyback_share: u64,
    pub staking_share: u64,
    pub timestamp: i64,
}
versioned!(Entry, ENTRY_VERSION_V1);
