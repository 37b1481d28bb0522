pub const CONFIG_SEED: &[u8] = b"config";
pub const BUYBACK_SEED: &[u8] = b"buyback";
pub const POOL_SEED: &[u8] = b"pool";
pub const NONCE_SEED: &[u8] = b"nonce";
pub const ENTRY_SEED: &[u8] = b"entry";
pub const TOKEN_SEED: &[u8] = b"token";
pub const CUSTODY_SEED: &[u8] = b"custody";

pub const MINT_DECIMALS: u8 = 6;

pub const MAX_MESSAGE_LENGTH: usize = 5000;
pub const MAX_SESSION_ID_LENGTH: usize = 100;
pub const TIMESTAMP_TOLERANCE: i64 = 3600; // 1 hour

// Seconds a blockhash stays usable for new transactions
pub const MAX_BLOCKHASH_AGE: i64 = 150;

pub const RECOVERY_COOLDOWN: i64 = 24 * 60 * 60;
pub const MAX_RECOVERY_PERCENT: u64 = 10;

// 1.0078 == 5039 / 5000
pub const ESCALATION_NUMERATOR: u32 = 5039;
pub const ESCALATION_DENOMINATOR: u32 = 5000;
