use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::{decision::DecisionPayload, error::LedgerError, state::SplitRates};

/// Every ledger operation. Submitted as the one ledger instruction of a
/// Solana transaction; "signer" below means a signing account listed on that
/// instruction.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub enum LedgerInstruction {
    /// Create the global config and buyback tracker. Runs once.
    ///
    /// Signers:
    /// 0. `authority`
    InitializeConfig {
        authority: Pubkey,
        pool_wallet: Pubkey,
        operational_wallet: Pubkey,
        buyback_wallet: Pubkey,
        staking_wallet: Pubkey,
        /// Receives executed buybacks
        buyback_target: Pubkey,
        /// Currency of every balance the ledger moves
        mint: Pubkey,
        rates: SplitRates,
        /// Evaluator ed25519 key
        backend_authority: [u8; 32],
        /// Largest single payout; `None` pays the whole pool
        payout_cap: Option<u64>,
    },

    /// Open a bounty pool.
    ///
    /// Signers:
    /// 0. Config authority
    InitializePool { bounty_id: u64, base_price: u64 },

    /// Pay for one entry at the current escalated price.
    ///
    /// Signers:
    /// 0. `payer`
    ProcessEntry {
        bounty_id: u64,
        payer: Pubkey,
        amount: u64,
        /// Client-chosen, unique per payer and bounty
        entry_nonce: u64,
    },

    /// Record an evaluator decision and pay the winner on success. Any party
    /// may submit; authorization comes from `signature`.
    ProcessDecision {
        bounty_id: u64,
        payload: DecisionPayload,
        /// Evaluator signature over the payload hash
        signature: [u8; 64],
        nonce: u64,
        session_id: String,
    },

    /// Spend accumulated buyback allocation.
    ///
    /// Signers:
    /// 0. Config authority
    ExecuteBuyback { amount: u64 },

    /// Withdraw up to a tenth of a pool once per cooldown window.
    ///
    /// Signers:
    /// 0. Config authority
    EmergencyRecover { bounty_id: u64, amount: u64 },

    /// Signers:
    /// 0. Config authority
    SetBackendAuthority { backend_authority: [u8; 32] },

    /// Signers:
    /// 0. Config authority
    TransferAuthority { new_authority: Pubkey },

    /// Signers:
    /// 0. Config authority
    SetPoolActive { bounty_id: u64, is_active: bool },

    /// Pause or resume the whole ledger.
    ///
    /// Signers:
    /// 0. Config authority
    SetConfigActive { is_active: bool },
}

impl LedgerInstruction {
    /// Wraps the instruction for `program_id`, listing each of `signers` as a
    /// signing account.
    pub fn to_instruction(&self, program_id: &Pubkey, signers: &[Pubkey]) -> Result<Instruction, ProgramError> {
        let data = borsh::to_vec(self).map_err(|_| ProgramError::from(LedgerError::InvalidInstruction))?;
        Ok(Instruction {
            program_id: *program_id,
            accounts: signers
                .iter()
                .map(|key| AccountMeta::new_readonly(*key, true))
                .collect(),
            data,
        })
    }
}
