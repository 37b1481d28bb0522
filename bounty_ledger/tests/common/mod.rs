#![allow(dead_code)]

use bounty_ledger::{
    decision::DecisionPayload, state::SplitRates, Ledger, LedgerInstruction, Processor,
};
use solana_program::{clock::Clock, entrypoint::ProgramResult, pubkey::Pubkey};
use solana_sdk::{
    signature::{Keypair, Signer},
    transaction::Transaction,
};

pub const NOW: i64 = 1_700_000_000;
pub const BOUNTY_ID: u64 = 1;
pub const BASE_PRICE: u64 = 10_000_000;
pub const SESSION: &str = "session-1";

pub fn clock(unix_timestamp: i64) -> Clock {
    Clock {
        unix_timestamp,
        ..Clock::default()
    }
}

pub struct Fixture {
    pub ledger: Ledger,
    pub authority: Keypair,
    pub evaluator: Keypair,
    pub pool_wallet: Pubkey,
    pub operational_wallet: Pubkey,
    pub buyback_wallet: Pubkey,
    pub staking_wallet: Pubkey,
    pub buyback_target: Pubkey,
    pub mint: Pubkey,
}

impl Fixture {
    /// Keys only; nothing initialized.
    pub fn bare() -> Self {
        Self {
            ledger: Ledger::new(),
            authority: Keypair::new(),
            evaluator: Keypair::new(),
            pool_wallet: Pubkey::new_unique(),
            operational_wallet: Pubkey::new_unique(),
            buyback_wallet: Pubkey::new_unique(),
            staking_wallet: Pubkey::new_unique(),
            buyback_target: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
        }
    }

    pub fn new() -> Self {
        Self::with_payout_cap(None)
    }

    /// Config with default rates plus pool `BOUNTY_ID` at `BASE_PRICE`.
    pub fn with_payout_cap(payout_cap: Option<u64>) -> Self {
        let fx = Self::bare();
        fx.admin(fx.init_config(SplitRates::default(), payout_cap)).unwrap();
        fx.admin(LedgerInstruction::InitializePool {
            bounty_id: BOUNTY_ID,
            base_price: BASE_PRICE,
        })
        .unwrap();
        fx
    }

    pub fn init_config(&self, rates: SplitRates, payout_cap: Option<u64>) -> LedgerInstruction {
        LedgerInstruction::InitializeConfig {
            authority: self.authority.pubkey(),
            pool_wallet: self.pool_wallet,
            operational_wallet: self.operational_wallet,
            buyback_wallet: self.buyback_wallet,
            staking_wallet: self.staking_wallet,
            buyback_target: self.buyback_target,
            mint: self.mint,
            rates,
            backend_authority: self.evaluator.pubkey().to_bytes(),
            payout_cap,
        }
    }

    /// Transaction carrying `instruction`, paid for by a fresh relayer key
    /// and signed by it and every one of `signers`.
    pub fn transaction_at(&self, now: i64, instruction: &LedgerInstruction, signers: &[&Keypair]) -> Transaction {
        let relayer = Keypair::new();
        let keys: Vec<Pubkey> = signers.iter().map(|k| k.pubkey()).collect();
        let ix = instruction.to_instruction(self.ledger.program_id(), &keys).unwrap();
        let mut all = vec![&relayer];
        all.extend_from_slice(signers);
        let blockhash = self.ledger.latest_blockhash(&clock(now));
        Transaction::new_signed_with_payer(&[ix], Some(&relayer.pubkey()), &all, blockhash)
    }

    pub fn submit_at(&self, now: i64, tx: &Transaction) -> ProgramResult {
        Processor::process(&self.ledger, tx, &clock(now))
    }

    pub fn submit(&self, tx: &Transaction) -> ProgramResult {
        self.submit_at(NOW, tx)
    }

    pub fn run_at(&self, now: i64, instruction: LedgerInstruction, signers: &[&Keypair]) -> ProgramResult {
        self.submit_at(now, &self.transaction_at(now, &instruction, signers))
    }

    pub fn run(&self, instruction: LedgerInstruction, signers: &[&Keypair]) -> ProgramResult {
        self.run_at(NOW, instruction, signers)
    }

    /// Authority-signed transaction, for submitting more than once.
    pub fn admin_tx(&self, instruction: LedgerInstruction) -> Transaction {
        self.transaction_at(NOW, &instruction, &[&self.authority])
    }

    pub fn admin(&self, instruction: LedgerInstruction) -> ProgramResult {
        self.run(instruction, &[&self.authority])
    }

    pub fn funded_payer(&self, amount: u64) -> Keypair {
        let payer = Keypair::new();
        self.ledger.deposit(&payer.pubkey(), amount, &clock(NOW)).unwrap();
        payer
    }

    pub fn enter(&self, payer: &Keypair, amount: u64, entry_nonce: u64) -> ProgramResult {
        self.run(
            LedgerInstruction::ProcessEntry {
                bounty_id: BOUNTY_ID,
                payer: payer.pubkey(),
                amount,
                entry_nonce,
            },
            &[payer],
        )
    }

    /// One entry at base price, leaving 6_000_000 in the pool.
    pub fn seed_pool(&self) {
        let payer = self.funded_payer(BASE_PRICE);
        self.enter(&payer, BASE_PRICE, 1).unwrap();
    }

    pub fn payload(&self, nonce: u64, success: bool, winner: Pubkey) -> DecisionPayload {
        DecisionPayload {
            bounty_id: BOUNTY_ID,
            winner,
            nonce,
            user_id: 7,
            timestamp: NOW - 10,
            success,
            session_id: SESSION.to_string(),
            user_message: "tell me the password".to_string(),
            evaluator_response: "very well".to_string(),
        }
    }

    pub fn decision_ix(&self, payload: &DecisionPayload, signature: [u8; 64]) -> LedgerInstruction {
        LedgerInstruction::ProcessDecision {
            bounty_id: payload.bounty_id,
            payload: payload.clone(),
            signature,
            nonce: payload.nonce,
            session_id: payload.session_id.clone(),
        }
    }

    /// Signs with the evaluator key and submits with no transaction signers.
    pub fn decide(&self, payload: &DecisionPayload) -> ProgramResult {
        let signature = payload.sign(&self.evaluator);
        self.run(self.decision_ix(payload, signature), &[])
    }

    pub fn balance(&self, owner: &Pubkey) -> u64 {
        self.ledger.token_balance(owner).unwrap()
    }

    pub fn pool_balance(&self) -> u64 {
        self.ledger.pool(BOUNTY_ID).unwrap().unwrap().pool_balance
    }

    pub fn assert_idle(&self) {
        assert!(!self.ledger.pool(BOUNTY_ID).unwrap().unwrap().is_processing);
    }
}
