use solana_program::{
    clock::Clock, entrypoint::ProgramResult, msg, program_error::ProgramError, pubkey::Pubkey,
};
use solana_sdk::transaction::Transaction;

use crate::{
    address::{
        buyback_tracker_address, config_address, custody_authority, entry_address, nonce_address, pool_address,
        session_hash,
    },
    audit::LedgerEvent,
    constants::{MAX_RECOVERY_PERCENT, RECOVERY_COOLDOWN},
    decision::{verify_decision_signature, DecisionPayload},
    error::LedgerError,
    escalation::required_price,
    instruction::LedgerInstruction,
    ledger::Ledger,
    split::{split_payment, validate_rates},
    state::{BuybackTracker, Entry, GlobalConfig, NonceRecord, Pool, CONFIG_VERSION_V1, ENTRY_VERSION_V1},
    store::StagedTransaction,
    transaction::sanitize,
};

pub struct Processor {}

impl Processor {
    pub fn process(ledger: &Ledger, transaction: &Transaction, clock: &Clock) -> ProgramResult {
        // Check signatures
        let (instruction, signers) = sanitize(ledger.program_id(), transaction)?;
        // Reject replayed and expired transactions
        ledger.admit(transaction, clock)?;

        match instruction {
            LedgerInstruction::InitializeConfig {
                authority,
                pool_wallet,
                operational_wallet,
                buyback_wallet,
                staking_wallet,
                buyback_target,
                mint,
                rates,
                backend_authority,
                payout_cap,
            } => {
                msg!("Instruction: InitializeConfig");
                let config = GlobalConfig {
                    version: CONFIG_VERSION_V1,
                    authority,
                    pool_wallet,
                    operational_wallet,
                    buyback_wallet,
                    staking_wallet,
                    buyback_target,
                    mint,
                    rates,
                    backend_authority,
                    payout_cap,
                    is_active: true,
                };
                Self::process_initialize_config(ledger, &signers, config, clock)
            }
            LedgerInstruction::InitializePool { bounty_id, base_price } => {
                msg!("Instruction: InitializePool");
                Self::process_initialize_pool(ledger, &signers, bounty_id, base_price, clock)
            }
            LedgerInstruction::ProcessEntry { bounty_id, payer, amount, entry_nonce } => {
                msg!("Instruction: ProcessEntry");
                Self::process_entry(ledger, &signers, bounty_id, payer, amount, entry_nonce, clock)
            }
            LedgerInstruction::ProcessDecision { bounty_id, payload, signature, nonce, session_id } => {
                msg!("Instruction: ProcessDecision");
                Self::process_decision(ledger, &signers, bounty_id, &payload, &signature, nonce, &session_id, clock)
            }
            LedgerInstruction::ExecuteBuyback { amount } => {
                msg!("Instruction: ExecuteBuyback");
                Self::process_execute_buyback(ledger, &signers, amount, clock)
            }
            LedgerInstruction::EmergencyRecover { bounty_id, amount } => {
                msg!("Instruction: EmergencyRecover");
                Self::process_emergency_recover(ledger, &signers, bounty_id, amount, clock)
            }
            LedgerInstruction::SetBackendAuthority { backend_authority } => {
                msg!("Instruction: SetBackendAuthority");
                Self::process_set_backend_authority(ledger, &signers, backend_authority, clock)
            }
            LedgerInstruction::TransferAuthority { new_authority } => {
                msg!("Instruction: TransferAuthority");
                Self::process_transfer_authority(ledger, &signers, new_authority, clock)
            }
            LedgerInstruction::SetPoolActive { bounty_id, is_active } => {
                msg!("Instruction: SetPoolActive");
                Self::process_set_pool_active(ledger, &signers, bounty_id, is_active, clock)
            }
            LedgerInstruction::SetConfigActive { is_active } => {
                msg!("Instruction: SetConfigActive");
                Self::process_set_config_active(ledger, &signers, is_active, clock)
            }
        }
    }

    fn process_initialize_config(
        ledger: &Ledger,
        signers: &[Pubkey],
        config: GlobalConfig,
        clock: &Clock,
    ) -> ProgramResult {
        // Check accounts
        if !signers.contains(&config.authority) {
            msg!("Authority {} did not sign", config.authority);
            return Err(LedgerError::Unauthorized.into());
        }

        // Validate inputs
        let keys = [
            config.authority,
            config.pool_wallet,
            config.operational_wallet,
            config.buyback_wallet,
            config.staking_wallet,
            config.buyback_target,
            config.mint,
        ];
        if keys.contains(&Pubkey::default()) || config.backend_authority == [0u8; 32] {
            return Err(LedgerError::InvalidPubkey.into());
        }
        validate_rates(&config.rates)?;
        if config.payout_cap == Some(0) {
            return Err(LedgerError::InvalidParameters.into());
        }

        ledger.execute(signers, |tx| {
            tx.create(&config_address(tx.program_id()), &config)?;
            tx.create(&buyback_tracker_address(tx.program_id()), &BuybackTracker::new())?;

            // Pool and buyback funds stay in custody; the other wallets
            // hold their own token accounts.
            let (custody, _) = custody_authority(tx.program_id());
            tx.create_mint(&config.mint)?;
            tx.open_token_account(&config.mint, &config.pool_wallet, &custody)?;
            tx.open_token_account(&config.mint, &config.buyback_wallet, &custody)?;

            msg!("Config initialized, authority {}", config.authority);
            tx.emit(LedgerEvent::ConfigInitialized {
                authority: config.authority,
                destinations: config.destinations(),
                buyback_target: config.buyback_target,
                rates: config.rates,
                backend_authority: config.backend_authority,
                payout_cap: config.payout_cap,
                timestamp: clock.unix_timestamp,
            });
            Ok(())
        })
    }

    fn process_initialize_pool(
        ledger: &Ledger,
        signers: &[Pubkey],
        bounty_id: u64,
        base_price: u64,
        clock: &Clock,
    ) -> ProgramResult {
        if base_price == 0 {
            return Err(LedgerError::InvalidParameters.into());
        }

        ledger.execute(signers, |tx| {
            let config = load_config(tx)?;
            require_authority(&config, signers)?;

            let pool = Pool::new(bounty_id, base_price, clock.unix_timestamp);
            tx.create(&pool_address(tx.program_id(), bounty_id), &pool)?;

            msg!("Pool {} opened at base price {}", bounty_id, base_price);
            tx.emit(LedgerEvent::PoolInitialized {
                bounty_id,
                base_price,
                authority: config.authority,
                timestamp: clock.unix_timestamp,
            });
            Ok(())
        })
    }

    fn process_entry(
        ledger: &Ledger,
        signers: &[Pubkey],
        bounty_id: u64,
        payer: Pubkey,
        amount: u64,
        entry_nonce: u64,
        clock: &Clock,
    ) -> ProgramResult {
        // Check accounts
        if !signers.contains(&payer) {
            msg!("Payer {} did not sign", payer);
            return Err(ProgramError::MissingRequiredSignature);
        }

        // Validate inputs
        if payer == Pubkey::default() {
            return Err(LedgerError::InvalidPubkey.into());
        }
        if amount == 0 || entry_nonce == 0 {
            return Err(LedgerError::InvalidInput.into());
        }

        // Reentrancy guard
        let _guard = ledger.lock_pool(bounty_id)?;
        ledger.execute(signers, |tx| {
            let config = load_config(tx)?;
            if !config.is_active {
                return Err(LedgerError::ConfigInactive.into());
            }
            let pool_key = pool_address(tx.program_id(), bounty_id);
            let mut pool: Pool = tx.load_required(&pool_key, LedgerError::BountyNotFound)?;
            if !pool.is_active {
                return Err(LedgerError::BountyInactive.into());
            }

            // Price and split
            let price = required_price(pool.base_price, pool.total_entries)?;
            if amount < price {
                msg!("Offered {} below required price {}", amount, price);
                return Err(LedgerError::InsufficientPayment.into());
            }
            let shares = split_payment(amount, &config.rates)?;

            let entry_key = entry_address(tx.program_id(), bounty_id, &payer, entry_nonce);
            if tx.exists(&entry_key) {
                msg!("Entry nonce {} already used by {}", entry_nonce, payer);
                return Err(LedgerError::EntryAlreadyRecorded.into());
            }

            // Move the payment
            if tx.token_balance(&payer)? < amount {
                msg!("Payer {} cannot cover {}", payer, amount);
                return Err(LedgerError::InsufficientFunds.into());
            }
            for (destination, share) in config.destinations().iter().zip(shares.as_array()) {
                tx.transfer(&config.mint, &payer, destination, &payer, share, &[])?;
            }

            // Update pool state
            pool.pool_balance = pool
                .pool_balance
                .checked_add(shares.pool)
                .ok_or(ProgramError::ArithmeticOverflow)?;
            pool.total_entries = pool
                .total_entries
                .checked_add(1)
                .ok_or(ProgramError::ArithmeticOverflow)?;
            tx.save(&pool_key, &pool)?;

            let tracker_key = buyback_tracker_address(tx.program_id());
            let mut tracker: BuybackTracker = tx.load_required(&tracker_key, LedgerError::ConfigNotFound)?;
            tracker.accumulated = tracker
                .accumulated
                .checked_add(shares.buyback)
                .ok_or(ProgramError::ArithmeticOverflow)?;
            tx.save(&tracker_key, &tracker)?;

            tx.create(
                &entry_key,
                &Entry {
                    version: ENTRY_VERSION_V1,
                    bounty_id,
                    payer,
                    entry_nonce,
                    amount_paid: amount,
                    price_required: price,
                    pool_share: shares.pool,
                    operational_share: shares.operational,
                    buyback_share: shares.buyback,
                    staking_share: shares.staking,
                    timestamp: clock.unix_timestamp,
                },
            )?;

            msg!("Entry {} accepted for pool {}, price {}", pool.total_entries, bounty_id, price);
            tx.emit(LedgerEvent::EntryProcessed {
                bounty_id,
                payer,
                entry_nonce,
                amount,
                price_required: price,
                shares: shares.as_array(),
                new_pool_balance: pool.pool_balance,
                total_entries: pool.total_entries,
                timestamp: clock.unix_timestamp,
            });
            Ok(())
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn process_decision(
        ledger: &Ledger,
        signers: &[Pubkey],
        bounty_id: u64,
        payload: &DecisionPayload,
        signature: &[u8; 64],
        nonce: u64,
        session_id: &str,
        clock: &Clock,
    ) -> ProgramResult {
        // Reentrancy guard
        let _guard = ledger.lock_pool(bounty_id)?;

        // Validate inputs
        payload.validate(clock.unix_timestamp)?;
        if payload.session_id != session_id {
            return Err(LedgerError::InvalidSessionId.into());
        }
        if payload.bounty_id != bounty_id {
            return Err(LedgerError::InvalidInput.into());
        }
        if payload.nonce != nonce {
            return Err(LedgerError::InvalidNonce.into());
        }
        if payload.success && payload.winner == Pubkey::default() {
            return Err(LedgerError::InvalidPubkey.into());
        }
        let decision_hash = payload.hash();

        ledger.execute(signers, |tx| {
            let config = load_config(tx)?;
            if !config.is_active {
                return Err(LedgerError::ConfigInactive.into());
            }
            let pool_key = pool_address(tx.program_id(), bounty_id);
            let mut pool: Pool = tx.load_required(&pool_key, LedgerError::BountyNotFound)?;
            if !pool.is_active {
                return Err(LedgerError::BountyInactive.into());
            }

            // Verify evaluator signature
            verify_decision_signature(&decision_hash, signature, &config.backend_authority)?;

            // Consume the session nonce
            let nonce_key = nonce_address(tx.program_id(), session_id);
            let mut record = tx
                .load::<NonceRecord>(&nonce_key)?
                .unwrap_or_else(|| NonceRecord::new(session_hash(session_id)));
            if record.expected_next() != Some(nonce) {
                msg!("Nonce {} rejected, session {} is at {}", nonce, session_id, record.nonce);
                return Err(LedgerError::InvalidNonce.into());
            }
            record.nonce = nonce;
            tx.save(&nonce_key, &record)?;

            // Pay the winner
            let mut amount_paid = 0;
            if payload.success {
                amount_paid = config
                    .payout_cap
                    .map_or(pool.pool_balance, |cap| cap.min(pool.pool_balance));
                if amount_paid == 0 {
                    msg!("Pool {} has nothing to pay out", bounty_id);
                    return Err(LedgerError::InsufficientFunds.into());
                }
                tx.transfer_from_custody(&config.mint, &config.pool_wallet, &payload.winner, amount_paid)?;

                pool.pool_balance = pool
                    .pool_balance
                    .checked_sub(amount_paid)
                    .ok_or(LedgerError::InsufficientFunds)?;
                pool.total_paid_out = pool
                    .total_paid_out
                    .checked_add(amount_paid)
                    .ok_or(ProgramError::ArithmeticOverflow)?;
                tx.save(&pool_key, &pool)?;

                msg!("Paid {} to winner {}", amount_paid, payload.winner);
                tx.emit(LedgerEvent::WinnerPaid {
                    bounty_id,
                    winner: payload.winner,
                    amount: amount_paid,
                    remaining_pool_balance: pool.pool_balance,
                    timestamp: clock.unix_timestamp,
                });
            }

            tx.emit(LedgerEvent::DecisionRecorded {
                bounty_id,
                session_id: session_id.to_string(),
                nonce,
                user_id: payload.user_id,
                success: payload.success,
                winner: payload.winner,
                amount_paid,
                signer: config.backend_authority_pubkey(),
                decision_hash,
                timestamp: clock.unix_timestamp,
            });
            Ok(())
        })
    }

    fn process_execute_buyback(
        ledger: &Ledger,
        signers: &[Pubkey],
        amount: u64,
        clock: &Clock,
    ) -> ProgramResult {
        ledger.execute(signers, |tx| {
            // Check accounts
            let config = load_config(tx)?;
            require_authority(&config, signers)?;

            // Validate inputs
            if amount == 0 {
                return Err(LedgerError::InvalidInput.into());
            }
            let tracker_key = buyback_tracker_address(tx.program_id());
            let mut tracker: BuybackTracker = tx.load_required(&tracker_key, LedgerError::ConfigNotFound)?;
            if amount > tracker.accumulated {
                msg!("Buyback of {} exceeds accumulated {}", amount, tracker.accumulated);
                return Err(LedgerError::InsufficientBuybackBalance.into());
            }

            tx.transfer_from_custody(&config.mint, &config.buyback_wallet, &config.buyback_target, amount)?;

            tracker.accumulated -= amount;
            tracker.total_executed = tracker
                .total_executed
                .checked_add(amount)
                .ok_or(ProgramError::ArithmeticOverflow)?;
            tracker.last_executed_at = clock.unix_timestamp;
            tx.save(&tracker_key, &tracker)?;

            tx.emit(LedgerEvent::BuybackExecuted {
                authority: config.authority,
                target: config.buyback_target,
                amount,
                remaining_accumulated: tracker.accumulated,
                total_executed: tracker.total_executed,
                timestamp: clock.unix_timestamp,
            });
            Ok(())
        })
    }

    fn process_emergency_recover(
        ledger: &Ledger,
        signers: &[Pubkey],
        bounty_id: u64,
        amount: u64,
        clock: &Clock,
    ) -> ProgramResult {
        // Check accounts before touching the pool
        let config = ledger.config()?.ok_or(LedgerError::ConfigNotFound)?;
        require_authority(&config, signers)?;

        // Reentrancy guard
        let _guard = ledger.lock_pool(bounty_id)?;
        ledger.execute(signers, |tx| {
            let config = load_config(tx)?;
            require_authority(&config, signers)?;

            // Validate inputs
            if amount == 0 {
                return Err(LedgerError::InvalidInput.into());
            }
            let pool_key = pool_address(tx.program_id(), bounty_id);
            let mut pool: Pool = tx.load_required(&pool_key, LedgerError::BountyNotFound)?;

            // Enforce the recovery cap and cooldown
            let max_allowed = (u128::from(pool.pool_balance) * u128::from(MAX_RECOVERY_PERCENT) / 100) as u64;
            if amount > max_allowed {
                msg!("Recovery of {} exceeds limit {}", amount, max_allowed);
                return Err(LedgerError::RecoveryAmountExceedsLimit.into());
            }

            let now = clock.unix_timestamp;
            if pool.last_recovery_time != 0 && now.saturating_sub(pool.last_recovery_time) < RECOVERY_COOLDOWN {
                msg!("Last recovery at {}, cooldown active", pool.last_recovery_time);
                return Err(LedgerError::RecoveryCooldownActive.into());
            }

            tx.transfer_from_custody(&config.mint, &config.pool_wallet, &config.authority, amount)?;

            pool.pool_balance -= amount;
            pool.last_recovery_time = now;
            tx.save(&pool_key, &pool)?;

            msg!("Recovered {} from pool {}", amount, bounty_id);
            tx.emit(LedgerEvent::EmergencyRecovered {
                bounty_id,
                authority: config.authority,
                amount,
                max_allowed,
                remaining_pool_balance: pool.pool_balance,
                timestamp: now,
            });
            Ok(())
        })
    }

    fn process_set_backend_authority(
        ledger: &Ledger,
        signers: &[Pubkey],
        backend_authority: [u8; 32],
        clock: &Clock,
    ) -> ProgramResult {
        if backend_authority == [0u8; 32] {
            return Err(LedgerError::InvalidPubkey.into());
        }

        ledger.execute(signers, |tx| {
            let mut config = load_config(tx)?;
            require_authority(&config, signers)?;

            let previous = config.backend_authority;
            config.backend_authority = backend_authority;
            tx.save(&config_address(tx.program_id()), &config)?;

            tx.emit(LedgerEvent::BackendAuthorityRotated {
                authority: config.authority,
                previous,
                backend_authority,
                timestamp: clock.unix_timestamp,
            });
            Ok(())
        })
    }

    fn process_transfer_authority(
        ledger: &Ledger,
        signers: &[Pubkey],
        new_authority: Pubkey,
        clock: &Clock,
    ) -> ProgramResult {
        if new_authority == Pubkey::default() {
            return Err(LedgerError::InvalidPubkey.into());
        }

        ledger.execute(signers, |tx| {
            let mut config = load_config(tx)?;
            require_authority(&config, signers)?;

            let previous = config.authority;
            config.authority = new_authority;
            tx.save(&config_address(tx.program_id()), &config)?;

            msg!("Authority moved from {} to {}", previous, new_authority);
            tx.emit(LedgerEvent::AuthorityTransferred {
                previous,
                new_authority,
                timestamp: clock.unix_timestamp,
            });
            Ok(())
        })
    }

    fn process_set_pool_active(
        ledger: &Ledger,
        signers: &[Pubkey],
        bounty_id: u64,
        is_active: bool,
        clock: &Clock,
    ) -> ProgramResult {
        let _guard = ledger.lock_pool(bounty_id)?;
        ledger.execute(signers, |tx| {
            let config = load_config(tx)?;
            require_authority(&config, signers)?;

            let pool_key = pool_address(tx.program_id(), bounty_id);
            let mut pool: Pool = tx.load_required(&pool_key, LedgerError::BountyNotFound)?;
            pool.is_active = is_active;
            tx.save(&pool_key, &pool)?;

            tx.emit(LedgerEvent::PoolActiveSet {
                bounty_id,
                is_active,
                authority: config.authority,
                timestamp: clock.unix_timestamp,
            });
            Ok(())
        })
    }

    fn process_set_config_active(
        ledger: &Ledger,
        signers: &[Pubkey],
        is_active: bool,
        clock: &Clock,
    ) -> ProgramResult {
        ledger.execute(signers, |tx| {
            let mut config = load_config(tx)?;
            require_authority(&config, signers)?;

            config.is_active = is_active;
            tx.save(&config_address(tx.program_id()), &config)?;

            tx.emit(LedgerEvent::ConfigActiveSet {
                is_active,
                authority: config.authority,
                timestamp: clock.unix_timestamp,
            });
            Ok(())
        })
    }
}

fn load_config(tx: &StagedTransaction) -> Result<GlobalConfig, ProgramError> {
    tx.load_required(&config_address(tx.program_id()), LedgerError::ConfigNotFound)
}

/// The stored authority must be among the verified signers.
fn require_authority(config: &GlobalConfig, signers: &[Pubkey]) -> ProgramResult {
    if !signers.contains(&config.authority) {
        msg!("Authority {} did not sign", config.authority);
        return Err(LedgerError::Unauthorized.into());
    }
    Ok(())
}
