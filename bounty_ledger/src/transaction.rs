//! Transaction admission.
//!
//! Ledger instructions arrive in ordinary Solana transactions. Before an
//! instruction runs, its transaction must carry valid signatures for every
//! required signer, reference a blockhash the ledger issued within the last
//! [`MAX_BLOCKHASH_AGE`] seconds, and not have been processed before.

use std::collections::{HashMap, VecDeque};

use borsh::BorshDeserialize;
use solana_program::{
    clock::UnixTimestamp,
    hash::{hashv, Hash},
    msg,
    program_error::ProgramError,
    pubkey::Pubkey,
};
use solana_sdk::{sanitize::Sanitize, signature::Signature, transaction::Transaction};

use crate::{constants::MAX_BLOCKHASH_AGE, error::LedgerError, instruction::LedgerInstruction};

/// Checks every signature and extracts the one instruction addressed to
/// `program_id`, with the keys that signed for it.
pub fn sanitize(program_id: &Pubkey, transaction: &Transaction) -> Result<(LedgerInstruction, Vec<Pubkey>), ProgramError> {
    if transaction.signatures.is_empty() || transaction.sanitize().is_err() {
        return Err(LedgerError::InvalidInstruction.into());
    }
    if transaction.verify().is_err() {
        msg!("Transaction signature verification failed");
        return Err(LedgerError::InvalidSignature.into());
    }

    let message = &transaction.message;
    let mut ours = message
        .instructions
        .iter()
        .filter(|ix| message.account_keys.get(usize::from(ix.program_id_index)) == Some(program_id));
    let compiled = match (ours.next(), ours.next()) {
        (Some(compiled), None) => compiled,
        _ => {
            msg!("Expected exactly one ledger instruction");
            return Err(LedgerError::InvalidInstruction.into());
        }
    };

    let instruction = LedgerInstruction::try_from_slice(&compiled.data)
        .map_err(|_| ProgramError::from(LedgerError::InvalidInstruction))?;
    let signers = compiled
        .accounts
        .iter()
        .map(|index| usize::from(*index))
        .filter(|index| message.is_signer(*index))
        .filter_map(|index| message.account_keys.get(index).copied())
        .collect();
    Ok((instruction, signers))
}

/// Recently issued blockhashes and the transactions processed against them.
#[derive(Debug, Default)]
pub struct StatusCache {
    // Last hash issued, kept after it expires so the chain never restarts.
    tip: Hash,
    blockhashes: VecDeque<(Hash, UnixTimestamp)>,
    processed: HashMap<Signature, Hash>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The newest blockhash, issuing a new one if the last is older than `now`.
    pub fn latest_blockhash(&mut self, now: UnixTimestamp) -> Hash {
        self.expire(now);
        match self.blockhashes.back() {
            Some((hash, issued_at)) if *issued_at >= now => *hash,
            _ => {
                self.tip = hashv(&[self.tip.as_ref(), &now.to_le_bytes()]);
                self.blockhashes.push_back((self.tip, now));
                self.tip
            }
        }
    }

    /// Records `signature` as processed. Fails if its blockhash is unknown or
    /// expired, or if the signature was seen before.
    pub fn admit(&mut self, signature: Signature, blockhash: &Hash, now: UnixTimestamp) -> Result<(), ProgramError> {
        self.expire(now);
        if !self.blockhashes.iter().any(|(hash, _)| hash == blockhash) {
            msg!("Blockhash {} not found", blockhash);
            return Err(LedgerError::BlockhashNotFound.into());
        }
        if self.processed.contains_key(&signature) {
            msg!("Transaction {} already processed", signature);
            return Err(LedgerError::AlreadyProcessed.into());
        }
        self.processed.insert(signature, *blockhash);
        Ok(())
    }

    fn expire(&mut self, now: UnixTimestamp) {
        let before = self.blockhashes.len();
        while let Some((_, issued_at)) = self.blockhashes.front() {
            if now.saturating_sub(*issued_at) <= MAX_BLOCKHASH_AGE {
                break;
            }
            self.blockhashes.pop_front();
        }
        if self.blockhashes.len() != before {
            let live = &self.blockhashes;
            self.processed
                .retain(|_, blockhash| live.iter().any(|(hash, _)| hash == blockhash));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_program::instruction::Instruction;
    use solana_sdk::signature::{Keypair, Signer};

    const NOW: UnixTimestamp = 1_700_000_000;

    fn instruction() -> LedgerInstruction {
        LedgerInstruction::ExecuteBuyback { amount: 5 }
    }

    fn signed(signers: &[&Keypair], blockhash: Hash) -> Transaction {
        let keys: Vec<Pubkey> = signers.iter().map(|k| k.pubkey()).collect();
        let ix = instruction().to_instruction(&crate::id(), &keys).unwrap();
        Transaction::new_signed_with_payer(&[ix], Some(&keys[0]), &signers.to_vec(), blockhash)
    }

    #[test]
    fn instruction_signers_are_extracted() {
        let (a, b) = (Keypair::new(), Keypair::new());
        let tx = signed(&[&a, &b], Hash::default());
        assert_eq!(
            sanitize(&crate::id(), &tx),
            Ok((instruction(), vec![a.pubkey(), b.pubkey()]))
        );
    }

    #[test]
    fn fee_payer_alone_is_not_an_instruction_signer() {
        let (relayer, a) = (Keypair::new(), Keypair::new());
        let ix = instruction().to_instruction(&crate::id(), &[]).unwrap();
        let tx = Transaction::new_signed_with_payer(&[ix], Some(&relayer.pubkey()), &[&relayer], Hash::default());
        assert_eq!(sanitize(&crate::id(), &tx), Ok((instruction(), vec![])));

        let ix = instruction().to_instruction(&crate::id(), &[a.pubkey()]).unwrap();
        let tx = Transaction::new_signed_with_payer(&[ix], Some(&relayer.pubkey()), &[&relayer, &a], Hash::default());
        assert_eq!(sanitize(&crate::id(), &tx), Ok((instruction(), vec![a.pubkey()])));
    }

    #[test]
    fn missing_signature_is_rejected() {
        let (relayer, a) = (Keypair::new(), Keypair::new());
        let ix = instruction().to_instruction(&crate::id(), &[a.pubkey()]).unwrap();
        let mut tx = Transaction::new_with_payer(&[ix], Some(&relayer.pubkey()));
        tx.partial_sign(&[&relayer], Hash::default());
        assert_eq!(
            sanitize(&crate::id(), &tx),
            Err(LedgerError::InvalidSignature.into())
        );
    }

    #[test]
    fn altered_instruction_is_rejected() {
        let a = Keypair::new();
        let mut tx = signed(&[&a], Hash::default());
        tx.message.instructions[0].data = borsh::to_vec(&LedgerInstruction::ExecuteBuyback { amount: 6 }).unwrap();
        assert_eq!(
            sanitize(&crate::id(), &tx),
            Err(LedgerError::InvalidSignature.into())
        );
    }

    #[test]
    fn other_programs_are_not_ledger_instructions() {
        let a = Keypair::new();
        let tx = signed(&[&a], Hash::default());
        assert_eq!(
            sanitize(&Pubkey::new_unique(), &tx),
            Err(LedgerError::InvalidInstruction.into())
        );
    }

    #[test]
    fn undecodable_data_is_rejected() {
        let a = Keypair::new();
        let ix = Instruction {
            program_id: crate::id(),
            accounts: vec![],
            data: vec![0xff, 0xff],
        };
        let tx = Transaction::new_signed_with_payer(&[ix], Some(&a.pubkey()), &[&a], Hash::default());
        assert_eq!(
            sanitize(&crate::id(), &tx),
            Err(LedgerError::InvalidInstruction.into())
        );
    }

    #[test]
    fn blockhash_is_shared_within_a_second() {
        let mut cache = StatusCache::new();
        let first = cache.latest_blockhash(NOW);
        assert_eq!(cache.latest_blockhash(NOW), first);
        assert_ne!(cache.latest_blockhash(NOW + 1), first);
    }

    #[test]
    fn signatures_are_admitted_once() {
        let mut cache = StatusCache::new();
        let blockhash = cache.latest_blockhash(NOW);
        let signature = Signature::new_unique();

        assert_eq!(cache.admit(signature, &blockhash, NOW), Ok(()));
        assert_eq!(
            cache.admit(signature, &blockhash, NOW + 1),
            Err(LedgerError::AlreadyProcessed.into())
        );
        assert_eq!(cache.admit(Signature::new_unique(), &blockhash, NOW), Ok(()));
    }

    #[test]
    fn stale_and_unknown_blockhashes_are_rejected() {
        let mut cache = StatusCache::new();
        let blockhash = cache.latest_blockhash(NOW);
        let signature = Signature::new_unique();
        cache.admit(signature, &blockhash, NOW).unwrap();

        assert_eq!(
            cache.admit(Signature::new_unique(), &Hash::new_unique(), NOW),
            Err(LedgerError::BlockhashNotFound.into())
        );
        assert_eq!(
            cache.admit(Signature::new_unique(), &blockhash, NOW + MAX_BLOCKHASH_AGE),
            Ok(())
        );
        assert_eq!(
            cache.admit(signature, &blockhash, NOW + MAX_BLOCKHASH_AGE + 1),
            Err(LedgerError::BlockhashNotFound.into())
        );
        assert!(cache.processed.is_empty());
    }

    #[test]
    fn expired_blockhashes_are_never_reissued() {
        let mut cache = StatusCache::new();
        let first = cache.latest_blockhash(NOW);
        let signature = Signature::new_unique();
        cache.admit(signature, &first, NOW).unwrap();

        cache.latest_blockhash(NOW + MAX_BLOCKHASH_AGE + 1);
        assert_ne!(cache.latest_blockhash(NOW), first);
        assert_eq!(
            cache.admit(signature, &first, NOW),
            Err(LedgerError::BlockhashNotFound.into())
        );
    }
}
