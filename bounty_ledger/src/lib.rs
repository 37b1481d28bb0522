pub mod address;
pub mod audit;
pub mod constants;
pub mod decision;
pub mod error;
pub mod escalation;
pub mod guard;
pub mod instruction;
pub mod ledger;
pub mod processor;
pub mod split;
pub mod state;
pub mod store;
pub mod transaction;

pub use error::LedgerError;
pub use instruction::LedgerInstruction;
pub use ledger::Ledger;
pub use processor::Processor;

solana_program::declare_id!("JDahM79yxJL4xQHgyMajq6FaoRjTfYW6NCQCJG5rk7JR");
