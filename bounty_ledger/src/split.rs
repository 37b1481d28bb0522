use solana_program::program_error::ProgramError;

use crate::{error::LedgerError, state::SplitRates};

/// Destination amounts for one gross payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitAmounts {
    pub pool: u64,
    pub operational: u64,
    pub buyback: u64,
    pub staking: u64,
}

impl SplitAmounts {
    pub fn as_array(&self) -> [u64; 4] {
        [self.pool, self.operational, self.buyback, self.staking]
    }

    pub fn total(&self) -> u128 {
        self.as_array().iter().map(|a| u128::from(*a)).sum()
    }
}

pub fn validate_rates(rates: &SplitRates) -> Result<(), ProgramError> {
    if rates.total() != 100 {
        return Err(LedgerError::InvalidSplitConfiguration.into());
    }
    Ok(())
}

/// Splits `gross` by `rates`, truncating each share and adding the remainder
/// to the pool share so the four amounts sum to exactly `gross`.
pub fn split_payment(gross: u64, rates: &SplitRates) -> Result<SplitAmounts, ProgramError> {
    validate_rates(rates)?;
    if gross == 0 {
        return Err(LedgerError::InvalidInput.into());
    }

    let share = |rate: u8| (u128::from(gross) * u128::from(rate) / 100) as u64;
    let mut amounts = SplitAmounts {
        pool: share(rates.pool),
        operational: share(rates.operational),
        buyback: share(rates.buyback),
        staking: share(rates.staking),
    };

    let remainder = u128::from(gross)
        .checked_sub(amounts.total())
        .ok_or(ProgramError::ArithmeticOverflow)?;
    amounts.pool = amounts
        .pool
        .checked_add(remainder as u64)
        .ok_or(ProgramError::ArithmeticOverflow)?;

    Ok(amounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_rates_split_evenly() {
        let amounts = split_payment(10_000_000, &SplitRates::default()).unwrap();
        assert_eq!(
            amounts.as_array(),
            [6_000_000, 2_000_000, 1_000_000, 1_000_000]
        );
    }

    #[test]
    fn remainder_goes_to_pool() {
        // 4.2, 1.4, 0.7, 0.7 truncate to 4, 1, 0, 0
        let amounts = split_payment(7, &SplitRates::default()).unwrap();
        assert_eq!(amounts.as_array(), [6, 1, 0, 0]);
        assert_eq!(amounts.total(), 7);
    }

    #[test]
    fn bad_rates_are_rejected() {
        assert_eq!(
            split_payment(100, &SplitRates::new(60, 20, 10, 5)),
            Err(LedgerError::InvalidSplitConfiguration.into())
        );
        assert_eq!(
            split_payment(100, &SplitRates::new(100, 100, 0, 0)),
            Err(LedgerError::InvalidSplitConfiguration.into())
        );
    }

    #[test]
    fn zero_gross_is_rejected() {
        assert_eq!(
            split_payment(0, &SplitRates::default()),
            Err(LedgerError::InvalidInput.into())
        );
    }

    #[test]
    fn max_amount() {
        let amounts = split_payment(u64::MAX, &SplitRates::new(33, 33, 33, 1)).unwrap();
        assert_eq!(amounts.total(), u128::from(u64::MAX));
    }

    fn rates() -> impl Strategy<Value = SplitRates> {
        (0u8..=100, 0u8..=100, 0u8..=100).prop_map(|(a, b, c)| {
            let b = b % (101 - a);
            let c = c % (101 - a - b);
            SplitRates::new(a, b, c, 100 - a - b - c)
        })
    }

    proptest! {
        #[test]
        fn conserves_every_unit(gross in 1u64..=u64::MAX, rates in rates()) {
            let amounts = split_payment(gross, &rates).unwrap();
            prop_assert_eq!(amounts.total(), u128::from(gross));
        }

        #[test]
        fn non_pool_shares_are_truncated_products(gross in 1u64..=u64::MAX, rates in rates()) {
            let amounts = split_payment(gross, &rates).unwrap();
            let expect = |r: u8| (u128::from(gross) * u128::from(r) / 100) as u64;
            prop_assert_eq!(amounts.operational, expect(rates.operational));
            prop_assert_eq!(amounts.buyback, expect(rates.buyback));
            prop_assert_eq!(amounts.staking, expect(rates.staking));
            prop_assert!(amounts.pool >= expect(rates.pool));
        }
    }
}
