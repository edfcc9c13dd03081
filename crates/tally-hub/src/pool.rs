// crates/tally-hub/src/pool.rs
//
// Reward pool: the single shared balance drained by redemption.
//
// Deposits come from administrators funding the pool. Withdrawals happen
// only inside `PointsHub::redeem`, which runs to completion before any
// other mutation, so no reservation scheme is needed.

use serde::{Deserialize, Serialize};

use tally_core::TallyError;

/// Reward units available for redemption.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPool {
    balance: u128,
}

impl RewardPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self { balance: 0 }
    }

    /// Create a pool with an initial balance.
    pub fn with_balance(balance: u128) -> Self {
        Self { balance }
    }

    /// Add reward units to the pool.
    pub fn deposit(&mut self, amount: u128) {
        self.balance = self.balance.saturating_add(amount);
    }

    /// Check that `amount` can be paid without paying it.
    ///
    /// # Errors
    /// `InsufficientPool` if the balance is too small.
    pub fn ensure_covers(&self, amount: u128) -> Result<(), TallyError> {
        if amount > self.balance {
            return Err(TallyError::InsufficientPool {
                requested: amount,
                available: self.balance,
            });
        }
        Ok(())
    }

    /// Remove reward units from the pool.
    ///
    /// # Errors
    /// `InsufficientPool` if the balance is too small; the balance is unchanged.
    pub fn withdraw(&mut self, amount: u128) -> Result<(), TallyError> {
        self.ensure_covers(amount)?;
        self.balance -= amount;
        Ok(())
    }

    pub fn balance(&self) -> u128 {
        self.balance
    }
}
