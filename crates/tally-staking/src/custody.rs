// crates/tally-staking/src/custody.rs
//
// In-memory balance custody.
//
// Tracks wallet balances per participant and the amount held by the ledger
// vault. Moves are all-or-nothing. Used by tests and by the keeper's
// simulated environment; production hosts plug in their own
// `BalanceCustody`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use tally_core::{BalanceCustody, ParticipantId, TallyError};

/// Wallet balances plus the vault holding deposited principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryCustody {
    wallets: HashMap<ParticipantId, u128>,
    vault: u128,
}

impl InMemoryCustody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit a participant's wallet from outside the ledger.
    pub fn mint(&mut self, participant: ParticipantId, amount: u128) {
        let balance = self.wallets.entry(participant).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Credit the vault from outside the ledger.
    pub fn fund_vault(&mut self, amount: u128) {
        self.vault = self.vault.saturating_add(amount);
    }

    pub fn balance_of(&self, participant: &ParticipantId) -> u128 {
        self.wallets.get(participant).copied().unwrap_or(0)
    }

    pub fn vault_balance(&self) -> u128 {
        self.vault
    }
}

impl BalanceCustody for InMemoryCustody {
    fn move_in(&mut self, participant: &ParticipantId, amount: u128) -> Result<(), TallyError> {
        let balance = self.balance_of(participant);
        if balance < amount {
            return Err(TallyError::Custody(format!(
                "wallet {} holds {} but {} was requested",
                participant, balance, amount
            )));
        }
        self.wallets.insert(*participant, balance - amount);
        self.vault = self.vault.saturating_add(amount);
        Ok(())
    }

    fn move_out(&mut self, participant: &ParticipantId, amount: u128) -> Result<(), TallyError> {
        if self.vault < amount {
            return Err(TallyError::Custody(format!(
                "vault holds {} but {} was requested",
                self.vault, amount
            )));
        }
        self.vault -= amount;
        self.mint(*participant, amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> ParticipantId {
        ParticipantId::new([1u8; 32])
    }

    #[test]
    fn test_move_in_and_out() {
        let mut custody = InMemoryCustody::new();
        custody.mint(alice(), 100);
        custody.move_in(&alice(), 60).unwrap();
        assert_eq!(custody.balance_of(&alice()), 40);
        assert_eq!(custody.vault_balance(), 60);

        custody.move_out(&alice(), 60).unwrap();
        assert_eq!(custody.balance_of(&alice()), 100);
        assert_eq!(custody.vault_balance(), 0);
    }

    #[test]
    fn test_move_in_insufficient_wallet() {
        let mut custody = InMemoryCustody::new();
        custody.mint(alice(), 10);
        assert!(custody.move_in(&alice(), 11).is_err());
        assert_eq!(custody.balance_of(&alice()), 10);
        assert_eq!(custody.vault_balance(), 0);
    }

    #[test]
    fn test_move_out_insufficient_vault() {
        let mut custody = InMemoryCustody::new();
        custody.fund_vault(5);
        assert!(custody.move_out(&alice(), 6).is_err());
        assert_eq!(custody.vault_balance(), 5);
        assert_eq!(custody.balance_of(&alice()), 0);
    }
}
