// crates/tally-hub/src/redemption.rs
//
// Redemption ledger and conversion settings.
//
// Each participant's redeemed total only ever grows, as does the
// process-wide total. Conversion is
//   reward = points * exchange_rate / REDEMPTION_PRECISION
// with the rate set by an administrator.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use tally_core::{ParticipantId, TallyError};

/// Scale of `exchange_rate` (1e18 = one reward unit per point).
pub const REDEMPTION_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Administrator-controlled redemption settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionSettings {
    /// Reward units per point, scaled by `REDEMPTION_PRECISION`. 0 = not configured.
    pub exchange_rate: u128,
    pub enabled: bool,
    /// Optional cap on points per redemption.
    pub max_per_tx: Option<u128>,
}

impl RedemptionSettings {
    /// Reward units for `points` at the current rate.
    ///
    /// # Errors
    /// `RateNotConfigured` if the rate is 0; `Overflow` if the product does
    /// not fit.
    pub fn convert(&self, points: u128) -> Result<u128, TallyError> {
        if self.exchange_rate == 0 {
            return Err(TallyError::RateNotConfigured);
        }
        points
            .checked_mul(self.exchange_rate)
            .map(|scaled| scaled / REDEMPTION_PRECISION)
            .ok_or(TallyError::Overflow)
    }
}

/// Outcome of a successful redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionReceipt {
    pub participant: ParticipantId,
    /// Points consumed.
    pub points: u128,
    /// Reward units paid out.
    pub reward: u128,
    /// Participant's redeemed total after this redemption.
    pub redeemed_total: u128,
}

/// Monotonic per-participant redeemed totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionLedger {
    redeemed: HashMap<ParticipantId, u128>,
    total: u128,
}

impl RedemptionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redeemed(&self, participant: &ParticipantId) -> u128 {
        self.redeemed.get(participant).copied().unwrap_or(0)
    }

    /// Redeemed points across all participants.
    pub fn total(&self) -> u128 {
        self.total
    }

    /// Totals after recording `points` for `participant`, without recording.
    ///
    /// # Errors
    /// `Overflow` if either total would leave the u128 range.
    pub fn preview(&self, participant: &ParticipantId, points: u128) -> Result<(u128, u128), TallyError> {
        let participant_total = self
            .redeemed(participant)
            .checked_add(points)
            .ok_or(TallyError::Overflow)?;
        let total = self.total.checked_add(points).ok_or(TallyError::Overflow)?;
        Ok((participant_total, total))
    }

    /// Add `points` to the participant's and the global redeemed totals.
    pub fn record(&mut self, participant: ParticipantId, points: u128) -> Result<u128, TallyError> {
        let (participant_total, total) = self.preview(&participant, points)?;
        self.redeemed.insert(participant, participant_total);
        self.total = total;
        Ok(participant_total)
    }

    pub fn participant_count(&self) -> usize {
        self.redeemed.len()
    }

    /// Check a restored ledger: no unset identities, and the global total
    /// equals the sum of the per-participant totals.
    ///
    /// # Errors
    /// `InvalidConfig` describing the first mismatch, or `Overflow`.
    pub fn verify(&self) -> Result<(), TallyError> {
        let mut sum = 0u128;
        for (participant, redeemed) in &self.redeemed {
            if participant.is_unset() {
                return Err(TallyError::InvalidConfig(
                    "redemption ledger holds the unset identity".to_string(),
                ));
            }
            sum = sum.checked_add(*redeemed).ok_or(TallyError::Overflow)?;
        }
        if sum != self.total {
            return Err(TallyError::InvalidConfig(format!(
                "redemption ledger total {} does not match participants ({})",
                self.total, sum
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> ParticipantId {
        ParticipantId::new([1u8; 32])
    }

    fn bob() -> ParticipantId {
        ParticipantId::new([2u8; 32])
    }

    #[test]
    fn test_convert_at_unit_rate() {
        let settings = RedemptionSettings {
            exchange_rate: REDEMPTION_PRECISION,
            ..RedemptionSettings::default()
        };
        assert_eq!(settings.convert(1_234).unwrap(), 1_234);
    }

    #[test]
    fn test_convert_fractional_rate_truncates() {
        let settings = RedemptionSettings {
            exchange_rate: REDEMPTION_PRECISION / 3,
            ..RedemptionSettings::default()
        };
        // 10 * 333..3 / 1e18 = 3.33 -> 3
        assert_eq!(settings.convert(10).unwrap(), 3);
    }

    #[test]
    fn test_convert_without_rate() {
        let settings = RedemptionSettings::default();
        assert_eq!(settings.convert(10), Err(TallyError::RateNotConfigured));
    }

    #[test]
    fn test_convert_overflow() {
        let settings = RedemptionSettings {
            exchange_rate: REDEMPTION_PRECISION,
            ..RedemptionSettings::default()
        };
        assert_eq!(settings.convert(u128::MAX), Err(TallyError::Overflow));
    }

    #[test]
    fn test_record_accumulates() {
        let mut ledger = RedemptionLedger::new();
        assert_eq!(ledger.record(alice(), 100).unwrap(), 100);
        assert_eq!(ledger.record(alice(), 50).unwrap(), 150);
        ledger.record(bob(), 10).unwrap();

        assert_eq!(ledger.redeemed(&alice()), 150);
        assert_eq!(ledger.redeemed(&bob()), 10);
        assert_eq!(ledger.total(), 160);
        assert_eq!(ledger.participant_count(), 2);
    }

    #[test]
    fn test_record_overflow_leaves_ledger() {
        let mut ledger = RedemptionLedger::new();
        ledger.record(alice(), u128::MAX).unwrap();
        assert_eq!(ledger.record(bob(), 1), Err(TallyError::Overflow));
        assert_eq!(ledger.redeemed(&bob()), 0);
        assert_eq!(ledger.total(), u128::MAX);
    }

    #[test]
    fn test_verify_catches_drifted_total() {
        let mut ledger = RedemptionLedger::new();
        ledger.record(alice(), 100).unwrap();
        ledger.record(bob(), 20).unwrap();
        assert!(ledger.verify().is_ok());

        ledger.total = 100;
        assert!(matches!(ledger.verify(), Err(TallyError::InvalidConfig(_))));
    }

    #[test]
    fn test_verify_rejects_unset_identity() {
        let mut ledger = RedemptionLedger::new();
        ledger.record(ParticipantId::UNSET, 1).unwrap();
        assert!(matches!(ledger.verify(), Err(TallyError::InvalidConfig(_))));
    }
}
