// crates/tally-hub/src/hub.rs
//
// Aggregation hub: multi-source point totals, claimable balance, redemption.
//
//   total(p)     = sum of Counted reports over registered sources
//   claimable(p) = max(0, total(p) - penalty(p) - redeemed(p))
//
// Sources are queried in registration order through the bulkhead, so one
// faulty source only zeroes its own contribution. The penalty source is
// fail-closed: if it cannot be read, claimable reads as zero and
// redemption is refused.
//
// Redemption validates everything, pays through reward custody, and only
// then commits the ledger and the pool. A rejected redemption changes nothing.
//
// The ledger, pool, and settings survive restarts through `HubSnapshot`.
// Sources are live objects and are registered again by the host.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use tally_core::{
    AccountingSource, BalanceCustody, EventLog, LedgerEvent, Moment, ParticipantId, PenaltySource,
    TallyError,
};
use tally_staking::InMemoryCustody;

use crate::bulkhead::{query_penalty, query_source, SourceReport, MAX_SOURCES};
use crate::params::HubParams;
use crate::pool::RewardPool;
use crate::redemption::{RedemptionLedger, RedemptionReceipt, RedemptionSettings};

struct RegisteredSource {
    name: String,
    source: Arc<dyn AccountingSource>,
}

struct RegisteredPenalty {
    name: String,
    source: Arc<dyn PenaltySource>,
}

/// Serializable image of the hub's persistent state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubSnapshot {
    pub ledger: RedemptionLedger,
    pub pool: RewardPool,
    pub settings: RedemptionSettings,
}

/// The points aggregation hub.
pub struct PointsHub<R: BalanceCustody = InMemoryCustody> {
    sources: Vec<RegisteredSource>,
    penalty_source: Option<RegisteredPenalty>,
    ledger: RedemptionLedger,
    pool: RewardPool,
    settings: RedemptionSettings,
    source_query_budget: u64,
    reward_custody: R,
    events: EventLog,
}

impl<R: BalanceCustody> PointsHub<R> {
    /// Create a hub with no sources and an empty pool.
    pub fn new(params: HubParams, reward_custody: R) -> Self {
        Self {
            sources: Vec::new(),
            penalty_source: None,
            ledger: RedemptionLedger::new(),
            pool: RewardPool::new(),
            settings: RedemptionSettings {
                exchange_rate: params.exchange_rate,
                enabled: params.redemption_enabled,
                max_per_tx: params.max_redeem_per_tx,
            },
            source_query_budget: params.source_query_budget,
            reward_custody,
            events: EventLog::new(),
        }
    }

    /// Rebuild a hub from a snapshot. The snapshot's redemption settings
    /// win over the rate, switch, and cap in `params`.
    ///
    /// # Errors
    /// `InvalidConfig` or `Overflow` if the redemption ledger is inconsistent.
    pub fn restore(
        snapshot: HubSnapshot,
        params: HubParams,
        reward_custody: R,
    ) -> Result<Self, TallyError> {
        snapshot.ledger.verify()?;

        tracing::info!(
            participants = snapshot.ledger.participant_count(),
            total_redeemed = snapshot.ledger.total(),
            pool = snapshot.pool.balance(),
            "points hub restored"
        );

        let mut hub = Self::new(params, reward_custody);
        hub.ledger = snapshot.ledger;
        hub.pool = snapshot.pool;
        hub.settings = snapshot.settings;
        Ok(hub)
    }

    /// Capture the redemption ledger, pool, and settings.
    pub fn snapshot(&self) -> HubSnapshot {
        HubSnapshot {
            ledger: self.ledger.clone(),
            pool: self.pool.clone(),
            settings: self.settings,
        }
    }

    // ---------------------------------------------------------------
    // Source registry
    // ---------------------------------------------------------------

    /// Append an accounting source. Its name is read once, here.
    ///
    /// # Errors
    /// `TooManySources` when `MAX_SOURCES` are registered;
    /// `DuplicateSource` when the name is taken.
    pub fn register_source(&mut self, source: Arc<dyn AccountingSource>) -> Result<(), TallyError> {
        if self.sources.len() >= MAX_SOURCES {
            return Err(TallyError::TooManySources { max: MAX_SOURCES });
        }
        let name = source.name().to_string();
        if self.sources.iter().any(|s| s.name == name) {
            return Err(TallyError::DuplicateSource(name));
        }

        tracing::info!(source = %name, position = self.sources.len(), "accounting source registered");
        self.events.push(LedgerEvent::SourceRegistered { name: name.clone() });
        self.sources.push(RegisteredSource { name, source });
        Ok(())
    }

    /// Remove an accounting source by name, keeping the order of the rest.
    pub fn remove_source(&mut self, name: &str) -> Result<(), TallyError> {
        let index = self
            .sources
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| TallyError::SourceNotFound(name.to_string()))?;
        self.sources.remove(index);

        tracing::info!(source = name, "accounting source removed");
        self.events.push(LedgerEvent::SourceRemoved {
            name: name.to_string(),
        });
        Ok(())
    }

    /// Install or clear the penalty source.
    pub fn set_penalty_source(&mut self, source: Option<Arc<dyn PenaltySource>>) {
        self.penalty_source = source.map(|source| RegisteredPenalty {
            name: source.name().to_string(),
            source,
        });
    }

    /// Registered source names, in query order.
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name.as_str()).collect()
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// Per-source reports for `participant` at `at`.
    pub fn points_breakdown(&self, participant: &ParticipantId, at: &Moment) -> Vec<SourceReport> {
        self.sources
            .iter()
            .map(|s| {
                query_source(
                    &s.name,
                    s.source.as_ref(),
                    participant,
                    at,
                    self.source_query_budget,
                )
            })
            .collect()
    }

    /// Sum of valid source reports. Never fails.
    pub fn total_points(&self, participant: &ParticipantId, at: &Moment) -> u128 {
        self.points_breakdown(participant, at)
            .iter()
            .map(|report| report.outcome.contribution())
            .fold(0u128, u128::saturating_add)
    }

    /// Penalty reported by the penalty source (0 when none is installed).
    pub fn penalty(&self, participant: &ParticipantId) -> Result<u128, TallyError> {
        match &self.penalty_source {
            Some(p) => query_penalty(&p.name, p.source.as_ref(), participant, self.source_query_budget),
            None => Ok(0),
        }
    }

    /// Points `participant` may redeem now, floored at zero.
    ///
    /// Reads as zero while the penalty source is unavailable.
    pub fn claimable(&self, participant: &ParticipantId, at: &Moment) -> u128 {
        self.try_claimable(participant, at).unwrap_or(0)
    }

    fn try_claimable(&self, participant: &ParticipantId, at: &Moment) -> Result<u128, TallyError> {
        let penalty = self.penalty(participant)?;
        Ok(self
            .total_points(participant, at)
            .saturating_sub(penalty)
            .saturating_sub(self.ledger.redeemed(participant)))
    }

    /// Reward units `points` would convert to at the current rate.
    pub fn preview_redeem(&self, points: u128) -> Result<u128, TallyError> {
        self.settings.convert(points)
    }

    // ---------------------------------------------------------------
    // Redemption
    // ---------------------------------------------------------------

    /// Convert `points` of `caller`'s claimable balance into reward units.
    ///
    /// # Errors
    /// In check order: `UnsetParticipant`, `RedemptionDisabled`, `ZeroAmount`,
    /// `RateNotConfigured`, `RedeemCapExceeded`, `PenaltySourceUnavailable`,
    /// `InsufficientPoints`, `Overflow`, `RewardRoundsToZero`,
    /// `InsufficientPool`, or the reward custody error.
    pub fn redeem(
        &mut self,
        caller: ParticipantId,
        points: u128,
        at: Moment,
    ) -> Result<RedemptionReceipt, TallyError> {
        if caller.is_unset() {
            return Err(TallyError::UnsetParticipant);
        }
        if !self.settings.enabled {
            return Err(TallyError::RedemptionDisabled);
        }
        if points == 0 {
            return Err(TallyError::ZeroAmount);
        }
        if self.settings.exchange_rate == 0 {
            return Err(TallyError::RateNotConfigured);
        }
        if let Some(cap) = self.settings.max_per_tx {
            if points > cap {
                return Err(TallyError::RedeemCapExceeded { amount: points, cap });
            }
        }

        let claimable = self.try_claimable(&caller, &at)?;
        if points > claimable {
            return Err(TallyError::InsufficientPoints {
                requested: points,
                claimable,
            });
        }

        let reward = self.settings.convert(points)?;
        if reward == 0 {
            return Err(TallyError::RewardRoundsToZero(points));
        }
        self.pool.ensure_covers(reward)?;
        self.ledger.preview(&caller, points)?;

        self.reward_custody.move_out(&caller, reward)?;

        self.pool.withdraw(reward)?;
        let redeemed_total = self.ledger.record(caller, points)?;

        tracing::info!(
            participant = %caller,
            points,
            reward,
            redeemed_total,
            pool_remaining = self.pool.balance(),
            "points redeemed"
        );
        self.events.push(LedgerEvent::Redeemed {
            participant: caller,
            points,
            reward,
        });

        Ok(RedemptionReceipt {
            participant: caller,
            points,
            reward,
            redeemed_total,
        })
    }

    // ---------------------------------------------------------------
    // Administration
    // ---------------------------------------------------------------

    /// Move `amount` reward units from `from` into the pool.
    pub fn fund_pool(&mut self, from: ParticipantId, amount: u128) -> Result<(), TallyError> {
        if amount == 0 {
            return Err(TallyError::ZeroAmount);
        }
        self.reward_custody.move_in(&from, amount)?;
        self.pool.deposit(amount);
        tracing::info!(amount, balance = self.pool.balance(), "reward pool funded");
        Ok(())
    }

    pub fn set_exchange_rate(&mut self, exchange_rate: u128) {
        self.settings.exchange_rate = exchange_rate;
        self.settings_changed();
    }

    pub fn set_redemption_enabled(&mut self, enabled: bool) {
        self.settings.enabled = enabled;
        self.settings_changed();
    }

    pub fn set_max_redeem_per_tx(&mut self, cap: Option<u128>) {
        self.settings.max_per_tx = cap;
        self.settings_changed();
    }

    fn settings_changed(&mut self) {
        tracing::info!(
            exchange_rate = self.settings.exchange_rate,
            enabled = self.settings.enabled,
            max_per_tx = ?self.settings.max_per_tx,
            "redemption settings updated"
        );
        self.events.push(LedgerEvent::RedemptionConfigUpdated {
            exchange_rate: self.settings.exchange_rate,
            enabled: self.settings.enabled,
            max_per_tx: self.settings.max_per_tx,
        });
    }

    pub fn settings(&self) -> &RedemptionSettings {
        &self.settings
    }

    pub fn pool_balance(&self) -> u128 {
        self.pool.balance()
    }

    pub fn redeemed(&self, participant: &ParticipantId) -> u128 {
        self.ledger.redeemed(participant)
    }

    pub fn total_redeemed(&self) -> u128 {
        self.ledger.total()
    }

    pub fn reward_custody(&self) -> &R {
        &self.reward_custody
    }

    pub fn reward_custody_mut(&mut self) -> &mut R {
        &mut self.reward_custody
    }

    /// Take the events buffered since the last drain.
    ///
    /// The buffer is bounded; see [`EventLog`] for the eviction rule.
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        self.events.drain()
    }

    pub fn events_dropped(&self) -> u64 {
        self.events.dropped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulkhead::SourceOutcome;
    use crate::redemption::REDEMPTION_PRECISION;
    use crate::sources::{SyncedPenaltyLedger, SyncedPointsSource};
    use tally_core::{QueryBudget, DEFAULT_EVENT_CAPACITY};

    fn alice() -> ParticipantId {
        ParticipantId::new([1u8; 32])
    }

    fn treasury() -> ParticipantId {
        ParticipantId::new([0xee; 32])
    }

    fn now() -> Moment {
        Moment::new(1_700_000_000, 10)
    }

    struct Failing;

    impl AccountingSource for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        fn is_active(&self) -> bool {
            true
        }
        fn points(&self, _: &ParticipantId, _: &Moment, _: &mut QueryBudget) -> Result<u128, TallyError> {
            Err(TallyError::Source("backend offline".to_string()))
        }
    }

    struct BrokenPenalty;

    impl PenaltySource for BrokenPenalty {
        fn name(&self) -> &str {
            "broken"
        }
        fn penalty(&self, _: &ParticipantId, _: &mut QueryBudget) -> Result<u128, TallyError> {
            Err(TallyError::Source("unreachable".to_string()))
        }
    }

    fn granted(name: &str, points: u128) -> Arc<SyncedPointsSource> {
        let source = SyncedPointsSource::new(name);
        source.apply_grants(&[(alice(), points)]).unwrap();
        Arc::new(source)
    }

    /// Hub with 1:1 redemption enabled and `pool` reward units funded.
    fn open_hub(pool: u128) -> PointsHub {
        let mut custody = InMemoryCustody::new();
        custody.mint(treasury(), pool);
        let params = HubParams {
            exchange_rate: REDEMPTION_PRECISION,
            redemption_enabled: true,
            ..HubParams::default()
        };
        let mut hub = PointsHub::new(params, custody);
        if pool > 0 {
            hub.fund_pool(treasury(), pool).unwrap();
        }
        hub
    }

    #[test]
    fn test_total_sums_sources() {
        let mut hub = open_hub(0);
        hub.register_source(granted("a", 100)).unwrap();
        hub.register_source(granted("b", 250)).unwrap();
        assert_eq!(hub.total_points(&alice(), &now()), 350);
        assert_eq!(hub.source_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_failing_source_contributes_zero() {
        let mut hub = open_hub(0);
        hub.register_source(granted("a", 100)).unwrap();
        hub.register_source(Arc::new(Failing)).unwrap();
        hub.register_source(granted("c", 5)).unwrap();

        assert_eq!(hub.total_points(&alice(), &now()), 105);
        let breakdown = hub.points_breakdown(&alice(), &now());
        assert_eq!(breakdown.len(), 3);
        assert!(matches!(breakdown[1].outcome, SourceOutcome::Failed(_)));
    }

    #[test]
    fn test_inactive_source_skipped() {
        let mut hub = open_hub(0);
        let source = granted("a", 100);
        hub.register_source(source.clone()).unwrap();
        source.set_active(false);
        assert_eq!(hub.total_points(&alice(), &now()), 0);
        assert_eq!(
            hub.points_breakdown(&alice(), &now())[0].outcome,
            SourceOutcome::Inactive
        );
    }

    #[test]
    fn test_registry_limits() {
        let mut hub = open_hub(0);
        for i in 0..MAX_SOURCES {
            hub.register_source(granted(&format!("s{}", i), 1)).unwrap();
        }
        assert_eq!(
            hub.register_source(granted("overflow", 1)),
            Err(TallyError::TooManySources { max: MAX_SOURCES })
        );

        hub.remove_source("s3").unwrap();
        assert_eq!(
            hub.register_source(granted("s4", 1)),
            Err(TallyError::DuplicateSource("s4".to_string()))
        );
        assert_eq!(
            hub.remove_source("missing"),
            Err(TallyError::SourceNotFound("missing".to_string()))
        );
        assert_eq!(hub.total_points(&alice(), &now()), (MAX_SOURCES - 1) as u128);
    }

    #[test]
    fn test_claimable_nets_penalty_and_redeemed() {
        let mut hub = open_hub(1_000);
        hub.register_source(granted("a", 500)).unwrap();
        let penalties = SyncedPenaltyLedger::new("penalties");
        penalties.apply_penalties(&[(alice(), 120)]).unwrap();
        hub.set_penalty_source(Some(Arc::new(penalties)));

        assert_eq!(hub.claimable(&alice(), &now()), 380);
        hub.redeem(alice(), 80, now()).unwrap();
        assert_eq!(hub.claimable(&alice(), &now()), 300);
    }

    #[test]
    fn test_claimable_saturates_at_zero() {
        let mut hub = open_hub(0);
        hub.register_source(granted("a", 100)).unwrap();
        let penalties = SyncedPenaltyLedger::new("penalties");
        penalties.apply_penalties(&[(alice(), 500)]).unwrap();
        hub.set_penalty_source(Some(Arc::new(penalties)));
        assert_eq!(hub.claimable(&alice(), &now()), 0);
    }

    #[test]
    fn test_broken_penalty_source_is_fail_closed() {
        let mut hub = open_hub(1_000);
        hub.register_source(granted("a", 500)).unwrap();
        hub.set_penalty_source(Some(Arc::new(BrokenPenalty)));
        assert_eq!(hub.claimable(&alice(), &now()), 0);
        assert!(matches!(
            hub.redeem(alice(), 10, now()),
            Err(TallyError::PenaltySourceUnavailable(_))
        ));
    }

    #[test]
    fn test_redeem_pays_reward() {
        let mut hub = open_hub(1_000);
        hub.register_source(granted("a", 500)).unwrap();
        let receipt = hub.redeem(alice(), 200, now()).unwrap();
        assert_eq!(receipt.reward, 200);
        assert_eq!(receipt.redeemed_total, 200);
        assert_eq!(hub.pool_balance(), 800);
        assert_eq!(hub.reward_custody().balance_of(&alice()), 200);
        assert_eq!(hub.redeemed(&alice()), 200);
        assert_eq!(hub.total_redeemed(), 200);
    }

    #[test]
    fn test_redeem_all_then_more_rejected() {
        let mut hub = open_hub(1_000);
        hub.register_source(granted("a", 300)).unwrap();
        let claimable = hub.claimable(&alice(), &now());
        hub.redeem(alice(), claimable, now()).unwrap();
        assert_eq!(
            hub.redeem(alice(), 1, now()),
            Err(TallyError::InsufficientPoints {
                requested: 1,
                claimable: 0
            })
        );
    }

    #[test]
    fn test_redeem_rejections_are_distinct() {
        let mut hub = open_hub(100);
        hub.register_source(granted("a", 1_000)).unwrap();

        assert_eq!(hub.redeem(alice(), 0, now()), Err(TallyError::ZeroAmount));
        assert_eq!(
            hub.redeem(ParticipantId::UNSET, 10, now()),
            Err(TallyError::UnsetParticipant)
        );
        assert_eq!(
            hub.redeem(alice(), 101, now()),
            Err(TallyError::InsufficientPool {
                requested: 101,
                available: 100
            })
        );

        hub.set_max_redeem_per_tx(Some(50));
        assert_eq!(
            hub.redeem(alice(), 60, now()),
            Err(TallyError::RedeemCapExceeded { amount: 60, cap: 50 })
        );

        hub.set_exchange_rate(0);
        assert_eq!(hub.redeem(alice(), 10, now()), Err(TallyError::RateNotConfigured));
        assert_eq!(hub.preview_redeem(10), Err(TallyError::RateNotConfigured));

        hub.set_redemption_enabled(false);
        assert_eq!(hub.redeem(alice(), 10, now()), Err(TallyError::RedemptionDisabled));

        assert_eq!(hub.redeemed(&alice()), 0);
        assert_eq!(hub.pool_balance(), 100);
    }

    #[test]
    fn test_reward_rounding_to_zero_rejected() {
        let mut hub = open_hub(100);
        hub.register_source(granted("a", 1_000)).unwrap();
        hub.set_exchange_rate(REDEMPTION_PRECISION / 10);
        assert_eq!(hub.preview_redeem(9).unwrap(), 0);
        assert_eq!(
            hub.redeem(alice(), 9, now()),
            Err(TallyError::RewardRoundsToZero(9))
        );
        assert_eq!(hub.redeem(alice(), 10, now()).unwrap().reward, 1);
    }

    #[test]
    fn test_custody_failure_rolls_back() {
        let mut hub = open_hub(100);
        hub.register_source(granted("a", 1_000)).unwrap();
        // Empty the custody vault behind the pool's back.
        hub.reward_custody_mut().move_out(&treasury(), 100).unwrap();

        assert!(matches!(
            hub.redeem(alice(), 50, now()),
            Err(TallyError::Custody(_))
        ));
        assert_eq!(hub.redeemed(&alice()), 0);
        assert_eq!(hub.total_redeemed(), 0);
        assert_eq!(hub.pool_balance(), 100);
    }

    #[test]
    fn test_restored_hub_remembers_redemptions() {
        let mut hub = open_hub(1_000);
        hub.register_source(granted("a", 300)).unwrap();
        hub.set_max_redeem_per_tx(Some(250));
        hub.redeem(alice(), 200, now()).unwrap();

        let json = serde_json::to_string(&hub.snapshot()).unwrap();
        let snapshot: HubSnapshot = serde_json::from_str(&json).unwrap();
        let custody = hub.reward_custody().clone();
        let mut restored = PointsHub::restore(snapshot, HubParams::default(), custody).unwrap();
        restored.register_source(granted("a", 300)).unwrap();

        assert_eq!(restored.redeemed(&alice()), 200);
        assert_eq!(restored.total_redeemed(), 200);
        assert_eq!(restored.pool_balance(), 800);
        assert_eq!(restored.settings(), hub.settings());
        assert_eq!(restored.claimable(&alice(), &now()), 100);
        assert_eq!(
            restored.redeem(alice(), 101, now()),
            Err(TallyError::InsufficientPoints {
                requested: 101,
                claimable: 100
            })
        );
    }

    #[test]
    fn test_restore_rejects_inconsistent_ledger() {
        let mut hub = open_hub(1_000);
        hub.register_source(granted("a", 300)).unwrap();
        hub.redeem(alice(), 200, now()).unwrap();

        let mut json: serde_json::Value = serde_json::to_value(hub.snapshot()).unwrap();
        json["ledger"]["total"] = serde_json::json!(50);
        let snapshot: HubSnapshot = serde_json::from_value(json).unwrap();
        assert!(matches!(
            PointsHub::restore(snapshot, HubParams::default(), InMemoryCustody::new()),
            Err(TallyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_events_recorded() {
        let mut hub = open_hub(100);
        hub.register_source(granted("a", 1_000)).unwrap();
        hub.redeem(alice(), 10, now()).unwrap();
        let events = hub.drain_events();
        assert!(events.contains(&LedgerEvent::SourceRegistered {
            name: "a".to_string()
        }));
        assert!(events.contains(&LedgerEvent::Redeemed {
            participant: alice(),
            points: 10,
            reward: 10
        }));
        assert!(hub.drain_events().is_empty());
    }

    #[test]
    fn test_undrained_events_are_bounded() {
        let mut hub = open_hub(100);
        for i in 0..DEFAULT_EVENT_CAPACITY + 5 {
            hub.set_redemption_enabled(i % 2 == 0);
        }
        assert_eq!(hub.events_dropped(), 5);
        assert_eq!(hub.drain_events().len(), DEFAULT_EVENT_CAPACITY);
        hub.set_redemption_enabled(true);
        assert_eq!(hub.drain_events().len(), 1);
        assert_eq!(hub.events_dropped(), 5);
    }
}
