// crates/tally-staking/src/staking.rs
//
// Staking engine: position lifecycle, queries, and accrual administration.
//
// Participants open uncommitted or committed positions and close them
// later. Closing folds accrual up to the close instant first, then applies
// the early-exit penalty to the folded value, then returns principal
// through custody. Points are never pushed; `total_points` is computed
// fresh from stored snapshots at every read.
//
// Every write validates fully before touching state and commits only after
// custody has accepted the balance move, so a rejected call leaves no trace.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use tally_core::{
    BalanceCustody, EventLog, LedgerEvent, Moment, ParticipantId, PositionId, QueryBudget,
    TallyError,
};

use crate::accrual::{self, effective_boost, AccrualConfig};
use crate::custody::InMemoryCustody;
use crate::multiplier::boost_for_days;
use crate::params::StakingParams;
use crate::penalty::{penalty_for_close, PenaltyQuote};
use crate::position::{ParticipantAccount, Position, PositionView};
use crate::units::{MAX_COMMITMENT_DAYS, MAX_RATE_PER_SECOND, MAX_STAKE_AMOUNT, MIN_COMMITMENT_DAYS};

/// Result of closing a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReceipt {
    pub position_id: PositionId,
    /// Principal returned through custody.
    pub amount_returned: u128,
    /// Points the closed position keeps.
    pub points_retained: u128,
    /// Points forfeited to the early-exit penalty.
    pub penalty: u128,
    /// The theoretical penalty exceeded the accrued value.
    pub capped: bool,
}

/// Serializable image of the position store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub config: AccrualConfig,
    pub accounts: BTreeMap<ParticipantId, ParticipantAccount>,
    pub total_staked: u128,
}

/// The staking accounting source: positions, accrual, penalties, checkpoints.
pub struct StakingEngine<C: BalanceCustody = InMemoryCustody> {
    pub(crate) params: StakingParams,
    pub(crate) config: AccrualConfig,
    pub(crate) accounts: BTreeMap<ParticipantId, ParticipantAccount>,
    pub(crate) total_staked: u128,
    pub(crate) custody: C,
    pub(crate) events: EventLog,
}

impl<C: BalanceCustody> StakingEngine<C> {
    /// Create an empty engine.
    ///
    /// # Errors
    /// Returns the validation error of `params` if they are unusable.
    pub fn new(params: StakingParams, custody: C) -> Result<Self, TallyError> {
        params.validate()?;
        let config = AccrualConfig::new(params.rate_per_second as u128, params.active);
        Ok(Self {
            params,
            config,
            accounts: BTreeMap::new(),
            total_staked: 0,
            custody,
            events: EventLog::new(),
        })
    }

    /// Rebuild an engine from a snapshot.
    ///
    /// The snapshot's accrual configuration (including its version) wins
    /// over `params.rate_per_second` and `params.active`.
    ///
    /// The snapshot is held to the same bounds as live writes, so accrual
    /// over a restored store stays inside the overflow-free range.
    ///
    /// # Errors
    /// `RateTooLarge` or `AmountTooLarge` for out-of-range values,
    /// `Overflow` if a total leaves the u128 range, and `InvalidConfig` if
    /// ids, owners, commitments, or cached totals disagree with the positions.
    pub fn restore(
        snapshot: LedgerSnapshot,
        params: StakingParams,
        custody: C,
    ) -> Result<Self, TallyError> {
        params.validate()?;
        if snapshot.config.rate_per_second > MAX_RATE_PER_SECOND {
            return Err(TallyError::RateTooLarge {
                rate: snapshot.config.rate_per_second,
                max: MAX_RATE_PER_SECOND,
            });
        }

        let mut total = 0u128;
        for (participant, account) in &snapshot.accounts {
            if participant.is_unset() {
                return Err(TallyError::InvalidConfig(
                    "snapshot holds an account for the unset identity".to_string(),
                ));
            }
            let (open, retired) = restored_account_totals(participant, account)?;
            if open != account.total_open_amount {
                return Err(TallyError::InvalidConfig(format!(
                    "account {} caches {} open but positions sum to {}",
                    participant, account.total_open_amount, open
                )));
            }
            if retired != account.retired_points {
                return Err(TallyError::InvalidConfig(format!(
                    "account {} caches {} retired points but closed positions hold {}",
                    participant, account.retired_points, retired
                )));
            }
            total = total.checked_add(open).ok_or(TallyError::Overflow)?;
        }
        if total != snapshot.total_staked {
            return Err(TallyError::InvalidConfig(format!(
                "snapshot total_staked {} does not match positions ({})",
                snapshot.total_staked, total
            )));
        }

        tracing::info!(
            participants = snapshot.accounts.len(),
            total_staked = total,
            config_version = snapshot.config.version,
            "staking engine restored"
        );

        Ok(Self {
            params,
            config: snapshot.config,
            accounts: snapshot.accounts,
            total_staked: total,
            custody,
            events: EventLog::new(),
        })
    }

    /// Capture the full position store.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            config: self.config,
            accounts: self.accounts.clone(),
            total_staked: self.total_staked,
        }
    }

    // ---------------------------------------------------------------
    // Position lifecycle
    // ---------------------------------------------------------------

    /// Open a position that accrues at 1.0x and can be closed any time.
    pub fn open_uncommitted(
        &mut self,
        participant: ParticipantId,
        amount: u128,
        now: Moment,
    ) -> Result<PositionId, TallyError> {
        self.open_position(participant, amount, 0, now)
    }

    /// Open a position committed for `days` days.
    ///
    /// # Errors
    /// `InvalidCommitment` unless `days` is within 7..=365, plus the
    /// validation errors of `open_uncommitted`.
    pub fn open_committed(
        &mut self,
        participant: ParticipantId,
        amount: u128,
        days: u32,
        now: Moment,
    ) -> Result<PositionId, TallyError> {
        if !(MIN_COMMITMENT_DAYS..=MAX_COMMITMENT_DAYS).contains(&days) {
            return Err(TallyError::InvalidCommitment { days });
        }
        self.open_position(participant, amount, days, now)
    }

    fn open_position(
        &mut self,
        participant: ParticipantId,
        amount: u128,
        days: u32,
        now: Moment,
    ) -> Result<PositionId, TallyError> {
        if participant.is_unset() {
            return Err(TallyError::UnsetParticipant);
        }
        validate_amount(amount)?;

        let max = self.params.max_positions_per_participant;
        let id = match self.accounts.get(&participant) {
            Some(account) if account.open_count() >= max => {
                return Err(TallyError::TooManyPositions { max });
            }
            Some(account) => account.next_id(),
            None => 0,
        };

        self.custody.move_in(&participant, amount)?;

        let position = if days == 0 {
            Position::uncommitted(id, participant, amount, now.timestamp)
        } else {
            Position::committed(id, participant, amount, days, now.timestamp)
        };

        let account = self
            .accounts
            .entry(participant)
            .or_insert_with(|| ParticipantAccount::new(now.block));
        account.positions.push(position);
        account.total_open_amount = account.total_open_amount.saturating_add(amount);
        // A deposit restarts the gate so it cannot be checkpointed in the same block.
        account.last_checkpoint_block = now.block;
        self.total_staked = self.total_staked.saturating_add(amount);

        let boost = boost_for_days(days);
        tracing::info!(
            participant = %participant,
            position_id = id,
            amount,
            commitment_days = days,
            boost,
            "position opened"
        );
        self.events.push(LedgerEvent::PositionOpened {
            participant,
            position_id: id,
            amount,
            commitment_days: days,
            boost,
            timestamp: now.timestamp,
        });

        Ok(id)
    }

    /// Close a position and return its principal.
    ///
    /// Accrual is folded up to `now` before the penalty is computed, and the
    /// penalty is taken out of the folded value in place.
    ///
    /// # Errors
    /// `PositionNotFound`, `PositionClosed`, or the custody error if the
    /// principal cannot be returned (in which case nothing changes).
    pub fn close(
        &mut self,
        participant: ParticipantId,
        position_id: PositionId,
        now: Moment,
    ) -> Result<CloseReceipt, TallyError> {
        let mut position = self.position(&participant, position_id)?.clone();
        if !position.is_open {
            return Err(TallyError::PositionClosed(position_id));
        }

        accrual::accrue(&mut position, &self.config, now.timestamp);
        let quote = penalty_for_close(&position, position.accrued_value, now.timestamp);
        position.accrued_value -= quote.penalty;
        position.penalty_paid = quote.penalty;
        position.is_open = false;
        position.closed_at = Some(now.timestamp);

        self.custody.move_out(&participant, position.amount)?;

        let amount = position.amount;
        let points_retained = position.accrued_value;
        let account = self
            .accounts
            .get_mut(&participant)
            .ok_or(TallyError::PositionNotFound(position_id))?;
        account.total_open_amount = account.total_open_amount.saturating_sub(amount);
        account.retired_points = account.retired_points.saturating_add(points_retained);
        if let Some(slot) = account.position_mut(position_id) {
            *slot = position;
        }
        self.total_staked = self.total_staked.saturating_sub(amount);

        if quote.capped {
            tracing::warn!(
                participant = %participant,
                position_id,
                penalty = quote.penalty,
                "early-exit penalty capped at accrued value"
            );
        }
        tracing::info!(
            participant = %participant,
            position_id,
            amount,
            points_retained,
            penalty = quote.penalty,
            "position closed"
        );
        self.events.push(LedgerEvent::PositionClosed {
            participant,
            position_id,
            amount,
            points_retained,
            penalty: quote.penalty,
            capped: quote.capped,
            timestamp: now.timestamp,
        });

        Ok(CloseReceipt {
            position_id,
            amount_returned: amount,
            points_retained,
            penalty: quote.penalty,
            capped: quote.capped,
        })
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Staking points of `participant` at `now`, across open and closed positions.
    pub fn total_points(&self, participant: &ParticipantId, now: u64) -> u128 {
        self.accounts
            .get(participant)
            .map(|account| {
                account
                    .open_positions()
                    .map(|p| accrual::total_points(p, &self.config, now))
                    .fold(account.retired_points, u128::saturating_add)
            })
            .unwrap_or(0)
    }

    /// `total_points`, charging `budget` one unit for the lookup and one per
    /// open position. Closed positions are covered by the retired total.
    pub fn total_points_metered(
        &self,
        participant: &ParticipantId,
        now: u64,
        budget: &mut QueryBudget,
    ) -> Result<u128, TallyError> {
        budget.charge(1)?;
        let Some(account) = self.accounts.get(participant) else {
            return Ok(0);
        };
        let mut sum = account.retired_points;
        for position in account.open_positions() {
            budget.charge(1)?;
            sum = sum.saturating_add(accrual::total_points(position, &self.config, now));
        }
        Ok(sum)
    }

    /// Detail of one position at `now`.
    pub fn position_detail(
        &self,
        participant: &ParticipantId,
        position_id: PositionId,
        now: u64,
    ) -> Result<PositionView, TallyError> {
        let position = self.position(participant, position_id)?;
        let current_points = accrual::total_points(position, &self.config, now);
        let pending_penalty = if position.is_open {
            penalty_for_close(position, current_points, now).penalty
        } else {
            0
        };
        Ok(PositionView {
            position: position.clone(),
            current_points,
            effective_boost: effective_boost(position, now),
            commitment_remaining: position.remaining_commitment(now),
            pending_penalty,
        })
    }

    /// Penalty a close of the position at `now` would apply.
    ///
    /// # Errors
    /// `PositionNotFound` or `PositionClosed`.
    pub fn potential_penalty(
        &self,
        participant: &ParticipantId,
        position_id: PositionId,
        now: u64,
    ) -> Result<PenaltyQuote, TallyError> {
        let position = self.position(participant, position_id)?;
        if !position.is_open {
            return Err(TallyError::PositionClosed(position_id));
        }
        let accrued = accrual::total_points(position, &self.config, now);
        Ok(penalty_for_close(position, accrued, now))
    }

    /// Points a fresh position of `amount` committed for `days` (0 for
    /// uncommitted) would hold after `hold_secs` seconds at the current rate.
    pub fn estimate(&self, amount: u128, days: u32, hold_secs: u64) -> Result<u128, TallyError> {
        validate_amount(amount)?;
        let position = match days {
            0 => Position::uncommitted(0, ParticipantId::UNSET, amount, 0),
            d if (MIN_COMMITMENT_DAYS..=MAX_COMMITMENT_DAYS).contains(&d) => {
                Position::committed(0, ParticipantId::UNSET, amount, d, 0)
            }
            d => return Err(TallyError::InvalidCommitment { days: d }),
        };
        Ok(accrual::total_points(&position, &self.config, hold_secs))
    }

    /// All positions (open and closed) of `participant`.
    pub fn positions(&self, participant: &ParticipantId) -> &[Position] {
        self.accounts
            .get(participant)
            .map(|account| account.positions.as_slice())
            .unwrap_or(&[])
    }

    pub fn account(&self, participant: &ParticipantId) -> Option<&ParticipantAccount> {
        self.accounts.get(participant)
    }

    /// Participants with an account, in identity order.
    pub fn participants(&self) -> impl Iterator<Item = &ParticipantId> {
        self.accounts.keys()
    }

    pub fn participant_count(&self) -> usize {
        self.accounts.len()
    }

    /// Sum of open principal across all participants.
    pub fn total_staked(&self) -> u128 {
        self.total_staked
    }

    pub fn config(&self) -> &AccrualConfig {
        &self.config
    }

    pub fn params(&self) -> &StakingParams {
        &self.params
    }

    pub fn custody(&self) -> &C {
        &self.custody
    }

    pub fn custody_mut(&mut self) -> &mut C {
        &mut self.custody
    }

    /// Take the events buffered since the last drain.
    ///
    /// The buffer holds at most `DEFAULT_EVENT_CAPACITY` events; hosts that
    /// want the full stream drain after every state-changing call.
    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        self.events.drain()
    }

    /// Events evicted from a full buffer before anyone drained them.
    pub fn events_dropped(&self) -> u64 {
        self.events.dropped()
    }

    // ---------------------------------------------------------------
    // Administration
    // ---------------------------------------------------------------

    /// Change the accrual rate. Applies to every window not yet folded.
    pub fn set_rate_per_second(&mut self, rate: u128) -> Result<(), TallyError> {
        if rate > MAX_RATE_PER_SECOND {
            return Err(TallyError::RateTooLarge {
                rate,
                max: MAX_RATE_PER_SECOND,
            });
        }
        self.config.rate_per_second = rate;
        self.bump_config();
        Ok(())
    }

    /// Switch accrual on or off for every position.
    pub fn set_active(&mut self, active: bool) {
        self.config.active = active;
        self.bump_config();
    }

    fn bump_config(&mut self) {
        self.config.version += 1;
        tracing::info!(
            version = self.config.version,
            rate_per_second = self.config.rate_per_second,
            active = self.config.active,
            "accrual config updated"
        );
        self.events.push(LedgerEvent::AccrualConfigUpdated {
            version: self.config.version,
            rate_per_second: self.config.rate_per_second,
            active: self.config.active,
        });
    }

    fn position(
        &self,
        participant: &ParticipantId,
        position_id: PositionId,
    ) -> Result<&Position, TallyError> {
        self.accounts
            .get(participant)
            .and_then(|account| account.position(position_id))
            .ok_or(TallyError::PositionNotFound(position_id))
    }
}

/// Open principal and retired points of a restored account, after checking
/// every position against the bounds a live open enforces.
fn restored_account_totals(
    participant: &ParticipantId,
    account: &ParticipantAccount,
) -> Result<(u128, u128), TallyError> {
    let mut open = 0u128;
    let mut retired = 0u128;
    for (index, position) in account.positions.iter().enumerate() {
        if position.id != index as PositionId || position.owner != *participant {
            return Err(TallyError::InvalidConfig(format!(
                "account {} position at index {} is recorded as id {} of {}",
                participant, index, position.id, position.owner
            )));
        }
        validate_amount(position.amount)?;
        if position.is_committed()
            && !(MIN_COMMITMENT_DAYS..=MAX_COMMITMENT_DAYS).contains(&position.commitment_days)
        {
            return Err(TallyError::InvalidCommitment {
                days: position.commitment_days,
            });
        }
        if position.is_open {
            open = open.checked_add(position.amount).ok_or(TallyError::Overflow)?;
        } else {
            retired = retired
                .checked_add(position.accrued_value)
                .ok_or(TallyError::Overflow)?;
        }
    }
    Ok((open, retired))
}

fn validate_amount(amount: u128) -> Result<(), TallyError> {
    if amount == 0 {
        return Err(TallyError::ZeroAmount);
    }
    if amount > MAX_STAKE_AMOUNT {
        return Err(TallyError::AmountTooLarge {
            amount,
            max: MAX_STAKE_AMOUNT,
        });
    }
    Ok(())
}
