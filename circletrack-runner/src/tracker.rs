//! Tracker: per-instrument orchestration across timeframes.
//!
//! - **daily**: evaluate today's daily bars and hold yesterday's
//!   continuation label until the matching breakout confirms.
//! - **weekly**: only a weekly breakout qualifies; it is then re-checked on
//!   daily bars and marked synchronized when both frames agree.
//! - **historical**: replay a past date from frozen resources, find the most
//!   recent weekly breakout, and walk daily bars forward from that week.
//!
//! Every failure below this boundary comes back as an operational state
//! label; nothing here returns an error.

use std::collections::HashSet;

use chrono::NaiveDate;
use circletrack_core::archive::ArchiveStore;
use circletrack_core::calendar::TradingCalendar;
use circletrack_core::data::BarSource;
use circletrack_core::domain::{EvaluationResult, State, Timeframe};
use circletrack_core::session::{ArchivePolicy, Clock, SystemClock};
use circletrack_core::{evaluate_bars, Evaluator};
use tracing::{debug, warn};

use crate::resources::{replay_from_source, ResourceLoader};

/// Calendar days searched forward for the end of a breakout week.
const MAX_WEEK_SPAN: usize = 7;

/// Hold a continuation label until the breakout in the same direction
/// confirms.
pub fn camouflage(pre_state: State, state: State) -> State {
    match pre_state {
        State::Rise if state != State::RiseBT => State::Rise,
        State::Drop if state != State::DropFT => State::Drop,
        _ => state,
    }
}

pub struct Tracker<'a> {
    source: &'a dyn BarSource,
    store: &'a dyn ArchiveStore,
    calendar: &'a dyn TradingCalendar,
    resources: Option<&'a ResourceLoader>,
    policy: ArchivePolicy,
    clock: &'a dyn Clock,
}

impl<'a> Tracker<'a> {
    pub fn new(
        source: &'a dyn BarSource,
        store: &'a dyn ArchiveStore,
        calendar: &'a dyn TradingCalendar,
    ) -> Self {
        Self {
            source,
            store,
            calendar,
            resources: None,
            policy: ArchivePolicy::default(),
            clock: &SystemClock,
        }
    }

    pub fn with_resources(mut self, resources: &'a ResourceLoader) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn with_policy(mut self, policy: ArchivePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    fn evaluator<'s>(&'s self, source: &'s dyn BarSource, policy: ArchivePolicy) -> Evaluator<'s> {
        Evaluator::new(source, self.store)
            .with_policy(policy)
            .with_clock(self.clock)
    }

    /// Daily pass for an instrument reported as `pre_state` yesterday.
    pub fn daily(&self, code: &str, pre_state: State, date: NaiveDate) -> EvaluationResult {
        let result = self
            .evaluator(self.source, self.policy)
            .evaluate(code, Timeframe::Daily, date);
        if result.is_fail() {
            warn!(code, %date, "daily analysis failed");
            return result.relabel(State::DailyFailed);
        }
        let state = camouflage(pre_state, result.state);
        debug!(code, %date, raw = %result.state, state = %state, "daily");
        result.relabel(state)
    }

    /// Weekly pass: `Unfit` unless the weekly frame breaks out.
    pub fn weekly(&self, code: &str, date: NaiveDate) -> EvaluationResult {
        let evaluator = self.evaluator(self.source, self.policy);
        let weekly = evaluator.evaluate(code, Timeframe::Weekly, date);
        if weekly.is_fail() {
            warn!(code, %date, "weekly analysis failed");
            return weekly.relabel(State::WeeklyFailed);
        }
        if !weekly.state.is_breakout() {
            return EvaluationResult::labelled(code, State::Unfit);
        }

        let daily = evaluator.evaluate(code, Timeframe::Daily, date);
        if daily.is_fail() {
            warn!(code, %date, "daily re-check of weekly breakout failed");
            return daily.relabel(State::WeeklyFailed);
        }
        let state = if daily.state == weekly.state {
            daily.state.synchronized()
        } else {
            daily.state
        };
        debug!(code, %date, weekly = %weekly.state, state = %state, "weekly");
        daily.relabel(state)
    }

    /// Replay `date` from frozen resources.
    pub fn historical(&self, code: &str, date: NaiveDate) -> EvaluationResult {
        let replay = match self.resources {
            Some(loader) => loader.replay_for(self.source, code, date),
            None => replay_from_source(self.source, code, date),
        };
        let replay = match replay {
            Ok(replay) => replay,
            Err(e) => {
                warn!(code, %date, "resources are incomplete: {e}");
                return EvaluationResult::labelled(code, State::MissingSource);
            }
        };
        let weekly_bars = replay.bars(code, Timeframe::Weekly).unwrap_or_default();
        let daily_bars = replay.bars(code, Timeframe::Daily).unwrap_or_default();

        // Drop the still-forming week unless `date` closes it.
        let complete = if self.calendar.is_week_end(date) {
            weekly_bars.len()
        } else {
            weekly_bars.len().saturating_sub(1)
        };

        let mut breakout: Option<EvaluationResult> = None;
        for w in (1..=complete).rev() {
            let result = evaluate_bars(code, &weekly_bars[..w]);
            if result.is_fail() {
                warn!(code, %date, weeks = w, "weekly analysis failed");
                return result.relabel(State::WeeklyFailed);
            }
            if result.state.is_breakout() {
                breakout = Some(result);
                break;
            }
        }

        let record = self
            .evaluator(&replay, ArchivePolicy::Always)
            .evaluate(code, Timeframe::Weekly, date);
        if record.is_fail() {
            warn!(code, %date, "weekly archive record failed");
            return record.relabel(State::WeeklyFailed);
        }

        let Some((week, mut intermediate)) =
            breakout.and_then(|b| b.last_date.map(|last| (b.state, last)))
        else {
            warn!(code, %date, "no weekly breakout to replay from");
            return EvaluationResult::labelled(code, State::MissingIntermediate);
        };

        for _ in 0..MAX_WEEK_SPAN {
            if self.calendar.is_week_end(intermediate) {
                break;
            }
            match intermediate.succ_opt() {
                Some(next) => intermediate = next,
                None => break,
            }
        }
        debug!(code, %date, weekly = %week, %intermediate, "replaying daily bars");

        let available: HashSet<NaiveDate> = daily_bars.iter().map(|b| b.date).collect();
        let evaluator = self.evaluator(&replay, ArchivePolicy::Always);
        let days = intermediate
            .iter_days()
            .take_while(|day| *day <= date)
            .filter(|day| self.calendar.is_trading_day(*day) && available.contains(day));

        for day in days {
            let result = evaluator.evaluate(code, Timeframe::Daily, day);
            if result.is_fail() {
                warn!(code, %day, "daily analysis failed");
                return result.relabel(State::DailyFailed);
            }
            if day < date {
                if result.state == week {
                    debug!(code, %day, "breakout already fired earlier in the week");
                    return EvaluationResult::labelled(code, State::Cancel);
                }
                continue;
            }

            let mut state = camouflage(week.base_form(), result.state);
            if intermediate == date {
                state = state.synchronized();
            }
            return result.relabel(state);
        }

        warn!(code, %date, "no daily bar on the replay date");
        EvaluationResult::labelled(code, State::MissingSource)
    }
}
