//! Single-instrument evaluation: fetch, analyze, classify, checkpoint.
//!
//! The evaluator owns the archive round trip. It resumes from the stored
//! archive when one exists, falls back to a bounded number of full-history
//! recomputes when the estimate asks for one, and rewrites the archive only
//! when the archive policy allows it. Nothing it does can fail the caller:
//! every problem ends up as a `fail` (or `invalid`) result.

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::analysis::{analyze, gain_rate, volume_rate, Analysis, Outcome};
use crate::archive::{Archive, ArchiveStore};
use crate::data::{BarSource, FetchRange};
use crate::domain::{Bar, EvaluationResult, Timeframe};
use crate::session::{ArchivePolicy, Clock, SystemClock};

/// Full-history recomputes attempted when the fallback pivot is missing.
pub const FULL_HISTORY_ATTEMPTS: usize = 2;

pub struct Evaluator<'a> {
    source: &'a dyn BarSource,
    store: &'a dyn ArchiveStore,
    policy: ArchivePolicy,
    clock: &'a dyn Clock,
}

impl<'a> Evaluator<'a> {
    pub fn new(source: &'a dyn BarSource, store: &'a dyn ArchiveStore) -> Self {
        Self {
            source,
            store,
            policy: ArchivePolicy::default(),
            clock: &SystemClock,
        }
    }

    pub fn with_policy(mut self, policy: ArchivePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Evaluate `code` on `timeframe` as of `as_of`, resuming from and
    /// updating the stored archive.
    pub fn evaluate(&self, code: &str, timeframe: Timeframe, as_of: NaiveDate) -> EvaluationResult {
        let archive = self.load_archive(code, timeframe, as_of);
        let range = archive
            .as_ref()
            .map_or(FetchRange::FullHistory, |a| FetchRange::Since(a.resume_date()));

        let Some(bars) = self.fetch(code, timeframe, range, as_of) else {
            return EvaluationResult::failed(code);
        };

        let mut analysis = match analyze(&bars, archive.as_ref()) {
            Ok(analysis) => analysis,
            Err(fault) => {
                warn!(code, timeframe = %timeframe, phase = %fault.phase, "{fault}");
                return EvaluationResult::faulted(code, fault);
            }
        };

        let mut attempt = 0;
        while matches!(analysis.outcome, Outcome::NeedsFullHistory) && attempt < FULL_HISTORY_ATTEMPTS
        {
            attempt += 1;
            debug!(code, timeframe = %timeframe, attempt, "fallback pivot missing, recomputing full history");
            let Some(full) = self.fetch(code, timeframe, FetchRange::FullHistory, as_of) else {
                break;
            };
            analysis = match analyze(&full, None) {
                Ok(analysis) => analysis,
                Err(fault) => {
                    warn!(code, timeframe = %timeframe, phase = %fault.phase, "{fault}");
                    return EvaluationResult::faulted(code, fault);
                }
            };
        }

        if let Some(snapshot) = analysis.outcome.snapshot() {
            self.persist(code, timeframe, snapshot, archive.as_ref());
        }

        let result = summarize(code, &analysis);
        debug!(code, timeframe = %timeframe, state = %result.state, "evaluated");
        result
    }

    fn load_archive(&self, code: &str, timeframe: Timeframe, as_of: NaiveDate) -> Option<Archive> {
        match self.store.load(code, timeframe) {
            Ok(Some(archive)) if archive.last_date() <= as_of => Some(archive),
            Ok(Some(archive)) => {
                debug!(
                    code,
                    timeframe = %timeframe,
                    covers = %archive.last_date(),
                    "archive runs past the as-of date, ignoring it"
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(code, timeframe = %timeframe, "archive unreadable, recomputing: {e}");
                None
            }
        }
    }

    fn fetch(
        &self,
        code: &str,
        timeframe: Timeframe,
        range: FetchRange,
        as_of: NaiveDate,
    ) -> Option<Vec<Bar>> {
        match self.source.fetch(code, timeframe, range, as_of) {
            Ok(bars) if bars.is_empty() => {
                warn!(code, timeframe = %timeframe, source = self.source.name(), "no bars");
                None
            }
            Ok(bars) => Some(bars),
            Err(e) => {
                warn!(code, timeframe = %timeframe, source = self.source.name(), "fetch failed: {e}");
                None
            }
        }
    }

    fn persist(
        &self,
        code: &str,
        timeframe: Timeframe,
        snapshot: &Archive,
        previous: Option<&Archive>,
    ) {
        if !self.policy.permits_write(self.clock) {
            debug!(code, timeframe = %timeframe, "archive write suppressed during session");
            return;
        }
        if let Err(e) = self.store.save(code, timeframe, snapshot) {
            warn!(code, timeframe = %timeframe, "archive write failed: {e}");
            return;
        }
        let fingerprint = snapshot.fingerprint();
        match previous.map(Archive::fingerprint) {
            Some(before) if before == fingerprint => {
                debug!(code, timeframe = %timeframe, "archive rewritten unchanged");
            }
            _ => {
                info!(
                    code,
                    timeframe = %timeframe,
                    rows = snapshot.rows.len(),
                    fingerprint = %fingerprint.to_hex(),
                    "archive changed"
                );
            }
        }
    }
}

/// Evaluate a complete bar series with no archive involved.
///
/// A missing fallback pivot cannot be helped by refetching here, so it is
/// reported as `invalid`.
pub fn evaluate_bars(code: &str, bars: &[Bar]) -> EvaluationResult {
    if bars.is_empty() {
        return EvaluationResult::failed(code);
    }
    match analyze(bars, None) {
        Ok(analysis) => summarize(code, &analysis),
        Err(fault) => {
            warn!(code, phase = %fault.phase, "{fault}");
            EvaluationResult::faulted(code, fault)
        }
    }
}

fn summarize(code: &str, analysis: &Analysis) -> EvaluationResult {
    EvaluationResult {
        code: code.to_string(),
        state: analysis.outcome.state(),
        gain_rate: gain_rate(&analysis.series),
        breakout_date: analysis.outcome.breakout_date(),
        last_date: analysis.series.last().map(|m| m.date()),
        volume_rate: volume_rate(&analysis.series),
        fault: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryArchiveStore;
    use crate::data::ReplaySource;
    use crate::domain::State;
    use crate::session::FixedClock;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 3, d).unwrap()
    }

    /// Trough, peak at 20, trough at 12, final close 21 above the peak.
    fn breakout_bars() -> Vec<Bar> {
        [
            (4, 10.0, 12.0, 8.0, 11.0),
            (5, 11.0, 15.0, 10.0, 14.0),
            (6, 17.0, 20.0, 16.0, 18.0),
            (7, 17.0, 18.0, 13.0, 14.0),
            (8, 14.0, 15.0, 12.0, 13.0),
            (11, 15.0, 19.0, 14.0, 18.0),
            (12, 18.0, 22.0, 17.0, 21.0),
        ]
        .iter()
        .map(|&(d, open, high, low, close)| Bar {
            date: day(d),
            open,
            high,
            low,
            close,
            volume: 1_000,
        })
        .collect()
    }

    fn source() -> ReplaySource {
        ReplaySource::new()
            .with("2330", Timeframe::Daily, breakout_bars())
            .unwrap()
    }

    fn after_close() -> FixedClock {
        FixedClock(day(12).and_hms_opt(15, 0, 0).unwrap())
    }

    fn mid_session() -> FixedClock {
        FixedClock(day(12).and_hms_opt(10, 0, 0).unwrap())
    }

    #[test]
    fn fresh_evaluation_breaks_out_and_writes_archive() {
        let source = source();
        let store = MemoryArchiveStore::new();
        let clock = after_close();
        let evaluator = Evaluator::new(&source, &store).with_clock(&clock);

        let result = evaluator.evaluate("2330", Timeframe::Daily, day(12));
        assert_eq!(result.state, State::RiseBT);
        assert_eq!(result.breakout_date, Some(day(6)));
        assert_eq!(result.gain_rate, 0.167);
        assert_eq!(result.last_date, Some(day(12)));
        assert!(store.exists("2330", Timeframe::Daily));
    }

    #[test]
    fn session_hours_suppress_the_write() {
        let source = source();
        let store = MemoryArchiveStore::new();
        let clock = mid_session();
        let evaluator = Evaluator::new(&source, &store).with_clock(&clock);

        let result = evaluator.evaluate("2330", Timeframe::Daily, day(12));
        assert_eq!(result.state, State::RiseBT);
        assert!(!store.exists("2330", Timeframe::Daily));
    }

    #[test]
    fn missing_source_is_fail() {
        let source = ReplaySource::new();
        let store = MemoryArchiveStore::new();
        let result = Evaluator::new(&source, &store)
            .with_policy(ArchivePolicy::Never)
            .evaluate("0050", Timeframe::Weekly, day(12));
        assert_eq!(result.state, State::Fail);
        assert!(result.fault.is_none());
    }

    #[test]
    fn phase_fault_is_fail_with_diagnostic() {
        let mut bars = breakout_bars();
        bars[3].low = f64::NAN;
        // Bypass normalisation, which would reject the bar up front.
        let result = evaluate_bars("2330", &bars);
        assert_eq!(result.state, State::Fail);
        let fault = result.fault.unwrap();
        assert_eq!(fault.date, Some(day(7)));
    }

    #[test]
    fn resumed_run_matches_fresh_run() {
        let source = source();
        let store = MemoryArchiveStore::new();
        let evaluator = Evaluator::new(&source, &store).with_policy(ArchivePolicy::Always);

        let first = evaluator.evaluate("2330", Timeframe::Daily, day(12));
        let second = evaluator.evaluate("2330", Timeframe::Daily, day(12));
        assert_eq!(first.state, second.state);
        assert_eq!(first.breakout_date, second.breakout_date);
        assert_eq!(first.gain_rate, second.gain_rate);
    }

    #[test]
    fn archive_past_as_of_is_ignored() {
        let source = source();
        let store = MemoryArchiveStore::new();
        let evaluator = Evaluator::new(&source, &store).with_policy(ArchivePolicy::Always);
        evaluator.evaluate("2330", Timeframe::Daily, day(12));

        // The stored rows run through the 12th; replaying the 8th recomputes.
        let early = evaluator.evaluate("2330", Timeframe::Daily, day(8));
        assert_ne!(early.state, State::Fail);
        assert_eq!(early.last_date, Some(day(8)));
    }

    #[test]
    fn stateless_evaluation_touches_nothing() {
        let result = evaluate_bars("2330", &breakout_bars());
        assert_eq!(result.state, State::RiseBT);
        assert_eq!(evaluate_bars("2330", &[]).state, State::Fail);
    }
}
