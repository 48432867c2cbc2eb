//! Property tests for pipeline invariants.
//!
//! Uses proptest to verify:
//! 1. Alternation: pivots strictly alternate between peak and trough
//! 2. Circles live only on pivots of the matching kind
//! 3. Frontier monotonicity: older surviving circles are strictly better
//! 4. Pruning is idempotent
//! 5. Label totality: every state label parses back to its state
//! 6. Same-data resume equivalence
//! 7. Snapshots keep every level the next run may still break through

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

use circletrack_core::analysis::{analyze, validate};
use circletrack_core::archive::MemoryArchiveStore;
use circletrack_core::data::ReplaySource;
use circletrack_core::domain::{Bar, MarkedBar, State, Timeframe, Turn};
use circletrack_core::session::ArchivePolicy;
use circletrack_core::{evaluate_bars, Evaluator};

// ── Strategies (proptest) ────────────────────────────────────────────

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Random walk with prices rounded to cents, so equal highs and lows occur.
fn arb_bars() -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec((-0.05..0.05_f64, 0.0..0.02_f64, 0.0..0.02_f64), 3..120).prop_map(
        |steps| {
            let start = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
            let mut price = 100.0;
            steps
                .into_iter()
                .enumerate()
                .map(|(k, (ret, up, down))| {
                    let open = price;
                    let close = price * (1.0 + ret);
                    price = close;
                    Bar {
                        date: start + Duration::days(k as i64),
                        open: round2(open),
                        high: round2(open.max(close) * (1.0 + up)),
                        low: round2(open.min(close) * (1.0 - down)),
                        close: round2(close),
                        volume: 1_000 + k as u64,
                    }
                })
                .collect()
        },
    )
}

fn pivots(series: &[MarkedBar]) -> Vec<Turn> {
    series
        .iter()
        .map(|m| m.turn)
        .filter(|t| t.is_pivot())
        .collect()
}

// ── 1–2. Pivot and circle shape ──────────────────────────────────────

proptest! {
    #[test]
    fn pivots_alternate(bars in arb_bars()) {
        let analysis = analyze(&bars, None).unwrap();
        for pair in pivots(&analysis.series).windows(2) {
            prop_assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn circles_sit_on_matching_pivots(bars in arb_bars()) {
        let analysis = analyze(&bars, None).unwrap();
        for m in &analysis.series {
            if m.rise_circle {
                prop_assert_eq!(m.turn, Turn::Peak);
            }
            if m.drop_circle {
                prop_assert_eq!(m.turn, Turn::Trough);
            }
        }
    }

    /// The final bar never carries a pivot: it has no successor to confirm it.
    #[test]
    fn last_bar_is_never_a_pivot(bars in arb_bars()) {
        let analysis = analyze(&bars, None).unwrap();
        prop_assert_eq!(analysis.series.last().unwrap().turn, Turn::None);
    }
}

// ── 3–4. Frontier ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn older_circles_are_strictly_better(bars in arb_bars()) {
        let analysis = analyze(&bars, None).unwrap();
        let rise: Vec<f64> = analysis.series.iter().filter(|m| m.rise_circle).map(|m| m.bar.high).collect();
        let drop: Vec<f64> = analysis.series.iter().filter(|m| m.drop_circle).map(|m| m.bar.low).collect();
        for pair in rise.windows(2) {
            prop_assert!(pair[0] > pair[1], "rise circles {:?}", rise);
        }
        for pair in drop.windows(2) {
            prop_assert!(pair[0] < pair[1], "drop circles {:?}", drop);
        }
    }

    #[test]
    fn pruning_is_idempotent(bars in arb_bars()) {
        let analysis = analyze(&bars, None).unwrap();
        let mut again = analysis.series.clone();
        validate::prune(&mut again);
        prop_assert_eq!(again, analysis.series);
    }

    #[test]
    fn analysis_is_deterministic(bars in arb_bars()) {
        prop_assert_eq!(analyze(&bars, None).unwrap(), analyze(&bars, None).unwrap());
    }
}

// ── 5. Labels ────────────────────────────────────────────────────────

#[test]
fn every_state_label_round_trips() {
    for state in State::ALL {
        assert_eq!(state.label().parse::<State>().unwrap(), state);
    }
}

proptest! {
    #[test]
    fn estimated_state_is_a_core_label(bars in arb_bars()) {
        let state = evaluate_bars("P", &bars).state;
        prop_assert!(matches!(
            state,
            State::Toss
                | State::Invalid
                | State::Rise
                | State::Drop
                | State::RiseBT
                | State::DropFT
        ));
    }
}

// ── 6. Resume ────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Re-running over the same bars from the stored archive reports what a
    /// full recompute reports.
    #[test]
    fn resume_over_same_data_matches_full_recompute(bars in arb_bars()) {
        let as_of = bars.last().unwrap().date;
        let source = ReplaySource::new().with("P", Timeframe::Daily, bars.clone()).unwrap();
        let store = MemoryArchiveStore::new();
        let evaluator = Evaluator::new(&source, &store).with_policy(ArchivePolicy::Always);

        let stateless = evaluate_bars("P", &bars);
        let first = evaluator.evaluate("P", Timeframe::Daily, as_of);
        let resumed = evaluator.evaluate("P", Timeframe::Daily, as_of);

        for result in [&first, &resumed] {
            prop_assert_eq!(result.state, stateless.state);
            prop_assert_eq!(result.breakout_date, stateless.breakout_date);
            prop_assert_eq!(result.gain_rate, stateless.gain_rate);
        }
    }
}

// ── 7. Snapshot coverage ─────────────────────────────────────────────

proptest! {
    /// A pivot that no later close has crossed is still live, and so is the
    /// breakout target: both must be inside the snapshot tail.
    #[test]
    fn snapshot_keeps_uncrossed_pivots_and_the_target(bars in arb_bars()) {
        let analysis = analyze(&bars, None).unwrap();
        let Some(snapshot) = analysis.outcome.snapshot() else {
            return Ok(());
        };
        let first = snapshot.rows.first().map(|m| m.date());
        prop_assert!(first.is_some());

        let series = &analysis.series;
        for (k, m) in series.iter().enumerate() {
            let later = &series[k + 1..];
            let uncrossed = match m.turn {
                Turn::Peak => later.iter().all(|n| n.bar.close <= m.bar.high),
                Turn::Trough => later.iter().all(|n| n.bar.close >= m.bar.low),
                Turn::None => false,
            };
            if uncrossed {
                prop_assert!(
                    first <= Some(m.date()),
                    "{:?} on {} dropped from a tail starting {:?}",
                    m.turn,
                    m.date(),
                    first
                );
            }
        }

        if let Some(date) = analysis.outcome.breakout_date() {
            prop_assert!(snapshot.rows.iter().any(|m| m.date() == date));
        }
    }
}
