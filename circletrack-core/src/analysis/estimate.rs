//! State estimation against the nearest unresolved circle frontier.
//!
//! The most recent circle fixes the working direction: a rise circle (price
//! has closed back under a trough) turns attention downward, a drop circle
//! upward. On the working side the frontier is every pivot at or before the
//! side's last circle that no intervening close has pierced, plus every pivot
//! after it. The target is the frontier level closest to the final close that
//! the final close has already crossed; crossing it cleanly is a breakout.
//!
//! Both frontiers are always built because both feed the next archive.

use chrono::NaiveDate;

use crate::archive::Archive;
use crate::domain::{round3, Bar, MarkedBar, State, Turn};

use super::fault::{check_series, Phase, PhaseFault};

/// Bars averaged for the volume baseline.
pub const VOLUME_WINDOW: usize = 20;

/// Result of the estimate phase.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// No bars at all.
    Empty,
    /// Peaks or troughs are missing.
    Invalid,
    /// Pivots exist but no circle does.
    Toss,
    /// The fallback pivot lies before the first available bar; the caller
    /// should recompute over the full history.
    NeedsFullHistory,
    Settled(Verdict),
}

impl Outcome {
    pub fn state(&self) -> State {
        match self {
            Outcome::Empty => State::Fail,
            Outcome::Invalid | Outcome::NeedsFullHistory => State::Invalid,
            Outcome::Toss => State::Toss,
            Outcome::Settled(verdict) => verdict.state,
        }
    }

    pub fn breakout_date(&self) -> Option<NaiveDate> {
        match self {
            Outcome::Settled(verdict) => verdict.breakout_date,
            _ => None,
        }
    }

    /// Snapshot to persist, if the run produced one.
    pub fn snapshot(&self) -> Option<&Archive> {
        match self {
            Outcome::Settled(verdict) => Some(&verdict.snapshot),
            _ => None,
        }
    }
}

/// A directional classification and the archive it leaves behind.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub state: State,
    pub breakout_date: Option<NaiveDate>,
    pub snapshot: Archive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Rise,
    Drop,
}

impl Side {
    fn pivot(self) -> Turn {
        match self {
            Side::Rise => Turn::Peak,
            Side::Drop => Turn::Trough,
        }
    }

    fn has_circle(self, m: &MarkedBar) -> bool {
        match self {
            Side::Rise => m.rise_circle,
            Side::Drop => m.drop_circle,
        }
    }

    fn level(self, bar: &Bar) -> f64 {
        match self {
            Side::Rise => bar.high,
            Side::Drop => bar.low,
        }
    }

    /// `price` lies past `level` in this side's breakout direction.
    fn beyond(self, price: f64, level: f64) -> bool {
        match self {
            Side::Rise => price > level,
            Side::Drop => price < level,
        }
    }

    fn breakout(self) -> State {
        match self {
            Side::Rise => State::RiseBT,
            Side::Drop => State::DropFT,
        }
    }

    fn continuation(self) -> State {
        match self {
            Side::Rise => State::Rise,
            Side::Drop => State::Drop,
        }
    }
}

struct Frontier {
    side: Side,
    last_circle: Option<usize>,
    rows: Vec<usize>,
    target: Option<usize>,
}

impl Frontier {
    fn build(series: &[MarkedBar], side: Side) -> Self {
        let close = final_close(series);
        let last_circle = series.iter().rposition(|m| side.has_circle(m));

        let rows: Vec<usize> = pivots(series, side)
            .filter(|&k| match last_circle {
                Some(c) if k <= c => !pierced(series, k, side),
                _ => true,
            })
            .collect();

        let mut target: Option<usize> = None;
        for &k in &rows {
            let level = side.level(&series[k].bar);
            if !side.beyond(close, level) {
                continue;
            }
            // Closest crossed level: the highest peak or the lowest trough.
            let closer = match target {
                None => true,
                Some(t) => side.beyond(level, side.level(&series[t].bar)),
            };
            if closer {
                target = Some(k);
            }
        }

        Self {
            side,
            last_circle,
            rows,
            target,
        }
    }

    /// Rows the next run still needs from this side: the target and every
    /// frontier level the final close has not crossed yet.
    fn retained(&self, series: &[MarkedBar]) -> Vec<usize> {
        if self.rows.is_empty() {
            return pivots(series, self.side).collect();
        }
        let side = self.side;
        let target_level = self.target.map(|t| side.level(&series[t].bar));
        self.rows
            .iter()
            .copied()
            .filter(|&k| {
                let level = side.level(&series[k].bar);
                target_level.map_or(true, |t| !side.beyond(t, level))
            })
            .collect()
    }
}

/// Classify the merged, validated series.
pub fn estimate(series: &[MarkedBar]) -> Result<Outcome, PhaseFault> {
    check_series(series, Phase::Estimate)?;

    let Some(last) = series.last() else {
        return Ok(Outcome::Empty);
    };
    let has = |turn: Turn| series.iter().any(|m| m.turn == turn);
    if !has(Turn::Peak) || !has(Turn::Trough) {
        return Ok(Outcome::Invalid);
    }
    let Some(latest) = series.iter().rposition(MarkedBar::is_circle) else {
        return Ok(Outcome::Toss);
    };

    let rise_side = Frontier::build(series, Side::Rise);
    let drop_side = Frontier::build(series, Side::Drop);

    let working = if series[latest].rise_circle {
        &drop_side
    } else {
        &rise_side
    };
    let side = working.side;
    let close = last.bar.close;

    let chosen = match working.target {
        Some(t) => Some(t),
        None if working.last_circle.is_none() => {
            // Fall back to the last pivot of the working kind before the
            // latest (opposite) circle.
            match series[..latest].iter().rposition(|m| m.turn == side.pivot()) {
                Some(k) => Some(k),
                None => return Ok(Outcome::NeedsFullHistory),
            }
        }
        None => None,
    };

    let (state, breakout_date) = match chosen {
        Some(k)
            if side.beyond(close, side.level(&series[k].bar)) && !pierced(series, k, side) =>
        {
            (side.breakout(), Some(series[k].date()))
        }
        _ => (side.continuation(), None),
    };

    let snapshot = build_snapshot(series, &rise_side, &drop_side);
    Ok(Outcome::Settled(Verdict {
        state,
        breakout_date,
        snapshot,
    }))
}

/// Contiguous tail from the oldest row either frontier retains, with the
/// second-to-last circle as the carry-in boundary. With fewer than two
/// circles the boundary is the first bar stripped of annotations, so the next
/// run recomputes from scratch.
fn build_snapshot(series: &[MarkedBar], rise: &Frontier, drop: &Frontier) -> Archive {
    let circles: Vec<usize> = series
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_circle())
        .map(|(k, _)| k)
        .collect();

    let (boundary_at, boundary) = match circles.len() {
        n if n >= 2 => (circles[n - 2], series[circles[n - 2]]),
        _ => (0, MarkedBar::new(series[0].bar)),
    };

    let start = drop
        .retained(series)
        .into_iter()
        .chain(rise.retained(series))
        .chain(std::iter::once(boundary_at))
        .min()
        .unwrap_or(boundary_at);

    Archive {
        rows: series[start..].to_vec(),
        boundary,
    }
}

fn pivots(series: &[MarkedBar], side: Side) -> impl Iterator<Item = usize> + '_ {
    series
        .iter()
        .enumerate()
        .filter(move |(_, m)| m.turn == side.pivot())
        .map(|(k, _)| k)
}

/// Some close strictly between bar `k` and the final bar has crossed bar
/// `k`'s level.
fn pierced(series: &[MarkedBar], k: usize, side: Side) -> bool {
    let level = side.level(&series[k].bar);
    let end = series.len().saturating_sub(1);
    series
        .get(k + 1..end)
        .unwrap_or(&[])
        .iter()
        .any(|m| side.beyond(m.bar.close, level))
}

fn final_close(series: &[MarkedBar]) -> f64 {
    series.last().map(|m| m.bar.close).unwrap_or(f64::NAN)
}

/// Close-to-close change of the final two bars, rounded to 3 places.
pub fn gain_rate(series: &[MarkedBar]) -> f64 {
    match series {
        [.., prev, last] if prev.bar.close != 0.0 => {
            round3((last.bar.close - prev.bar.close) / prev.bar.close)
        }
        _ => 0.0,
    }
}

/// Final volume over the ceiling of the mean of the preceding
/// [`VOLUME_WINDOW`] volumes.
pub fn volume_rate(series: &[MarkedBar]) -> f64 {
    let n = series.len();
    if n <= VOLUME_WINDOW {
        return 0.0;
    }
    let total: u64 = series[n - 1 - VOLUME_WINDOW..n - 1]
        .iter()
        .map(|m| m.bar.volume)
        .sum();
    let baseline = total.div_ceil(VOLUME_WINDOW as u64);
    if baseline == 0 {
        return 0.0;
    }
    series[n - 1].bar.volume as f64 / baseline as f64
}
