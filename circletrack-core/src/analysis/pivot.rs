//! Pivot detection: zig-zag turning points with look-ahead and look-back
//! invalidation.
//!
//! Every interior bar is tested against its two neighbours. A bar that is a
//! local extreme on either side becomes a candidate. Candidates that a later
//! bar swallows are skipped outright. Otherwise the candidate first clears
//! every earlier pivot whose range it contains, then tries to confirm itself
//! as a peak (or a trough) against the surviving anchor pivot:
//!
//! - no bar from the anchor up to the candidate may dominate it, and
//! - scanning forward, a bar that moves away from it on both extremes must
//!   appear before any bar that takes out its extreme.
//!
//! The first bar of the series may already carry a pivot from the archive;
//! it then seeds the anchor and nothing is planted behind it.

use crate::domain::{Bar, MarkedBar, Turn};

use super::fault::{check_series, Phase, PhaseFault};

/// Mark pivots on every interior bar of `series`.
///
/// The first bar keeps whatever turn it carries in; the last bar is never
/// marked.
pub fn detect(series: &mut [MarkedBar]) -> Result<(), PhaseFault> {
    check_series(series, Phase::Pivot)?;

    let n = series.len();
    if n < 3 {
        return Ok(());
    }

    let bars: Vec<Bar> = series.iter().map(|m| m.bar).collect();
    let mut anchor: Option<usize> = series[0].turn.is_pivot().then_some(0);

    for i in 1..n - 1 {
        let (prev, cur, next) = (&bars[i - 1], &bars[i], &bars[i + 1]);
        let peak_side = is_peak_side(prev, cur, next);
        let trough_side = is_trough_side(prev, cur, next);
        if !peak_side && !trough_side {
            continue;
        }

        if is_swallowed(&bars, i) {
            continue;
        }

        if let Some(surviving) = invalidate_contained(series, i) {
            anchor = Some(surviving);
        }

        if peak_side && confirms_peak(&bars, i, anchor) {
            mark(series, &bars, i, Turn::Peak, &mut anchor);
        } else if trough_side && confirms_trough(&bars, i, anchor) {
            mark(series, &bars, i, Turn::Trough, &mut anchor);
        }
    }

    Ok(())
}

/// Higher than the predecessor (an equal high needs a low no lower than the
/// predecessor's) and not below the successor's high.
fn is_peak_side(prev: &Bar, cur: &Bar, next: &Bar) -> bool {
    (prev.high < cur.high || (prev.high == cur.high && prev.low >= cur.low))
        && cur.high >= next.high
}

fn is_trough_side(prev: &Bar, cur: &Bar, next: &Bar) -> bool {
    (cur.low < prev.low || (cur.low == prev.low && prev.high <= cur.high)) && cur.low <= next.low
}

/// A later bar contains the candidate and nothing in between breaks out of
/// that later bar's range.
fn is_swallowed(bars: &[Bar], i: usize) -> bool {
    let cur = &bars[i];
    let Some(offset) = bars[i + 1..].iter().position(|b| cur.is_inside(b)) else {
        return false;
    };
    let j = i + 1 + offset;
    let outer = &bars[j];
    !bars[i + 1..j]
        .iter()
        .any(|b| b.high > outer.high || b.low < outer.low)
}

/// Clear earlier pivots contained in bar `i`, newest first, stopping at the
/// first one that is not. Returns that surviving pivot's index.
fn invalidate_contained(series: &mut [MarkedBar], i: usize) -> Option<usize> {
    let cur = series[i].bar;
    for j in (0..i).rev() {
        if !series[j].turn.is_pivot() {
            continue;
        }
        if series[j].bar.is_inside(&cur) {
            series[j].turn = Turn::None;
        } else {
            return Some(j);
        }
    }
    None
}

fn confirms_peak(bars: &[Bar], i: usize, anchor: Option<usize>) -> bool {
    let cur = &bars[i];
    let start = anchor.unwrap_or(0);
    let dominated = bars[start..i]
        .iter()
        .any(|b| b.high > cur.high || (b.high == cur.high && b.low < cur.low));
    if dominated {
        return false;
    }

    for next in &bars[i + 1..] {
        if next.high > cur.high || (next.high == cur.high && next.low <= cur.low) {
            return false;
        }
        if next.high < cur.high && next.low < cur.low {
            return true;
        }
    }
    false
}

fn confirms_trough(bars: &[Bar], i: usize, anchor: Option<usize>) -> bool {
    let cur = &bars[i];
    let start = anchor.unwrap_or(0);
    let dominated = bars[start..i]
        .iter()
        .any(|b| b.low < cur.low || (b.low == cur.low && b.high > cur.high));
    if dominated {
        return false;
    }

    for next in &bars[i + 1..] {
        if next.low < cur.low || (next.low == cur.low && next.high >= cur.high) {
            return false;
        }
        if next.high > cur.high && next.low > cur.low {
            return true;
        }
    }
    false
}

/// Record a confirmed pivot at `i` and move the anchor onto it.
///
/// With no anchor yet, the opposite kind is planted at the earliest bar
/// reaching the candidate's extreme. An anchor of the same kind is
/// superseded, which keeps pivots alternating.
fn mark(
    series: &mut [MarkedBar],
    bars: &[Bar],
    i: usize,
    turn: Turn,
    anchor: &mut Option<usize>,
) {
    let cur = &bars[i];
    match *anchor {
        None => {
            let planted = match turn {
                Turn::Peak => bars[..i].iter().position(|b| b.low <= cur.low),
                Turn::Trough => bars[..i].iter().position(|b| b.high >= cur.high),
                Turn::None => None,
            };
            if let Some(y) = planted {
                series[y].turn = turn.opposite();
            }
        }
        Some(a) if series[a].turn == turn => series[a].turn = Turn::None,
        Some(_) => {}
    }
    series[i].turn = turn;
    *anchor = Some(i);
}
