//! Circle validation: prune dominated circles in the fresh range, then merge
//! it over the archive.
//!
//! Archived rows carry circle flags settled by earlier runs and are never
//! re-pruned.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::archive::Archive;
use crate::domain::MarkedBar;

use super::fault::{check_series, Phase, PhaseFault};

/// Prune `fresh`, then merge it over the archived rows (fresh copy wins on a
/// shared date).
pub fn validate(
    mut fresh: Vec<MarkedBar>,
    archive: Option<&Archive>,
) -> Result<Vec<MarkedBar>, PhaseFault> {
    check_series(&fresh, Phase::Validate)?;
    prune(&mut fresh);
    let series = match archive {
        Some(archive) => merge(&archive.rows, fresh),
        None => fresh,
    };
    check_series(&series, Phase::Validate)?;
    Ok(series)
}

/// Date-keyed union of `archived` and `fresh`, fresh rows replacing archived
/// rows on the same date, sorted by date.
pub fn merge(archived: &[MarkedBar], fresh: Vec<MarkedBar>) -> Vec<MarkedBar> {
    let mut by_date: BTreeMap<NaiveDate, MarkedBar> =
        archived.iter().map(|m| (m.date(), *m)).collect();
    for m in fresh {
        by_date.insert(m.date(), m);
    }
    by_date.into_values().collect()
}

/// Keep only circles that strictly improve on every younger circle of the
/// same kind: a rise circle needs a higher high, a drop circle a lower low.
///
/// Scans newest to oldest, comparing against the nearest younger survivor.
pub fn prune(series: &mut [MarkedBar]) {
    let mut best_rise: Option<f64> = None;
    let mut best_drop: Option<f64> = None;

    for marked in series.iter_mut().rev() {
        if marked.rise_circle {
            match best_rise {
                Some(high) if marked.bar.high <= high => marked.rise_circle = false,
                _ => best_rise = Some(marked.bar.high),
            }
        }
        if marked.drop_circle {
            match best_drop {
                Some(low) if marked.bar.low >= low => marked.drop_circle = false,
                _ => best_drop = Some(marked.bar.low),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, Turn};

    fn marked(day: u32, high: f64, low: f64) -> MarkedBar {
        MarkedBar::new(Bar {
            date: NaiveDate::from_ymd_opt(2019, 7, day).unwrap(),
            open: low,
            high,
            low,
            close: low,
            volume: 5,
        })
    }

    fn rise(day: u32, high: f64) -> MarkedBar {
        let mut m = marked(day, high, high - 2.0);
        m.turn = Turn::Peak;
        m.rise_circle = true;
        m
    }

    fn drop(day: u32, low: f64) -> MarkedBar {
        let mut m = marked(day, low + 2.0, low);
        m.turn = Turn::Trough;
        m.drop_circle = true;
        m
    }

    #[test]
    fn older_rise_circle_survives_only_if_higher() {
        let mut s = vec![rise(1, 30.0), rise(2, 25.0), rise(3, 28.0)];
        prune(&mut s);
        let kept: Vec<bool> = s.iter().map(|m| m.rise_circle).collect();
        // 25 is not above 28; 30 is above the nearest survivor 28.
        assert_eq!(kept, vec![true, false, true]);
    }

    #[test]
    fn equal_extreme_does_not_survive() {
        let mut s = vec![drop(1, 10.0), drop(2, 10.0)];
        prune(&mut s);
        assert!(!s[0].drop_circle);
        assert!(s[1].drop_circle);
    }

    #[test]
    fn kinds_are_pruned_independently() {
        let mut s = vec![drop(1, 5.0), rise(2, 40.0), drop(3, 9.0), rise(4, 50.0)];
        prune(&mut s);
        assert!(s[0].drop_circle);
        assert!(!s[1].rise_circle);
        assert!(s[2].drop_circle);
        assert!(s[3].rise_circle);
    }

    #[test]
    fn merge_prefers_fresh_copy_and_sorts() {
        let archived = vec![marked(1, 10.0, 9.0), marked(2, 11.0, 9.0)];
        let mut replacement = marked(2, 12.0, 9.5);
        replacement.turn = Turn::Peak;
        let fresh = vec![replacement, marked(3, 13.0, 10.0)];

        let merged = merge(&archived, fresh);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[1].bar.high, 12.0);
        assert_eq!(merged[1].turn, Turn::Peak);
        assert!(merged.windows(2).all(|w| w[0].date() < w[1].date()));
    }

    #[test]
    fn validate_without_archive_only_prunes() {
        let s = vec![rise(1, 20.0), rise(2, 21.0)];
        let out = validate(s, None).unwrap();
        assert!(!out[0].rise_circle);
        assert!(out[1].rise_circle);
    }

    #[test]
    fn archived_circles_are_not_pruned_against_fresh_ones() {
        let archived = rise(1, 20.0);
        let archive = Archive {
            rows: vec![archived, marked(2, 18.0, 15.0)],
            boundary: marked(2, 18.0, 15.0),
        };
        let fresh = vec![marked(2, 18.0, 15.0), rise(3, 25.0), rise(4, 22.0)];

        let out = validate(fresh, Some(&archive)).unwrap();
        assert_eq!(out.len(), 4);
        // The archived circle keeps its settled flag even though the fresh
        // circle on day 3 is higher.
        assert!(out[0].rise_circle);
        assert!(out[2].rise_circle);
        assert!(out[3].rise_circle);
    }

    #[test]
    fn fresh_circles_are_pruned_before_the_merge() {
        let archive = Archive {
            rows: vec![marked(1, 12.0, 10.0)],
            boundary: marked(1, 12.0, 10.0),
        };
        let fresh = vec![marked(1, 12.0, 10.0), drop(2, 9.0), drop(3, 8.0)];

        let out = validate(fresh, Some(&archive)).unwrap();
        assert!(!out[1].drop_circle);
        assert!(out[2].drop_circle);
    }

    #[test]
    fn corrupt_archive_row_faults_in_validate() {
        let mut bad = marked(1, 10.0, 9.0);
        bad.bar.low = f64::NAN;
        let archive = Archive {
            rows: vec![bad],
            boundary: bad,
        };
        let fault = validate(vec![marked(2, 11.0, 9.0)], Some(&archive)).unwrap_err();
        assert_eq!(fault.phase, Phase::Validate);
    }
}
