//! Circle classification.
//!
//! A circle is planted on a pivot when, by the end of the series, price has
//! already closed through the preceding opposite pivot's extreme: a peak gets
//! a rise circle once some close from the preceding trough onward falls below
//! that trough's low, a trough gets a drop circle once some close from the
//! preceding peak onward rises above that peak's high.

use crate::domain::{MarkedBar, Turn};

use super::fault::{check_series, Phase, PhaseFault};

pub fn classify(series: &mut [MarkedBar]) -> Result<(), PhaseFault> {
    check_series(series, Phase::Circle)?;

    // Circles only live on pivots; a carried-in flag on a bar whose turn was
    // invalidated goes with it.
    for marked in series.iter_mut().filter(|m| !m.turn.is_pivot()) {
        marked.rise_circle = false;
        marked.drop_circle = false;
    }

    let pivots: Vec<usize> = series
        .iter()
        .enumerate()
        .filter(|(_, m)| m.turn.is_pivot())
        .map(|(k, _)| k)
        .collect();

    for pair in pivots.windows(2) {
        let (prev, cur) = (pair[0], pair[1]);
        let anchor = series[prev].bar;
        let turn = series[cur].turn;
        let mut closes = series[prev..].iter().map(|m| m.bar.close);
        let crossed = match turn {
            Turn::Peak => closes.any(|c| c < anchor.low),
            Turn::Trough => closes.any(|c| c > anchor.high),
            Turn::None => false,
        };
        if crossed {
            match turn {
                Turn::Peak => series[cur].rise_circle = true,
                Turn::Trough => series[cur].drop_circle = true,
                Turn::None => {}
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use chrono::NaiveDate;

    fn marked(day: u32, high: f64, low: f64, close: f64, turn: Turn) -> MarkedBar {
        let mut m = MarkedBar::new(Bar {
            date: NaiveDate::from_ymd_opt(2019, 5, day).unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 10,
        });
        m.turn = turn;
        m
    }

    #[test]
    fn trough_gets_drop_circle_after_close_above_prior_peak() {
        let mut s = vec![
            marked(1, 12.0, 8.0, 11.0, Turn::Trough),
            marked(2, 20.0, 16.0, 18.0, Turn::Peak),
            marked(3, 15.0, 12.0, 13.0, Turn::Trough),
            marked(4, 22.0, 17.0, 21.0, Turn::None),
        ];
        classify(&mut s).unwrap();
        assert!(s[2].drop_circle);
        assert!(!s[2].rise_circle);
        assert!(!s[1].rise_circle);
    }

    #[test]
    fn peak_gets_rise_circle_after_close_below_prior_trough() {
        let mut s = vec![
            marked(1, 20.0, 16.0, 18.0, Turn::Peak),
            marked(2, 15.0, 10.0, 12.0, Turn::Trough),
            marked(3, 17.0, 13.0, 16.0, Turn::Peak),
            marked(4, 12.0, 8.0, 9.0, Turn::None),
        ];
        classify(&mut s).unwrap();
        assert!(s[2].rise_circle);
        // Close 9 never rises above the first peak's high of 20.
        assert!(!s[1].drop_circle);
    }

    #[test]
    fn carried_flag_survives_on_pivot_and_drops_elsewhere() {
        let mut s = vec![
            marked(1, 12.0, 8.0, 11.0, Turn::Trough),
            marked(2, 13.0, 9.0, 12.0, Turn::None),
        ];
        s[0].drop_circle = true;
        s[1].rise_circle = true;
        classify(&mut s).unwrap();
        assert!(s[0].drop_circle);
        assert!(!s[1].rise_circle);
    }

    #[test]
    fn first_pivot_never_gets_a_new_circle() {
        let mut s = vec![
            marked(1, 20.0, 16.0, 18.0, Turn::Peak),
            marked(2, 15.0, 10.0, 5.0, Turn::None),
        ];
        classify(&mut s).unwrap();
        assert!(!s[0].is_circle());
    }
}
