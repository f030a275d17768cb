//! Information Value (IV) and Weight of Evidence (WoE) of a bin table
//!
//! Period rows are summed per bin first. Event and non-event proportions are
//! clipped to `1e-9` inside the logarithm only.

use super::bin_table::BinTable;

/// Lower clip for event / non-event proportions
pub const IV_EPSILON: f64 = 1e-9;

/// Per-bin `(p_event, p_non_event)`, or `None` when either class is absent
fn distributions(table: &BinTable) -> Option<Vec<(usize, f64, f64)>> {
    let bins = table.aggregate();
    let total_events: u64 = bins.iter().map(|b| b.event).sum();
    let total_non_events: u64 = bins.iter().map(|b| b.non_event).sum();

    if total_events == 0 || total_non_events == 0 {
        return None;
    }

    Some(
        bins.iter()
            .map(|b| {
                let pe = b.event as f64 / total_events as f64;
                let pn = b.non_event as f64 / total_non_events as f64;
                (b.code, pe, pn)
            })
            .collect(),
    )
}

fn log_ratio(pe: f64, pn: f64) -> f64 {
    (pe.max(IV_EPSILON) / pn.max(IV_EPSILON)).ln()
}

/// `sum((p_e - p_n) * ln(p_e / p_n))`; 0 when the table has no events or
/// no non-events
pub fn information_value(table: &BinTable) -> f64 {
    match distributions(table) {
        Some(dist) => dist
            .iter()
            .map(|(_, pe, pn)| (pe - pn) * log_ratio(*pe, *pn))
            .sum(),
        None => 0.0,
    }
}

/// WoE per bin code using the ln(%event / %non-event) convention:
/// positive WoE means higher risk. All zeros when a class is absent.
pub fn bin_woe(table: &BinTable) -> Vec<(usize, f64)> {
    match distributions(table) {
        Some(dist) => dist
            .iter()
            .map(|(code, pe, pn)| (*code, log_ratio(*pe, *pn)))
            .collect(),
        None => table.aggregate().iter().map(|b| (b.code, 0.0)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::bin_table::{BinRow, Period};

    #[test]
    fn test_single_bin_iv_is_zero() {
        let table = BinTable::new(vec![BinRow::new("x", "all", 0, 20, 80, None)]);
        assert_eq!(information_value(&table), 0.0);
    }

    #[test]
    fn test_no_events_iv_is_zero() {
        let table = BinTable::new(vec![
            BinRow::new("x", "a", 0, 0, 50, None),
            BinRow::new("x", "b", 1, 0, 50, None),
        ]);
        assert_eq!(information_value(&table), 0.0);
        assert_eq!(bin_woe(&table), vec![(0, 0.0), (1, 0.0)]);
    }

    #[test]
    fn test_iv_known_value() {
        let table = BinTable::new(vec![
            BinRow::new("x", "a", 0, 10, 40, None),
            BinRow::new("x", "b", 1, 40, 10, None),
        ]);
        // p_e = (0.2, 0.8), p_n = (0.8, 0.2)
        let expected = 2.0 * 0.6 * 4.0f64.ln();
        assert!((information_value(&table) - expected).abs() < 1e-12);

        let woe = bin_woe(&table);
        assert!((woe[0].1 + 4.0f64.ln()).abs() < 1e-12);
        assert!((woe[1].1 - 4.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_empty_class_clipped_only_in_log() {
        let table = BinTable::new(vec![
            BinRow::new("x", "a", 0, 0, 50, None),
            BinRow::new("x", "b", 1, 50, 50, None),
        ]);
        // p_e = (0, 1), p_n = (0.5, 0.5)
        let expected = -0.5 * (IV_EPSILON / 0.5).ln() + 0.5 * 2.0f64.ln();
        assert!((information_value(&table) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_separation_is_finite() {
        let table = BinTable::new(vec![
            BinRow::new("x", "a", 0, 0, 50, None),
            BinRow::new("x", "b", 1, 50, 0, None),
        ]);
        let iv = information_value(&table);
        assert!(iv.is_finite());
        assert!(iv > 40.0);
    }

    #[test]
    fn test_periods_are_aggregated() {
        let flat = BinTable::new(vec![
            BinRow::new("x", "a", 0, 10, 40, None),
            BinRow::new("x", "b", 1, 40, 10, None),
        ]);
        let split = BinTable::new(vec![
            BinRow::new("x", "a", 0, 4, 20, Some(Period::Int(1))),
            BinRow::new("x", "b", 1, 20, 5, Some(Period::Int(1))),
            BinRow::new("x", "a", 0, 6, 20, Some(Period::Int(2))),
            BinRow::new("x", "b", 1, 20, 5, Some(Period::Int(2))),
        ]);
        assert!((information_value(&flat) - information_value(&split)).abs() < 1e-12);
    }
}
