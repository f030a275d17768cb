//! Categorical split finder
//!
//! Categories below the rare threshold are collapsed into one cell, the
//! remaining cells are sorted by event rate and grouped by the MIP solver.
//! When the solver fails or returns fewer than two groups every category
//! keeps its own ordinal code instead.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use super::{tabulate, BinMapping, Encoding, Partition, SplitFinder, SplitParams};
use crate::error::{BinningError, Result};
use crate::pipeline::features::FeatureValues;
use crate::pipeline::solver::{solve_optimal_grouping, CellStats, SolverConfig};

/// Default share below which a category is collapsed
pub const DEFAULT_RARE_THRESHOLD: f64 = 0.01;

/// Label of the cell holding all rare categories
pub const RARE_LABEL: &str = "_RARE_";

/// A category cell: one frequent category, or the collapsed rare categories.
/// A real category spelled like `RARE_LABEL` stays its own cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Cell {
    Category(String),
    Rare,
}

impl Cell {
    fn label(&self) -> &str {
        match self {
            Cell::Category(name) => name,
            Cell::Rare => RARE_LABEL,
        }
    }
}

/// One category cell after rare collapsing
#[derive(Debug, Clone)]
struct CategoryStats {
    cell: Cell,
    stats: CellStats,
}

#[derive(Debug, Clone)]
pub struct CategoricalSplitter {
    rare_threshold: f64,
}

impl CategoricalSplitter {
    /// `rare_threshold` is expected in `[0, 1)`; `BinnerConfig` validates it
    pub fn new(rare_threshold: f64) -> Self {
        Self { rare_threshold }
    }

    /// Map every observed category to its cell
    fn collapse_rare(&self, values: &[Option<String>]) -> BTreeMap<String, Cell> {
        let mut freq: HashMap<&str, usize> = HashMap::new();
        for value in values.iter().flatten() {
            *freq.entry(value.as_str()).or_insert(0) += 1;
        }
        let total: usize = freq.values().sum();

        freq.into_iter()
            .map(|(category, count)| {
                let share = count as f64 / total as f64;
                let cell = if share < self.rare_threshold {
                    Cell::Rare
                } else {
                    Cell::Category(category.to_string())
                };
                (category.to_string(), cell)
            })
            .collect()
    }
}

impl SplitFinder for CategoricalSplitter {
    fn fit(
        &self,
        variable: &str,
        values: &FeatureValues,
        target: &[u8],
        params: &SplitParams,
    ) -> Result<Partition> {
        let FeatureValues::Categorical(raw) = values else {
            return Err(BinningError::config(format!(
                "Categorical split finder needs text values for '{}'",
                variable
            )));
        };
        let cell_of = self.collapse_rare(raw);

        // Cells sorted by event rate (ties by name)
        let mut cells: BTreeMap<&Cell, CellStats> = BTreeMap::new();
        for (value, t) in raw.iter().zip(target) {
            let Some(cell) = value.as_ref().and_then(|v| cell_of.get(v)) else {
                continue;
            };
            let stats = cells.entry(cell).or_insert(CellStats::new(0.0, 0.0));
            if *t == 1 {
                stats.events += 1.0;
            } else {
                stats.non_events += 1.0;
            }
        }
        let mut sorted: Vec<CategoryStats> = cells
            .into_iter()
            .map(|(cell, stats)| CategoryStats {
                cell: cell.clone(),
                stats,
            })
            .collect();
        sorted.sort_by(|a, b| a.stats.event_rate().total_cmp(&b.stats.event_rate()));

        let n_present = raw.iter().flatten().count();
        let config = SolverConfig {
            max_bins: params.max_bins,
            min_bin_samples: params.min_bin_samples(n_present),
            trend: None,
        };
        let cell_stats: Vec<CellStats> = sorted.iter().map(|c| c.stats).collect();

        let grouping = match solve_optimal_grouping(&cell_stats, &config) {
            Ok(result) if result.bin_boundaries.len() >= 2 => Some(result.bin_boundaries),
            Ok(result) => {
                debug!(
                    feature = variable,
                    bins = result.bin_boundaries.len(),
                    "categorical grouping below 2 bins, using ordinal codes"
                );
                None
            }
            Err(e) => {
                let message = format!("{e:#}");
                warn!(
                    feature = variable,
                    error = %message,
                    "categorical solver failed, using ordinal codes"
                );
                None
            }
        };

        let (labels, cell_code, encoding): (Vec<String>, HashMap<Cell, usize>, Encoding) =
            match grouping {
                Some(boundaries) => {
                    let mut labels = Vec::with_capacity(boundaries.len());
                    let mut cell_code = HashMap::new();
                    for (code, (start, end)) in boundaries.iter().enumerate() {
                        let members = &sorted[*start..=*end];
                        for member in members {
                            cell_code.insert(member.cell.clone(), code);
                        }
                        let names: Vec<&str> = members.iter().map(|c| c.cell.label()).collect();
                        labels.push(names.join(" | "));
                    }
                    (labels, cell_code, Encoding::Woe)
                }
                None => {
                    let mut cells: Vec<Cell> = sorted.iter().map(|c| c.cell.clone()).collect();
                    cells.sort();
                    let labels = cells.iter().map(|c| c.label().to_string()).collect();
                    let cell_code = cells
                        .into_iter()
                        .enumerate()
                        .map(|(code, cell)| (cell, code))
                        .collect();
                    (labels, cell_code, Encoding::Ordinal)
                }
            };

        let categories: BTreeMap<String, usize> = cell_of
            .iter()
            .filter_map(|(category, cell)| cell_code.get(cell).map(|c| (category.clone(), *c)))
            .collect();
        let mapping = BinMapping::Categorical {
            categories,
            encoding,
        };
        let codes = mapping.assign(values);
        let table = tabulate(variable, &labels, &codes, target, None);

        Ok(Partition { table, mapping })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(max_bins: usize) -> SplitParams {
        SplitParams {
            max_bins,
            min_bin_size: 0.05,
            trend: None,
        }
    }

    fn sample() -> (FeatureValues, Vec<u8>) {
        let mut values = Vec::new();
        let mut target = Vec::new();
        for (category, n, events) in [
            ("A", 300, 15),
            ("B", 300, 30),
            ("C", 300, 150),
            ("D", 300, 240),
            ("Z", 2, 1),
        ] {
            for i in 0..n {
                values.push(Some(category.to_string()));
                target.push(u8::from(i < events));
            }
        }
        values.push(None);
        target.push(0);
        (FeatureValues::Categorical(values), target)
    }

    #[test]
    fn test_rare_categories_collapse() {
        let (values, _) = sample();
        let FeatureValues::Categorical(raw) = values else {
            unreachable!()
        };
        let cell_of = CategoricalSplitter::new(0.01).collapse_rare(&raw);
        assert_eq!(cell_of["Z"], Cell::Rare);
        assert_eq!(cell_of["A"], Cell::Category("A".to_string()));
    }

    #[test]
    fn test_grouping_uses_woe_encoding() {
        let (values, target) = sample();
        let partition = CategoricalSplitter::new(DEFAULT_RARE_THRESHOLD)
            .fit("cat", &values, &target, &params(3))
            .unwrap();

        assert_eq!(partition.mapping.encoding(), Some(Encoding::Woe));
        let n_bins = partition.table.n_bins();
        assert!(n_bins >= 2 && n_bins <= 3);
        // missing value excluded
        assert_eq!(partition.table.total_count(), 1202);

        let codes = partition.mapping.assign(&FeatureValues::Categorical(vec![
            Some("Z".to_string()),
            Some("unseen".to_string()),
        ]));
        assert!(codes[0].is_some());
        assert_eq!(codes[1], None);
    }

    #[test]
    fn test_single_category_falls_back_to_ordinal() {
        let values = FeatureValues::Categorical(vec![Some("only".to_string()); 50]);
        let target: Vec<u8> = (0..50).map(|i| u8::from(i % 5 == 0)).collect();
        let partition = CategoricalSplitter::new(DEFAULT_RARE_THRESHOLD)
            .fit("cat", &values, &target, &params(4))
            .unwrap();
        assert_eq!(partition.mapping.encoding(), Some(Encoding::Ordinal));
        assert_eq!(partition.table.n_bins(), 1);
    }

    #[test]
    fn test_category_named_like_rare_cell_stays_separate() {
        let mut raw = Vec::new();
        let mut target = Vec::new();
        for (category, n, events) in [
            ("A", 400, 20),
            (RARE_LABEL, 400, 360),
            ("tiny", 3, 0),
        ] {
            for i in 0..n {
                raw.push(Some(category.to_string()));
                target.push(u8::from(i < events));
            }
        }
        let cell_of = CategoricalSplitter::new(0.01).collapse_rare(&raw);
        assert_eq!(cell_of["tiny"], Cell::Rare);
        assert_eq!(cell_of[RARE_LABEL], Cell::Category(RARE_LABEL.to_string()));

        let values = FeatureValues::Categorical(raw);
        let partition = CategoricalSplitter::new(0.01)
            .fit("cat", &values, &target, &params(3))
            .unwrap();
        let codes = partition.mapping.assign(&FeatureValues::Categorical(vec![
            Some(RARE_LABEL.to_string()),
            Some("A".to_string()),
        ]));
        // the literal category keeps its high event rate apart from "A"
        assert_ne!(codes[0], codes[1]);
        assert_eq!(partition.table.total_count(), 803);
    }
}
