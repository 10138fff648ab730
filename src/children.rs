//! Direct-descendant counts per code and year.
//!
//! Counts reflect the leaf coverage observed in each year, not a static
//! classification, so the same code can have different counts in
//! different years.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::hierarchy::LeafTable;
use crate::taxonomy::{AGGREGATED_LEVELS, LEAF_LEVEL};

/// `(year, level, code) -> n_children` for every level
#[derive(Debug, Clone, Default)]
pub struct ChildCounts {
    levels: [FxHashMap<(i64, String), i64>; 4],
}

impl ChildCounts {
    /// Children of `code` at `level` in `year`, if the code was observed
    #[must_use]
    pub fn get(&self, level: u8, year: i64, code: &str) -> Option<i64> {
        self.levels
            .get(usize::from(level).wrapping_sub(1))?
            .get(&(year, code.to_string()))
            .copied()
    }

    /// Number of `(year, code)` entries at a level
    #[must_use]
    pub fn len(&self, level: u8) -> usize {
        self.levels
            .get(usize::from(level).wrapping_sub(1))
            .map_or(0, FxHashMap::len)
    }
}

/// Count distinct next-level codes under each `(year, code)`.
///
/// Leaf codes always count 1. Rows without a year are not counted.
#[must_use]
pub fn compute_child_counts(table: &LeafTable) -> ChildCounts {
    let mut counts = ChildCounts::default();

    for level in AGGREGATED_LEVELS {
        let mut children: FxHashMap<(i64, &str), FxHashSet<&str>> = FxHashMap::default();
        for row in 0..table.num_rows() {
            let Some(year) = table.year_at(row) else {
                continue;
            };
            children
                .entry((year, table.code_at(level, row)))
                .or_default()
                .insert(table.code_at(level + 1, row));
        }

        let idx = usize::from(level - 1);
        counts.levels[idx] = children
            .into_iter()
            .map(|((year, code), set)| ((year, code.to_string()), set.len() as i64))
            .collect();
    }

    let leaf_idx = usize::from(LEAF_LEVEL - 1);
    for row in 0..table.num_rows() {
        if let Some(year) = table.year_at(row) {
            counts.levels[leaf_idx].insert((year, table.code_at(LEAF_LEVEL, row).to_string()), 1);
        }
    }

    counts
}
