use std::cmp::Ordering;
use std::time::Instant;

use rayon::prelude::*;
use tracing::trace;

use crate::csv::Row;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortState {
    pub column: usize,
    pub direction: SortDirection,
}

impl SortState {
    pub fn ascending(column: usize) -> Self {
        SortState {
            column,
            direction: SortDirection::Ascending,
        }
    }

    /// Selecting the column that is currently sorted ascending flips it to
    /// descending, anything else starts ascending.
    pub fn toggle(current: Option<SortState>, column: usize) -> Self {
        match current {
            Some(SortState {
                column: c,
                direction: SortDirection::Ascending,
            }) if c == column => SortState {
                column,
                direction: SortDirection::Descending,
            },
            _ => SortState::ascending(column),
        }
    }
}

// Return data indices of rows where any cell contains the term, ignoring case
pub fn filter_rows(rows: &[Row], query: &str) -> Vec<usize> {
    if query.is_empty() {
        return (0..rows.len()).collect();
    }
    let term = query.to_lowercase();
    rows.par_iter()
        .enumerate()
        .filter(|(_, row)| {
            row.iter()
                .any(|v| v.to_string().to_lowercase().contains(&term))
        })
        .map(|(idx, _)| idx)
        .collect()
}

// Stable sort of data indices; ties keep their incoming order.
pub fn sort_rows(rows: &[Row], indices: &mut [usize], sort: SortState) {
    let key = |idx: usize| rows.get(idx).and_then(|r| r.get(sort.column));
    indices.sort_by(|&a, &b| {
        let ord = match (key(a), key(b)) {
            (Some(va), Some(vb)) => va.compare(vb),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        match sort.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
}

/// Holds the filter result and the sort state separately, so either one can
/// change without redoing the other.
#[derive(Debug, Default)]
pub struct QueryEngine {
    query: String,
    sort: Option<SortState>,
    filtered: Vec<usize>,
    view: Vec<usize>,
}

impl QueryEngine {
    pub fn reset(&mut self, rows: &[Row], ncols: usize) {
        self.query.clear();
        self.sort = if ncols > 0 {
            Some(SortState::ascending(0))
        } else {
            None
        };
        self.filtered = (0..rows.len()).collect();
        self.apply_sort(rows);
    }

    pub fn set_query(&mut self, rows: &[Row], query: &str) {
        let start_time = Instant::now();
        self.query = query.to_string();
        self.filtered = filter_rows(rows, &self.query);
        trace!(
            "Filter \"{}\" kept {}/{} rows in {}ms",
            self.query,
            self.filtered.len(),
            rows.len(),
            start_time.elapsed().as_millis()
        );
        self.apply_sort(rows);
    }

    pub fn set_sort(&mut self, rows: &[Row], sort: SortState) {
        self.sort = Some(sort);
        self.apply_sort(rows);
    }

    pub fn toggle_sort(&mut self, rows: &[Row], column: usize) -> SortState {
        let sort = SortState::toggle(self.sort, column);
        self.set_sort(rows, sort);
        sort
    }

    fn apply_sort(&mut self, rows: &[Row]) {
        let start_time = Instant::now();
        self.view = self.filtered.clone();
        if let Some(sort) = self.sort {
            sort_rows(rows, &mut self.view, sort);
        }
        trace!(
            "Sorted {} rows by {:?} in {}ms",
            self.view.len(),
            self.sort,
            start_time.elapsed().as_millis()
        );
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn sort(&self) -> Option<SortState> {
        self.sort
    }

    pub fn view(&self) -> &[usize] {
        &self.view
    }
}
