//! Row-grouped sparse matrices.
//!
//! Transitions of a nondeterministic model are stored as a matrix
//! whose rows are the model's *choices*,
//! grouped so that each row group collects the choices available in one state.
//! Deterministic models simply have one row per group.

use std::ops::Range;
use thiserror::Error;

/// An error in building a [`SparseMatrix`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum MatrixError {
    /// A row was opened before any row group.
    #[error("no row group has been opened")]
    NoGroup,
    /// An entry was added before any row.
    #[error("no row has been opened")]
    NoRow,
    /// A row group was closed without rows.
    #[error("row group {0} has no rows")]
    EmptyGroup(usize),
    /// An entry value is not a finite number.
    #[error("entry ({row}, {column}) has non-finite value {value}")]
    NotFinite {
        /// Row of the entry.
        row: usize,
        /// Column of the entry.
        column: usize,
        /// Offending value.
        value: f64,
    },
}

/// A non-zero entry of a [`SparseMatrix`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entry {
    /// The column of the entry.
    pub column: usize,
    /// The value of the entry.
    pub value: f64,
}

/// A sparse matrix in compressed row format, with rows partitioned in consecutive groups.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    // rows + 1 offsets into `entries`
    row_indices: Vec<usize>,
    // groups + 1 offsets into rows
    group_indices: Vec<usize>,
    entries: Vec<Entry>,
    columns: usize,
}

impl SparseMatrix {
    /// Number of row groups.
    #[inline]
    pub fn groups(&self) -> usize {
        self.group_indices.len() - 1
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.row_indices.len() - 1
    }

    /// Number of columns, i.e., one more than the largest column index of any entry.
    #[inline]
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Number of non-zero entries.
    #[inline]
    pub fn entries(&self) -> usize {
        self.entries.len()
    }

    /// The entries of the given row, sorted by column.
    #[inline]
    pub fn row(&self, row: usize) -> &[Entry] {
        &self.entries[self.row_indices[row]..self.row_indices[row + 1]]
    }

    /// The (global) indices of the rows in the given group.
    #[inline]
    pub fn group(&self, group: usize) -> Range<usize> {
        self.group_indices[group]..self.group_indices[group + 1]
    }

    /// The number of rows in the given group.
    #[inline]
    pub fn group_size(&self, group: usize) -> usize {
        self.group_indices[group + 1] - self.group_indices[group]
    }

    /// The row group containing the given row.
    pub fn group_of(&self, row: usize) -> usize {
        // group_indices is sorted, so the group is the last one starting at or before `row`.
        self.group_indices.partition_point(|&start| start <= row) - 1
    }

    /// Multiplies the given row with a vector.
    #[inline]
    pub fn multiply_row(&self, row: usize, vector: &[f64]) -> f64 {
        self.row(row)
            .iter()
            .map(|entry| entry.value * vector[entry.column])
            .sum()
    }

    /// Sum of the values in the given row.
    #[inline]
    pub fn row_sum(&self, row: usize) -> f64 {
        self.row(row).iter().map(|entry| entry.value).sum()
    }
}

/// Builds a [`SparseMatrix`] row by row.
///
/// ```
/// # use spmc_core::SparseMatrixBuilder;
/// let mut builder = SparseMatrixBuilder::new();
/// builder.new_group();
/// builder.new_row().unwrap();
/// builder.add_entry(1, 0.5).unwrap();
/// builder.add_entry(0, 0.5).unwrap();
/// builder.new_group();
/// builder.new_row().unwrap();
/// builder.add_entry(1, 1.0).unwrap();
/// let matrix = builder.build().unwrap();
/// assert_eq!(matrix.groups(), 2);
/// assert_eq!(matrix.row(0)[0].column, 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SparseMatrixBuilder {
    row_indices: Vec<usize>,
    group_indices: Vec<usize>,
    entries: Vec<Entry>,
    columns: usize,
}

impl SparseMatrixBuilder {
    /// Creates a new, empty [`SparseMatrixBuilder`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the last opened row group, if any.
    pub fn current_group(&self) -> Option<usize> {
        self.group_indices.len().checked_sub(1)
    }

    /// Index of the last opened row, if any.
    pub fn current_row(&self) -> Option<usize> {
        self.row_indices.len().checked_sub(1)
    }

    /// Opens a new row group and returns its index.
    ///
    /// Rows subsequently opened with [`Self::new_row`] belong to this group.
    pub fn new_group(&mut self) -> usize {
        self.group_indices.push(self.row_indices.len());
        self.group_indices.len() - 1
    }

    /// Opens a new row in the current group and returns its (global) index.
    pub fn new_row(&mut self) -> Result<usize, MatrixError> {
        if self.group_indices.is_empty() {
            return Err(MatrixError::NoGroup);
        }
        self.close_row();
        self.row_indices.push(self.entries.len());
        Ok(self.row_indices.len() - 1)
    }

    /// Adds an entry to the current row.
    ///
    /// Entries need not be added in column order,
    /// and entries on the same column are summed together.
    pub fn add_entry(&mut self, column: usize, value: f64) -> Result<(), MatrixError> {
        let row = self.current_row().ok_or(MatrixError::NoRow)?;
        if !value.is_finite() {
            return Err(MatrixError::NotFinite { row, column, value });
        }
        self.columns = self.columns.max(column + 1);
        self.entries.push(Entry { column, value });
        Ok(())
    }

    // Sort the entries of the last row and merge duplicate columns.
    fn close_row(&mut self) {
        if let Some(&start) = self.row_indices.last() {
            let row = &mut self.entries[start..];
            row.sort_by_key(|entry| entry.column);
            let mut write = start;
            for read in start..self.entries.len() {
                if write > start && self.entries[write - 1].column == self.entries[read].column {
                    self.entries[write - 1].value += self.entries[read].value;
                } else {
                    self.entries[write] = self.entries[read];
                    write += 1;
                }
            }
            self.entries.truncate(write);
        }
    }

    /// Builds the [`SparseMatrix`].
    ///
    /// Fails if any row group has no rows.
    pub fn build(mut self) -> Result<SparseMatrix, MatrixError> {
        self.close_row();
        self.row_indices.push(self.entries.len());
        self.group_indices.push(self.row_indices.len() - 1);
        if let Some(group) = self
            .group_indices
            .windows(2)
            .position(|window| window[0] == window[1])
        {
            return Err(MatrixError::EmptyGroup(group));
        }
        Ok(SparseMatrix {
            row_indices: self.row_indices,
            group_indices: self.group_indices,
            entries: self.entries,
            columns: self.columns,
        })
    }
}
