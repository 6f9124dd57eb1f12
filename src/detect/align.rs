//! Series alignment: trim the in-progress interval and split counters.

use crate::source::ApiSeriesPoint;

use super::Category;

/// Per-category sequences of one entity, all of equal length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignedSeries {
    pub success: Vec<i64>,
    pub pending: Vec<i64>,
    pub failed: Vec<i64>,
}

impl AlignedSeries {
    /// Drop the last point (the interval still accumulating) and project the
    /// remaining points onto the three counters, preserving order. Missing
    /// counters read as zero.
    pub fn from_points(points: &[ApiSeriesPoint]) -> Self {
        let complete = match points.split_last() {
            Some((_, rest)) => rest,
            None => return Self::default(),
        };

        let mut aligned = Self {
            success: Vec::with_capacity(complete.len()),
            pending: Vec::with_capacity(complete.len()),
            failed: Vec::with_capacity(complete.len()),
        };
        for p in complete {
            aligned.success.push(p.success.unwrap_or(0));
            aligned.pending.push(p.pending.unwrap_or(0));
            aligned.failed.push(p.failed.unwrap_or(0));
        }
        aligned
    }

    pub fn len(&self) -> usize {
        self.success.len()
    }

    pub fn is_empty(&self) -> bool {
        self.success.is_empty()
    }

    pub fn sequence(&self, category: Category) -> &[i64] {
        match category {
            Category::Success => &self.success,
            Category::Pending => &self.pending,
            Category::Failed => &self.failed,
        }
    }

    /// Latest complete value for `category`, if any.
    pub fn latest(&self, category: Category) -> Option<i64> {
        self.sequence(category).last().copied()
    }
}
