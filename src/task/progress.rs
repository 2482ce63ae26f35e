use std::iter::Sum;
use std::ops::Add;

/// Progress report: `loaded` units out of `total`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Progress {
    /// Units done.
    pub loaded: u64,
    /// Units expected; `0` when unknown.
    pub total: u64,
}

impl Progress {
    /// Creates a progress report.
    pub fn new(loaded: u64, total: u64) -> Self {
        Self { loaded, total }
    }

    /// Fraction done in `0.0..=1.0`, or `None` when `total` is unknown.
    pub fn ratio(&self) -> Option<f64> {
        (self.total > 0).then(|| (self.loaded as f64 / self.total as f64).min(1.0))
    }
}

impl Add for Progress {
    type Output = Progress;

    fn add(self, rhs: Progress) -> Progress {
        Progress {
            loaded: self.loaded + rhs.loaded,
            total: self.total + rhs.total,
        }
    }
}

impl Sum for Progress {
    fn sum<I: Iterator<Item = Progress>>(iter: I) -> Progress {
        iter.fold(Progress::default(), Add::add)
    }
}

/// How a composite task aggregates the progress of its children.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProgressMode {
    /// `{children settled, children}` after each child completes.
    #[default]
    Count,
    /// Sum of every child's latest `{loaded, total}`.
    Sum,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_and_sum() {
        assert_eq!(Progress::new(1, 4).ratio(), Some(0.25));
        assert_eq!(Progress::new(3, 0).ratio(), None);
        assert_eq!(Progress::new(9, 4).ratio(), Some(1.0));

        let total: Progress = [Progress::new(1, 2), Progress::new(3, 4)].into_iter().sum();
        assert_eq!(total, Progress::new(4, 6));
    }
}
