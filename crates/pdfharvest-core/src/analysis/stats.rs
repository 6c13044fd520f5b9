//! Descriptive statistics over numeric samples.

/// Tolerance used when comparing deviations against the threshold.
const EPSILON: f64 = 1e-9;

/// Summary of a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    /// Population standard deviation; `None` below two samples.
    pub stddev: Option<f64>,
    pub min: f64,
    pub max: f64,
}

/// Summarize a sample. Returns `None` for an empty sample.
pub fn summarize(values: &[f64]) -> Option<Summary> {
    if values.is_empty() {
        return None;
    }

    let count = values.len();
    let sum: f64 = values.iter().sum();
    let mean = sum / count as f64;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let stddev = if count >= 2 {
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
        Some(variance.sqrt())
    } else {
        None
    };

    Some(Summary {
        count,
        sum,
        mean,
        stddev,
        min,
        max,
    })
}

impl Summary {
    /// Signed deviation of `value` from the mean in standard deviations.
    /// `None` when the spread is undefined or zero.
    pub fn z_score(&self, value: f64) -> Option<f64> {
        match self.stddev {
            Some(sd) if sd > 0.0 => Some((value - self.mean) / sd),
            _ => None,
        }
    }

    /// Whether `value` lies at least `threshold` standard deviations away
    /// from the mean.
    pub fn is_outlier(&self, value: f64, threshold: f64) -> bool {
        self.z_score(value)
            .is_some_and(|z| z.abs() + EPSILON >= threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize() {
        let s = summarize(&[10.0, 10.0, 10.0, 10.0, 100.0]).unwrap();
        assert_eq!(s.count, 5);
        assert_eq!(s.sum, 140.0);
        assert_eq!(s.mean, 28.0);
        assert_eq!(s.stddev, Some(36.0));
        assert_eq!(s.min, 10.0);
        assert_eq!(s.max, 100.0);
    }

    #[test]
    fn test_outlier_at_two_sigma() {
        let s = summarize(&[10.0, 10.0, 10.0, 10.0, 100.0]).unwrap();
        assert!(s.is_outlier(100.0, 2.0));
        assert!(!s.is_outlier(10.0, 2.0));
    }

    #[test]
    fn test_single_sample_has_no_spread() {
        let s = summarize(&[1_000_000.0]).unwrap();
        assert_eq!(s.stddev, None);
        assert!(!s.is_outlier(1_000_000.0, 0.0));
    }

    #[test]
    fn test_constant_sample_never_flags() {
        let s = summarize(&[5.0, 5.0, 5.0]).unwrap();
        assert_eq!(s.stddev, Some(0.0));
        assert_eq!(s.z_score(5.0), None);
    }

    #[test]
    fn test_empty_sample() {
        assert!(summarize(&[]).is_none());
    }
}
