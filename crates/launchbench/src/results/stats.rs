//! Summary statistics over metric samples.

/// Summary of one metric's samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleStats {
    /// Number of samples.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Sample standard deviation (n - 1), zero for fewer than two samples.
    pub std_dev: f64,
    /// Smallest sample.
    pub min: f64,
    /// Largest sample.
    pub max: f64,
}

/// Compute statistics for `samples`. All fields are zero when empty.
pub fn compute_stats(samples: &[f64]) -> SampleStats {
    if samples.is_empty() {
        return SampleStats {
            count: 0,
            mean: 0.0,
            std_dev: 0.0,
            min: 0.0,
            max: 0.0,
        };
    }

    let count = samples.len();
    let n = count as f64;
    let mean = samples.iter().sum::<f64>() / n;

    let std_dev = if count > 1 {
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0);
        variance.sqrt()
    } else {
        0.0
    };

    let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    SampleStats {
        count,
        mean,
        std_dev,
        min,
        max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        let stats = compute_stats(&[]);
        assert_eq!(stats.count, 0);
        assert!(stats.mean.abs() < f64::EPSILON);
    }

    #[test]
    fn test_single_sample() {
        let stats = compute_stats(&[4.0]);
        assert_eq!(stats.count, 1);
        assert!((stats.mean - 4.0).abs() < f64::EPSILON);
        assert!(stats.std_dev.abs() < f64::EPSILON);
        assert!((stats.min - 4.0).abs() < f64::EPSILON);
        assert!((stats.max - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_known_values() {
        let stats = compute_stats(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(stats.count, 8);
        assert!((stats.mean - 5.0).abs() < 1e-12);
        // Sample variance 32 / 7.
        assert!((stats.std_dev - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert!((stats.min - 2.0).abs() < f64::EPSILON);
        assert!((stats.max - 9.0).abs() < f64::EPSILON);
    }
}
