//! Small descriptive-statistics helpers shared by the estimators.

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample (n - 1) standard deviation. Zero for fewer than two values.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Population standard deviation. Zero for an empty slice.
pub fn population_std_dev(values: &[f64]) -> f64 {
    let Some(m) = mean(values) else {
        return 0.0;
    };
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (value * f).round() / f
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_vs_population() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((population_std_dev(&v) - 2.0).abs() < 1e-12);
        assert!((sample_std_dev(&v) - 2.138089935299395).abs() < 1e-12);
        assert_eq!(sample_std_dev(&[3.0]), 0.0);
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.857142, 2), 0.86);
        assert_eq!(round_to(11.428571, 1), 11.4);
    }
}
