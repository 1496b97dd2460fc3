//! Confidence bands around point forecasts.

use serde::{Deserialize, Serialize};

/// Two-sided confidence level with its normal z-score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Pct80,
    Pct95,
}

impl Confidence {
    pub fn z(self) -> f64 {
        match self {
            Confidence::Pct80 => 1.28,
            Confidence::Pct95 => 1.96,
        }
    }
}

/// `[lower, upper]` price band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBand {
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceBand {
    /// Symmetric band `center ± z · stderr`.
    pub fn around(center: f64, stderr: f64, confidence: Confidence) -> Self {
        let half_width = confidence.z() * stderr.abs();
        Self {
            lower: center - half_width,
            upper: center + half_width,
        }
    }
}

/// One-step forecast with its 80% and 95% bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointForecast {
    pub forecast: f64,
    pub stderr: f64,
    pub band_80: ConfidenceBand,
    pub band_95: ConfidenceBand,
}

impl PointForecast {
    pub fn new(forecast: f64, stderr: f64) -> Self {
        Self {
            forecast,
            stderr,
            band_80: ConfidenceBand::around(forecast, stderr, Confidence::Pct80),
            band_95: ConfidenceBand::around(forecast, stderr, Confidence::Pct95),
        }
    }
}

/// Population standard deviation (divides by n). Empty input gives 0.
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_widths_follow_z_scores() {
        let f = PointForecast::new(100.0, 2.0);
        assert!((f.band_80.upper - 102.56).abs() < 1e-12);
        assert!((f.band_80.lower - 97.44).abs() < 1e-12);
        assert!((f.band_95.upper - 103.92).abs() < 1e-12);
        assert!(f.band_95.upper - f.band_95.lower > f.band_80.upper - f.band_80.lower);
    }

    #[test]
    fn zero_stderr_collapses_band() {
        let band = ConfidenceBand::around(50.0, 0.0, Confidence::Pct95);
        assert_eq!(band.lower, 50.0);
        assert_eq!(band.upper, 50.0);
    }

    #[test]
    fn population_std_matches_definition() {
        // mean 5, squared deviations 9+1+1+9 = 20, /4 = 5
        let sd = population_std(&[2.0, 4.0, 6.0, 8.0]);
        assert!((sd - 5.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(population_std(&[]), 0.0);
        assert_eq!(population_std(&[3.0]), 0.0);
    }
}
