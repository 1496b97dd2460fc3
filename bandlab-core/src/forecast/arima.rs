//! ARIMA(p, d, q) estimation by conditional least squares.
//!
//! The series is differenced `d` times. Pure AR models are fit by OLS on
//! lagged values; models with an MA part use the two-stage Hannan–Rissanen
//! regression (a long autoregression supplies innovation estimates, then OLS
//! on AR lags and lagged innovations). Residuals are recomputed with the
//! conditional-sum-of-squares recursion and drive the Gaussian likelihood.
//! A constant is estimated only when `d == 0`.
//!
//! The likelihood is conditional on a number of leading observations. Models
//! whose BIC is compared must be conditioned on the same count, otherwise
//! each dropped observation shifts `-2·LL` by `ln(2πσ²) + 1` and the ranking
//! depends on the units of the series.

use std::f64::consts::PI;
use std::fmt;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::bounds::population_std;

/// Observations required on top of `p + d + q`.
const MIN_EXTRA_OBSERVATIONS: usize = 10;

/// Floor for the long autoregression in the Hannan–Rissanen first stage.
const MIN_LONG_AR_ORDER: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ArimaOrder {
    pub const fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }

    pub fn has_constant(&self) -> bool {
        self.d == 0
    }

    /// Estimated parameters including the innovation variance.
    pub fn param_count(&self) -> usize {
        self.p + self.q + usize::from(self.has_constant()) + 1
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
    }
}

/// Why a single candidate could not be fit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArimaFitError {
    #[error("{order} needs at least {needed} observations, got {len}")]
    TooShort {
        order: ArimaOrder,
        needed: usize,
        len: usize,
    },

    #[error("regression design matrix is rank deficient")]
    Singular,

    #[error("autoregressive part is not stationary")]
    NonStationary,

    #[error("moving-average part is not invertible")]
    NonInvertible,

    #[error("non-finite values in data or residuals")]
    NonFinite,

    #[error("residual variance is zero")]
    DegenerateVariance,
}

/// A fitted ARIMA model together with the data it was fit on.
#[derive(Debug, Clone)]
pub struct ArimaModel {
    order: ArimaOrder,
    constant: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
    sigma2: f64,
    log_likelihood: f64,
    aic: f64,
    bic: f64,
    /// Residuals entering the likelihood.
    effective_nobs: usize,
    levels: Vec<f64>,
    differenced: Vec<f64>,
    /// Aligned with `differenced`; zero for the first `p` entries.
    residuals: Vec<f64>,
    /// Last value of the series after 0, 1, .., d-1 differences.
    tails: Vec<f64>,
}

impl ArimaModel {
    /// Fit an ARIMA model of the given order to `data`, conditioning the
    /// likelihood on the first `p + d` observations.
    pub fn fit(data: &[f64], order: ArimaOrder) -> Result<Self, ArimaFitError> {
        Self::fit_conditional(data, order, order.p + order.d)
    }

    /// Fit with the likelihood evaluated over `data[condition..]`, in levels.
    /// At least `p + d` leading observations are always excluded.
    pub fn fit_conditional(
        data: &[f64],
        order: ArimaOrder,
        condition: usize,
    ) -> Result<Self, ArimaFitError> {
        let needed = order.p + order.d + order.q + MIN_EXTRA_OBSERVATIONS;
        if data.len() < needed {
            return Err(ArimaFitError::TooShort {
                order,
                needed,
                len: data.len(),
            });
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(ArimaFitError::NonFinite);
        }

        let differenced = difference(data, order.d);
        let with_constant = order.has_constant();
        let (constant, ar, ma) = match (order.p, order.q) {
            (0, 0) => {
                let c = if with_constant { mean(&differenced) } else { 0.0 };
                (c, Vec::new(), Vec::new())
            }
            (p, 0) => {
                let (c, phi) = fit_autoregression(&differenced, p, with_constant)?;
                (c, phi, Vec::new())
            }
            (p, q) => hannan_rissanen(&differenced, p, q, with_constant)?,
        };

        if !is_stationary(&ar) {
            return Err(ArimaFitError::NonStationary);
        }
        let negated_ma: Vec<f64> = ma.iter().map(|theta| -theta).collect();
        if !is_stationary(&negated_ma) {
            return Err(ArimaFitError::NonInvertible);
        }

        let residuals = css_residuals(&differenced, constant, &ar, &ma);
        let skip = condition.max(order.p + order.d) - order.d;
        let effective = residuals.get(skip..).unwrap_or_default();
        let k = order.param_count();
        if effective.len() <= k {
            return Err(ArimaFitError::TooShort {
                order,
                needed,
                len: data.len(),
            });
        }

        let n = effective.len() as f64;
        let sigma2 = effective.iter().map(|e| e * e).sum::<f64>() / n;
        if !sigma2.is_finite() {
            return Err(ArimaFitError::NonFinite);
        }
        if sigma2 <= 0.0 {
            return Err(ArimaFitError::DegenerateVariance);
        }

        let log_likelihood = -0.5 * n * ((2.0 * PI * sigma2).ln() + 1.0);
        let aic = -2.0 * log_likelihood + 2.0 * k as f64;
        let bic = -2.0 * log_likelihood + k as f64 * n.ln();

        Ok(Self {
            order,
            constant,
            ar,
            ma,
            sigma2,
            log_likelihood,
            aic,
            bic,
            effective_nobs: effective.len(),
            levels: data.to_vec(),
            tails: difference_tails(data, order.d),
            differenced,
            residuals,
        })
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    pub fn aic(&self) -> f64 {
        self.aic
    }

    pub fn bic(&self) -> f64 {
        self.bic
    }

    /// Number of observations (in levels) the model was fit on.
    pub fn nobs(&self) -> usize {
        self.levels.len()
    }

    /// Number of residuals the likelihood was evaluated over.
    pub fn effective_nobs(&self) -> usize {
        self.effective_nobs
    }

    /// Out-of-sample forecasts in levels for `steps` periods ahead.
    pub fn forecast(&self, steps: usize) -> Vec<f64> {
        let mut y = self.differenced.clone();
        let mut e = self.residuals.clone();
        let mut out = Vec::with_capacity(steps);

        for _ in 0..steps {
            let t = y.len();
            let mut pred = self.constant;
            for (i, phi) in self.ar.iter().enumerate() {
                pred += phi * y[t - 1 - i];
            }
            for (j, theta) in self.ma.iter().enumerate() {
                pred += theta * e[t - 1 - j];
            }
            y.push(pred);
            // Future innovations have zero expectation.
            e.push(0.0);
            out.push(pred);
        }

        undifference(&out, &self.tails)
    }

    /// One-step-ahead in-sample prediction of the last observation, in levels.
    pub fn in_sample_prediction(&self) -> f64 {
        let last_level = self.levels.last().copied().unwrap_or(f64::NAN);
        let last_residual = self.residuals.last().copied().unwrap_or(0.0);
        last_level - last_residual
    }

    /// Spread of the predictions from the last in-sample step through
    /// `steps` out-of-sample steps (population standard deviation).
    pub fn prediction_spread(&self, steps: usize) -> f64 {
        let mut predictions = Vec::with_capacity(steps + 1);
        predictions.push(self.in_sample_prediction());
        predictions.extend(self.forecast(steps));
        population_std(&predictions)
    }
}

/// Difference a series `d` times.
pub fn difference(data: &[f64], d: usize) -> Vec<f64> {
    let mut result = data.to_vec();
    for _ in 0..d {
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    result
}

fn difference_tails(data: &[f64], d: usize) -> Vec<f64> {
    let mut series = data.to_vec();
    let mut tails = Vec::with_capacity(d);
    for _ in 0..d {
        tails.push(series.last().copied().unwrap_or(0.0));
        series = difference(&series, 1);
    }
    tails
}

/// Invert `difference` for a forecast path given the tails of each level.
fn undifference(forecasts: &[f64], tails: &[f64]) -> Vec<f64> {
    let mut path = forecasts.to_vec();
    for &tail in tails.iter().rev() {
        let mut acc = tail;
        for v in path.iter_mut() {
            acc += *v;
            *v = acc;
        }
    }
    path
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Least squares on a row-major design matrix, solved by SVD of `X` itself
/// so lagged price levels with a small spread keep their precision.
fn least_squares(
    rows: usize,
    cols: usize,
    design: &[f64],
    target: Vec<f64>,
) -> Result<Vec<f64>, ArimaFitError> {
    if cols == 0 {
        return Ok(Vec::new());
    }
    if rows <= cols {
        return Err(ArimaFitError::Singular);
    }
    let x = DMatrix::from_row_slice(rows, cols, design);
    let y = DVector::from_vec(target);
    let svd = x.svd(true, true);
    let largest = svd.singular_values.iter().fold(0.0_f64, |m, s| m.max(*s));
    let tolerance = largest * f64::EPSILON * rows as f64;
    if !largest.is_finite() || largest <= 0.0 || svd.rank(tolerance) < cols {
        return Err(ArimaFitError::Singular);
    }
    let beta = svd
        .solve(&y, tolerance)
        .map_err(|_| ArimaFitError::Singular)?;
    if beta.iter().any(|b| !b.is_finite()) {
        return Err(ArimaFitError::Singular);
    }
    Ok(beta.iter().copied().collect())
}

/// Regress `y[t]` on `[1?, y[t-1], .., y[t-p]]`; returns (constant, φ).
fn fit_autoregression(
    y: &[f64],
    p: usize,
    with_constant: bool,
) -> Result<(f64, Vec<f64>), ArimaFitError> {
    let n = y.len();
    if n <= p {
        return Err(ArimaFitError::Singular);
    }
    let cols = p + usize::from(with_constant);
    let mut design = Vec::with_capacity((n - p) * cols);
    for t in p..n {
        if with_constant {
            design.push(1.0);
        }
        design.extend((1..=p).map(|i| y[t - i]));
    }
    let beta = least_squares(n - p, cols, &design, y[p..].to_vec())?;
    Ok(split_constant(beta, with_constant))
}

/// Two-stage Hannan–Rissanen estimate; returns (constant, φ, θ).
fn hannan_rissanen(
    y: &[f64],
    p: usize,
    q: usize,
    with_constant: bool,
) -> Result<(f64, Vec<f64>, Vec<f64>), ArimaFitError> {
    let n = y.len();
    let long_order = (p + q).max(MIN_LONG_AR_ORDER).min(n / 4).max(1);
    let (long_c, long_phi) = fit_autoregression(y, long_order, true)?;

    let mut innovations = vec![0.0; n];
    for t in long_order..n {
        let fitted: f64 = long_phi
            .iter()
            .enumerate()
            .map(|(i, phi)| phi * y[t - 1 - i])
            .sum();
        innovations[t] = y[t] - long_c - fitted;
    }

    let start = (long_order + q).max(p);
    if start >= n {
        return Err(ArimaFitError::Singular);
    }
    let cols = p + q + usize::from(with_constant);
    let mut design = Vec::with_capacity((n - start) * cols);
    for t in start..n {
        if with_constant {
            design.push(1.0);
        }
        design.extend((1..=p).map(|i| y[t - i]));
        design.extend((1..=q).map(|j| innovations[t - j]));
    }
    let beta = least_squares(n - start, cols, &design, y[start..].to_vec())?;
    let (constant, coeffs) = split_constant(beta, with_constant);
    let (ar, ma) = coeffs.split_at(p);
    Ok((constant, ar.to_vec(), ma.to_vec()))
}

fn split_constant(mut beta: Vec<f64>, with_constant: bool) -> (f64, Vec<f64>) {
    if with_constant && !beta.is_empty() {
        let c = beta.remove(0);
        (c, beta)
    } else {
        (0.0, beta)
    }
}

/// Conditional-sum-of-squares residuals; pre-sample innovations are zero.
fn css_residuals(y: &[f64], constant: f64, ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let p = ar.len();
    let mut e = vec![0.0; y.len()];
    for t in p..y.len() {
        let mut pred = constant;
        for (i, phi) in ar.iter().enumerate() {
            pred += phi * y[t - 1 - i];
        }
        for (j, theta) in ma.iter().enumerate() {
            if t > j {
                pred += theta * e[t - 1 - j];
            }
        }
        e[t] = y[t] - pred;
    }
    e
}

/// Step-down (reverse Levinson–Durbin) test: true iff every root of
/// `1 - a₁z - .. - aₖzᵏ` lies outside the unit circle.
fn is_stationary(coeffs: &[f64]) -> bool {
    let mut a = coeffs.to_vec();
    while let Some(&kappa) = a.last() {
        if !kappa.is_finite() || kappa.abs() >= 1.0 {
            return false;
        }
        let k = a.len();
        let denom = 1.0 - kappa * kappa;
        a = (0..k - 1)
            .map(|j| (a[j] + kappa * a[k - 2 - j]) / denom)
            .collect();
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn ar1_series(phi: f64, n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut data = vec![0.0];
        for i in 1..n {
            let noise: f64 = rng.gen_range(-1.0..1.0);
            data.push(phi * data[i - 1] + noise);
        }
        data
    }

    fn random_walk(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut price = 100.0;
        (0..n)
            .map(|_| {
                price += rng.gen_range(-1.0..1.0);
                price
            })
            .collect()
    }

    #[test]
    fn difference_once_and_twice() {
        let data = [1.0, 3.0, 6.0, 10.0, 15.0];
        assert_eq!(difference(&data, 1), vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(difference(&data, 2), vec![1.0, 1.0, 1.0]);
        assert_eq!(difference(&data, 0), data.to_vec());
    }

    #[test]
    fn undifference_inverts_difference() {
        let data = [1.0, 3.0, 6.0, 10.0, 15.0];
        // Continue the quadratic: next second differences are 1.0.
        let tails = difference_tails(&data, 2);
        assert_eq!(tails, vec![15.0, 5.0]);
        assert_eq!(undifference(&[1.0, 1.0], &tails), vec![21.0, 28.0]);
    }

    #[test]
    fn ar1_coefficient_is_recovered() {
        let data = ar1_series(0.7, 400, 7);
        let model = ArimaModel::fit(&data, ArimaOrder::new(1, 0, 0)).unwrap();
        assert!((model.ar_coefficients()[0] - 0.7).abs() < 0.1);
        assert!(model.sigma2() > 0.0);
    }

    #[test]
    fn bic_matches_likelihood_and_parameter_count() {
        let data = ar1_series(0.5, 120, 3);
        let order = ArimaOrder::new(2, 0, 1);
        let model = ArimaModel::fit(&data, order).unwrap();
        let n = (data.len() - order.p) as f64;
        let expected = -2.0 * model.log_likelihood() + order.param_count() as f64 * n.ln();
        assert!((model.bic() - expected).abs() < 1e-9);
        assert_eq!(order.param_count(), 5);
    }

    #[test]
    fn conditioning_fixes_the_likelihood_sample() {
        let data = ar1_series(0.5, 120, 3);
        let orders = [
            ArimaOrder::new(0, 0, 0),
            ArimaOrder::new(1, 1, 0),
            ArimaOrder::new(2, 0, 1),
        ];
        for order in orders {
            let model = ArimaModel::fit_conditional(&data, order, 3).unwrap();
            assert_eq!(model.effective_nobs(), 117, "{order}");
            let n = 117.0_f64;
            let expected = -2.0 * model.log_likelihood() + order.param_count() as f64 * n.ln();
            assert!((model.bic() - expected).abs() < 1e-9);
        }
        // Never fewer than p + d excluded.
        let model = ArimaModel::fit_conditional(&data, ArimaOrder::new(2, 1, 0), 0).unwrap();
        assert_eq!(model.effective_nobs(), 117);
    }

    #[test]
    fn bic_gap_does_not_depend_on_units() {
        let small: Vec<f64> = ar1_series(0.0, 90, 23).iter().map(|v| v * 0.05).collect();
        let large: Vec<f64> = small.iter().map(|v| v * 1000.0).collect();
        let gap = |data: &[f64]| {
            let ar0 = ArimaModel::fit_conditional(data, ArimaOrder::new(0, 0, 0), 2).unwrap();
            let ar2 = ArimaModel::fit_conditional(data, ArimaOrder::new(2, 0, 0), 2).unwrap();
            ar2.bic() - ar0.bic()
        };
        assert!((gap(&small) - gap(&large)).abs() < 1e-6);
    }

    #[test]
    fn autoregression_survives_a_price_level_offset() {
        let mut rng = StdRng::seed_from_u64(31);
        let noise: Vec<f64> = (0..90).map(|_| rng.gen_range(-0.087..0.087)).collect();
        let shifted: Vec<f64> = noise.iter().map(|v| v + 400.0).collect();
        let order = ArimaOrder::new(2, 0, 0);
        let at_zero = ArimaModel::fit(&noise, order).unwrap();
        let at_level = ArimaModel::fit(&shifted, order).unwrap();
        for (a, b) in at_zero.ar_coefficients().iter().zip(at_level.ar_coefficients()) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }
        assert!((at_zero.sigma2() - at_level.sigma2()).abs() < 1e-6 * at_zero.sigma2());
    }

    #[test]
    fn white_noise_mean_model_forecasts_the_mean() {
        let data = ar1_series(0.0, 60, 11);
        let model = ArimaModel::fit(&data, ArimaOrder::new(0, 0, 0)).unwrap();
        let mean = data.iter().sum::<f64>() / data.len() as f64;
        for f in model.forecast(4) {
            assert!((f - mean).abs() < 1e-12);
        }
    }

    #[test]
    fn random_walk_model_forecasts_last_value() {
        let data = random_walk(90, 5);
        let model = ArimaModel::fit(&data, ArimaOrder::new(0, 1, 0)).unwrap();
        let last = *data.last().unwrap();
        assert_eq!(model.forecast(4), vec![last; 4]);
        assert_eq!(model.nobs(), 90);
    }

    #[test]
    fn in_sample_prediction_is_actual_minus_residual() {
        let data = random_walk(90, 9);
        let model = ArimaModel::fit(&data, ArimaOrder::new(0, 1, 0)).unwrap();
        // No constant and no lags: the prediction is the previous level.
        assert!((model.in_sample_prediction() - data[88]).abs() < 1e-9);
    }

    #[test]
    fn prediction_spread_is_zero_for_flat_path() {
        let mut data = random_walk(90, 13);
        let last = data[88];
        data[89] = last;
        let model = ArimaModel::fit(&data, ArimaOrder::new(0, 1, 0)).unwrap();
        assert!(model.prediction_spread(4).abs() < 1e-9);
    }

    #[test]
    fn constant_series_has_degenerate_variance() {
        let result = ArimaModel::fit(&[42.0; 40], ArimaOrder::new(0, 0, 0));
        assert_eq!(result.unwrap_err(), ArimaFitError::DegenerateVariance);
    }

    #[test]
    fn short_series_is_rejected() {
        let err = ArimaModel::fit(&[1.0, 2.0, 3.0], ArimaOrder::new(2, 1, 2)).unwrap_err();
        assert!(matches!(err, ArimaFitError::TooShort { needed: 15, len: 3, .. }));
    }

    #[test]
    fn non_finite_data_is_rejected() {
        let mut data = random_walk(40, 1);
        data[10] = f64::NAN;
        let err = ArimaModel::fit(&data, ArimaOrder::new(1, 0, 0)).unwrap_err();
        assert_eq!(err, ArimaFitError::NonFinite);
    }

    #[test]
    fn stationarity_step_down() {
        assert!(is_stationary(&[]));
        assert!(is_stationary(&[0.5]));
        assert!(!is_stationary(&[1.2]));
        assert!(is_stationary(&[0.5, 0.3]));
        assert!(!is_stationary(&[0.5, 0.6]));
        assert!(!is_stationary(&[0.1, -1.0]));
    }

    #[test]
    fn order_display() {
        assert_eq!(ArimaOrder::new(2, 1, 0).to_string(), "ARIMA(2,1,0)");
        assert!(ArimaOrder::new(0, 0, 0).has_constant());
        assert!(!ArimaOrder::new(0, 1, 0).has_constant());
    }
}
