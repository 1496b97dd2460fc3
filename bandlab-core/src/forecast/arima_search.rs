//! BIC grid search over ARIMA orders and the 80% forecast band.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::arima::{ArimaFitError, ArimaModel, ArimaOrder};
use super::bounds::{Confidence, ConfidenceBand};
use super::ForecastError;

/// Inclusive upper bounds for p, d and q.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchGrid {
    pub max_p: usize,
    pub max_d: usize,
    pub max_q: usize,
}

impl Default for SearchGrid {
    fn default() -> Self {
        Self {
            max_p: 2,
            max_d: 1,
            max_q: 2,
        }
    }
}

impl SearchGrid {
    /// Returns the total number of candidate orders.
    pub fn size(&self) -> usize {
        (self.max_p + 1) * (self.max_d + 1) * (self.max_q + 1)
    }

    /// All orders, p outermost and q innermost.
    pub fn orders(&self) -> Vec<ArimaOrder> {
        let mut orders = Vec::with_capacity(self.size());
        for p in 0..=self.max_p {
            for d in 0..=self.max_d {
                for q in 0..=self.max_q {
                    orders.push(ArimaOrder::new(p, d, q));
                }
            }
        }
        orders
    }

    /// Leading observations every candidate's likelihood is conditioned on,
    /// so BIC values across the grid share one sample.
    pub fn conditioning(&self) -> usize {
        self.max_p + self.max_d
    }
}

/// Outcome of fitting one grid point.
#[derive(Debug, Clone)]
pub enum CandidateFit {
    Fitted(ArimaModel),
    Failed {
        order: ArimaOrder,
        reason: ArimaFitError,
    },
}

impl CandidateFit {
    pub fn order(&self) -> ArimaOrder {
        match self {
            CandidateFit::Fitted(model) => model.order(),
            CandidateFit::Failed { order, .. } => *order,
        }
    }

    /// BIC of a fitted candidate; `None` for a failure.
    pub fn bic(&self) -> Option<f64> {
        match self {
            CandidateFit::Fitted(model) => Some(model.bic()),
            CandidateFit::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArimaSearchConfig {
    pub grid: SearchGrid,
    /// Out-of-sample horizon.
    pub steps: usize,
    pub confidence: Confidence,
    /// Fit candidates on the rayon pool.
    pub parallel: bool,
}

impl Default for ArimaSearchConfig {
    fn default() -> Self {
        Self {
            grid: SearchGrid::default(),
            steps: 4,
            confidence: Confidence::Pct80,
            parallel: true,
        }
    }
}

/// Result of a grid search: the winner plus every candidate in grid order.
#[derive(Debug, Clone)]
pub struct ArimaSelection {
    pub best: ArimaModel,
    pub candidates: Vec<CandidateFit>,
}

impl ArimaSelection {
    pub fn failures(&self) -> impl Iterator<Item = (ArimaOrder, &ArimaFitError)> {
        self.candidates.iter().filter_map(|c| match c {
            CandidateFit::Failed { order, reason } => Some((*order, reason)),
            CandidateFit::Fitted(_) => None,
        })
    }

    pub fn fitted_count(&self) -> usize {
        self.candidates
            .iter()
            .filter(|c| matches!(c, CandidateFit::Fitted(_)))
            .count()
    }
}

/// Fit every order in the grid over a common likelihood sample. Results come
/// back in grid order regardless of `parallel`.
pub fn fit_candidates(data: &[f64], grid: &SearchGrid, parallel: bool) -> Vec<CandidateFit> {
    let condition = grid.conditioning();
    let fit = |order: &ArimaOrder| match ArimaModel::fit_conditional(data, *order, condition) {
        Ok(model) => CandidateFit::Fitted(model),
        Err(reason) => CandidateFit::Failed {
            order: *order,
            reason,
        },
    };

    let orders = grid.orders();
    if parallel {
        orders.par_iter().map(fit).collect()
    } else {
        orders.iter().map(fit).collect()
    }
}

/// Fit the grid and keep the lowest-BIC model. Ties keep the earlier
/// candidate. Errors only if no candidate could be fit.
pub fn find_best_arima(
    data: &[f64],
    grid: &SearchGrid,
    parallel: bool,
) -> Result<ArimaSelection, ForecastError> {
    if data.is_empty() {
        return Err(ForecastError::EmptySeries);
    }

    let candidates = fit_candidates(data, grid, parallel);
    let mut best: Option<&ArimaModel> = None;
    let mut failures = 0;

    for candidate in &candidates {
        match candidate {
            CandidateFit::Fitted(model) => {
                if best.map_or(true, |b| model.bic() < b.bic()) {
                    best = Some(model);
                }
            }
            CandidateFit::Failed { order, reason } => {
                debug!(%order, %reason, "ARIMA candidate skipped");
                failures += 1;
            }
        }
    }

    let best = best
        .cloned()
        .ok_or(ForecastError::NoViableModel { failures })?;
    debug!(order = %best.order(), bic = best.bic(), failures, "ARIMA order selected");

    Ok(ArimaSelection { best, candidates })
}

/// Multi-step forecast from the BIC-best model with a band at every step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArimaForecast {
    pub order: ArimaOrder,
    pub path: Vec<f64>,
    pub bands: Vec<ConfidenceBand>,
    pub stderr: f64,
}

impl ArimaForecast {
    /// Forecast and band at the last step of the horizon.
    pub fn horizon(&self) -> Option<(f64, ConfidenceBand)> {
        Some((*self.path.last()?, *self.bands.last()?))
    }
}

/// Select the best ARIMA model for `data` and forecast `config.steps` ahead.
///
/// The standard error is the population standard deviation of the model's
/// predictions from the last in-sample step through the final forecast step.
pub fn perform_arima_forecast(
    data: &[f64],
    config: &ArimaSearchConfig,
) -> Result<ArimaForecast, ForecastError> {
    if config.steps == 0 {
        return Err(ForecastError::InvalidParameter(
            "forecast steps must be at least 1".into(),
        ));
    }

    let selection = find_best_arima(data, &config.grid, config.parallel)?;
    let model = &selection.best;
    let path = model.forecast(config.steps);
    let stderr = model.prediction_spread(config.steps);

    let bands = path
        .iter()
        .map(|&f| ConfidenceBand::around(f, stderr, config.confidence))
        .collect();

    Ok(ArimaForecast {
        order: model.order(),
        path,
        bands,
        stderr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noisy_walk(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut price = 150.0;
        (0..n)
            .map(|_| {
                price += rng.gen_range(-2.0..2.0);
                price
            })
            .collect()
    }

    #[test]
    fn default_grid_has_eighteen_orders_in_product_order() {
        let orders = SearchGrid::default().orders();
        assert_eq!(orders.len(), 18);
        assert_eq!(orders[0], ArimaOrder::new(0, 0, 0));
        assert_eq!(orders[1], ArimaOrder::new(0, 0, 1));
        assert_eq!(orders[3], ArimaOrder::new(0, 1, 0));
        assert_eq!(orders[17], ArimaOrder::new(2, 1, 2));
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let data = noisy_walk(90, 21);
        let grid = SearchGrid::default();
        let par = find_best_arima(&data, &grid, true).unwrap();
        let seq = find_best_arima(&data, &grid, false).unwrap();
        assert_eq!(par.best.order(), seq.best.order());
        assert_eq!(par.best.bic(), seq.best.bic());
        assert_eq!(par.candidates.len(), 18);
    }

    #[test]
    fn failures_are_reported_not_fatal() {
        // 14 points: orders with p + d + q > 4 are too short.
        let data = noisy_walk(14, 4);
        let selection = find_best_arima(&data, &SearchGrid::default(), false).unwrap();
        assert!(selection.failures().count() > 0);
        assert!(selection.fitted_count() > 0);
        assert_eq!(
            selection.failures().count() + selection.fitted_count(),
            18
        );
    }

    fn scaled(data: &[f64], factor: f64) -> Vec<f64> {
        data.iter().map(|v| v * factor).collect()
    }

    #[test]
    fn candidates_share_one_likelihood_sample() {
        let data = noisy_walk(90, 12);
        let grid = SearchGrid::default();
        for candidate in fit_candidates(&data, &grid, false) {
            if let CandidateFit::Fitted(model) = candidate {
                assert_eq!(model.effective_nobs(), 90 - grid.conditioning());
            }
        }
    }

    #[test]
    fn selected_order_does_not_depend_on_units() {
        let grid = SearchGrid::default();
        for seed in 0..10 {
            let walk = noisy_walk(90, seed);
            let cents = find_best_arima(&scaled(&walk, 0.01), &grid, false).unwrap();
            let dollars = find_best_arima(&scaled(&walk, 2.0), &grid, false).unwrap();
            assert_eq!(cents.best.order(), dollars.best.order(), "seed {seed}");
        }

        let ar_only = SearchGrid {
            max_p: 2,
            max_d: 0,
            max_q: 0,
        };
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let noise: Vec<f64> = (0..90).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let small = find_best_arima(&scaled(&noise, 0.05), &ar_only, false).unwrap();
            let large = find_best_arima(&scaled(&noise, 50.0), &ar_only, false).unwrap();
            assert_eq!(small.best.order(), large.best.order(), "seed {seed}");
        }
    }

    #[test]
    fn random_walks_select_first_differences_without_lags() {
        let grid = SearchGrid::default();
        let seeds = 30;
        let hits = (0..seeds)
            .filter(|&seed| {
                let walk = scaled(&noisy_walk(90, 100 + seed), 3.5);
                let order = find_best_arima(&walk, &grid, true).unwrap().best.order();
                order.d == 1 && order.p == 0
            })
            .count();
        assert!(hits * 3 >= seeds as usize * 2, "{hits}/{seeds} picked d=1, p=0");
    }

    #[test]
    fn stderr_is_the_model_prediction_spread() {
        let data = noisy_walk(90, 6);
        let config = ArimaSearchConfig::default();
        let forecast = perform_arima_forecast(&data, &config).unwrap();
        let best = find_best_arima(&data, &config.grid, false).unwrap().best;
        assert_eq!(forecast.order, best.order());
        assert!((forecast.stderr - best.prediction_spread(config.steps)).abs() < 1e-12);
    }

    #[test]
    fn no_viable_model_is_an_error() {
        let err = find_best_arima(&[1.0, 2.0, 3.0], &SearchGrid::default(), true).unwrap_err();
        assert!(matches!(err, ForecastError::NoViableModel { failures: 18 }));
    }

    #[test]
    fn forecast_has_band_per_step() {
        let data = noisy_walk(90, 8);
        let forecast = perform_arima_forecast(&data, &ArimaSearchConfig::default()).unwrap();
        assert_eq!(forecast.path.len(), 4);
        assert_eq!(forecast.bands.len(), 4);
        let (point, band) = forecast.horizon().unwrap();
        assert!(band.lower <= point && point <= band.upper);
        assert!((band.upper - point - 1.28 * forecast.stderr).abs() < 1e-9);
    }

    #[test]
    fn zero_steps_is_rejected() {
        let config = ArimaSearchConfig {
            steps: 0,
            ..ArimaSearchConfig::default()
        };
        let err = perform_arima_forecast(&noisy_walk(90, 1), &config).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidParameter(_)));
    }
}
