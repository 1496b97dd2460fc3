//! One-step LSTM forecaster built on candle.
//!
//! A fresh network is trained on every call: sliding windows over the
//! min-max scaled closes form (input, target) pairs, two stacked LSTM
//! layers feed a dense head, and the last window yields the forecast.

use std::sync::PoisonError;

use candle_core::{DType, Device, Tensor};
use candle_nn::{
    linear, loss, lstm, AdamW, LSTMConfig, Linear, Module, Optimizer, ParamsAdamW, VarBuilder,
    VarMap, LSTM, RNN,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::bounds::{population_std, PointForecast};
use super::ForecastError;

/// Anything that turns a close history into a one-step forecast with bands.
pub trait PointForecaster: Send + Sync {
    fn forecast(&self, closes: &[f64]) -> Result<PointForecast, ForecastError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LstmConfig {
    /// Input sequence length.
    pub window: usize,
    pub hidden: usize,
    pub layers: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub batch_size: usize,
    /// Trailing targets whose spread is the forecast stderr.
    pub stderr_tail: usize,
    pub seed: u64,
}

impl Default for LstmConfig {
    fn default() -> Self {
        Self {
            window: 30,
            hidden: 30,
            layers: 2,
            epochs: 50,
            learning_rate: 1e-2,
            batch_size: 32,
            stderr_tail: 10,
            seed: 42,
        }
    }
}

impl LstmConfig {
    /// Fewest closes that produce `stderr_tail` training targets.
    pub fn min_history(&self) -> usize {
        self.window + self.stderr_tail
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        let sizes = [
            ("window", self.window),
            ("hidden", self.hidden),
            ("layers", self.layers),
            ("epochs", self.epochs),
            ("batch_size", self.batch_size),
            ("stderr_tail", self.stderr_tail),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, v)| *v == 0) {
            return Err(ForecastError::InvalidParameter(format!(
                "lstm {name} must be positive"
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "lstm learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LstmForecaster {
    config: LstmConfig,
    device: Device,
}

impl LstmForecaster {
    pub fn new(config: LstmConfig) -> Self {
        Self {
            config,
            device: Device::Cpu,
        }
    }

    pub fn config(&self) -> &LstmConfig {
        &self.config
    }
}

impl Default for LstmForecaster {
    fn default() -> Self {
        Self::new(LstmConfig::default())
    }
}

impl PointForecaster for LstmForecaster {
    fn forecast(&self, closes: &[f64]) -> Result<PointForecast, ForecastError> {
        let cfg = &self.config;
        cfg.validate()?;
        if closes.is_empty() {
            return Err(ForecastError::EmptySeries);
        }
        if closes.len() < cfg.min_history() {
            return Err(ForecastError::InsufficientHistory {
                needed: cfg.min_history(),
                got: closes.len(),
            });
        }
        if closes.iter().any(|c| !c.is_finite()) {
            return Err(ForecastError::InvalidParameter(
                "close history contains non-finite values".into(),
            ));
        }

        let targets = &closes[cfg.window..];
        let stderr = population_std(&targets[targets.len() - cfg.stderr_tail..]);

        let Some(scaler) = MinMaxScaler::fit(closes) else {
            // Flat history: nothing to learn.
            return Ok(PointForecast::new(closes[closes.len() - 1], stderr));
        };
        let scaled: Vec<f32> = closes.iter().map(|&c| scaler.scale(c)).collect();

        let net = LstmNet::new(cfg, &self.device)?;
        net.train(&scaled, cfg, &self.device)?;
        let prediction = net.predict(&scaled[scaled.len() - cfg.window..], &self.device)?;

        Ok(PointForecast::new(scaler.unscale(prediction), stderr))
    }
}

/// Maps `[min, max]` onto `[0, 1]`.
#[derive(Debug, Clone, Copy)]
struct MinMaxScaler {
    min: f64,
    range: f64,
}

impl MinMaxScaler {
    /// `None` when the series has no spread.
    fn fit(values: &[f64]) -> Option<Self> {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        (range > 0.0).then_some(Self { min, range })
    }

    fn scale(&self, value: f64) -> f32 {
        ((value - self.min) / self.range) as f32
    }

    fn unscale(&self, value: f32) -> f64 {
        f64::from(value) * self.range + self.min
    }
}

struct LstmNet {
    varmap: VarMap,
    layers: Vec<LSTM>,
    head: Linear,
}

impl LstmNet {
    fn new(cfg: &LstmConfig, device: &Device) -> candle_core::Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);

        let mut layers = Vec::with_capacity(cfg.layers);
        let mut in_dim = 1;
        for i in 0..cfg.layers {
            layers.push(lstm(
                in_dim,
                cfg.hidden,
                LSTMConfig::default(),
                vb.pp(format!("lstm{i}")),
            )?);
            in_dim = cfg.hidden;
        }
        let head = linear(cfg.hidden, 1, vb.pp("head"))?;

        let net = Self {
            varmap,
            layers,
            head,
        };
        net.seed_weights(cfg.seed, cfg.hidden)?;
        Ok(net)
    }

    /// Overwrite candle's default init with values drawn from a seeded RNG,
    /// visiting variables in name order.
    fn seed_weights(&self, seed: u64, hidden: usize) -> candle_core::Result<()> {
        let bound = 1.0 / (hidden as f32).sqrt();
        let mut rng = StdRng::seed_from_u64(seed);
        let vars = self
            .varmap
            .data()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut names: Vec<&String> = vars.keys().collect();
        names.sort();
        for name in names {
            let var = &vars[name];
            let values: Vec<f32> = (0..var.elem_count())
                .map(|_| rng.gen_range(-bound..bound))
                .collect();
            var.set(&Tensor::from_vec(values, var.dims().to_vec(), var.device())?)?;
        }
        Ok(())
    }

    /// `xs`: (batch, seq, 1) → (batch, 1).
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mut hidden = xs.clone();
        for layer in &self.layers {
            let states = layer.seq(&hidden)?;
            hidden = layer.states_to_tensor(&states)?;
        }
        let seq_len = hidden.dim(1)?;
        let last = hidden.narrow(1, seq_len - 1, 1)?.squeeze(1)?;
        self.head.forward(&last)
    }

    fn train(&self, scaled: &[f32], cfg: &LstmConfig, device: &Device) -> candle_core::Result<()> {
        let window = cfg.window;
        let samples = scaled.len() - window;
        let mut inputs = Vec::with_capacity(samples * window);
        for i in 0..samples {
            inputs.extend_from_slice(&scaled[i..i + window]);
        }
        let targets = &scaled[window..];

        let mut optimizer = AdamW::new(
            self.varmap.all_vars(),
            ParamsAdamW {
                lr: cfg.learning_rate,
                weight_decay: 0.0,
                ..Default::default()
            },
        )?;

        for epoch in 0..cfg.epochs {
            let mut epoch_loss = 0.0;
            for start in (0..samples).step_by(cfg.batch_size) {
                let len = cfg.batch_size.min(samples - start);
                let xs = Tensor::from_slice(
                    &inputs[start * window..(start + len) * window],
                    (len, window, 1),
                    device,
                )?;
                let ys = Tensor::from_slice(&targets[start..start + len], (len, 1), device)?;
                let batch_loss = loss::mse(&self.forward(&xs)?, &ys)?;
                optimizer.backward_step(&batch_loss)?;
                epoch_loss += batch_loss.to_scalar::<f32>()?;
            }
            trace!(epoch, loss = epoch_loss, "lstm epoch");
        }
        Ok(())
    }

    fn predict(&self, last_window: &[f32], device: &Device) -> candle_core::Result<f32> {
        let xs = Tensor::from_slice(last_window, (1, last_window.len(), 1), device)?;
        self.forward(&xs)?.reshape(())?.to_scalar::<f32>()
    }
}
