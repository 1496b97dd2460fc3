//! Domain types for BandLab

pub mod bar;
pub mod holdings;
pub mod settings;

pub use bar::Bar;
pub use holdings::TargetAllocation;
pub use settings::{
    AccountType, AlgorithmSettings, Brokerage, NormalizationMode, Resolution, Subscription,
};
