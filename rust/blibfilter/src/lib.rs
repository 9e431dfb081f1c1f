#![doc = include_str!("../README.md")]

pub mod codec;
pub mod config;
pub mod errors;
pub mod filter;
pub mod grouping;
pub mod library;
pub mod models;
pub mod processing;
pub mod scoring;

pub use config::{
    FilterConfig,
    PeakProcessingConfig,
};
pub use errors::{
    FilterError,
    LibraryError,
    PeakDecodeError,
};
pub use filter::{
    BlibFilter,
    FilterStats,
    run,
};
pub use models::{
    IonKey,
    Peak,
    RefSpectrum,
};
pub use processing::PeakProcessor;
