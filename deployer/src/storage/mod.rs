//! Configuration storage

pub mod settings;

pub use settings::Settings;
