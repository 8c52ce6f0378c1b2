//! HTTP clients for the device and OTA services and the orchestrator API

pub mod checks;
pub mod client;
pub mod deployments;
pub mod devices;
pub mod ota;

pub use checks::HttpCheckRunner;
pub use client::HttpClient;
pub use devices::HttpDeviceRegistry;
pub use ota::HttpFirmwareSender;
