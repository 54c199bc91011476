//! SUISA "Sendemeldung" generation from ACRCloud broadcast-monitoring data.

pub mod acr_client;
pub mod config;
pub mod email;
pub mod error;
pub mod identifier;
pub mod interval;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod report;

pub use error::{Error, Result};
