//! Payload rendering and the daily digest.

pub mod digest;
pub mod generator;

pub use digest::{DailyReportBuilder, DigestSettings};
pub use generator::render_live_alert;
