//! Cart execution
//!
//! [`CartRunner`] drains the cart one transaction at a time; the tracker
//! waits for receipts and resumes transactions left in flight by a restart.

mod runner;
mod tracker;

pub use runner::CartRunner;
pub use tracker::RunSummary;
