pub mod client;
pub mod taxonomy;

pub use client::FailureClassifier;
