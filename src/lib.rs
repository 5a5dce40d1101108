//! Cardiovascular risk classification.
//!
//! A submitted form is validated, encoded into the categorical feature vector
//! the risk model was trained on, classified, and interpreted into a risk
//! class with a confidence. [`pipeline::RiskPipeline`] runs the whole chain;
//! storage and reporting are the caller's side and live in [`db`] and
//! [`report`].

pub mod batch;
pub mod classifier;
pub mod config;
pub mod db;
pub mod encode;
pub mod error;
pub mod interpret;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod validate;
