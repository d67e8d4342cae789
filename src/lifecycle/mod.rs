//! Model lifecycle manager
//!
//! [`train_all`] fits every configured candidate on one split and records a
//! run per candidate (three metrics plus the serialized model).
//! [`select_best`] later ranks the recorded runs by a metric and loads the
//! winner's model for inference.

mod select;
mod train;

pub use select::{select_best, Direction, LoadedModel};
pub use train::{train_all, TrainingOutcome, TrainingReport};
