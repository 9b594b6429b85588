//! Common structs for model metadata shared across crates.

mod columns;
mod model;
mod record;
mod run;

pub use columns::*;
pub use model::*;
pub use record::*;
pub use run::*;

/// Key under which training runs record their mean absolute error.
pub const MAE_METRIC_KEY: &str = "mean absolute error";
