// cartograph/src/template/mod.rs

//! Template stamping: parameter resolution, `$(...)$` interpolation, path
//! evaluation and submission of rendered objects.

pub mod interpolate;
pub mod params;
pub mod path;
pub mod stamper;

pub use interpolate::{Evaluator, InterpolationError, TagInterpolator};
pub use path::{JsonPath, PathError};
pub use stamper::{Applied, StampContext, Stamper};
