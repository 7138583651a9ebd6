pub mod dataset;
pub mod errors;
pub mod validation;

pub use dataset::*;
pub use errors::*;
pub use validation::*;
