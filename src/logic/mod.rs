pub mod aggregates;
pub mod guards;

pub use aggregates::*;
pub use guards::*;
