pub mod descriptor;
pub mod envelope;
pub mod eval;
pub mod results;
pub mod translator;

pub use descriptor::*;
pub use envelope::*;
pub use eval::*;
pub use results::*;
pub use translator::translate;
