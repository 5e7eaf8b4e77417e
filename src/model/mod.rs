pub mod bootcamp;
pub mod common;
pub mod course;
pub mod document;
pub mod geo;
pub mod principal;
pub mod review;
pub mod session;
pub mod user;
pub mod validation;

pub use bootcamp::*;
pub use common::*;
pub use course::*;
pub use document::*;
pub use geo::*;
pub use principal::*;
pub use review::*;
pub use session::*;
pub use user::*;
