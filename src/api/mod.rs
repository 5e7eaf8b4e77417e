pub mod auth_handlers;
pub mod bootcamp_handlers;
pub mod course_handlers;
pub mod extract;
pub mod handlers;
pub mod responses;
pub mod review_handlers;
pub mod routes;
pub mod state;
pub mod user_extractor;
pub mod user_handlers;

pub use extract::ValidJson;
pub use routes::*;
pub use state::*;
