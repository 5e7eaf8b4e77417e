pub mod geocoder;
pub mod mailer;
pub mod password;
pub mod storage;
pub mod tokens;

pub use geocoder::*;
pub use mailer::*;
pub use password::*;
pub use storage::*;
