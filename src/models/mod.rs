pub mod enums;

pub mod catalog;
pub mod patient;
pub mod request;
pub mod result;
pub mod sample;
pub mod user;

pub use catalog::*;
pub use patient::*;
pub use request::*;
pub use result::*;
pub use sample::*;
pub use user::*;
