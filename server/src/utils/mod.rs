pub mod actor;
pub mod error;
pub mod extract;
pub mod response;
