pub mod attendance;
pub mod catalog;
pub mod core;
pub mod reports;
pub mod session;
