pub mod driver;
pub mod expense;
pub mod log;
pub mod service;
pub mod trip;
pub mod user;
pub mod vehicle;
