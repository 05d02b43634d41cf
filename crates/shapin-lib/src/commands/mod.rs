pub mod app;
pub mod pin;
