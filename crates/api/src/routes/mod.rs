pub mod account;
pub mod health;
pub mod signal;
pub mod trade;
