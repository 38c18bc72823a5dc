pub mod account;
pub mod generate;
pub mod webhooks;
