// Services module - Business logic

pub mod account_client;
pub mod card_lifecycle;
pub mod context;
pub mod tokenization;
