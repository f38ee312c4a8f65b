// Models module - Database entity representations

pub mod account;
pub mod card;

pub use account::Account;
pub use card::{Card, CardToken, CardTokenView, NewCard, NewCardToken};
