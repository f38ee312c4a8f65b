// Repository module - SQL access for cards and card tokens

pub mod card_repository;

pub use card_repository::CardRepository;
