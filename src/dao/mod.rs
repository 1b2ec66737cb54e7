/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
/// Trivia persistence backends and the store contract they implement.
pub mod trivia_store;
