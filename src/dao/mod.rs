/// Database model definitions.
pub mod models;
/// Court, match and score persistence.
pub mod score_store;
/// Storage abstraction layer for database operations.
pub mod storage;
