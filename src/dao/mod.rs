/// Event document and content persistence backends.
pub mod event_store;
/// Persisted document shapes shared by every backend.
pub mod models;
/// Storage error taxonomy.
pub mod storage;
