//! Shared types and result types for the database layer

pub mod errors;

pub use errors::{Entity, ErrorKind, StoreError};

pub type StoreResult<T> = Result<T, StoreError>;
