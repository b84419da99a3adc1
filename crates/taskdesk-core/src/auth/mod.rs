//! Credential persistence.

pub mod token_store;

pub use token_store::{FileTokenStore, MemoryTokenStore, TokenKind, TokenStore};
