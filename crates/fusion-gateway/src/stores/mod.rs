//! In-process implementations of the four external-collaborator traits the
//! core only consumes by interface (spec §1, §6): `TokenStore`,
//! `KnowledgeStore`, `APITokenStore`, `AuthCodeStore`. Each follows
//! `sa_sessions::store::SessionStore`'s persistence convention — an
//! in-memory `RwLock<HashMap<…>>` as the fast path, flushed to a single
//! JSON file on every write.

mod auth_code_store;
mod knowledge_store;
mod token_store;

pub use auth_code_store::FileAuthCodeStore;
pub use knowledge_store::FileKnowledgeStore;
pub use token_store::{derive_tenant_hash, FileApiTokenStore, FileTokenStore};
