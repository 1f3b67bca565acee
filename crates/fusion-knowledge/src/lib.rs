//! Knowledge tool set (spec §4.14): per-user persistent key-value memory
//! surfaced as three tools, dispatched against whatever `KnowledgeStore` the
//! gateway wires in. Generalizes `sa_sessions::store::SessionStore`'s
//! fast-path-read / lock-on-write persistence pattern from session keys to
//! knowledge entries, one layer up from the storage trait itself.

pub mod tools;

pub use tools::KnowledgeHandler;
