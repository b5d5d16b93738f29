pub mod document;
pub mod memory;
pub mod rest;
pub mod subscription;
pub mod supabase;

pub use document::{
    Direction, Document, DocumentStore, OrderBy, Query, StoreError, WriteOp, SERVER_TIMESTAMP_FIELD,
};
pub use memory::InMemoryStore;
pub use rest::RestDocumentStore;
pub use subscription::Subscription;
pub use supabase::{ApiError, SupabaseClient};
