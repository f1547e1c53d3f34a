pub mod error;
pub mod handle;
pub mod memory;
pub mod rest_store;
pub mod store;
pub mod supabase;

pub use error::{StoreError, StoreResult};
pub use handle::Storage;
pub use memory::InMemoryStore;
pub use rest_store::SupabaseStore;
pub use store::*;
