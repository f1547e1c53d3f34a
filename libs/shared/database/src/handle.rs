use std::sync::Arc;

use tracing::info;

use shared_config::{AppConfig, StorageBackend};

use crate::memory::InMemoryStore;
use crate::rest_store::SupabaseStore;
use crate::store::{AppointmentStore, DoctorStore, SlotStore};
use crate::supabase::SupabaseClient;

/// The process-wide storage handle. Built once at startup and cloned into
/// every service; all clones share the same backend.
#[derive(Clone)]
pub struct Storage {
    pub slots: Arc<dyn SlotStore>,
    pub doctors: Arc<dyn DoctorStore>,
    pub appointments: Arc<dyn AppointmentStore>,
}

impl Storage {
    pub fn from_config(config: &AppConfig) -> Self {
        match config.storage_backend {
            StorageBackend::Supabase => {
                info!("Using Supabase storage at {}", config.supabase_url);
                Self::supabase(config)
            }
            StorageBackend::Memory => {
                info!("Using in-memory storage");
                Self::in_memory()
            }
        }
    }

    pub fn supabase(config: &AppConfig) -> Self {
        Self::from_backend(Arc::new(SupabaseStore::new(Arc::new(SupabaseClient::new(config)))))
    }

    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(InMemoryStore::new()))
    }

    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: SlotStore + DoctorStore + AppointmentStore + 'static,
    {
        Self {
            slots: backend.clone(),
            doctors: backend.clone(),
            appointments: backend,
        }
    }
}
