//! Durable record of resources and their committed reservation history.
//!
//! The engine only ever calls [`ResourceStore::load_resource`] and
//! [`ResourceStore::commit_reservation`], and only calls the latter while it
//! holds the resource's critical section. The catalog methods exist for the
//! collaborator that manages the fleet.

mod durable;
mod memory;

pub use durable::WalStore;
pub use memory::InMemoryStore;

use async_trait::async_trait;
use ulid::Ulid;

use crate::limits::MAX_RESOURCE_NAME_LEN;
use crate::model::{Reservation, Resource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    LimitExceeded(&'static str),
    Storage(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "resource not found: {id}"),
            StoreError::AlreadyExists(id) => write!(f, "resource already exists: {id}"),
            StoreError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            StoreError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Storage(e.to_string())
    }
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Current snapshot of a resource and its history.
    async fn load_resource(&self, id: Ulid) -> Result<Resource, StoreError>;

    /// Append a reservation to a resource's history. Applies fully or not at
    /// all; once `Ok` is returned every later `load_resource` sees it.
    /// Does not check for overlap.
    async fn commit_reservation(&self, id: Ulid, reservation: Reservation)
    -> Result<(), StoreError>;

    async fn create_resource(&self, id: Ulid, name: Option<String>) -> Result<(), StoreError>;

    async fn remove_resource(&self, id: Ulid) -> Result<(), StoreError>;

    fn resource_ids(&self) -> Vec<Ulid>;
}

pub(crate) fn validate_name(name: Option<&str>) -> Result<(), StoreError> {
    if name.is_some_and(|n| n.len() > MAX_RESOURCE_NAME_LEN) {
        return Err(StoreError::LimitExceeded("resource name too long"));
    }
    Ok(())
}
