use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use ulid::Ulid;

use crate::model::*;

use super::{ResourceStore, StoreError, validate_name};

/// Volatile store. Same contract as [`super::WalStore`] minus surviving a restart.
pub struct InMemoryStore {
    resources: DashMap<Ulid, Resource>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
        }
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn contains_resource(&self, id: &Ulid) -> bool {
        self.resources.contains_key(id)
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn load_resource(&self, id: Ulid) -> Result<Resource, StoreError> {
        self.resources
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn commit_reservation(
        &self,
        id: Ulid,
        reservation: Reservation,
    ) -> Result<(), StoreError> {
        let mut rs = self.resources.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        rs.insert_reservation(reservation);
        Ok(())
    }

    async fn create_resource(&self, id: Ulid, name: Option<String>) -> Result<(), StoreError> {
        validate_name(name.as_deref())?;
        match self.resources.entry(id) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                slot.insert(Resource::new(id, name));
                Ok(())
            }
        }
    }

    async fn remove_resource(&self, id: Ulid) -> Result<(), StoreError> {
        self.resources
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    fn resource_ids(&self) -> Vec<Ulid> {
        self.resources.iter().map(|e| *e.key()).collect()
    }
}
