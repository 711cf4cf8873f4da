//! In-memory object storage.
//!
//! Each resource kind is backed by its own table, a map of object name to object guarded by a
//! single read/write lock. Reads share the lock, writes hold it exclusively. Tables of
//! different kinds are fully independent.
//!
//! The table owns every record it holds. Objects are cloned on the way in and on the way out,
//! so no caller ever aliases a stored record.
//!
//! ## Versioning
//! Every table carries one monotonically increasing counter. Each create & update takes the
//! current value as the object's `resourceVersion` and then bumps it, so versions are strictly
//! increasing across all objects of the table, not per object.

use std::collections::HashMap;

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::crd::{GroupResource, ResourceKind, ResourceList};
use crate::error::{AppError, AppResult};

/// The first resource version issued by a fresh table.
const INITIAL_VERSION: u64 = 1;

/// An in-memory table of objects of kind `K`.
pub struct MemoryStorage<K> {
    /// The group/resource of the objects in this table, used for errors & logging.
    resource: GroupResource,
    /// The table itself.
    table: RwLock<Table<K>>,
}

struct Table<K> {
    /// All objects of this table, keyed by name.
    items: HashMap<String, K>,
    /// The version to be assigned by the next write.
    version_counter: u64,
}

impl<K> Table<K> {
    /// Issue the next resource version.
    fn next_version(&mut self) -> String {
        let version = self.version_counter;
        self.version_counter += 1;
        version.to_string()
    }

    /// The last resource version issued by this table, if any.
    fn latest_version(&self) -> Option<String> {
        if self.version_counter > INITIAL_VERSION {
            Some((self.version_counter - 1).to_string())
        } else {
            None
        }
    }
}

impl<K: ResourceKind> Default for MemoryStorage<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ResourceKind> MemoryStorage<K> {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self {
            resource: K::group_resource(),
            table: RwLock::new(Table {
                items: HashMap::new(),
                version_counter: INITIAL_VERSION,
            }),
        }
    }

    /// The group/resource of the objects in this table.
    pub fn resource(&self) -> &GroupResource {
        &self.resource
    }

    /// The number of objects currently held in this table.
    pub async fn len(&self) -> usize {
        self.table.read().await.items.len()
    }

    /// Check if this table is empty.
    pub async fn is_empty(&self) -> bool {
        self.table.read().await.items.is_empty()
    }

    /// Get a copy of the object bearing the given name.
    pub async fn get(&self, name: &str) -> AppResult<K> {
        let table = self.table.read().await;
        table.items.get(name).cloned().ok_or_else(|| self.not_found(name))
    }

    /// Get a snapshot of all objects in this table.
    ///
    /// Item order is unspecified.
    pub async fn list(&self) -> ResourceList<K> {
        let table = self.table.read().await;
        let items = table.items.values().cloned().collect();
        ResourceList::new(items, table.latest_version())
    }

    /// Create a new object.
    ///
    /// A name is generated if the given object has none. The object's UID, creation timestamp,
    /// resource version, status, `apiVersion` & `kind` are all assigned by the table.
    pub async fn create(&self, mut object: K) -> AppResult<K> {
        let mut table = self.table.write().await;

        let meta = object.meta_mut();
        let name = match meta.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                let name = Uuid::new_v4().to_string();
                meta.name = Some(name.clone());
                name
            }
        };
        if table.items.contains_key(&name) {
            return Err(AppError::AlreadyExists {
                resource: self.resource.clone(),
                name,
            });
        }

        let version = table.next_version();
        meta.creation_timestamp = Some(Time(Utc::now()));
        meta.resource_version = Some(version.clone());
        meta.uid = Some(Uuid::new_v4().to_string());
        object.mark_active();
        object.stamp_type_meta();

        table.items.insert(name.clone(), object.clone());
        tracing::debug!(resource = %self.resource, %name, %version, "object created");
        Ok(object)
    }

    /// Update an existing object, replacing it wholesale.
    ///
    /// The UID & creation timestamp of the stored object are carried over, whatever the given
    /// object holds, and a new resource version is assigned. `apiVersion` & `kind` are always
    /// those of the table's kind.
    pub async fn update(&self, mut object: K) -> AppResult<K> {
        let name = object.meta().name.clone().unwrap_or_default();
        let mut table = self.table.write().await;

        let (uid, creation_timestamp) = match table.items.get(&name) {
            Some(existing) => (existing.meta().uid.clone(), existing.meta().creation_timestamp.clone()),
            None => return Err(self.not_found(&name)),
        };

        let version = table.next_version();
        let meta = object.meta_mut();
        meta.uid = uid;
        meta.creation_timestamp = creation_timestamp;
        meta.resource_version = Some(version.clone());
        object.stamp_type_meta();

        table.items.insert(name.clone(), object.clone());
        tracing::debug!(resource = %self.resource, %name, %version, "object updated");
        Ok(object)
    }

    /// Delete the object bearing the given name.
    pub async fn delete(&self, name: &str) -> AppResult<()> {
        let mut table = self.table.write().await;
        match table.items.remove(name) {
            Some(_) => {
                tracing::debug!(resource = %self.resource, %name, "object deleted");
                Ok(())
            }
            None => Err(self.not_found(name)),
        }
    }

    fn not_found(&self, name: &str) -> AppError {
        AppError::NotFound {
            resource: self.resource.clone(),
            name: name.to_string(),
        }
    }
}
