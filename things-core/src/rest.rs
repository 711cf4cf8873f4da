//! REST bindings for the hosting API server.
//!
//! `RestStorage` is the contract a resource must satisfy to be served: constructors for empty
//! objects & lists, scoping metadata, and the CRUD verbs plus watch & table conversion. A
//! single generic implementation, `ResourceRest`, serves every kind by delegating to that
//! kind's `MemoryStorage`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::crd::{Gadget, ResourceKind, ResourceList, Widget};
use crate::error::{AppError, AppResult};
use crate::storage::MemoryStorage;
use crate::table::{DefaultTableConvertor, Table, TableOptions, TableSource};

/// REST storage for Widgets.
pub type WidgetRest = ResourceRest<Widget>;
/// REST storage for Gadgets.
pub type GadgetRest = ResourceRest<Gadget>;

/// A stream of objects, delivered as they change.
pub type WatchStream<K> = mpsc::Receiver<K>;

/// Computes the desired state of an object from its current state.
///
/// This is how the host applies replace or patch semantics before the REST layer ever sees a
/// concrete object.
pub trait UpdatedObjectInfo<K>: Send + Sync {
    /// Produce the new object given the currently stored one.
    fn updated_object(&self, old: K) -> AppResult<K>;
}

impl<K, F> UpdatedObjectInfo<K> for F
where
    F: Fn(K) -> AppResult<K> + Send + Sync,
{
    fn updated_object(&self, old: K) -> AppResult<K> {
        self(old)
    }
}

/// Replace the stored object with the given one, as done for a `PUT`.
#[derive(Clone, Debug)]
pub struct ReplaceObject<K>(pub K);

impl<K: Clone + Send + Sync> UpdatedObjectInfo<K> for ReplaceObject<K> {
    fn updated_object(&self, _old: K) -> AppResult<K> {
        Ok(self.0.clone())
    }
}

/// Apply a JSON merge patch (RFC 7386) to the stored object, as done for a `PATCH`.
#[derive(Clone, Debug)]
pub struct MergePatch(pub Value);

impl<K: ResourceKind> UpdatedObjectInfo<K> for MergePatch {
    fn updated_object(&self, old: K) -> AppResult<K> {
        let mut doc = serde_json::to_value(&old).map_err(|err| AppError::Ise(err.into()))?;
        json_patch::merge(&mut doc, &self.0);
        serde_json::from_value(doc).map_err(|err| AppError::InvalidInput(format!("patched object is invalid: {}", err)))
    }
}

/// The contract a resource must satisfy to be served by the host.
#[async_trait]
pub trait RestStorage<K: ResourceKind>: Send + Sync {
    /// Construct an empty object of this resource.
    fn new_object(&self) -> K;

    /// Construct an empty list of this resource.
    fn new_list(&self) -> ResourceList<K>;

    /// Whether this resource is namespace scoped.
    fn namespace_scoped(&self) -> bool;

    /// The singular display name of this resource.
    fn singular_name(&self) -> &'static str;

    /// Get the object bearing the given name.
    async fn get(&self, name: &str) -> AppResult<K>;

    /// List all objects of this resource.
    async fn list(&self) -> AppResult<ResourceList<K>>;

    /// Create a new object.
    async fn create(&self, object: K) -> AppResult<K>;

    /// Update the named object, returning the new object & whether it was created.
    async fn update(&self, name: &str, info: &dyn UpdatedObjectInfo<K>) -> AppResult<(K, bool)>;

    /// Delete the named object, returning the deleted object & whether deletion was immediate.
    async fn delete(&self, name: &str) -> AppResult<(K, bool)>;

    /// Watch this resource for changes.
    async fn watch(&self) -> AppResult<WatchStream<K>>;

    /// Render the given object or list as a table.
    fn convert_to_table(&self, source: TableSource<'_, K>, options: &TableOptions) -> AppResult<Table>;
}

/// REST storage for objects of kind `K`, backed by an in-memory table.
pub struct ResourceRest<K> {
    storage: Arc<MemoryStorage<K>>,
    table_convertor: DefaultTableConvertor,
}

impl<K> Clone for ResourceRest<K> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            table_convertor: self.table_convertor.clone(),
        }
    }
}

impl<K: ResourceKind> Default for ResourceRest<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ResourceKind> ResourceRest<K> {
    /// Create a new instance backed by a fresh table.
    pub fn new() -> Self {
        Self {
            storage: Arc::new(MemoryStorage::new()),
            table_convertor: DefaultTableConvertor::new(K::group_resource()),
        }
    }

    /// The table backing this resource.
    pub fn storage(&self) -> &MemoryStorage<K> {
        &self.storage
    }
}

#[async_trait]
impl<K: ResourceKind> RestStorage<K> for ResourceRest<K> {
    fn new_object(&self) -> K {
        K::empty()
    }

    fn new_list(&self) -> ResourceList<K> {
        ResourceList::empty()
    }

    fn namespace_scoped(&self) -> bool {
        true
    }

    fn singular_name(&self) -> &'static str {
        K::SINGULAR
    }

    async fn get(&self, name: &str) -> AppResult<K> {
        self.storage.get(name).await
    }

    async fn list(&self) -> AppResult<ResourceList<K>> {
        Ok(self.storage.list().await)
    }

    async fn create(&self, object: K) -> AppResult<K> {
        self.storage.create(object).await
    }

    async fn update(&self, name: &str, info: &dyn UpdatedObjectInfo<K>) -> AppResult<(K, bool)> {
        let old = self.storage.get(name).await?;
        let mut object = info.updated_object(old)?;
        object.meta_mut().name = Some(name.to_string());
        let object = self.storage.update(object).await?;
        Ok((object, false))
    }

    async fn delete(&self, name: &str) -> AppResult<(K, bool)> {
        let object = self.storage.get(name).await?;
        self.storage.delete(name).await?;
        Ok((object, true))
    }

    async fn watch(&self) -> AppResult<WatchStream<K>> {
        Err(AppError::Unimplemented("watch".into()))
    }

    fn convert_to_table(&self, source: TableSource<'_, K>, options: &TableOptions) -> AppResult<Table> {
        self.table_convertor.convert_to_table(source, options)
    }
}
