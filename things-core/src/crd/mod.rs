//! Widget & Gadget CRDs.
//!
//! References:
//! - https://kubernetes.io/docs/tasks/extend-kubernetes/custom-resources/custom-resource-definitions/
//! - https://kubernetes.io/docs/tasks/extend-kubernetes/configure-aggregation-layer/

mod gadget;
mod widget;

use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ListMeta;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use gadget::{Gadget, GadgetSpec, GadgetStatus};
pub use widget::{Widget, WidgetSpec, WidgetStatus};

/// The status value stamped onto every object when it is created.
pub const ACTIVE: &str = "Active";

/// A group/resource pair, e.g. `widgets.things.myorg.io`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupResource {
    /// The API group of the resource.
    pub group: String,
    /// The plural resource name.
    pub resource: String,
}

impl GroupResource {
    /// Create a new instance.
    pub fn new(group: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for GroupResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.resource)
        } else {
            write!(f, "{}.{}", self.resource, self.group)
        }
    }
}

/// The per-kind descriptor which the storage & REST layers are generic over.
///
/// Everything else a kind needs (group, version, kind, plural, metadata access) comes from
/// the `kube::Resource` impl generated by the `CustomResource` derive.
pub trait ResourceKind: Resource<DynamicType = ()> + Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The lower-case singular name of this kind.
    const SINGULAR: &'static str;

    /// Construct an empty object of this kind.
    fn empty() -> Self;

    /// Set this object's server managed status to the `Active` sentinel.
    fn mark_active(&mut self);

    /// Overwrite this object's `apiVersion` & `kind` with those of its kind.
    fn stamp_type_meta(&mut self);

    /// The group/resource identifier of this kind.
    fn group_resource() -> GroupResource {
        GroupResource::new(Self::group(&()), Self::plural(&()))
    }
}

/// A convenience trait built around the fact that all implementors
/// must have the following attributes.
pub trait RequiredMetadata {
    /// The namespace of this object.
    fn namespace(&self) -> &str;

    /// The name of this object.
    fn name(&self) -> &str;
}

impl<K: ResourceKind> RequiredMetadata for K {
    fn namespace(&self) -> &str {
        self.meta().namespace.as_deref().unwrap_or_default()
    }

    fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }
}

/// A list of objects of a single kind, e.g. a `WidgetList`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceList<K> {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ListMeta,
    pub items: Vec<K>,
}

impl<K: ResourceKind> ResourceList<K> {
    /// Create a new list from the given items.
    pub fn new(items: Vec<K>, resource_version: Option<String>) -> Self {
        Self {
            api_version: K::api_version(&()).into_owned(),
            kind: format!("{}List", K::kind(&())),
            metadata: ListMeta {
                resource_version,
                ..Default::default()
            },
            items,
        }
    }

    /// Create an empty list.
    pub fn empty() -> Self {
        Self::new(vec![], None)
    }
}
