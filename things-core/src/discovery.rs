//! API discovery documents.
//!
//! These are what clients read from `/apis`, `/apis/{group}` & `/apis/{group}/{version}` to
//! learn which resources this server provides and how they may be used.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{APIGroup, APIGroupList, APIResource, APIResourceList, GroupVersionForDiscovery};

use crate::crd::ResourceKind;
use crate::rest::RestStorage;
use crate::{API_VERSION, GROUP_NAME};

/// The verbs supported by every resource of this server.
///
/// Watch is intentionally absent, as no event stream exists.
pub const VERBS: [&str; 6] = ["create", "delete", "get", "list", "patch", "update"];

/// The `group/version` string of this server's API.
pub fn group_version() -> String {
    format!("{}/{}", GROUP_NAME, API_VERSION)
}

/// Describe a single resource served by the given REST storage.
pub fn api_resource<K: ResourceKind, R: RestStorage<K> + ?Sized>(rest: &R) -> APIResource {
    APIResource {
        kind: K::kind(&()).into_owned(),
        name: K::plural(&()).into_owned(),
        namespaced: rest.namespace_scoped(),
        singular_name: rest.singular_name().into(),
        verbs: VERBS.iter().map(|verb| verb.to_string()).collect(),
        ..Default::default()
    }
}

/// The resource list of this server's single group version.
pub fn api_resource_list(resources: Vec<APIResource>) -> APIResourceList {
    APIResourceList {
        group_version: group_version(),
        resources,
    }
}

/// The API group served by this server.
pub fn api_group() -> APIGroup {
    let version = GroupVersionForDiscovery {
        group_version: group_version(),
        version: API_VERSION.into(),
    };
    APIGroup {
        name: GROUP_NAME.into(),
        preferred_version: Some(version.clone()),
        versions: vec![version],
        ..Default::default()
    }
}

/// All API groups served by this server.
pub fn api_group_list() -> APIGroupList {
    APIGroupList { groups: vec![api_group()] }
}
