//! Gadget CRD.

use kube::{CustomResource, Resource};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ResourceKind, ACTIVE};

/// CRD spec for the Gadget resource.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, CustomResource, JsonSchema)]
#[kube(
    status = "GadgetStatus",
    group = "things.myorg.io",
    version = "v1alpha1",
    kind = "Gadget",
    namespaced,
    derive = "PartialEq",
    apiextensions = "v1",
    shortname = "gd",
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Enabled","type":"boolean","jsonPath":".spec.enabled"}"#,
    printcolumn = r#"{"name":"Priority","type":"integer","jsonPath":".spec.priority"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct GadgetSpec {
    /// The type of this gadget, e.g. `temperature-sensor`.
    #[serde(default)]
    pub r#type: String,
    /// The version of this gadget.
    #[serde(default)]
    pub version: String,
    /// Whether this gadget is enabled.
    #[serde(default)]
    pub enabled: bool,
    /// The priority of this gadget.
    #[serde(default)]
    pub priority: i32,
}

/// CRD status object.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
pub struct GadgetStatus {
    /// The current state of this gadget, `Active` once created.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state: String,
}

impl ResourceKind for Gadget {
    const SINGULAR: &'static str = "gadget";

    fn empty() -> Self {
        let mut object = Self::new("", GadgetSpec::default());
        object.metadata.name = None;
        object
    }

    fn mark_active(&mut self) {
        self.status.get_or_insert_with(Default::default).state = ACTIVE.into();
    }

    fn stamp_type_meta(&mut self) {
        self.api_version = Self::api_version(&()).into_owned();
        self.kind = Self::kind(&()).into_owned();
    }
}
