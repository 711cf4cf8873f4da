//! Widget CRD.

use kube::{CustomResource, Resource};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ResourceKind, ACTIVE};

/// CRD spec for the Widget resource.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, CustomResource, JsonSchema)]
#[kube(
    status = "WidgetStatus",
    group = "things.myorg.io",
    version = "v1alpha1",
    kind = "Widget",
    namespaced,
    derive = "PartialEq",
    apiextensions = "v1",
    shortname = "wd",
    printcolumn = r#"{"name":"Size","type":"integer","jsonPath":".spec.size"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSpec {
    /// The display name of this widget.
    #[serde(default)]
    pub name: String,
    /// A free-form description of this widget.
    #[serde(default)]
    pub description: String,
    /// The size of this widget.
    #[serde(default)]
    pub size: i32,
}

/// CRD status object.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
pub struct WidgetStatus {
    /// The lifecycle phase of this widget, `Active` once created.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phase: String,
}

impl ResourceKind for Widget {
    const SINGULAR: &'static str = "widget";

    fn empty() -> Self {
        let mut object = Self::new("", WidgetSpec::default());
        object.metadata.name = None;
        object
    }

    fn mark_active(&mut self) {
        self.status.get_or_insert_with(Default::default).phase = ACTIVE.into();
    }

    fn stamp_type_meta(&mut self) {
        self.api_version = Self::api_version(&()).into_owned();
        self.kind = Self::kind(&()).into_owned();
    }
}
