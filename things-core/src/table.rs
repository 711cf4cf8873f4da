//! Tabular rendering of objects, as requested by `kubectl get`.
//!
//! Clients ask for a table by sending `Accept: application/json;as=Table;v=v1;g=meta.k8s.io`.
//! The default convertor renders a `Name` & `Created At` column for any kind.

use chrono::SecondsFormat;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ListMeta;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crd::{GroupResource, RequiredMetadata, ResourceKind, ResourceList};
use crate::error::{AppError, AppResult};

/// The API version of the table envelope.
pub const TABLE_API_VERSION: &str = "meta.k8s.io/v1";
/// The kind of the table envelope.
pub const TABLE_KIND: &str = "Table";

/// The source of a table conversion, either a single object or a list.
#[derive(Debug)]
pub enum TableSource<'a, K> {
    Object(&'a K),
    List(&'a ResourceList<K>),
}

/// Options controlling table rendering.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableOptions {
    /// Omit the column definitions from the rendered table.
    #[serde(default)]
    pub no_headers: bool,
}

/// A tabular rendering of one or more objects.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ListMeta,
    #[serde(default)]
    pub column_definitions: Vec<TableColumnDefinition>,
    pub rows: Vec<TableRow>,
}

/// The definition of a single table column.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableColumnDefinition {
    pub name: String,
    pub r#type: String,
    pub format: String,
    pub description: String,
    pub priority: i32,
}

/// A single table row, one per object.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    pub cells: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,
}

/// The table convertor used for resources without bespoke printers.
#[derive(Clone, Debug)]
pub struct DefaultTableConvertor {
    resource: GroupResource,
}

impl DefaultTableConvertor {
    /// Create a new instance for the given group/resource.
    pub fn new(resource: GroupResource) -> Self {
        Self { resource }
    }

    /// Render the given object or list as a table.
    pub fn convert_to_table<K: ResourceKind>(&self, source: TableSource<'_, K>, options: &TableOptions) -> AppResult<Table> {
        let (objects, metadata): (Vec<&K>, ListMeta) = match source {
            TableSource::Object(object) => (
                vec![object],
                ListMeta {
                    resource_version: object.meta().resource_version.clone(),
                    ..Default::default()
                },
            ),
            TableSource::List(list) => (list.items.iter().collect(), list.metadata.clone()),
        };

        let rows = objects
            .into_iter()
            .map(|object| -> AppResult<TableRow> {
                let created_at = object
                    .meta()
                    .creation_timestamp
                    .as_ref()
                    .map(|ts| ts.0.to_rfc3339_opts(SecondsFormat::Secs, true))
                    .unwrap_or_default();
                let name = Value::from(object.name());
                let raw = serde_json::to_value(object).map_err(|err| AppError::Ise(err.into()))?;
                Ok(TableRow {
                    cells: vec![name, Value::from(created_at)],
                    object: Some(raw),
                })
            })
            .collect::<AppResult<Vec<_>>>()?;
        tracing::trace!(resource = %self.resource, rows = rows.len(), "converted objects to table");

        let column_definitions = if options.no_headers { vec![] } else { default_columns() };
        Ok(Table {
            api_version: TABLE_API_VERSION.into(),
            kind: TABLE_KIND.into(),
            metadata,
            column_definitions,
            rows,
        })
    }
}

fn default_columns() -> Vec<TableColumnDefinition> {
    vec![
        TableColumnDefinition {
            name: "Name".into(),
            r#type: "string".into(),
            format: "name".into(),
            description: "Name must be unique within a namespace.".into(),
            priority: 0,
        },
        TableColumnDefinition {
            name: "Created At".into(),
            r#type: "date".into(),
            format: String::new(),
            description: "CreationTimestamp is a timestamp representing the server time when this object was created.".into(),
            priority: 0,
        },
    ]
}
