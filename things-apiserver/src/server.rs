//! The HTTP API server.
//!
//! Routes follow the Kubernetes API conventions for the `things.myorg.io/v1alpha1` group
//! version: discovery documents at `/apis/...`, and per-resource collection & object
//! endpoints under `/apis/things.myorg.io/v1alpha1/namespaces/{namespace}/{plural}`.

mod prom;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{Extension, Path, Query};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::get;
use axum::{AddExtensionLayer, Json, Router};
use kube::Resource;
use serde_json::{json, Map, Value};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::{json_response, ApiResponse, AppError, AppErrorExt};
use things_core::crd::{Gadget, RequiredMetadata, ResourceKind, Widget};
use things_core::discovery;
use things_core::rest::{GadgetRest, MergePatch, ReplaceObject, ResourceRest, RestStorage, WidgetRest};
use things_core::table::{TableOptions, TableSource};
use things_core::{AppResult, API_VERSION, GROUP_NAME};

pub use prom::spawn_prom_server;

const METRIC_API_REQUESTS: &str = "things_api_requests_total";
const METRIC_OBJECTS: &str = "things_objects";

/// The API server hosting all resources of this group.
pub struct ApiServer {
    /// The application's runtime config.
    config: Arc<Config>,
    /// REST storage for widgets.
    widgets: WidgetRest,
    /// REST storage for gadgets.
    gadgets: GadgetRest,

    /// A channel used for triggering graceful shutdown.
    shutdown: broadcast::Sender<()>,
}

impl ApiServer {
    /// Create a new instance.
    pub fn new(config: Arc<Config>, widgets: WidgetRest, gadgets: GadgetRest, shutdown: broadcast::Sender<()>) -> Self {
        metrics::register_counter!(METRIC_API_REQUESTS, metrics::Unit::Count, "API requests handled, by resource, verb & response code");
        metrics::register_gauge!(METRIC_OBJECTS, metrics::Unit::Count, "objects currently stored, by resource");
        Self {
            config,
            widgets,
            gadgets,
            shutdown,
        }
    }

    /// Spawn the HTTP server, which runs until the shutdown signal is received.
    pub fn spawn(self) -> JoinHandle<Result<()>> {
        let mut shutdown = self.shutdown.subscribe();
        let app = router(self.widgets, self.gadgets);
        let server = axum::Server::bind(&([0, 0, 0, 0], self.config.http_port).into())
            .serve(app.into_make_service())
            .with_graceful_shutdown(async move {
                let _res = shutdown.recv().await;
            });
        tracing::info!("API server is listening at 0.0.0.0:{}", self.config.http_port);
        let shutdown_tx = self.shutdown.clone();
        tokio::spawn(async move {
            let res = server.await.map_err(anyhow::Error::from);
            if let Err(err) = &res {
                tracing::error!(error = ?err, "error from API server, shutting down");
                let _res = shutdown_tx.send(());
            }
            res
        })
    }
}

/// The path prefix of this server's group version.
fn group_version_path() -> String {
    format!("/apis/{}/{}", GROUP_NAME, API_VERSION)
}

/// Add the collection & object routes of the given kind to the router.
macro_rules! resource_routes {
    ($router:expr, $kind:ty) => {{
        let plural = <$kind as Resource>::plural(&()).into_owned();
        let base = group_version_path();
        $router
            .route(&format!("{}/{}", base, plural), get(list_objects::<$kind>))
            .route(
                &format!("{}/namespaces/:namespace/{}", base, plural),
                get(list_namespaced_objects::<$kind>).post(create_object::<$kind>),
            )
            .route(
                &format!("{}/namespaces/:namespace/{}/:name", base, plural),
                get(get_object::<$kind>)
                    .put(replace_object::<$kind>)
                    .patch(patch_object::<$kind>)
                    .delete(delete_object::<$kind>),
            )
    }};
}

/// Build the router of the API server.
pub fn router(widgets: WidgetRest, gadgets: GadgetRest) -> Router {
    let router = Router::new()
        .route("/", get(root))
        .route("/health", get(|| async { StatusCode::OK }))
        .route("/apis", get(group_list))
        .route(&format!("/apis/{}", GROUP_NAME), get(group))
        .route(&group_version_path(), get(resource_list));
    let router = resource_routes!(router, Widget);
    let router = resource_routes!(router, Gadget);
    router
        .layer(AddExtensionLayer::new(widgets))
        .layer(AddExtensionLayer::new(gadgets))
}

async fn root() -> ApiResponse {
    (StatusCode::OK, Json(json!({"paths": ["/api", "/apis"]})))
}

async fn group_list() -> ApiResponse {
    json_response(StatusCode::OK, &discovery::api_group_list())
}

async fn group() -> ApiResponse {
    json_response(StatusCode::OK, &discovery::api_group())
}

async fn resource_list(Extension(widgets): Extension<WidgetRest>, Extension(gadgets): Extension<GadgetRest>) -> ApiResponse {
    let resources = vec![discovery::api_resource(&widgets), discovery::api_resource(&gadgets)];
    json_response(StatusCode::OK, &discovery::api_resource_list(resources))
}

#[tracing::instrument(level = "debug", skip(rest, headers))]
async fn list_objects<K: ResourceKind>(rest: Extension<ResourceRest<K>>, query: Query<HashMap<String, String>>, headers: HeaderMap) -> ApiResponse {
    let Extension(rest) = rest;
    let res = list(&rest, &query.0, &headers).await;
    record::<K>("list", &res);
    res
}

#[tracing::instrument(level = "debug", skip(rest, headers))]
async fn list_namespaced_objects<K: ResourceKind>(
    rest: Extension<ResourceRest<K>>, _path: Path<String>, query: Query<HashMap<String, String>>, headers: HeaderMap,
) -> ApiResponse {
    let Extension(rest) = rest;
    // Namespaces are accepted but do not partition storage.
    let res = list(&rest, &query.0, &headers).await;
    record::<K>("list", &res);
    res
}

async fn list<K: ResourceKind>(rest: &ResourceRest<K>, query: &HashMap<String, String>, headers: &HeaderMap) -> ApiResponse {
    if is_flag_set(query, "watch") {
        return match rest.watch().await {
            Ok(_) => AppError::Unimplemented("watch".into()).into_response(),
            Err(err) => err.into_response(),
        };
    }
    let list = match rest.list().await {
        Ok(list) => list,
        Err(err) => return err.into_response(),
    };
    match table_options(headers, query) {
        Some(opts) => match rest.convert_to_table(TableSource::List(&list), &opts) {
            Ok(table) => json_response(StatusCode::OK, &table),
            Err(err) => err.into_response(),
        },
        None => json_response(StatusCode::OK, &list),
    }
}

#[tracing::instrument(level = "debug", skip(rest, body))]
async fn create_object<K: ResourceKind>(rest: Extension<ResourceRest<K>>, path: Path<String>, body: Bytes) -> ApiResponse {
    let Extension(rest) = rest;
    let Path(namespace) = path;
    let res = match decode_object::<K>(&body, &namespace) {
        Ok(object) => match rest.create(object).await {
            Ok(created) => json_response(StatusCode::CREATED, &created),
            Err(err) => err.into_response(),
        },
        Err(err) => err.into_response(),
    };
    record::<K>("create", &res);
    observe_count(&rest).await;
    res
}

#[tracing::instrument(level = "debug", skip(rest, headers))]
async fn get_object<K: ResourceKind>(
    rest: Extension<ResourceRest<K>>, path: Path<(String, String)>, query: Query<HashMap<String, String>>, headers: HeaderMap,
) -> ApiResponse {
    let Extension(rest) = rest;
    let Path((_namespace, name)) = path;
    let res = match rest.get(&name).await {
        Ok(object) => match table_options(&headers, &query.0) {
            Some(opts) => match rest.convert_to_table(TableSource::Object(&object), &opts) {
                Ok(table) => json_response(StatusCode::OK, &table),
                Err(err) => err.into_response(),
            },
            None => json_response(StatusCode::OK, &object),
        },
        Err(err) => err.into_response(),
    };
    record::<K>("get", &res);
    res
}

#[tracing::instrument(level = "debug", skip(rest, body))]
async fn replace_object<K: ResourceKind>(rest: Extension<ResourceRest<K>>, path: Path<(String, String)>, body: Bytes) -> ApiResponse {
    let Extension(rest) = rest;
    let Path((namespace, name)) = path;
    let res = match decode_object::<K>(&body, &namespace) {
        Ok(object) => update_response(rest.update(&name, &ReplaceObject(object)).await),
        Err(err) => err.into_response(),
    };
    record::<K>("update", &res);
    res
}

#[tracing::instrument(level = "debug", skip(rest, body))]
async fn patch_object<K: ResourceKind>(rest: Extension<ResourceRest<K>>, path: Path<(String, String)>, body: Bytes) -> ApiResponse {
    let Extension(rest) = rest;
    let Path((_namespace, name)) = path;
    let res = match serde_json::from_slice::<Value>(&body) {
        Ok(patch) => update_response(rest.update(&name, &MergePatch(patch)).await),
        Err(err) => AppError::InvalidInput(format!("invalid merge patch: {}", err)).into_response(),
    };
    record::<K>("patch", &res);
    res
}

#[tracing::instrument(level = "debug", skip(rest))]
async fn delete_object<K: ResourceKind>(rest: Extension<ResourceRest<K>>, path: Path<(String, String)>) -> ApiResponse {
    let Extension(rest) = rest;
    let Path((_namespace, name)) = path;
    let res = match rest.delete(&name).await {
        Ok((deleted, _)) => json_response(StatusCode::OK, &deleted),
        Err(err) => err.into_response(),
    };
    record::<K>("delete", &res);
    observe_count(&rest).await;
    res
}

fn update_response<K: ResourceKind>(res: AppResult<(K, bool)>) -> ApiResponse {
    match res {
        Ok((object, true)) => json_response(StatusCode::CREATED, &object),
        Ok((object, false)) => json_response(StatusCode::OK, &object),
        Err(err) => err.into_response(),
    }
}

/// Decode an object of kind `K` from a request body.
///
/// The body's `apiVersion` & `kind` must be those of `K` when given. The body's namespace
/// defaults to the namespace of the request path, and must match it when given.
fn decode_object<K: ResourceKind>(body: &[u8], namespace: &str) -> AppResult<K> {
    let mut doc: Map<String, Value> = serde_json::from_slice(body).map_err(|err| AppError::InvalidInput(format!("invalid request body: {}", err)))?;
    for (field, expected) in [("apiVersion", K::api_version(&())), ("kind", K::kind(&()))] {
        match doc.get(field).and_then(Value::as_str) {
            Some(given) if !given.is_empty() && given != expected => {
                return Err(AppError::InvalidInput(format!("{} {:?} does not match the expected value {:?}", field, given, expected)));
            }
            _ => {
                doc.insert(field.into(), Value::from(expected.into_owned()));
            }
        }
    }
    let metadata = doc.entry("metadata").or_insert_with(|| json!({}));
    if metadata.is_null() {
        *metadata = json!({});
    }

    let mut object: K = serde_json::from_value(Value::Object(doc)).map_err(|err| AppError::InvalidInput(format!("invalid {}: {}", K::SINGULAR, err)))?;
    let object_namespace = object.namespace().to_string();
    if object_namespace.is_empty() {
        object.meta_mut().namespace = Some(namespace.to_string());
    } else if object_namespace != namespace {
        return Err(AppError::InvalidInput(format!(
            "the namespace of the provided object ({}) does not match the namespace of the request ({})",
            object_namespace, namespace
        )));
    }
    Ok(object)
}

/// Get the table options of the request, if a table rendering was requested.
fn table_options(headers: &HeaderMap, query: &HashMap<String, String>) -> Option<TableOptions> {
    let accept = headers.get(header::ACCEPT).and_then(|val| val.to_str().ok()).unwrap_or_default();
    if !accept.split(',').any(|media| media.split(';').any(|param| param.trim() == "as=Table")) {
        return None;
    }
    Some(TableOptions {
        no_headers: is_flag_set(query, "noHeaders"),
    })
}

fn is_flag_set(query: &HashMap<String, String>, key: &str) -> bool {
    matches!(query.get(key).map(|val| val.as_str()), Some("true") | Some("1"))
}

/// Record a handled request.
fn record<K: ResourceKind>(verb: &'static str, res: &ApiResponse) {
    metrics::increment_counter!(
        METRIC_API_REQUESTS,
        "resource" => K::plural(&()).into_owned(),
        "verb" => verb,
        "code" => res.0.as_u16().to_string()
    );
}

/// Record the number of objects currently stored for kind `K`.
async fn observe_count<K: ResourceKind>(rest: &ResourceRest<K>) {
    let count = rest.storage().len().await;
    metrics::gauge!(METRIC_OBJECTS, count as f64, "resource" => K::plural(&()).into_owned());
}
