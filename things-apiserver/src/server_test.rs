use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::server::router;
use things_core::rest::{GadgetRest, WidgetRest};

const WIDGETS: &str = "/apis/things.myorg.io/v1alpha1/namespaces/default/widgets";
const GADGETS: &str = "/apis/things.myorg.io/v1alpha1/namespaces/default/gadgets";

/// A client of an API server backed by fresh tables.
#[derive(Default)]
struct Client {
    widgets: WidgetRest,
    gadgets: GadgetRest,
}

impl Client {
    async fn send(&self, method: Method, uri: &str, accept: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(accept) = accept {
            req = req.header(header::ACCEPT, accept);
        }
        let req = match body {
            Some(body) => req.header(header::CONTENT_TYPE, "application/json").body(Body::from(body.to_string()))?,
            None => req.body(Body::empty())?,
        };

        let res = router(self.widgets.clone(), self.gadgets.clone()).oneshot(req).await?;

        let status = res.status();
        let bytes = hyper::body::to_bytes(res.into_body()).await?;
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).context("error decoding response body")? };
        Ok((status, body))
    }

    async fn get(&self, uri: &str) -> Result<(StatusCode, Value)> {
        self.send(Method::GET, uri, None, None).await
    }
}

fn widget_body(name: &str, size: i32) -> Value {
    json!({
        "apiVersion": "things.myorg.io/v1alpha1",
        "kind": "Widget",
        "metadata": {"name": name},
        "spec": {"name": "Main Control Widget", "description": "Primary control interface", "size": size},
    })
}

#[tokio::test]
async fn root_and_health() -> Result<()> {
    let client = Client::default();

    let (status, body) = client.get("/").await?;
    assert_eq!(status, StatusCode::OK, "unexpected status for root");
    assert_eq!(body, json!({"paths": ["/api", "/apis"]}), "unexpected root body");

    let (status, _) = client.get("/health").await?;
    assert_eq!(status, StatusCode::OK, "unexpected status for health");
    Ok(())
}

#[tokio::test]
async fn discovery_documents() -> Result<()> {
    let client = Client::default();

    let (status, body) = client.get("/apis").await?;
    assert_eq!(status, StatusCode::OK, "unexpected status for group list");
    assert_eq!(body["groups"][0]["name"], "things.myorg.io", "unexpected group list {}", body);

    let (status, body) = client.get("/apis/things.myorg.io").await?;
    assert_eq!(status, StatusCode::OK, "unexpected status for group");
    assert_eq!(body["preferredVersion"]["groupVersion"], "things.myorg.io/v1alpha1", "unexpected group {}", body);

    let (status, body) = client.get("/apis/things.myorg.io/v1alpha1").await?;
    assert_eq!(status, StatusCode::OK, "unexpected status for resource list");
    assert_eq!(body["groupVersion"], "things.myorg.io/v1alpha1", "unexpected resource list {}", body);
    let names: Vec<_> = body["resources"]
        .as_array()
        .context("expected a resources array")?
        .iter()
        .filter_map(|res| res["name"].as_str())
        .collect();
    assert_eq!(names, vec!["widgets", "gadgets"], "unexpected resources");
    Ok(())
}

#[tokio::test]
async fn widget_crud_over_http() -> Result<()> {
    let client = Client::default();
    let uri = format!("{}/w1", WIDGETS);

    let (status, created) = client.send(Method::POST, WIDGETS, None, Some(widget_body("w1", 42))).await?;
    assert_eq!(status, StatusCode::CREATED, "unexpected create status, body {}", created);
    assert_eq!(created["metadata"]["namespace"], "default", "expected namespace to default to the path namespace");
    assert_eq!(created["status"]["phase"], "Active", "expected an Active phase");
    assert_eq!(created["metadata"]["resourceVersion"], "1", "expected the first version of the table");

    let (status, fetched) = client.get(&uri).await?;
    assert_eq!(status, StatusCode::OK, "unexpected get status");
    assert_eq!(fetched, created, "expected get to return the created object");

    let mut desired = fetched.clone();
    desired["spec"]["size"] = json!(100);
    let (status, updated) = client.send(Method::PUT, &uri, None, Some(desired)).await?;
    assert_eq!(status, StatusCode::OK, "unexpected update status, body {}", updated);
    assert_eq!(updated["spec"]["size"], 100, "expected updated size");
    assert_eq!(updated["metadata"]["uid"], created["metadata"]["uid"], "expected UID to be preserved");
    assert_ne!(updated["metadata"]["resourceVersion"], created["metadata"]["resourceVersion"], "expected a new version");

    let (status, patched) = client.send(Method::PATCH, &uri, None, Some(json!({"spec": {"description": "patched"}}))).await?;
    assert_eq!(status, StatusCode::OK, "unexpected patch status, body {}", patched);
    assert_eq!(patched["spec"]["description"], "patched", "expected patched description");
    assert_eq!(patched["spec"]["size"], 100, "expected unpatched size to remain");

    let (status, deleted) = client.send(Method::DELETE, &uri, None, None).await?;
    assert_eq!(status, StatusCode::OK, "unexpected delete status");
    assert_eq!(deleted, patched, "expected delete to return the last stored object");

    let (status, body) = client.get(&uri).await?;
    assert_eq!(status, StatusCode::NOT_FOUND, "expected NotFound after delete");
    assert_eq!(body["kind"], "Status", "expected a Status object, got {}", body);
    assert_eq!(body["reason"], "NotFound", "unexpected reason in {}", body);
    assert_eq!(body["message"], "widgets.things.myorg.io \"w1\" not found", "unexpected message in {}", body);
    Ok(())
}

#[tokio::test]
async fn create_generates_missing_name() -> Result<()> {
    let client = Client::default();

    let (status, created) = client.send(Method::POST, GADGETS, None, Some(json!({"spec": {"type": "sensor"}}))).await?;

    assert_eq!(status, StatusCode::CREATED, "unexpected create status, body {}", created);
    let name = created["metadata"]["name"].as_str().context("expected a generated name")?;
    assert!(!name.is_empty(), "expected a non-empty generated name");
    assert_eq!(created["kind"], "Gadget", "unexpected kind");
    assert_eq!(created["status"]["state"], "Active", "expected an Active state");
    Ok(())
}

#[tokio::test]
async fn create_rejects_bad_input() -> Result<()> {
    let client = Client::default();

    let mut body = widget_body("w1", 1);
    body["metadata"]["namespace"] = json!("other");
    let (status, _) = client.send(Method::POST, WIDGETS, None, Some(body)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "expected namespace mismatch to be rejected");

    let (status, _) = client.send(Method::POST, WIDGETS, None, Some(json!({"spec": {"size": "huge"}}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "expected an invalid spec to be rejected");

    let (status, _) = client.send(Method::POST, WIDGETS, None, Some(json!(["not", "an", "object"]))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "expected a non-object body to be rejected");

    let (status, list) = client.get(WIDGETS).await?;
    assert_eq!(status, StatusCode::OK, "unexpected list status");
    assert_eq!(list["items"], json!([]), "expected no widgets to be stored");
    Ok(())
}

#[tokio::test]
async fn create_duplicate_conflicts() -> Result<()> {
    let client = Client::default();
    client.send(Method::POST, WIDGETS, None, Some(widget_body("w1", 1))).await?;

    let (status, body) = client.send(Method::POST, WIDGETS, None, Some(widget_body("w1", 2))).await?;

    assert_eq!(status, StatusCode::CONFLICT, "expected a conflict, body {}", body);
    assert_eq!(body["reason"], "AlreadyExists", "unexpected reason in {}", body);
    assert_eq!(body["details"]["name"], "w1", "unexpected details in {}", body);
    Ok(())
}

#[tokio::test]
async fn update_absent_is_not_found() -> Result<()> {
    let client = Client::default();

    let (status, _) = client.send(Method::PUT, &format!("{}/ghost", WIDGETS), None, Some(widget_body("ghost", 1))).await?;
    assert_eq!(status, StatusCode::NOT_FOUND, "expected update of an absent widget to fail");

    let (status, _) = client.send(Method::DELETE, &format!("{}/ghost", GADGETS), None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND, "expected delete of an absent gadget to fail");
    Ok(())
}

#[tokio::test]
async fn lists_are_per_kind() -> Result<()> {
    let client = Client::default();
    for name in ["sensor-1", "sensor-2", "actuator-1"] {
        let (status, _) = client.send(Method::POST, GADGETS, None, Some(json!({"metadata": {"name": name}, "spec": {}}))).await?;
        assert_eq!(status, StatusCode::CREATED, "unexpected create status for {}", name);
    }
    client.send(Method::POST, WIDGETS, None, Some(widget_body("w1", 1))).await?;

    let (status, gadgets) = client.get("/apis/things.myorg.io/v1alpha1/gadgets").await?;
    assert_eq!(status, StatusCode::OK, "unexpected cluster-wide list status");
    assert_eq!(gadgets["kind"], "GadgetList", "unexpected list kind");
    assert_eq!(gadgets["items"].as_array().map(Vec::len), Some(3), "expected three gadgets");
    assert_eq!(gadgets["metadata"]["resourceVersion"], "3", "expected list version to be the last issued");

    let (status, widgets) = client.get(WIDGETS).await?;
    assert_eq!(status, StatusCode::OK, "unexpected namespaced list status");
    assert_eq!(widgets["items"].as_array().map(Vec::len), Some(1), "expected one widget");
    Ok(())
}

#[tokio::test]
async fn watch_is_not_implemented() -> Result<()> {
    let client = Client::default();

    let (status, body) = client.get(&format!("{}?watch=true", WIDGETS)).await?;

    assert_eq!(status, StatusCode::NOT_IMPLEMENTED, "expected watch to be unimplemented, body {}", body);
    assert_eq!(body["message"], "watch not implemented", "unexpected message in {}", body);
    Ok(())
}

#[tokio::test]
async fn table_rendering_is_negotiated() -> Result<()> {
    let client = Client::default();
    client.send(Method::POST, WIDGETS, None, Some(widget_body("w1", 1))).await?;
    let accept = "application/json;as=Table;v=v1;g=meta.k8s.io,application/json";

    let (status, table) = client.send(Method::GET, WIDGETS, Some(accept), None).await?;
    assert_eq!(status, StatusCode::OK, "unexpected status for table list");
    assert_eq!(table["kind"], "Table", "expected a table, got {}", table);
    assert_eq!(table["columnDefinitions"][0]["name"], "Name", "unexpected first column in {}", table);
    assert_eq!(table["rows"][0]["cells"][0], "w1", "unexpected first cell in {}", table);

    let (status, table) = client.send(Method::GET, &format!("{}/w1?noHeaders=true", WIDGETS), Some(accept), None).await?;
    assert_eq!(status, StatusCode::OK, "unexpected status for table get");
    assert!(table.get("columnDefinitions").map(|cols| cols == &json!([])).unwrap_or(true), "expected no column definitions in {}", table);
    assert_eq!(table["rows"].as_array().map(Vec::len), Some(1), "expected a single row in {}", table);
    Ok(())
}

#[tokio::test]
async fn create_rejects_foreign_type_meta() -> Result<()> {
    let client = Client::default();

    let mut body = widget_body("w1", 1);
    body["kind"] = json!("Gadget");
    let (status, res) = client.send(Method::POST, WIDGETS, None, Some(body)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "expected a foreign kind to be rejected, body {}", res);

    let mut body = widget_body("w1", 1);
    body["apiVersion"] = json!("other.io/v9");
    let (status, res) = client.send(Method::POST, WIDGETS, None, Some(body)).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "expected a foreign apiVersion to be rejected, body {}", res);

    let (_, list) = client.get(WIDGETS).await?;
    assert_eq!(list["items"], json!([]), "expected no widgets to be stored");
    Ok(())
}

#[tokio::test]
async fn patch_cannot_rewrite_type_meta() -> Result<()> {
    let client = Client::default();
    let uri = format!("{}/w1", WIDGETS);
    client.send(Method::POST, WIDGETS, None, Some(widget_body("w1", 1))).await?;

    let (status, patched) = client
        .send(Method::PATCH, &uri, None, Some(json!({"kind": "Bogus", "apiVersion": "other.io/v9", "spec": {"size": 2}})))
        .await?;

    assert_eq!(status, StatusCode::OK, "unexpected patch status, body {}", patched);
    assert_eq!(patched["kind"], "Widget", "expected kind to remain Widget, got {}", patched);
    assert_eq!(patched["apiVersion"], "things.myorg.io/v1alpha1", "expected apiVersion to remain, got {}", patched);
    assert_eq!(patched["spec"]["size"], 2, "expected the rest of the patch to apply");
    let (_, fetched) = client.get(&uri).await?;
    assert_eq!(fetched["kind"], "Widget", "expected the stored kind to remain Widget, got {}", fetched);
    Ok(())
}
