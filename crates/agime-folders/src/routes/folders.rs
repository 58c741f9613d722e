//! Folders API

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{FolderError, FolderResult};
use crate::models::{
    BuildWarning, CreateFolderRequest, CriteriaExpression, FolderRecord, FolderTree,
    FolderTreeView, UpdateFolderRequest,
};
use crate::services::{
    EffectivePermissions, ETag, FolderMembers, FolderService, MatchSummary,
};

#[derive(Debug, Serialize)]
pub struct FolderTreeResponse {
    pub root: FolderTreeView,
    pub warnings: Vec<BuildWarning>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    #[serde(default)]
    pub parent_id: Option<String>,
    pub criteria: CriteriaExpression,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub scheduled: usize,
}

pub fn folder_routes() -> Router<Arc<FolderService>> {
    Router::new()
        .route("/folders", post(create_folder))
        .route("/folders/tree", get(get_folder_tree))
        .route("/folders/preview", post(preview_criteria))
        .route("/folders/refresh", post(documents_changed))
        .route(
            "/folders/{folder_id}",
            get(get_folder).put(update_folder).delete(delete_folder),
        )
        .route("/folders/{folder_id}/permissions", get(get_permissions))
        .route("/folders/{folder_id}/members", get(get_members))
}

/// Expected ETag from `If-Match`; `*` or no header means unconditional
fn if_match(headers: &HeaderMap) -> FolderResult<Option<ETag>> {
    let Some(value) = headers.get(header::IF_MATCH) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| FolderError::Validation("If-Match header is not valid text".to_string()))?;
    if value.trim() == "*" {
        return Ok(None);
    }
    ETag::parse(value)
        .map(Some)
        .ok_or_else(|| FolderError::Validation(format!("Invalid If-Match header: {}", value)))
}

fn with_etag(status: StatusCode, record: FolderRecord) -> impl IntoResponse {
    let etag = ETag::for_record(&record);
    (status, [(header::ETAG, etag.to_string())], Json(record))
}

async fn get_folder_tree(
    State(service): State<Arc<FolderService>>,
) -> FolderResult<Json<FolderTreeResponse>> {
    let build = service.get_tree().await?;
    Ok(Json(FolderTreeResponse {
        root: build.tree.view(FolderTree::ROOT),
        warnings: build.warnings,
    }))
}

async fn get_folder(
    State(service): State<Arc<FolderService>>,
    Path(folder_id): Path<String>,
) -> FolderResult<impl IntoResponse> {
    let record = service.get_folder(&folder_id).await?;
    Ok(with_etag(StatusCode::OK, record))
}

async fn get_permissions(
    State(service): State<Arc<FolderService>>,
    Path(folder_id): Path<String>,
) -> FolderResult<Json<EffectivePermissions>> {
    Ok(Json(service.get_effective_permissions(&folder_id).await?))
}

async fn get_members(
    State(service): State<Arc<FolderService>>,
    Path(folder_id): Path<String>,
) -> FolderResult<Json<FolderMembers>> {
    Ok(Json(service.get_folder_members(&folder_id).await?))
}

async fn create_folder(
    State(service): State<Arc<FolderService>>,
    Json(req): Json<CreateFolderRequest>,
) -> FolderResult<impl IntoResponse> {
    let record = service.create_folder(req).await?;
    Ok(with_etag(StatusCode::CREATED, record))
}

async fn update_folder(
    State(service): State<Arc<FolderService>>,
    Path(folder_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<UpdateFolderRequest>,
) -> FolderResult<impl IntoResponse> {
    let expected = if_match(&headers)?;
    let record = service.update_folder(&folder_id, req, expected).await?;
    Ok(with_etag(StatusCode::OK, record))
}

async fn delete_folder(
    State(service): State<Arc<FolderService>>,
    Path(folder_id): Path<String>,
    headers: HeaderMap,
) -> FolderResult<StatusCode> {
    let expected = if_match(&headers)?;
    service.delete_folder(&folder_id, expected).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn preview_criteria(
    State(service): State<Arc<FolderService>>,
    Json(req): Json<PreviewRequest>,
) -> FolderResult<Json<MatchSummary>> {
    let summary = service
        .preview_criteria(req.parent_id.as_deref(), &req.criteria)
        .await?;
    Ok(Json(summary))
}

async fn documents_changed(
    State(service): State<Arc<FolderService>>,
) -> FolderResult<Json<RefreshResponse>> {
    let scheduled = service.notify_documents_changed().await?;
    Ok(Json(RefreshResponse { scheduled }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FolderConfig;
    use crate::models::{DocumentDescriptor, PermissionSet};
    use crate::routes::router;
    use crate::store::{MemoryDocumentStore, MemoryFolderStore};
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app(records: Vec<FolderRecord>) -> Router {
        let folders = Arc::new(MemoryFolderStore::with_records(records));
        let documents = Arc::new(MemoryDocumentStore::with_documents(vec![
            DocumentDescriptor::new("d1", "a.pdf", "pdf", 2048).in_folder("a"),
            DocumentDescriptor::new("d2", "b.docx", "docx", 2048),
        ]));
        router(Arc::new(FolderService::new(
            folders,
            documents,
            FolderConfig::default(),
        )))
    }

    fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_tree_endpoint() {
        let app = app(vec![
            FolderRecord::regular("a", "a"),
            FolderRecord::regular("b", "b").under("a"),
            FolderRecord::regular("c", "c").under("zzz"),
        ]);
        let response = app
            .oneshot(request(Method::GET, "/folders/tree", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["root"]["id"], "__root__");
        assert_eq!(body["root"]["children"][0]["id"], "a");
        assert_eq!(body["root"]["children"][0]["children"][0]["id"], "b");
        assert_eq!(body["root"]["children"][1]["id"], "c");
        assert_eq!(body["root"]["children"][0]["stats"]["documentCount"], 1);
        assert_eq!(body["warnings"][0]["type"], "missing_parent");
        assert_eq!(body["warnings"][0]["parentId"], "zzz");
    }

    #[tokio::test]
    async fn test_create_then_conditional_update() {
        let app = app(Vec::new());
        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/folders",
                Some(json!({"id": "a", "name": "Reports"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let etag = response.headers()[header::ETAG].to_str().unwrap().to_string();

        let update = |etag: &str| {
            Request::builder()
                .method(Method::PUT)
                .uri("/folders/a")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::IF_MATCH, etag)
                .body(Body::from(json!({"name": "Renamed"}).to_string()))
                .unwrap()
        };
        let response = app.clone().oneshot(update(&etag)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_ne!(response.headers()[header::ETAG].to_str().unwrap(), etag);
        assert_eq!(json_body(response).await["name"], "Renamed");

        let response = app.clone().oneshot(update(&etag)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await["code"], "CONFLICT");

        let response = app
            .oneshot(request(Method::DELETE, "/folders/a", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_invalid_criteria_is_bad_request() {
        let app = app(Vec::new());
        let response = app
            .oneshot(request(
                Method::POST,
                "/folders/preview",
                Some(json!({"criteria": {"sizeRange": {"min": 10, "max": 1}}})),
            ))
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_preview_and_permissions() {
        let app = app(vec![
            FolderRecord::regular("a", "a").with_permissions(PermissionSet::view_only()),
            FolderRecord::regular("b", "b").under("a").inheriting(),
        ]);
        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/folders/preview",
                Some(json!({"parentId": "a", "criteria": {"documentTypes": ["PDF"]}})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["matchedCount"], 1);
        assert_eq!(body["sampleDocumentIds"][0], "d1");

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/folders/b/permissions", None))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["canView"], true);
        assert_eq!(body["canEdit"], false);
        assert_eq!(body["sourceFolderId"], "a");

        let response = app
            .oneshot(request(Method::DELETE, "/folders/b", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_members_and_not_found() {
        let app = app(vec![FolderRecord::regular("a", "a")]);
        let response = app
            .clone()
            .oneshot(request(Method::GET, "/folders/a/members", None))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["kind"], "regular");
        assert_eq!(body["documents"][0]["id"], "d1");

        let response = app
            .oneshot(request(Method::GET, "/folders/missing/members", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_if_match() {
        let app = app(vec![FolderRecord::regular("a", "a")]);
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/folders/a")
                    .header(header::IF_MATCH, "garbage")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_refresh_endpoint() {
        let app = app(Vec::new());
        let response = app
            .oneshot(request(Method::POST, "/folders/refresh", None))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["scheduled"], 0);
    }
}
