//! Gallery Vault - Content Server
//!
//! Local HTTP endpoint the viewer loads pages and covers from, plus the
//! session endpoints that unlock the hidden zone and locked items.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::catalog::{ItemFilter, SortKey, StoredItem};
use crate::error::{VaultError, VaultResult};
use crate::vault::GalleryVault;

/// Sent on every response; decrypted pages must never be cached
pub const NO_CACHE: &str = "no-store, no-cache, must-revalidate, max-age=0";

/// Server state shared by all handlers
#[derive(Clone)]
pub struct ServerState {
    pub vault: Arc<GalleryVault>,
}

/// Listing parameters; `tags` is comma separated
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub query: String,
    pub tags: String,
    pub favorites: bool,
    pub collection: Option<i64>,
    pub sort: SortKey,
    pub page: u32,
    pub page_size: u32,
}

impl From<ListQuery> for ItemFilter {
    fn from(q: ListQuery) -> Self {
        ItemFilter {
            query: q.query,
            tags: q
                .tags
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
            only_favorite: q.favorites,
            collection_id: q.collection,
            sort: q.sort,
            page: q.page,
            page_size: q.page_size,
            include_hidden: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PasswordBody {
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnlockResponse {
    pub unlocked: bool,
}

/// Create the content server router
pub fn create_router(vault: Arc<GalleryVault>) -> Router {
    Router::new()
        .route("/img/*path", get(serve_image))
        .route("/thumbnail/:item", get(serve_thumbnail))
        .route("/api/items", get(list_items))
        .route("/api/hidden-zone/unlock", post(unlock_hidden_zone))
        .route("/api/hidden-zone/lock", post(lock_hidden_zone))
        .route("/api/items/:item/unlock", post(unlock_item))
        .route("/api/items/:item/relock", post(relock_item))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static(NO_CACHE),
        ))
        .with_state(ServerState { vault })
}

/// Bind and serve until the process stops
pub async fn serve(vault: Arc<GalleryVault>, addr: SocketAddr) -> VaultResult<()> {
    let app = create_router(vault);

    log::info!("🌐 Content server listening on http://{}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

impl IntoResponse for VaultError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            log::error!("Request failed: {}", self);
        }

        let reason = status.canonical_reason().unwrap_or("Error");
        (status, reason).into_response()
    }
}

/// Run vault work off the async runtime
async fn blocking<T, F>(state: &ServerState, f: F) -> VaultResult<T>
where
    F: FnOnce(&GalleryVault) -> VaultResult<T> + Send + 'static,
    T: Send + 'static,
{
    let vault = state.vault.clone();
    tokio::task::spawn_blocking(move || f(&vault))
        .await
        .map_err(|e| VaultError::TaskFailed(e.to_string()))?
}

// ═══════════════════════════════════════════════════════════════════════════
// CONTENT
// ═══════════════════════════════════════════════════════════════════════════

async fn serve_image(
    State(state): State<ServerState>,
    Path(path): Path<String>,
) -> Result<Response, VaultError> {
    let page = blocking(&state, move |vault| vault.read_file(&path)).await?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, page.content_type)], page.bytes).into_response())
}

async fn serve_thumbnail(
    State(state): State<ServerState>,
    Path(item): Path<String>,
) -> Result<Response, VaultError> {
    let preview = blocking(&state, move |vault| vault.preview(&item)).await?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "image/jpeg")], preview).into_response())
}

async fn list_items(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<StoredItem>>, VaultError> {
    let filter = ItemFilter::from(query);
    let items = blocking(&state, move |vault| vault.list_items(filter)).await?;
    Ok(Json(items))
}

// ═══════════════════════════════════════════════════════════════════════════
// SESSION
// ═══════════════════════════════════════════════════════════════════════════

fn unlock_response(unlocked: bool) -> Response {
    let status = if unlocked {
        StatusCode::OK
    } else {
        StatusCode::FORBIDDEN
    };
    (status, Json(UnlockResponse { unlocked })).into_response()
}

async fn unlock_hidden_zone(
    State(state): State<ServerState>,
    Json(body): Json<PasswordBody>,
) -> Result<Response, VaultError> {
    let unlocked = blocking(&state, move |vault| {
        vault.access().unlock_hidden_zone(&body.password)
    })
    .await?;
    Ok(unlock_response(unlocked))
}

async fn lock_hidden_zone(State(state): State<ServerState>) -> StatusCode {
    state.vault.access().lock_hidden_zone();
    StatusCode::NO_CONTENT
}

async fn unlock_item(
    State(state): State<ServerState>,
    Path(item): Path<String>,
    Json(body): Json<PasswordBody>,
) -> Result<Response, VaultError> {
    let unlocked = blocking(&state, move |vault| {
        vault.access().verify_item(&item, &body.password)
    })
    .await?;
    Ok(unlock_response(unlocked))
}

async fn relock_item(State(state): State<ServerState>, Path(item): Path<String>) -> StatusCode {
    state.vault.access().relock_item(&item);
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::tests::{import_book, open_vault};
    use crate::vault::ItemUpdate;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Response) {
        let response = app.clone().oneshot(request).await.unwrap();
        (response.status(), response)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, json: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_serves_decrypted_page_without_caching() {
        let (_dir, vault) = open_vault();
        import_book(&vault, "My Book", &["p1.png"]);
        let app = create_router(Arc::new(vault));

        let (status, response) = send(&app, get_req("/img/My%20Book/p1.jpg")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], NO_CACHE);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(image::load_from_memory(&body).is_ok());
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let (_dir, vault) = open_vault();
        import_book(&vault, "Book", &["p1.png"]);
        let app = create_router(Arc::new(vault));

        let (status, response) = send(&app, get_req("/img/Book/missing.jpg")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::CACHE_CONTROL], NO_CACHE);

        let (status, _) = send(&app, get_req("/img/Book/..%2F..%2Flibrary.db")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, get_req("/img/Book")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, get_req("/thumbnail/Nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_hidden_zone_flow() {
        let (_dir, vault) = open_vault();
        import_book(&vault, "Secret", &["p.png"]);
        vault
            .update_item(
                "Secret",
                ItemUpdate {
                    hidden: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        vault.access().set_hidden_zone_password("zone").unwrap();
        let app = create_router(Arc::new(vault));

        let list = |app: Router| async move {
            let response = app.oneshot(get_req("/api/items")).await.unwrap();
            let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            serde_json::from_slice::<Vec<StoredItem>>(&body).unwrap().len()
        };

        assert_eq!(list(app.clone()).await, 0);
        assert_eq!(send(&app, get_req("/img/Secret/p.jpg")).await.0, StatusCode::FORBIDDEN);
        assert_eq!(send(&app, get_req("/thumbnail/Secret")).await.0, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, post_json("/api/hidden-zone/unlock", r#"{"password":"bad"}"#)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, post_json("/api/hidden-zone/unlock", r#"{"password":"zone"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list(app.clone()).await, 1);
        assert_eq!(send(&app, get_req("/img/Secret/p.jpg")).await.0, StatusCode::OK);
        assert_eq!(send(&app, get_req("/thumbnail/Secret")).await.0, StatusCode::OK);

        let lock = Request::builder()
            .method("POST")
            .uri("/api/hidden-zone/lock")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, lock).await.0, StatusCode::NO_CONTENT);
        assert_eq!(list(app.clone()).await, 0);
        // Cached preview is not served once the zone is locked again
        assert_eq!(send(&app, get_req("/thumbnail/Secret")).await.0, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_item_unlock_flow() {
        let (_dir, vault) = open_vault();
        import_book(&vault, "Diary", &["p.png"]);
        vault.access().lock_item("Diary", "pw").unwrap();
        let app = create_router(Arc::new(vault));

        assert_eq!(send(&app, get_req("/img/Diary/p.jpg")).await.0, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, post_json("/api/items/Diary/unlock", r#"{"password":"pw"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(send(&app, get_req("/img/Diary/p.jpg")).await.0, StatusCode::OK);

        let relock = Request::builder()
            .method("POST")
            .uri("/api/items/Diary/relock")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, relock).await.0, StatusCode::NO_CONTENT);
        assert_eq!(send(&app, get_req("/img/Diary/p.jpg")).await.0, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_list_query_to_filter() {
        let filter = ItemFilter::from(ListQuery {
            tags: "Action, ,drama".into(),
            sort: SortKey::LastReadDesc,
            ..Default::default()
        });
        assert_eq!(filter.tags, vec!["Action", "drama"]);
        assert!(!filter.include_hidden);
    }
}
