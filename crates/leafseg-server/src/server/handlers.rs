//! HTTP handlers for allocation and health probes.
//!
//! Responses always carry the `{err_no, msg, ...}` envelope: `err_no = 0`
//! with `msg = "success"` on the happy path, `err_no = -1` plus the error
//! text and HTTP 500 otherwise.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::server::state::{Alloc, AppState};

/// Attempts at re-drawing when an ID composes to exactly 0, which the wire
/// protocol reserves as "unset".
const ZERO_ID_RETRIES: usize = 8;

#[derive(Debug, Deserialize)]
pub struct TagQuery {
    pub biz_tag: Option<String>,
}

/// Wire shape of `/alloc` responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct AllocResponse {
    pub err_no: i32,
    pub msg: String,
    pub id: i64,
}

/// Wire shape of `/health` responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub err_no: i32,
    pub msg: String,
    pub left: i64,
}

/// `GET /alloc?biz_tag=<tag>`
///
/// The allocator may block up to its wait bound on an empty buffer, so the
/// call runs on the blocking pool rather than a reactor thread.
pub async fn alloc(
    State(state): State<AppState>,
    Query(query): Query<TagQuery>,
) -> (StatusCode, Json<AllocResponse>) {
    let Some(tag) = query.biz_tag else {
        return alloc_failure("need biz_tag param".to_string());
    };

    let alloc = Arc::clone(&state.alloc);
    let drawn = tokio::task::spawn_blocking(move || next_nonzero_id(&alloc, &tag)).await;

    match drawn {
        Ok(Ok(id)) => (
            StatusCode::OK,
            Json(AllocResponse {
                err_no: 0,
                msg: "success".to_string(),
                id,
            }),
        ),
        Ok(Err(err)) => alloc_failure(err.to_string()),
        Err(err) => {
            warn!(%err, "alloc task failed");
            alloc_failure("internal error".to_string())
        }
    }
}

/// `GET /health?biz_tag=<tag>`
///
/// Reports the in-process buffered count for the tag; an empty buffer is an
/// error so load balancers drain instances that cannot serve.
pub async fn health(
    State(state): State<AppState>,
    Query(query): Query<TagQuery>,
) -> (StatusCode, Json<HealthResponse>) {
    let Some(tag) = query.biz_tag else {
        return health_failure("need biz_tag param".to_string(), 0);
    };

    match state.alloc.remaining(&tag) {
        Ok(left) if left > 0 => (
            StatusCode::OK,
            Json(HealthResponse {
                err_no: 0,
                msg: "success".to_string(),
                left,
            }),
        ),
        Ok(left) => health_failure("no available id".to_string(), left),
        Err(err) => health_failure(err.to_string(), 0),
    }
}

/// Draws IDs until one composes to a non-zero value. A raw ID of 0 with
/// composition disabled (or a degenerate clock) would otherwise collide
/// with the protocol's "unset" marker.
fn next_nonzero_id(alloc: &Alloc, tag: &str) -> leafseg::Result<i64> {
    for _ in 0..ZERO_ID_RETRIES {
        let id = alloc.next_id(tag)?;
        if id != 0 {
            return Ok(id);
        }
    }
    Err(leafseg::Error::NoAvailableId)
}

fn alloc_failure(msg: String) -> (StatusCode, Json<AllocResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(AllocResponse {
            err_no: -1,
            msg,
            id: 0,
        }),
    )
}

fn health_failure(msg: String, left: i64) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(HealthResponse {
            err_no: -1,
            msg,
            left,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::config::ServiceConfig;
    use crate::server::router;
    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use http_body_util::BodyExt;
    use leafseg::{Composer, IdAllocator, SqliteSegmentStore, WallClock};
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    /// In-memory stack with composition disabled so raw IDs are observable.
    fn test_router() -> Router {
        let store = SqliteSegmentStore::open(":memory:", "segments").unwrap();
        store.ensure_schema().unwrap();
        store.seed_tag("test", 0, 100, "test tag").unwrap();

        let alloc = Arc::new(IdAllocator::new(
            Arc::new(store),
            Composer::new(WallClock, false),
        ));
        let config = ServiceConfig {
            dsn: ":memory:".to_string(),
            table: "segments".to_string(),
            http_port: 8880,
            http_read_timeout: 0,
            http_write_timeout: 0,
            compose_clock: false,
        };
        router(AppState::new(alloc), &config)
    }

    async fn get_json<T: DeserializeOwned>(router: &Router, uri: &str) -> (StatusCode, T) {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn alloc_serves_sequential_ids_skipping_zero() {
        let router = test_router();

        // Raw 0 collides with the "unset" marker and is skipped.
        let (status, body) = get_json::<AllocResponse>(&router, "/alloc?biz_tag=test").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!((body.err_no, body.msg.as_str(), body.id), (0, "success", 1));

        let (_, body) = get_json::<AllocResponse>(&router, "/alloc?biz_tag=test").await;
        assert_eq!(body.id, 2);
    }

    #[tokio::test]
    async fn alloc_without_tag_is_an_error() {
        let router = test_router();
        let (status, body) = get_json::<AllocResponse>(&router, "/alloc").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.err_no, -1);
        assert!(body.msg.contains("biz_tag"), "{}", body.msg);
    }

    #[tokio::test]
    async fn alloc_unknown_tag_reports_failure() {
        let router = test_router();
        let (status, body) = get_json::<AllocResponse>(&router, "/alloc?biz_tag=missing").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.err_no, -1);
    }

    #[tokio::test]
    async fn health_tracks_buffered_ids() {
        let router = test_router();

        // Nothing buffered before the first allocation.
        let (status, body) = get_json::<HealthResponse>(&router, "/health?biz_tag=test").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!((body.err_no, body.left), (-1, 0));

        get_json::<AllocResponse>(&router, "/alloc?biz_tag=test").await;

        let (status, body) = get_json::<HealthResponse>(&router, "/health?biz_tag=test").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.err_no, 0);
        assert!(body.left > 0);
    }

    #[tokio::test]
    async fn health_without_tag_is_an_error() {
        let router = test_router();
        let (status, body) = get_json::<HealthResponse>(&router, "/health").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.err_no, -1);
    }
}
