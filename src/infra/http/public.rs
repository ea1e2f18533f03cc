use std::{collections::HashSet, sync::Arc};

use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_LENGTH, CONTENT_TYPE, REFERER,
        },
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::{Multipart, cookie::CookieJar};
use bytes::Bytes;
use metrics::counter;
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::{
    application::{
        cache::GarfCache,
        catalog::GarfCatalog,
        error::HttpError,
        review::ReviewService,
        store::{GarfStore, StoreError},
    },
    domain::garfs,
    presentation::views::{HomeTemplate, UploadTemplate, render_template_response},
};

use super::{
    ReviewAuth,
    middleware::{log_responses, set_request_context},
    review,
};

const ACCEPTED_MIME_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/png",
    "image/gif",
    "video/mp4",
    "video/webm",
];

#[derive(Clone)]
pub struct HttpState {
    pub catalog: Arc<GarfCatalog>,
    pub review: Arc<ReviewService>,
    pub media: Arc<crate::infra::store::FsGarfStore>,
    pub auth: Arc<ReviewAuth>,
    pub public_url: Arc<str>,
    pub max_pending: usize,
}

pub fn build_router(state: HttpState, upload_body_limit: usize) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/garf", get(random_garf))
        .route("/garf.json", get(random_garf_json))
        .route("/garfields", get(list_garfields))
        .route("/upload", get(upload_page).post(upload_garf))
        .route("/review", get(review::review_page).post(review::review_action))
        .route("/{name}", get(serve_media))
        .layer(DefaultBodyLimit::max(upload_body_limit))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GarfQuery {
    filter: Option<String>,
    include: Option<String>,
}

/// `filter` excludes the listed extensions; `include` keeps only them.
/// Both comma-separated and case-insensitive, no leading dot.
fn snapshot_with_filters(cache: GarfCache, query: &GarfQuery) -> Result<GarfCache, HttpError> {
    if let Some(raw) = query.filter.as_deref() {
        cache
            .apply_filter(&parse_criteria(raw), false)
            .map_err(HttpError::from)
    } else if let Some(raw) = query.include.as_deref() {
        cache
            .apply_filter(&parse_criteria(raw), true)
            .map_err(HttpError::from)
    } else {
        Ok(cache)
    }
}

fn parse_criteria(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

fn set_cors_headers(response: &mut Response) {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Origin, X-Requested-With, Content-Type, Accept"),
    );
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET"));
}

async fn random_garf(State(state): State<HttpState>, Query(query): Query<GarfQuery>) -> Response {
    let snapshot = match snapshot_with_filters(state.catalog.current(), &query) {
        Ok(snapshot) => snapshot,
        Err(err) => return err.into_response(),
    };

    counter!("garfapi_garfs_served_total").increment(1);
    let mut response = (StatusCode::OK, snapshot.random().to_string()).into_response();
    set_cors_headers(&mut response);
    response
}

async fn random_garf_json(
    State(state): State<HttpState>,
    Query(query): Query<GarfQuery>,
) -> Response {
    const SOURCE: &str = "infra::http::public::random_garf_json";

    let snapshot = match snapshot_with_filters(state.catalog.current(), &query) {
        Ok(snapshot) => snapshot,
        Err(err) => return err.into_response(),
    };

    let name = snapshot.random().to_string();
    let file_size_bytes = match state.media.stat_approved(&name).await {
        Ok(size) => size,
        Err(err) => {
            error!(source = SOURCE, garf = %name, error = %err, "stat failed for approved garf");
            return HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something broke!",
                err.to_string(),
            )
            .into_response();
        }
    };

    counter!("garfapi_garfs_served_total").increment(1);
    let mut response = Json(json!({
        "fileSizeBytes": file_size_bytes,
        "url": format!("{}/{name}", state.public_url),
    }))
    .into_response();
    set_cors_headers(&mut response);
    response
}

async fn list_garfields(
    State(state): State<HttpState>,
    Query(query): Query<GarfQuery>,
) -> Response {
    let snapshot = match snapshot_with_filters(state.catalog.current(), &query) {
        Ok(snapshot) => snapshot,
        Err(err) => return err.into_response(),
    };

    let mut response = Json(snapshot.names().to_vec()).into_response();
    set_cors_headers(&mut response);
    response
}

async fn home(State(state): State<HttpState>) -> Response {
    let snapshot = state.catalog.current();
    let garf = snapshot.random().to_string();
    let is_video = garfs::GarfKind::from_name(&garf).is_video();

    render_template_response(
        HomeTemplate {
            garf,
            is_video,
            adopted: state.catalog.approved_count(),
        },
        StatusCode::OK,
    )
}

async fn upload_page(State(state): State<HttpState>) -> Response {
    let waiting = match state.review.pending().await {
        Ok(pending) => pending.len(),
        Err(err) => return err.into_response(),
    };

    render_template_response(UploadTemplate { waiting }, StatusCode::OK)
}

async fn upload_garf(State(state): State<HttpState>, mut multipart: Multipart) -> Response {
    const SOURCE: &str = "infra::http::public::upload_garf";

    let pending = match state.review.pending().await {
        Ok(pending) => pending,
        Err(err) => return err.into_response(),
    };
    if pending.len() >= state.max_pending {
        return HttpError::new(
            SOURCE,
            StatusCode::TOO_MANY_REQUESTS,
            "Too many new garfs, please try again later.",
            format!("pending queue at {} items", pending.len()),
        )
        .into_response();
    }

    let (original_name, content_type, data) = match read_upload_field(&mut multipart).await {
        Ok(Some(payload)) => payload,
        Ok(None) => {
            return HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "No files were uploaded.",
                "multipart body had no upload_file field",
            )
            .into_response();
        }
        Err(err) => return err.into_response(),
    };

    if !ACCEPTED_MIME_TYPES.contains(&content_type.as_str()) {
        return HttpError::new(
            SOURCE,
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Unsupported Media Type, please upload a JPEG, PNG, GIF, MP4 or WEBM file.",
            format!("rejected content type `{content_type}`"),
        )
        .into_response();
    }

    let stored_name = pending_name(&original_name);
    if let Err(err) = state.media.save_pending(&stored_name, data).await {
        error!(source = SOURCE, garf = %stored_name, error = %err, "failed to store upload");
        return HttpError::new(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Something broke!",
            err.to_string(),
        )
        .into_response();
    }

    counter!("garfapi_uploads_total").increment(1);
    (StatusCode::OK, "File uploaded!").into_response()
}

/// Walk the multipart fields until the upload payload appears.
async fn read_upload_field(
    multipart: &mut Multipart,
) -> Result<Option<(String, String, Bytes)>, HttpError> {
    const SOURCE: &str = "infra::http::public::read_upload_field";

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if !matches!(field.name(), Some("upload_file") | Some("file")) {
                    continue;
                }

                let original_name = field
                    .file_name()
                    .map(|value| value.to_string())
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(|| "upload.bin".to_string());
                let content_type = field
                    .content_type()
                    .map(|mime| mime.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());

                let data = field.bytes().await.map_err(|err| {
                    HttpError::new(
                        SOURCE,
                        err.status(),
                        "Upload could not be read",
                        err.to_string(),
                    )
                })?;

                return Ok(Some((original_name, content_type, data)));
            }
            Ok(None) => return Ok(None),
            Err(err) => {
                return Err(HttpError::new(
                    SOURCE,
                    err.status(),
                    "Malformed upload request",
                    err.to_string(),
                ));
            }
        }
    }
}

/// Uploads are renamed to a fresh uuid; only the extension survives.
fn pending_name(original_name: &str) -> String {
    let identifier = Uuid::new_v4();
    let extension = garfs::extension(original_name);
    if extension.is_empty() {
        identifier.to_string()
    } else {
        format!("{identifier}.{extension}")
    }
}

/// Serve media by name. Requests referred from the review page read the
/// pending set (cookie gated); everything else reads the approved set.
async fn serve_media(
    State(state): State<HttpState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    let from_review = headers
        .get(REFERER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_end_matches('/').ends_with("/review"))
        .unwrap_or(false);

    let read = if from_review {
        if !state.auth.authorize(&jar) {
            return HttpError::new(
                SOURCE,
                StatusCode::UNAUTHORIZED,
                "Unauthorized",
                "review media requested without a valid cookie",
            )
            .into_response();
        }
        state.media.read_pending(&name).await
    } else {
        state.media.read_approved(&name).await
    };

    match read {
        Ok(bytes) => build_media_response(&name, bytes),
        Err(StoreError::InvalidName { .. }) | Err(StoreError::NotFound { .. }) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Garf not found",
            "the requested garf is not available",
        )
        .into_response(),
        Err(StoreError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Garf not found",
            "the requested garf is not available",
        )
        .into_response(),
        Err(err) => {
            error!(source = SOURCE, garf = %name, error = %err, "failed to read garf");
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something broke!",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn build_media_response(name: &str, bytes: Bytes) -> Response {
    let mut response = Response::new(Body::from(bytes.clone()));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(name).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&bytes.len().to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    set_cors_headers(&mut response);
    response
}
