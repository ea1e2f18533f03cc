//! Moderation surface: cookie-gated review page and decision endpoint.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::{
    application::{error::HttpError, review::ReviewAction},
    domain::garfs,
    presentation::views::{ReviewTemplate, render_template_response},
};

use super::public::HttpState;

const REVIEW_COOKIE: &str = "bone";

/// Constant-time check of the base64-encoded review cookie against the
/// configured key. An unset key closes the review surface entirely.
pub struct ReviewAuth {
    key: Option<String>,
}

impl ReviewAuth {
    pub fn new(key: Option<String>) -> Self {
        Self { key }
    }

    pub fn authorize(&self, jar: &CookieJar) -> bool {
        let Some(expected) = self.key.as_deref() else {
            return false;
        };
        let Some(cookie) = jar.get(REVIEW_COOKIE) else {
            return false;
        };
        let Ok(decoded) = BASE64.decode(cookie.value()) else {
            return false;
        };
        decoded.ct_eq(expected.as_bytes()).into()
    }
}

fn unauthorized(source: &'static str) -> Response {
    HttpError::new(
        source,
        StatusCode::UNAUTHORIZED,
        "Unauthorized",
        "missing or invalid review cookie",
    )
    .into_response()
}

pub(super) async fn review_page(State(state): State<HttpState>, jar: CookieJar) -> Response {
    const SOURCE: &str = "infra::http::review::review_page";

    if !state.auth.authorize(&jar) {
        return unauthorized(SOURCE);
    }

    let pending = match state.review.pending().await {
        Ok(pending) => pending,
        Err(err) => return err.into_response(),
    };

    let Some(garf) = pending.first().cloned() else {
        return (StatusCode::OK, "No new garfs to review").into_response();
    };

    let waiting = pending.len();
    render_template_response(
        ReviewTemplate {
            is_video: garfs::GarfKind::from_name(&garf).is_video(),
            garf,
            waiting,
            plural: if waiting == 1 { "" } else { "s" },
        },
        StatusCode::OK,
    )
}

#[derive(Debug, Deserialize)]
pub(super) struct ReviewRequest {
    action: String,
    #[serde(rename = "garfName")]
    garf_name: String,
}

pub(super) async fn review_action(
    State(state): State<HttpState>,
    jar: CookieJar,
    Json(request): Json<ReviewRequest>,
) -> Response {
    const SOURCE: &str = "infra::http::review::review_action";

    if !state.auth.authorize(&jar) {
        return unauthorized(SOURCE);
    }

    let Some(action) = ReviewAction::parse(&request.action) else {
        return HttpError::new(
            SOURCE,
            StatusCode::BAD_REQUEST,
            "Invalid action",
            format!("unknown review action `{}`", request.action),
        )
        .into_response();
    };

    match state.review.decide(action, &request.garf_name).await {
        Ok(()) => {
            let message = match action {
                ReviewAction::Accept => "garf accepted",
                ReviewAction::Reject => "garf rejected",
            };
            (StatusCode::OK, message).into_response()
        }
        Err(err) => err.into_response(),
    }
}
