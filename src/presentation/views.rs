use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::application::error::HttpError;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Landing page: one random garf plus the adopted counter.
#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub garf: String,
    pub is_video: bool,
    pub adopted: usize,
}

/// Upload form with the current waiting-queue size.
#[derive(Template)]
#[template(path = "upload.html")]
pub struct UploadTemplate {
    pub waiting: usize,
}

/// Moderation page showing the next pending garf.
#[derive(Template)]
#[template(path = "review.html")]
pub struct ReviewTemplate {
    pub garf: String,
    pub is_video: bool,
    pub waiting: usize,
    pub plural: &'static str,
}
