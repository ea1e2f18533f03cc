//! Moderation: the only write path the cache depends on.
//!
//! Accept and reject move a file between directories and then await a
//! catalog refresh, so a decided garf is visible (or gone) before the
//! moderator's response returns.

use std::sync::Arc;

use metrics::counter;
use tracing::info;

use crate::application::catalog::GarfCatalog;
use crate::application::error::AppError;
use crate::application::store::{GarfStore, StoreError};
use crate::domain::error::DomainError;

const SOURCE: &str = "application::review";

/// Minimum plausible garf name: a one-char stem plus `.x` is already 3.
const MIN_NAME_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Accept,
    Reject,
}

impl ReviewAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "accept" => Some(Self::Accept),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            Self::Accept => "accepted",
            Self::Reject => "rejected",
        }
    }
}

pub struct ReviewService {
    store: Arc<dyn GarfStore>,
    catalog: Arc<GarfCatalog>,
}

impl ReviewService {
    pub fn new(store: Arc<dyn GarfStore>, catalog: Arc<GarfCatalog>) -> Self {
        Self { store, catalog }
    }

    /// Names still waiting on a decision.
    pub async fn pending(&self) -> Result<Vec<String>, AppError> {
        self.store.list_pending().await.map_err(AppError::from)
    }

    /// Apply a moderation decision and make it visible before returning.
    pub async fn decide(&self, action: ReviewAction, name: &str) -> Result<(), AppError> {
        validate_name(name)?;

        let result = match action {
            ReviewAction::Accept => self.store.promote(name).await,
            ReviewAction::Reject => self.store.reject(name).await,
        };

        match result {
            Ok(()) => {}
            Err(StoreError::NotFound { name }) => {
                return Err(DomainError::not_found(name).into());
            }
            Err(err) => return Err(err.into()),
        }

        counter!("garfapi_reviews_total", "action" => action.past_tense()).increment(1);
        info!(source = SOURCE, garf = name, action = action.past_tense(), "garf reviewed");

        // Read-after-write visibility for subsequent random/list queries.
        self.catalog.refresh().await;
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() || name.len() < MIN_NAME_LEN {
        return Err(DomainError::validation("invalid garf name").into());
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(DomainError::validation("garf name must be a plain file name").into());
    }
    Ok(())
}
