use std::{process, sync::Arc};

use garfapi::{
    application::{
        catalog::GarfCatalog, error::AppError, review::ReviewService, store::GarfStore,
    },
    config,
    infra::{
        error::InfraError,
        http::{self, HttpState, ReviewAuth},
        store::FsGarfStore,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (_cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    if settings.review.key.is_none() {
        warn!("review.key is not configured; the review surface will refuse every request");
    }

    let media = Arc::new(
        FsGarfStore::new(&settings.store.root).map_err(|err| AppError::from(InfraError::Io(err)))?,
    );
    let store: Arc<dyn GarfStore> = media.clone();

    // There is no valid state without an initial snapshot.
    let catalog = Arc::new(GarfCatalog::bootstrap(store.clone()).await?);
    let review = Arc::new(ReviewService::new(store, catalog.clone()));

    // Periodic rebuild of the current snapshot; moderation actions trigger
    // their own awaited refresh in addition to this timer.
    let refresh_handle = {
        let catalog = catalog.clone();
        let interval = settings.refresh.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // Skip the first immediate tick
            loop {
                ticker.tick().await;
                catalog.refresh().await;
            }
        })
    };

    let state = HttpState {
        catalog,
        review,
        media,
        auth: Arc::new(ReviewAuth::new(settings.review.key.clone())),
        public_url: settings.server.public_url.clone().into(),
        max_pending: settings.uploads.max_pending.get() as usize,
    };

    let upload_body_limit = settings.uploads.max_request_bytes.get() as usize;
    let router = http::build_router(state, upload_body_limit);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(addr = %settings.server.addr, "garfapi listening");

    let result = axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")));

    refresh_handle.abort();
    let _ = refresh_handle.await;

    result
}
