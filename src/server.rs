//! The exposed HTTP surface: a landing page and the telemetry path.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::error;

use crate::client::ChannelApi;
use crate::collect::Collector;
use crate::metrics::ExporterMetrics;

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Everything a scrape needs, shared read-only between concurrent requests.
pub struct App<A> {
    pub collector: Collector<A>,
    pub metrics: ExporterMetrics,
    pub telemetry_path: String,
}

pub fn router<A: ChannelApi + 'static>(app: Arc<App<A>>) -> Router {
    let telemetry_path = app.telemetry_path.clone();
    Router::new()
        .route("/", get(home::<A>))
        .route(&telemetry_path, get(scrape::<A>))
        .with_state(app)
}

async fn home<A: ChannelApi>(State(app): State<Arc<App<A>>>) -> Html<String> {
    Html(format!(
        "<html>\n\
         <head><title>Mirth Channel Exporter</title></head>\n\
         <body>\n\
         <h1>Mirth Channel Exporter</h1>\n\
         <p><a href='{}'>Metrics</a></p>\n\
         </body>\n\
         </html>",
        app.telemetry_path
    ))
}

/// Runs one collection cycle and replies with the exposition text. The cycle
/// itself cannot fail the request; only an encoding problem produces a 500.
async fn scrape<A: ChannelApi>(State(app): State<Arc<App<A>>>) -> Response {
    let result = app.collector.collect().await;
    app.metrics.request_duration.observe(result.duration_seconds);

    match app.metrics.render(&result) {
        Ok(body) => (
            [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
