use std::net::SocketAddr;

use axum::{response::Response, Router};
use color_eyre::eyre::WrapErr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub(crate) mod cmd;
pub(crate) mod errors;
pub(crate) mod routes;
mod trace;

pub(crate) mod api {
    pub mod ingredients;
    pub mod recipes;
}

#[cfg(test)]
pub(crate) mod test_helpers;

pub(crate) type ResponseResult<T = Response> = Result<T, errors::ServerError>;

/// The full application: routes, state and request tracing.
pub(crate) fn app(state: AppState) -> Router {
    let tracer = trace::Tracer;
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(tracer)
        .on_response(tracer);

    routes::make_router().with_state(state).layer(trace_layer)
}

pub(crate) async fn run_server(app: Router, port: u16) -> color_eyre::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!("Starting server on port {}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err("Failed to open port")?;

    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .await
        .wrap_err("Failed to run server")
}
