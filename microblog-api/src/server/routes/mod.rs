use crate::server::{ServerError, ServerRouter};
use axum::{Router, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;

mod posts;

pub fn routes() -> ServerRouter {
    Router::new().merge(posts::routes()).typed_get(ping)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/maintenance/ping", rejection(ServerError))]
struct PingPath();

async fn ping(PingPath(): PingPath) -> StatusCode {
    StatusCode::OK
}
