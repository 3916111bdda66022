//! Fallback for requests no route matched.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    response::Response,
};
use serde_json::{json, Map, Value};

use crate::http::request::request_url;
use crate::http::response::not_found;
use crate::http::server::AppState;

/// Log the miss and answer 404. The client address is included when the
/// server was started with connection info.
pub async fn route_not_found(State(state): State<AppState>, request: Request) -> Response {
    let mut fields = Map::new();
    fields.insert("url".into(), json!(request_url(&request)));
    fields.insert("method".into(), json!(request.method().as_str()));
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        fields.insert("ip".into(), json!(addr.ip().to_string()));
    }
    state.logger.warn("404 Not Found", Value::Object(fields));

    not_found()
}
