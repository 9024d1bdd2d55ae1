//! Version Gate enforcement on the server side (spec §4.5): the same
//! [`pocket_engine::version::check_versions`] helper the Sync Engine uses
//! against server responses, run here against client request headers, so
//! the two sides can never drift on what counts as a mismatch.

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};

use pocket_engine::version::{
    check_versions, ObservedVersions, DATASTORE_VERSION, HEADER_DATASTORE_VERSION,
    HEADER_PROTOCOL_VERSION, PROTOCOL_VERSION,
};

use crate::error::AppError;

fn parse_header(req: &Request, name: &str) -> Option<u32> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Rejects requests whose version headers disagree with this server's
/// constants, then stamps the server's own versions onto every response so
/// a client's own [`check_versions`] call can validate the reply.
pub async fn enforce_version_gate(req: Request, next: Next) -> Result<Response, AppError> {
    let observed = ObservedVersions {
        datastore: parse_header(&req, HEADER_DATASTORE_VERSION),
        protocol: parse_header(&req, HEADER_PROTOCOL_VERSION),
    };
    check_versions(observed)?;

    let mut response = next.run(req).await;
    response.headers_mut().insert(
        HEADER_DATASTORE_VERSION,
        HeaderValue::from_str(&DATASTORE_VERSION.to_string()).expect("integer is valid header value"),
    );
    response.headers_mut().insert(
        HEADER_PROTOCOL_VERSION,
        HeaderValue::from_str(&PROTOCOL_VERSION.to_string()).expect("integer is valid header value"),
    );
    Ok(response)
}
