use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::{api::state::AppState, web::templates::error_page};

/// Rejects requests whose `Host` header is not in `server.allowed_hosts`.
/// Requests without a Host header (HTTP/1.0) are let through.
pub async fn require_allowed_host(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.as_str().to_string()));

    if let Some(host) = host {
        if !state.settings.server.is_allowed_host(&host) {
            tracing::warn!(host = %host, "Rejected request for disallowed host");
            return error_page(
                StatusCode::BAD_REQUEST,
                "Requisição inválida (400)",
                "O endereço solicitado não é atendido por este servidor.",
            );
        }
    }

    next.run(request).await
}
