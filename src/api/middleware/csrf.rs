use axum::{
    body::{self, Body},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use cookie::{Cookie, SameSite};

use crate::{
    api::state::AppState,
    auth::{
        csrf::{CSRF_COOKIE, CSRF_FIELD, CSRF_HEADER},
        CsrfService,
    },
    web::templates::error_page,
};

const MAX_FORM_BYTES: usize = 1024 * 1024;

/// Form token for the current request, for templates to embed.
#[derive(Clone, Debug)]
pub struct CsrfToken(pub String);

/// Issues the `csrftoken` cookie and checks state-changing requests.
///
/// Urlencoded bodies are buffered to read `csrf_token`; other requests
/// must send `X-CSRF-Token`. Multipart is only accepted on the photo upload
/// route, whose handler checks the field while streaming the parts.
pub async fn csrf_protect(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let csrf = &state.service_context.csrf_service;
    let existing = jar
        .get(CSRF_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());
    let cookie_value = existing.clone().unwrap_or_else(CsrfService::new_cookie_value);

    let (parts, body) = request.into_parts();
    let body = if is_unsafe(&parts.method) {
        match check(csrf, existing.as_deref(), parts.uri.path(), &parts.headers, body).await {
            Ok(body) => body,
            Err(response) => {
                tracing::warn!(method = %parts.method, path = %parts.uri.path(), "CSRF check failed");
                return response;
            }
        }
    } else {
        body
    };

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(CsrfToken(csrf.form_token(&cookie_value)));

    let mut response = next.run(request).await;

    if existing.is_none() {
        let cookie = Cookie::build((CSRF_COOKIE, cookie_value))
            .path("/")
            .same_site(SameSite::Lax)
            .secure(state.settings.server.secure_cookies())
            .max_age(cookie::time::Duration::days(365))
            .build();
        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

fn is_unsafe(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE)
}

fn rejected() -> Response {
    error_page(
        StatusCode::FORBIDDEN,
        "Acesso negado (403)",
        "Falha na verificação CSRF. Recarregue a página e tente novamente.",
    )
}

async fn check(
    csrf: &CsrfService,
    cookie_value: Option<&str>,
    path: &str,
    headers: &HeaderMap,
    body: Body,
) -> std::result::Result<Body, Response> {
    let Some(cookie_value) = cookie_value else {
        return Err(rejected());
    };

    if let Some(token) = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok()) {
        return if csrf.verify(cookie_value, token) { Ok(body) } else { Err(rejected()) };
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") && is_photo_upload(path) {
        return Ok(body);
    }

    if !content_type.starts_with("application/x-www-form-urlencoded") {
        return Err(rejected());
    }

    let bytes = body::to_bytes(body, MAX_FORM_BYTES)
        .await
        .map_err(|_| (StatusCode::PAYLOAD_TOO_LARGE, "Formulário muito grande").into_response())?;

    let token = form_field(&bytes, CSRF_FIELD).unwrap_or_default();
    if !csrf.verify(cookie_value, &token) {
        return Err(rejected());
    }

    Ok(Body::from(bytes))
}

/// `/admin/members/<id>/photo/`
fn is_photo_upload(path: &str) -> bool {
    path.strip_prefix("/admin/members/")
        .and_then(|rest| rest.strip_suffix("/photo/"))
        .is_some_and(|id| !id.is_empty() && !id.contains('/'))
}

fn form_field(bytes: &[u8], name: &str) -> Option<String> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(bytes)
        .ok()?
        .into_iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_field_lookup() {
        let body = b"username=ana&csrf_token=abc%2B1&password=x";
        assert_eq!(form_field(body, "csrf_token"), Some("abc+1".to_string()));
        assert_eq!(form_field(body, "missing"), None);
    }

    #[test]
    fn test_multipart_exemption_is_limited_to_photo_upload() {
        assert!(is_photo_upload("/admin/members/0b6c7d1e-2f3a-4b5c-8d9e-0f1a2b3c4d5e/photo/"));
        assert!(!is_photo_upload("/admin/members/0b6c7d1e/photo/remove/"));
        assert!(!is_photo_upload("/admin/members/0b6c7d1e/deactivate/"));
        assert!(!is_photo_upload("/admin/members//photo/"));
        assert!(!is_photo_upload("/admin/members/a/b/photo/"));
        assert!(!is_photo_upload("/logout/"));
    }

    #[test]
    fn test_safe_methods_skip_checks() {
        assert!(!is_unsafe(&Method::GET));
        assert!(!is_unsafe(&Method::HEAD));
        assert!(is_unsafe(&Method::POST));
        assert!(is_unsafe(&Method::DELETE));
    }
}
