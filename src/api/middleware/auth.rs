use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;

use crate::{
    api::state::AppState,
    auth::SESSION_COOKIE,
    domain::Member,
    error::{AppError, Result},
    web::templates::HtmlError,
};

#[derive(Clone)]
pub struct CurrentUser {
    pub member: Member,
}

/// Raw session token of the current request, needed to end the session.
#[derive(Clone)]
pub struct SessionInfo {
    pub token: String,
}

/// Resolves the session cookie to an active member, if any.
async fn authenticate(state: &AppState, jar: &CookieJar) -> Result<Option<(Member, String)>> {
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        return Ok(None);
    };
    let token = cookie.value().to_string();
    if token.is_empty() {
        return Ok(None);
    }

    let Some(session) = state.service_context.auth_service.validate_session(&token).await? else {
        return Ok(None);
    };

    let member = state.service_context.member_repo
        .find_by_id(session.member_id)
        .await?
        .filter(|m| m.account.is_active);

    Ok(member.map(|m| (m, token)))
}

fn insert_user(request: &mut Request, member: Member, token: String) {
    request.extensions_mut().insert(CurrentUser { member });
    request.extensions_mut().insert(SessionInfo { token });
}

pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let (member, token) = authenticate(&state, &jar)
        .await?
        .ok_or(AppError::Unauthorized)?;

    insert_user(&mut request, member, token);
    Ok(next.run(request).await)
}

/// Like `require_auth`, but anonymous visitors are sent to the login page
/// with a `next` parameter pointing back here.
pub async fn require_auth_redirect(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, &jar).await {
        Ok(Some((member, token))) => {
            insert_user(&mut request, member, token);
            next.run(request).await
        }
        Ok(None) => {
            let target = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/".to_string());
            Redirect::to(&login_url(&target)).into_response()
        }
        Err(e) => HtmlError(e).into_response(),
    }
}

pub async fn optional_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, &jar).await {
        Ok(Some((member, token))) => insert_user(&mut request, member, token),
        Ok(None) => {}
        Err(e) => tracing::warn!("Session lookup failed: {}", e),
    }

    next.run(request).await
}

/// Runs after `require_auth`. JSON 403 for non-staff.
pub async fn require_staff(request: Request, next: Next) -> Result<Response> {
    let is_staff = request
        .extensions()
        .get::<CurrentUser>()
        .map(|u| u.member.account.is_staff)
        .ok_or(AppError::Unauthorized)?;

    if !is_staff {
        return Err(AppError::Forbidden);
    }

    Ok(next.run(request).await)
}

/// Runs after `require_auth_redirect`. HTML 403 for non-staff.
pub async fn require_staff_page(request: Request, next: Next) -> Response {
    let is_staff = request
        .extensions()
        .get::<CurrentUser>()
        .is_some_and(|u| u.member.account.is_staff);

    if !is_staff {
        return HtmlError(AppError::Forbidden).into_response();
    }

    next.run(request).await
}

pub fn login_url(next: &str) -> String {
    format!("/login/?next={}", urlencoding::encode(next))
}

/// Only same-site absolute paths are followed after login.
pub fn safe_next(next: Option<&str>) -> Option<String> {
    let next = next?.trim();
    let is_local = next.starts_with('/')
        && !next.starts_with("//")
        && !next.starts_with("/\\")
        && !next.contains(['\r', '\n']);
    is_local.then(|| next.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_url_encodes_next() {
        assert_eq!(login_url("/dashboard/"), "/login/?next=%2Fdashboard%2F");
        assert_eq!(login_url("/admin/?q=a b"), "/login/?next=%2Fadmin%2F%3Fq%3Da%20b");
    }

    #[test]
    fn test_safe_next_rejects_external_targets() {
        assert_eq!(safe_next(Some("/empresas/")), Some("/empresas/".to_string()));
        assert_eq!(safe_next(Some("//evil.example/")), None);
        assert_eq!(safe_next(Some("/\\evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example/")), None);
        assert_eq!(safe_next(Some("")), None);
        assert_eq!(safe_next(None), None);
    }
}
