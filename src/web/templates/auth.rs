use askama::Template;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use crate::{
    api::{
        middleware::{
            auth::{safe_next, CurrentUser, SessionInfo},
            csrf::CsrfToken,
        },
        state::AppState,
    },
    auth::AuthService,
    domain::Member,
    error::{AppError, FieldErrors},
    service::RegistrationForm,
    web::templates::{HtmlError, HtmlTemplate},
};

pub const DASHBOARD_URL: &str = "/dashboard/";
pub const LOGIN_URL: &str = "/login/";

const INVALID_LOGIN: &str = "Por favor, entre com um nome de usuário e senha corretos. \
    Note que ambos os campos diferenciam maiúsculas e minúsculas.";

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub current_user: Option<super::UserInfo>,
    pub csrf_token: String,
    pub username: String,
    pub next: String,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Template)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub current_user: Option<super::UserInfo>,
    pub csrf_token: String,
    pub form: RegistrationForm,
    pub errors: FieldErrors,
}

/// Opens a session for the member and redirects with the cookie set.
async fn sign_in(
    state: &AppState,
    jar: CookieJar,
    member: &Member,
    target: &str,
) -> Result<Response, HtmlError> {
    let auth_service = &state.service_context.auth_service;
    let (_session, token) = auth_service.create_session(member.id).await?;
    let jar = jar.add(auth_service.create_session_cookie(&token));
    Ok((jar, Redirect::to(target)).into_response())
}

// GET /login/
pub async fn login_page(
    current_user: Option<Extension<CurrentUser>>,
    Extension(csrf): Extension<CsrfToken>,
    Query(query): Query<LoginQuery>,
) -> Response {
    let next = safe_next(query.next.as_deref());

    if current_user.is_some() {
        return Redirect::to(next.as_deref().unwrap_or(DASHBOARD_URL)).into_response();
    }

    HtmlTemplate(LoginTemplate {
        current_user: None,
        csrf_token: csrf.0,
        username: String::new(),
        next: next.unwrap_or_default(),
        error: None,
    }).into_response()
}

// POST /login/
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Extension(csrf): Extension<CsrfToken>,
    Form(request): Form<LoginRequest>,
) -> Result<Response, HtmlError> {
    let next = safe_next(request.next.as_deref());

    match state.service_context.member_service
        .authenticate(&request.username, &request.password)
        .await
    {
        Ok(member) => {
            sign_in(&state, jar, &member, next.as_deref().unwrap_or(DASHBOARD_URL)).await
        }
        Err(AppError::InvalidCredentials) => Ok(HtmlTemplate(LoginTemplate {
            current_user: None,
            csrf_token: csrf.0,
            username: request.username.trim().to_string(),
            next: next.unwrap_or_default(),
            error: Some(INVALID_LOGIN.to_string()),
        }).into_response()),
        Err(e) => Err(e.into()),
    }
}

// GET or POST /logout/
pub async fn logout_handler(
    State(state): State<AppState>,
    session: Option<Extension<SessionInfo>>,
    jar: CookieJar,
) -> Response {
    if let Some(Extension(session)) = session {
        if let Err(e) = state.service_context.auth_service.invalidate_session(&session.token).await {
            tracing::error!("Failed to invalidate session: {}", e);
        }
    }

    let jar = jar.add(AuthService::create_logout_cookie());
    (jar, Redirect::to(LOGIN_URL)).into_response()
}

// GET /registrar/
pub async fn register_page(
    current_user: Option<Extension<CurrentUser>>,
    Extension(csrf): Extension<CsrfToken>,
) -> impl IntoResponse {
    HtmlTemplate(RegisterTemplate {
        current_user: current_user.map(|Extension(u)| super::UserInfo::from_member(&u.member)),
        csrf_token: csrf.0,
        form: RegistrationForm::default(),
        errors: FieldErrors::new(),
    })
}

// POST /registrar/
pub async fn register_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Extension(csrf): Extension<CsrfToken>,
    Form(form): Form<RegistrationForm>,
) -> Result<Response, HtmlError> {
    match state.service_context.member_service.register(form.clone()).await {
        Ok(member) => sign_in(&state, jar, &member, DASHBOARD_URL).await,
        Err(AppError::InvalidFields(errors)) => {
            let form = RegistrationForm {
                password1: String::new(),
                password2: String::new(),
                ..form
            };
            Ok(HtmlTemplate(RegisterTemplate {
                current_user: None,
                csrf_token: csrf.0,
                form,
                errors,
            }).into_response())
        }
        Err(e) => Err(e.into()),
    }
}
