use askama::Template;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    Extension, Form,
};
use serde::Deserialize;

use crate::{
    api::{middleware::csrf::CsrfToken, state::AppState},
    error::{AppError, FieldErrors},
    service::SetPasswordForm,
    web::templates::{HtmlError, HtmlTemplate},
};

#[derive(Template)]
#[template(path = "registration/password_reset_form.html")]
pub struct PasswordResetTemplate {
    pub current_user: Option<super::UserInfo>,
    pub csrf_token: String,
}

#[derive(Template)]
#[template(path = "registration/password_reset_done.html")]
pub struct PasswordResetDoneTemplate {
    pub current_user: Option<super::UserInfo>,
    pub csrf_token: String,
}

#[derive(Template)]
#[template(path = "registration/password_reset_confirm.html")]
pub struct PasswordResetConfirmTemplate {
    pub current_user: Option<super::UserInfo>,
    pub csrf_token: String,
    pub valid_link: bool,
    pub errors: FieldErrors,
}

#[derive(Template)]
#[template(path = "registration/password_reset_complete.html")]
pub struct PasswordResetCompleteTemplate {
    pub current_user: Option<super::UserInfo>,
    pub csrf_token: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    #[serde(default)]
    pub email: String,
}

// GET /password_reset/
pub async fn password_reset_page(Extension(csrf): Extension<CsrfToken>) -> impl IntoResponse {
    HtmlTemplate(PasswordResetTemplate {
        current_user: None,
        csrf_token: csrf.0,
    })
}

// POST /password_reset/
pub async fn password_reset_handler(
    State(state): State<AppState>,
    Form(request): Form<PasswordResetRequest>,
) -> Response {
    // Same redirect whatever happened, so the response reveals nothing
    // about which addresses are registered.
    if let Err(e) = state.service_context.member_service
        .request_password_reset(&request.email)
        .await
    {
        tracing::error!("Password reset request failed: {}", e);
    }

    Redirect::to("/password_reset/done/").into_response()
}

// GET /password_reset/done/
pub async fn password_reset_done(Extension(csrf): Extension<CsrfToken>) -> impl IntoResponse {
    HtmlTemplate(PasswordResetDoneTemplate {
        current_user: None,
        csrf_token: csrf.0,
    })
}

// GET /reset/:uidb64/:token/
pub async fn password_reset_confirm_page(
    State(state): State<AppState>,
    Extension(csrf): Extension<CsrfToken>,
    Path((uidb64, token)): Path<(String, String)>,
) -> Result<Response, HtmlError> {
    let valid_link = match state.service_context.member_service
        .check_reset_link(&uidb64, &token)
        .await
    {
        Ok(_) => true,
        Err(AppError::InvalidToken) => false,
        Err(e) => return Err(e.into()),
    };

    Ok(HtmlTemplate(PasswordResetConfirmTemplate {
        current_user: None,
        csrf_token: csrf.0,
        valid_link,
        errors: FieldErrors::new(),
    }).into_response())
}

// POST /reset/:uidb64/:token/
pub async fn password_reset_confirm_handler(
    State(state): State<AppState>,
    Extension(csrf): Extension<CsrfToken>,
    Path((uidb64, token)): Path<(String, String)>,
    Form(form): Form<SetPasswordForm>,
) -> Result<Response, HtmlError> {
    let (valid_link, errors) = match state.service_context.member_service
        .confirm_password_reset(&uidb64, &token, form)
        .await
    {
        Ok(_) => return Ok(Redirect::to("/reset/done/").into_response()),
        Err(AppError::InvalidFields(errors)) => (true, errors),
        Err(AppError::InvalidToken) => (false, FieldErrors::new()),
        Err(e) => return Err(e.into()),
    };

    Ok(HtmlTemplate(PasswordResetConfirmTemplate {
        current_user: None,
        csrf_token: csrf.0,
        valid_link,
        errors,
    }).into_response())
}

// GET /reset/done/
pub async fn password_reset_complete(Extension(csrf): Extension<CsrfToken>) -> impl IntoResponse {
    HtmlTemplate(PasswordResetCompleteTemplate {
        current_user: None,
        csrf_token: csrf.0,
    })
}
