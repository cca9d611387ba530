pub mod auth;
pub mod home;
pub mod password_reset;

use askama::Template;
use axum::{
    response::{Html, IntoResponse, Response},
    http::StatusCode,
};

use crate::{domain::Member, error::AppError};

/// What the navigation bar needs to know about the signed-in member.
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub initials: String,
    pub member_type: String,
    pub is_staff: bool,
}

impl UserInfo {
    pub fn from_member(member: &Member) -> Self {
        Self {
            id: member.id.to_string(),
            username: member.account.username.clone(),
            display_name: member.display_name(),
            initials: member.initials(),
            member_type: member.member_type.label().to_string(),
            is_staff: member.account.is_staff,
        }
    }
}

/// `<option>` entry for select inputs.
#[derive(Debug, Clone)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl SelectOption {
    pub fn new(value: &str, label: &str, current: &str) -> Self {
        Self {
            value: value.to_string(),
            label: label.to_string(),
            selected: value == current,
        }
    }
}

// Make askama templates work with axum
pub struct HtmlTemplate<T>(pub T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => {
                tracing::error!("Failed to render template: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to render template",
                ).into_response()
            }
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub current_user: Option<UserInfo>,
    pub csrf_token: String,
    pub status: u16,
    pub title: String,
    pub message: String,
}

pub fn error_page(status: StatusCode, title: &str, message: &str) -> Response {
    let template = ErrorTemplate {
        current_user: None,
        csrf_token: String::new(),
        status: status.as_u16(),
        title: title.to_string(),
        message: message.to_string(),
    };
    (status, HtmlTemplate(template)).into_response()
}

/// `AppError` rendered as an HTML page instead of JSON.
pub struct HtmlError(pub AppError);

impl From<AppError> for HtmlError {
    fn from(err: AppError) -> Self {
        HtmlError(err)
    }
}

impl IntoResponse for HtmlError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let (title, message) = match &self.0 {
            AppError::NotFound(_) => (
                "Página não encontrada (404)",
                "A página que você procura não existe ou foi removida.".to_string(),
            ),
            AppError::InvalidFields(errors) => ("Dados inválidos", errors.to_string()),
            AppError::Unauthorized | AppError::InvalidCredentials => (
                "Acesso restrito (401)",
                "Entre na intranet para acessar esta página.".to_string(),
            ),
            AppError::Forbidden => (
                "Acesso negado (403)",
                "Você não tem permissão para acessar esta página.".to_string(),
            ),
            AppError::InvalidToken => (
                "Link inválido",
                "O link é inválido ou expirou.".to_string(),
            ),
            AppError::BadRequest(msg) | AppError::Validation(msg) | AppError::Conflict(msg) => (
                "Requisição inválida",
                msg.clone(),
            ),
            other => {
                // logs the underlying failure
                let _ = other.public_message();
                (
                    "Erro no servidor (500)",
                    "Ocorreu um erro inesperado. Tente novamente em instantes.".to_string(),
                )
            }
        };
        error_page(status, title, &message)
    }
}
