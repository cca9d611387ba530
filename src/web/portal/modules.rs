use askama::Template;
use axum::{
    response::{IntoResponse, Redirect},
    Extension,
};

use crate::{
    api::middleware::{auth::CurrentUser, csrf::CsrfToken},
    web::templates::{HtmlTemplate, UserInfo},
};
use super::{ModuleCard, MODULES};

/// Placeholder page for modules that are not built yet.
#[derive(Template)]
#[template(path = "under_construction.html")]
pub struct UnderConstructionTemplate {
    pub current_user: Option<UserInfo>,
    pub csrf_token: String,
    pub app_name: String,
    pub modules: Vec<ModuleCard>,
}

fn under_construction(current_user: &CurrentUser, csrf: CsrfToken, app_name: &str) -> impl IntoResponse {
    HtmlTemplate(UnderConstructionTemplate {
        current_user: Some(UserInfo::from_member(&current_user.member)),
        csrf_token: csrf.0,
        app_name: app_name.to_string(),
        modules: MODULES.to_vec(),
    })
}

pub async fn companies(
    Extension(current_user): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
) -> impl IntoResponse {
    under_construction(&current_user, csrf, "Empresas")
}

pub async fn projects(
    Extension(current_user): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
) -> impl IntoResponse {
    under_construction(&current_user, csrf, "Projetos")
}

pub async fn surveys(
    Extension(current_user): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
) -> impl IntoResponse {
    under_construction(&current_user, csrf, "Pesquisas")
}

pub async fn links(
    Extension(current_user): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
) -> impl IntoResponse {
    under_construction(&current_user, csrf, "Links")
}

pub async fn companies_alias() -> Redirect {
    Redirect::permanent("/empresas/")
}

pub async fn projects_alias() -> Redirect {
    Redirect::permanent("/projetos/")
}

pub async fn surveys_alias() -> Redirect {
    Redirect::permanent("/pesquisas/")
}
