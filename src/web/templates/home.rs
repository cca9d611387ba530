use askama::Template;
use axum::{response::IntoResponse, Extension};

use crate::{
    api::middleware::{auth::CurrentUser, csrf::CsrfToken},
    web::templates::{HtmlTemplate, UserInfo},
};

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub current_user: Option<UserInfo>,
    pub csrf_token: String,
}

// GET /
pub async fn home_page(
    current_user: Option<Extension<CurrentUser>>,
    Extension(csrf): Extension<CsrfToken>,
) -> impl IntoResponse {
    HtmlTemplate(HomeTemplate {
        current_user: current_user.map(|Extension(u)| UserInfo::from_member(&u.member)),
        csrf_token: csrf.0,
    })
}
