use askama::Template;
use axum::{response::IntoResponse, Extension};

use crate::{
    api::middleware::{auth::CurrentUser, csrf::CsrfToken},
    web::templates::{HtmlTemplate, UserInfo},
};
use super::{MemberInfo, ModuleCard, MODULES};

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct MemberDashboardTemplate {
    pub current_user: Option<UserInfo>,
    pub csrf_token: String,
    pub member: MemberInfo,
    pub modules: Vec<ModuleCard>,
    pub is_staff: bool,
}

pub async fn member_dashboard(
    Extension(current_user): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
) -> impl IntoResponse {
    let member = &current_user.member;

    HtmlTemplate(MemberDashboardTemplate {
        current_user: Some(UserInfo::from_member(member)),
        csrf_token: csrf.0,
        member: MemberInfo::from_member(member),
        modules: MODULES.to_vec(),
        is_staff: member.account.is_staff,
    })
}
