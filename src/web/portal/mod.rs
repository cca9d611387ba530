mod admin;
mod dashboard;
mod modules;

use axum::{
    Router,
    routing::get,
    middleware,
};
use crate::{api::state::AppState, domain::Member};

pub fn create_portal_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Member routes
        .route("/dashboard/", get(dashboard::member_dashboard))
        .route("/empresas/", get(modules::companies))
        .route("/projetos/", get(modules::projects))
        .route("/pesquisas/", get(modules::surveys))
        .route("/links/", get(modules::links))

        // Staff routes
        .merge(admin::create_admin_routes())

        // Require authentication for all portal routes
        // Uses redirect version to send users to login page instead of showing error
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::api::middleware::auth::require_auth_redirect,
        ))
        // English aliases, no session needed to follow them
        .route("/companies/", get(modules::companies_alias))
        .route("/projects/", get(modules::projects_alias))
        .route("/surveys/", get(modules::surveys_alias))
}

/// A module shown on the dashboard and in the sidebar.
#[derive(Debug, Clone)]
pub struct ModuleCard {
    pub name: &'static str,
    pub url: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
}

pub const MODULES: [ModuleCard; 4] = [
    ModuleCard {
        name: "Empresas",
        url: "/empresas/",
        icon: "🏢",
        description: "Estúdios e empresas de jogos associados.",
    },
    ModuleCard {
        name: "Projetos",
        url: "/projetos/",
        icon: "🎮",
        description: "Jogos e projetos desenvolvidos pelos membros.",
    },
    ModuleCard {
        name: "Pesquisas",
        url: "/pesquisas/",
        icon: "📊",
        description: "Pesquisas e levantamentos sobre o setor no RJ.",
    },
    ModuleCard {
        name: "Links",
        url: "/links/",
        icon: "🔗",
        description: "Links úteis para a comunidade.",
    },
];

// Shared view of the signed-in member used across portal pages
pub struct MemberInfo {
    pub display_name: String,
    pub initials: String,
    pub username: String,
    pub email: String,
    pub member_type: String,
    pub active: bool,
    pub association_date: Option<String>,
    pub date_joined: String,
    pub photo_url: Option<String>,
}

impl MemberInfo {
    pub fn from_member(member: &Member) -> Self {
        Self {
            display_name: member.display_name(),
            initials: member.initials(),
            username: member.account.username.clone(),
            email: member.account.email.clone(),
            member_type: member.member_type.label().to_string(),
            active: member.active,
            association_date: member.association_date.map(|d| d.format("%d/%m/%Y").to_string()),
            date_joined: member.account.date_joined.format("%d/%m/%Y").to_string(),
            photo_url: member.profile_photo.as_ref().map(|p| format!("/media/{}", p)),
        }
    }
}
