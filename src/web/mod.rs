pub mod templates;
pub mod portal;
pub mod uploads;

use axum::{
    Router,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    middleware,
};
use crate::api::state::AppState;

/// Pages that also answer without the trailing slash, via redirect.
const SLASHED_PAGES: &[&str] = &[
    "/login/",
    "/logout/",
    "/registrar/",
    "/password_reset/",
    "/dashboard/",
    "/empresas/",
    "/projetos/",
    "/pesquisas/",
    "/links/",
    "/companies/",
    "/projects/",
    "/surveys/",
    "/admin/",
];

pub fn create_web_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(templates::home::home_page))

        // Auth pages (web interface)
        .route(
            "/login/",
            get(templates::auth::login_page).post(templates::auth::login_handler),
        )
        .route(
            "/logout/",
            get(templates::auth::logout_handler).post(templates::auth::logout_handler),
        )
        .route(
            "/registrar/",
            get(templates::auth::register_page).post(templates::auth::register_handler),
        )

        // Password reset
        .route(
            "/password_reset/",
            get(templates::password_reset::password_reset_page)
                .post(templates::password_reset::password_reset_handler),
        )
        .route("/password_reset/done/", get(templates::password_reset::password_reset_done))
        .route(
            "/reset/:uidb64/:token/",
            get(templates::password_reset::password_reset_confirm_page)
                .post(templates::password_reset::password_reset_confirm_handler),
        )
        .route("/reset/done/", get(templates::password_reset::password_reset_complete))

        // Public pages still want to know who is signed in
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::api::middleware::auth::optional_auth,
        ))

        // Dashboard, modules and staff pages
        .merge(portal::create_portal_routes(state))
}

// Fallback for unmapped routes
pub async fn not_found(method: Method, uri: Uri) -> Response {
    if method == Method::GET {
        let slashed = format!("{}/", uri.path());
        if SLASHED_PAGES.contains(&slashed.as_str()) {
            let target = match uri.query() {
                Some(query) => format!("{}?{}", slashed, query),
                None => slashed,
            };
            return Redirect::permanent(&target).into_response();
        }
    }

    templates::error_page(
        StatusCode::NOT_FOUND,
        "Página não encontrada (404)",
        "A página que você procura não existe ou foi removida.",
    )
}
