pub mod members;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
    middleware,
};
use crate::{api::state::AppState, web::uploads::MAX_FILE_SIZE};

/// Staff-only pages. Mounted inside the authenticated portal router, so
/// the session is already resolved when the staff check runs.
pub fn create_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/", get(members::admin_index))
        .route("/admin/members/", get(members::admin_members_page))
        .route(
            "/admin/members/new/",
            get(members::admin_new_member_page).post(members::admin_create_member),
        )
        .route(
            "/admin/members/:id/",
            get(members::admin_member_detail_page).post(members::admin_update_member),
        )
        .route("/admin/members/:id/activate/", post(members::admin_activate_member))
        .route("/admin/members/:id/deactivate/", post(members::admin_deactivate_member))
        .route(
            "/admin/members/:id/photo/",
            post(members::admin_upload_photo)
                .layer(DefaultBodyLimit::max(MAX_FILE_SIZE + 1024 * 1024)),
        )
        .route("/admin/members/:id/photo/remove/", post(members::admin_remove_photo))
        .route_layer(middleware::from_fn(
            crate::api::middleware::auth::require_staff_page,
        ))
}
