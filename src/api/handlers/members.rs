use axum::{
    extract::{Path, Query, State, Extension},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    domain::{Member, MemberFilter, MemberType},
    error::{AppError, Result},
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    q: Option<String>,
    #[serde(default, rename = "type")]
    member_type: Option<String>,
    #[serde(default)]
    active: Option<bool>,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    members: Vec<MemberDto>,
    total: i64,
}

#[derive(Debug, Serialize)]
pub struct MemberDto {
    id: Uuid,
    username: String,
    email: String,
    display_name: String,
    listing_label: String,
    member_type: MemberType,
    member_type_label: String,
    national_id: Option<String>,
    phone: String,
    discord_handle: String,
    address: String,
    city: String,
    state: String,
    association_date: Option<String>,
    active: bool,
    is_active: bool,
    is_staff: bool,
    profile_photo: Option<String>,
    date_joined: String,
    last_login: Option<String>,
}

impl From<Member> for MemberDto {
    fn from(member: Member) -> Self {
        Self {
            id: member.id,
            display_name: member.display_name(),
            listing_label: member.listing_label(),
            member_type_label: member.member_type.label().to_string(),
            national_id: member.national_id.as_ref().map(|c| c.formatted()),
            address: member.full_address(),
            state: member.state.code().to_string(),
            association_date: member.association_date.map(|d| d.to_string()),
            profile_photo: member.profile_photo.as_ref().map(|p| format!("/media/{}", p)),
            date_joined: member.account.date_joined.to_rfc3339(),
            last_login: member.account.last_login.map(|dt| dt.to_rfc3339()),
            username: member.account.username,
            email: member.account.email,
            member_type: member.member_type,
            phone: member.phone,
            discord_handle: member.discord_handle,
            city: member.city,
            active: member.active,
            is_active: member.account.is_active,
            is_staff: member.account.is_staff,
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>> {
    let member_type = match params.member_type.as_deref().filter(|t| !t.is_empty()) {
        Some(code) => Some(
            MemberType::from_code(&code.to_ascii_uppercase())
                .ok_or_else(|| AppError::BadRequest("Invalid member type".to_string()))?,
        ),
        None => None,
    };

    let mut filter = MemberFilter {
        search: params.q,
        member_type,
        active: params.active,
        ..Default::default()
    };

    let total = state.service_context.member_repo.count(&filter).await?;

    filter.limit = Some(params.limit.clamp(1, 500));
    filter.offset = Some(params.offset.max(0));
    let members = state.service_context.member_repo.list(&filter).await?;

    Ok(Json(ListResponse {
        members: members.into_iter().map(Into::into).collect(),
        total,
    }))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<MemberDto>> {
    let member = state.service_context.member_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;

    Ok(Json(member.into()))
}

pub async fn activate(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<MemberDto>> {
    let member = state.service_context.member_service
        .set_active(id, true)
        .await?;

    Ok(Json(member.into()))
}

pub async fn deactivate(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<MemberDto>> {
    let member = state.service_context.member_service
        .set_active(id, false)
        .await?;

    Ok(Json(member.into()))
}
