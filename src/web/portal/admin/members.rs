use askama::Template;
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    http::StatusCode,
    Extension, Form,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{
        middleware::{auth::CurrentUser, csrf::CsrfToken},
        state::AppState,
    },
    auth::csrf::CSRF_COOKIE,
    domain::{FederativeUnit, Member, MemberFilter, MemberType},
    error::{AppError, FieldErrors},
    service::MemberForm,
    web::{
        templates::{error_page, HtmlError, HtmlTemplate, SelectOption, UserInfo},
        uploads::{delete_profile_photo, save_profile_photo},
    },
};

const PER_PAGE: i64 = 25;

#[derive(Template)]
#[template(path = "admin/members.html")]
pub struct AdminMembersTemplate {
    pub current_user: Option<UserInfo>,
    pub csrf_token: String,
    pub members: Vec<AdminMemberInfo>,
    pub total_members: i64,
    pub current_page: i64,
    pub total_pages: i64,
    pub search_query: String,
    pub type_options: Vec<SelectOption>,
    pub active_options: Vec<SelectOption>,
    pub staff_options: Vec<SelectOption>,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
}

#[derive(Template)]
#[template(path = "admin/member_form.html")]
pub struct AdminMemberFormTemplate {
    pub current_user: Option<UserInfo>,
    pub csrf_token: String,
    pub is_new: bool,
    pub member: Option<AdminMemberInfo>,
    pub form: MemberForm,
    pub errors: FieldErrors,
    pub member_types: Vec<SelectOption>,
    pub states: Vec<SelectOption>,
    pub saved: bool,
    pub photo_error: Option<String>,
}

#[derive(Clone)]
pub struct AdminMemberInfo {
    pub id: String,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub initials: String,
    pub member_type: String,
    pub national_id: String,
    pub city_state: String,
    pub address: String,
    pub active: bool,
    pub is_active: bool,
    pub is_staff: bool,
    pub date_joined: String,
    pub last_login: String,
    pub photo_url: Option<String>,
}

impl AdminMemberInfo {
    fn from_member(member: &Member) -> Self {
        Self {
            id: member.id.to_string(),
            username: member.account.username.clone(),
            email: member.account.email.clone(),
            display_name: member.display_name(),
            initials: member.initials(),
            member_type: member.member_type.label().to_string(),
            national_id: member.national_id.as_ref().map(|c| c.formatted()).unwrap_or_default(),
            city_state: format!("{}/{}", member.city, member.state.code()),
            address: member.full_address(),
            active: member.active,
            is_active: member.account.is_active,
            is_staff: member.account.is_staff,
            date_joined: member.account.date_joined.format("%d/%m/%Y").to_string(),
            last_login: member
                .account
                .last_login
                .map(|dt| dt.format("%d/%m/%Y %H:%M").to_string())
                .unwrap_or_else(|| "nunca".to_string()),
            photo_url: member.profile_photo.as_ref().map(|p| format!("/media/{}", p)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminMembersQuery {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub member_type: Option<String>,
    pub active: Option<String>,
    pub staff: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DetailQuery {
    pub saved: Option<String>,
    pub photo_error: Option<String>,
}

fn parse_flag(value: Option<&str>) -> Option<bool> {
    match value {
        Some("1") => Some(true),
        Some("0") => Some(false),
        _ => None,
    }
}

fn flag_options(current: &str, yes: &str, no: &str) -> Vec<SelectOption> {
    vec![
        SelectOption::new("", "Todos", current),
        SelectOption::new("1", yes, current),
        SelectOption::new("0", no, current),
    ]
}

fn member_type_options(current: &str) -> Vec<SelectOption> {
    MemberType::ALL
        .iter()
        .map(|t| SelectOption::new(t.code(), t.label(), current))
        .collect()
}

fn state_options(current: &str) -> Vec<SelectOption> {
    FederativeUnit::ALL
        .iter()
        .map(|uf| SelectOption::new(uf.code(), &format!("{} - {}", uf.code(), uf.name()), current))
        .collect()
}

fn page_url(query: &AdminMembersQuery, page: i64) -> String {
    let params = [
        ("q", query.q.clone().unwrap_or_default()),
        ("type", query.member_type.clone().unwrap_or_default()),
        ("active", query.active.clone().unwrap_or_default()),
        ("staff", query.staff.clone().unwrap_or_default()),
        ("page", page.to_string()),
    ];
    let params: Vec<(&str, String)> = params.into_iter().filter(|(_, v)| !v.is_empty()).collect();
    format!(
        "/admin/members/?{}",
        serde_urlencoded::to_string(params).unwrap_or_default()
    )
}

fn detail_url(id: Uuid) -> String {
    format!("/admin/members/{}/", id)
}

// GET /admin/
pub async fn admin_index() -> Redirect {
    Redirect::to("/admin/members/")
}

// GET /admin/members/
pub async fn admin_members_page(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Query(query): Query<AdminMembersQuery>,
) -> Result<Response, HtmlError> {
    let type_filter = query.member_type.clone().unwrap_or_default();
    let active_filter = query.active.clone().unwrap_or_default();
    let staff_filter = query.staff.clone().unwrap_or_default();
    let search_query = query.q.clone().unwrap_or_default();

    let mut filter = MemberFilter {
        search: Some(search_query.clone()).filter(|s| !s.trim().is_empty()),
        member_type: MemberType::from_code(&type_filter),
        active: parse_flag(query.active.as_deref()),
        is_staff: parse_flag(query.staff.as_deref()),
        ..Default::default()
    };

    let repo = &state.service_context.member_repo;
    let total_members = repo.count(&filter).await?;
    let total_pages = ((total_members + PER_PAGE - 1) / PER_PAGE).max(1);
    let current_page = query.page.unwrap_or(1).clamp(1, total_pages);

    filter.limit = Some(PER_PAGE);
    filter.offset = Some((current_page - 1) * PER_PAGE);
    let members = repo.list(&filter).await?;

    let mut type_options = vec![SelectOption::new("", "Todos", &type_filter)];
    type_options.extend(member_type_options(&type_filter));

    let template = AdminMembersTemplate {
        current_user: Some(UserInfo::from_member(&current_user.member)),
        csrf_token: csrf.0,
        members: members.iter().map(AdminMemberInfo::from_member).collect(),
        total_members,
        current_page,
        total_pages,
        search_query,
        type_options,
        active_options: flag_options(&active_filter, "Ativos", "Inativos"),
        staff_options: flag_options(&staff_filter, "Equipe", "Membros"),
        prev_url: (current_page > 1).then(|| page_url(&query, current_page - 1)),
        next_url: (current_page < total_pages).then(|| page_url(&query, current_page + 1)),
    };

    Ok(HtmlTemplate(template).into_response())
}

fn form_page(
    current_user: &CurrentUser,
    csrf: CsrfToken,
    member: Option<&Member>,
    form: MemberForm,
    errors: FieldErrors,
    detail: DetailQuery,
) -> Response {
    let template = AdminMemberFormTemplate {
        current_user: Some(UserInfo::from_member(&current_user.member)),
        csrf_token: csrf.0,
        is_new: member.is_none(),
        member: member.map(AdminMemberInfo::from_member),
        member_types: member_type_options(&form.member_type),
        states: state_options(&form.state),
        form,
        errors,
        saved: detail.saved.is_some(),
        photo_error: detail.photo_error,
    };
    HtmlTemplate(template).into_response()
}

// GET /admin/members/new/
pub async fn admin_new_member_page(
    Extension(current_user): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
) -> Response {
    form_page(&current_user, csrf, None, MemberForm::blank(), FieldErrors::new(), DetailQuery::default())
}

// POST /admin/members/new/
pub async fn admin_create_member(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Form(form): Form<MemberForm>,
) -> Result<Response, HtmlError> {
    match state.service_context.member_service.admin_create(form.clone()).await {
        Ok(member) => {
            tracing::info!(by = %current_user.member.id, member_id = %member.id, "Staff created member");
            Ok(Redirect::to(&format!("{}?saved=1", detail_url(member.id))).into_response())
        }
        Err(AppError::InvalidFields(errors)) => {
            let form = MemberForm { password1: String::new(), password2: String::new(), ..form };
            let mut response = form_page(&current_user, csrf, None, form, errors, DetailQuery::default());
            *response.status_mut() = StatusCode::UNPROCESSABLE_ENTITY;
            Ok(response)
        }
        Err(e) => Err(e.into()),
    }
}

async fn load_member(state: &AppState, id: Uuid) -> Result<Member, HtmlError> {
    state.service_context.member_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| HtmlError(AppError::NotFound("Membro não encontrado".to_string())))
}

// GET /admin/members/:id/
pub async fn admin_member_detail_page(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Path(id): Path<Uuid>,
    Query(detail): Query<DetailQuery>,
) -> Result<Response, HtmlError> {
    let member = load_member(&state, id).await?;
    let form = MemberForm::from_member(&member);
    Ok(form_page(&current_user, csrf, Some(&member), form, FieldErrors::new(), detail))
}

// POST /admin/members/:id/
pub async fn admin_update_member(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(csrf): Extension<CsrfToken>,
    Path(id): Path<Uuid>,
    Form(form): Form<MemberForm>,
) -> Result<Response, HtmlError> {
    match state.service_context.member_service.admin_update(id, form.clone()).await {
        Ok(member) => {
            tracing::info!(by = %current_user.member.id, member_id = %member.id, "Staff updated member");
            Ok(Redirect::to(&format!("{}?saved=1", detail_url(member.id))).into_response())
        }
        Err(AppError::InvalidFields(errors)) => {
            let member = load_member(&state, id).await?;
            let form = MemberForm { username: member.account.username.clone(), ..form };
            let mut response = form_page(&current_user, csrf, Some(&member), form, errors, DetailQuery::default());
            *response.status_mut() = StatusCode::UNPROCESSABLE_ENTITY;
            Ok(response)
        }
        Err(e) => Err(e.into()),
    }
}

// POST /admin/members/:id/activate/
pub async fn admin_activate_member(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, HtmlError> {
    state.service_context.member_service.set_active(id, true).await?;
    Ok(Redirect::to(&format!("{}?saved=1", detail_url(id))).into_response())
}

// POST /admin/members/:id/deactivate/
pub async fn admin_deactivate_member(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, HtmlError> {
    state.service_context.member_service.set_active(id, false).await?;
    Ok(Redirect::to(&format!("{}?saved=1", detail_url(id))).into_response())
}

// POST /admin/members/:id/photo/
pub async fn admin_upload_photo(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Response, HtmlError> {
    let cookie_value = jar.get(CSRF_COOKIE).map(|c| c.value().to_string()).unwrap_or_default();
    let mut csrf_ok = false;
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "csrf_token" => {
                let token = field.text().await.map_err(upload_error)?;
                csrf_ok = state.service_context.csrf_service.verify(&cookie_value, &token);
            }
            "photo" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let data = field.bytes().await.map_err(upload_error)?;
                upload = Some((filename, data.to_vec()));
            }
            _ => {
                field.bytes().await.map_err(upload_error)?;
            }
        }
    }

    if !csrf_ok {
        tracing::warn!(member_id = %id, "CSRF check failed on photo upload");
        return Ok(error_page(
            StatusCode::FORBIDDEN,
            "Acesso negado (403)",
            "Falha na verificação CSRF. Recarregue a página e tente novamente.",
        ));
    }

    // 404 before anything is written to disk
    load_member(&state, id).await?;

    let media_dir = &state.settings.server.media_dir;
    let (filename, data) = upload.unwrap_or_default();
    let path = match save_profile_photo(media_dir, &filename, &data).await {
        Ok(path) => path,
        Err(AppError::Validation(message)) => {
            let query = serde_urlencoded::to_string([("photo_error", message)]).unwrap_or_default();
            return Ok(Redirect::to(&format!("{}?{}", detail_url(id), query)).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let (_, previous) = state.service_context.member_service
        .replace_profile_photo(id, Some(path))
        .await?;
    remove_old_photo(media_dir, previous).await;

    Ok(Redirect::to(&format!("{}?saved=1", detail_url(id))).into_response())
}

fn upload_error(e: MultipartError) -> AppError {
    AppError::BadRequest(format!("Falha no envio: {}", e))
}

// POST /admin/members/:id/photo/remove/
pub async fn admin_remove_photo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, HtmlError> {
    let (_, previous) = state.service_context.member_service
        .replace_profile_photo(id, None)
        .await?;
    remove_old_photo(&state.settings.server.media_dir, previous).await;

    Ok(Redirect::to(&format!("{}?saved=1", detail_url(id))).into_response())
}

async fn remove_old_photo(media_dir: &str, previous: Option<String>) {
    if let Some(old) = previous {
        if let Err(e) = delete_profile_photo(media_dir, &old).await {
            tracing::warn!("Failed to delete old profile photo {}: {}", old, e);
        }
    }
}
