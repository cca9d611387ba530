pub mod forms;
pub mod member_service;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::repository::*;
use crate::auth::{AuthService, CsrfService, ResetTokenStore};
use crate::config::Settings;
use crate::email::EmailSender;
use member_service::MemberService;

pub use forms::{MemberForm, RegistrationForm, SetPasswordForm};

/// Everything handlers need, built once at startup and shared by reference.
pub struct ServiceContext {
    pub member_repo: Arc<dyn MemberRepository>,
    pub auth_service: Arc<AuthService>,
    pub csrf_service: Arc<CsrfService>,
    pub reset_tokens: Arc<ResetTokenStore>,
    pub email_sender: Arc<dyn EmailSender>,
    pub member_service: Arc<MemberService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        member_repo: Arc<dyn MemberRepository>,
        email_sender: Arc<dyn EmailSender>,
        db_pool: SqlitePool,
        settings: &Settings,
    ) -> Self {
        let auth_service = Arc::new(AuthService::new(
            db_pool.clone(),
            settings.auth.session_duration_hours,
            settings.server.secure_cookies(),
        ));
        let csrf_service = Arc::new(CsrfService::new(&settings.auth.secret_key));
        let reset_tokens = Arc::new(ResetTokenStore::new(
            db_pool.clone(),
            settings.auth.password_reset_timeout_hours,
        ));

        let member_service = Arc::new(MemberService::new(
            member_repo.clone(),
            auth_service.clone(),
            reset_tokens.clone(),
            email_sender.clone(),
            &settings.server.base_url,
            settings.auth.password_reset_timeout_hours,
        ));

        Self {
            member_repo,
            auth_service,
            csrf_service,
            reset_tokens,
            email_sender,
            member_service,
            db_pool,
        }
    }

    /// Wires the SQLite repository and the configured email backend.
    pub fn from_settings(db_pool: SqlitePool, settings: &Settings) -> crate::error::Result<Self> {
        let member_repo: Arc<dyn MemberRepository> =
            Arc::new(SqliteMemberRepository::new(db_pool.clone()));
        let email_sender: Arc<dyn EmailSender> = Arc::from(crate::email::from_settings(&settings.email)?);
        Ok(Self::new(member_repo, email_sender, db_pool, settings))
    }
}
