use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;

use intranet::{
    auth::reset_tokens::encode_uid,
    config::Settings,
    domain::MemberType,
    email::{EmailSender, OutgoingEmail},
    error::AppError,
    repository::{MemberRepository, SqliteMemberRepository},
    service::{MemberForm, RegistrationForm, ServiceContext, SetPasswordForm},
    MIGRATOR,
};

#[derive(Default)]
struct RecordingEmailSender {
    sent: Mutex<Vec<OutgoingEmail>>,
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, email: OutgoingEmail) -> intranet::error::Result<()> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

async fn context() -> anyhow::Result<(ServiceContext, Arc<RecordingEmailSender>)> {
    context_with(Settings::default()).await
}

async fn context_with(settings: Settings) -> anyhow::Result<(ServiceContext, Arc<RecordingEmailSender>)> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    MIGRATOR.run(&pool).await?;

    let emails = Arc::new(RecordingEmailSender::default());
    let repo: Arc<dyn MemberRepository> = Arc::new(SqliteMemberRepository::new(pool.clone()));
    let context = ServiceContext::new(repo, emails.clone(), pool, &settings);
    Ok((context, emails))
}

fn registration(username: &str, national_id: &str) -> RegistrationForm {
    RegistrationForm {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        first_name: "Ana".to_string(),
        last_name: "Souza".to_string(),
        national_id: national_id.to_string(),
        password1: "dados-e-tabuleiros".to_string(),
        password2: "dados-e-tabuleiros".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_register_defaults_and_optional_cpf() -> anyhow::Result<()> {
    let (ctx, _) = context().await?;

    let ana = ctx.member_service.register(registration("ana", "")).await?;
    let bia = ctx.member_service.register(registration("bia", "")).await?;
    assert_eq!(ana.member_type, MemberType::Affiliate);
    assert!(ana.national_id.is_none() && bia.national_id.is_none());

    let err = ctx.member_service
        .register(RegistrationForm {
            password2: "outra-coisa".to_string(),
            ..registration("carla", "")
        })
        .await
        .unwrap_err();
    match err {
        AppError::InvalidFields(errors) => assert!(errors.contains("password2")),
        other => panic!("unexpected error: {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn test_password_similar_to_username_is_rejected() -> anyhow::Result<()> {
    let (ctx, _) = context().await?;

    let err = ctx.member_service
        .register(RegistrationForm {
            password1: "anasouza1".to_string(),
            password2: "anasouza1".to_string(),
            ..registration("anasouza", "")
        })
        .await
        .unwrap_err();
    match err {
        AppError::InvalidFields(errors) => {
            assert!(errors.messages("password1").iter().any(|m| m.contains("parecida")));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn test_deactivated_account_cannot_log_in() -> anyhow::Result<()> {
    let (ctx, emails) = context().await?;
    let member = ctx.member_service.register(registration("ana", "529.982.247-25")).await?;
    let (_, token) = ctx.auth_service.create_session(member.id).await?;

    let form = MemberForm { is_active: false, ..MemberForm::from_member(&member) };
    let updated = ctx.member_service.admin_update(member.id, form).await?;
    assert!(!updated.account.is_active);

    // Sessions die with the account
    assert!(ctx.auth_service.validate_session(&token).await?.is_none());

    let err = ctx.member_service.authenticate("ana", "dados-e-tabuleiros").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));

    // Inactive accounts get no reset mail either
    ctx.member_service.request_password_reset("ana@example.com").await?;
    assert!(emails.sent.lock().unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_membership_flag_does_not_block_login() -> anyhow::Result<()> {
    let (ctx, _) = context().await?;
    let member = ctx.member_service.register(registration("ana", "")).await?;

    ctx.member_service.set_active(member.id, false).await?;
    let signed_in = ctx.member_service.authenticate("ana", "dados-e-tabuleiros").await?;
    assert!(!signed_in.active);
    assert!(signed_in.account.last_login.is_none());

    let reloaded = ctx.member_repo.find_by_id(member.id).await?.unwrap();
    assert!(reloaded.account.last_login.is_some());
    Ok(())
}

#[tokio::test]
async fn test_reset_token_is_single_use() -> anyhow::Result<()> {
    let (ctx, _) = context().await?;
    let member = ctx.member_service.register(registration("ana", "")).await?;

    let token = ctx.reset_tokens.issue(member.id).await?;
    let uid = encode_uid(member.id);
    let form = SetPasswordForm {
        new_password1: "nova-senha-secreta".to_string(),
        new_password2: "nova-senha-secreta".to_string(),
    };

    ctx.member_service.confirm_password_reset(&uid, &token, form.clone()).await?;
    let again = ctx.member_service.confirm_password_reset(&uid, &token, form).await;
    assert!(matches!(again, Err(AppError::InvalidToken)));

    ctx.member_service.authenticate("ana", "nova-senha-secreta").await?;
    Ok(())
}

#[tokio::test]
async fn test_expired_reset_token_is_rejected() -> anyhow::Result<()> {
    let mut settings = Settings::default();
    settings.auth.password_reset_timeout_hours = 0;
    let (ctx, _) = context_with(settings).await?;
    let member = ctx.member_service.register(registration("ana", "")).await?;

    let token = ctx.reset_tokens.issue(member.id).await?;
    let uid = encode_uid(member.id);

    let checked = ctx.member_service.check_reset_link(&uid, &token).await;
    assert!(matches!(checked, Err(AppError::InvalidToken)));

    let form = SetPasswordForm {
        new_password1: "nova-senha-secreta".to_string(),
        new_password2: "nova-senha-secreta".to_string(),
    };
    let confirmed = ctx.member_service.confirm_password_reset(&uid, &token, form).await;
    assert!(matches!(confirmed, Err(AppError::InvalidToken)));

    ctx.member_service.authenticate("ana", "dados-e-tabuleiros").await?;
    Ok(())
}

#[tokio::test]
async fn test_failed_password_write_keeps_reset_link_usable() -> anyhow::Result<()> {
    let (ctx, _) = context().await?;
    let member = ctx.member_service.register(registration("ana", "")).await?;
    let (_, session) = ctx.auth_service.create_session(member.id).await?;

    let token = ctx.reset_tokens.issue(member.id).await?;
    let uid = encode_uid(member.id);
    let form = SetPasswordForm {
        new_password1: "nova-senha-secreta".to_string(),
        new_password2: "nova-senha-secreta".to_string(),
    };

    sqlx::query(
        "CREATE TRIGGER block_password BEFORE UPDATE OF password_hash ON members \
         BEGIN SELECT RAISE(ABORT, 'blocked'); END",
    )
    .execute(&ctx.db_pool)
    .await?;

    let failed = ctx.member_service.confirm_password_reset(&uid, &token, form.clone()).await;
    assert!(failed.is_err());
    assert!(ctx.reset_tokens.is_valid(member.id, &token).await?);
    assert!(ctx.auth_service.validate_session(&session).await?.is_some());
    ctx.member_service.authenticate("ana", "dados-e-tabuleiros").await?;

    sqlx::query("DROP TRIGGER block_password").execute(&ctx.db_pool).await?;

    ctx.member_service.confirm_password_reset(&uid, &token, form).await?;
    ctx.member_service.authenticate("ana", "nova-senha-secreta").await?;
    assert!(ctx.auth_service.validate_session(&session).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_admin_update_rejects_taken_cpf() -> anyhow::Result<()> {
    let (ctx, _) = context().await?;
    ctx.member_service.register(registration("ana", "529.982.247-25")).await?;
    let bia = ctx.member_service.register(registration("bia", "")).await?;

    let form = MemberForm {
        national_id: "529.982.247-25".to_string(),
        ..MemberForm::from_member(&bia)
    };
    let err = ctx.member_service.admin_update(bia.id, form).await.unwrap_err();
    match err {
        AppError::InvalidFields(errors) => assert!(errors.contains("national_id")),
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}
