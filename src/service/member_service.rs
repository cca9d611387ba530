use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{
        password_policy::UserAttributes,
        reset_tokens::{decode_uid, encode_uid},
        AuthService, PasswordPolicy, ResetTokenStore,
    },
    domain::*,
    email::{password_reset_email, EmailSender},
    error::{AppError, FieldErrors, Result},
    repository::MemberRepository,
};
use super::forms::{self, MemberForm, RegistrationForm, SetPasswordForm};

const PASSWORD_MISMATCH: &str = "Os dois campos de senha não correspondem.";

pub struct MemberService {
    repo: Arc<dyn MemberRepository>,
    auth_service: Arc<AuthService>,
    reset_tokens: Arc<ResetTokenStore>,
    email_sender: Arc<dyn EmailSender>,
    password_policy: PasswordPolicy,
    base_url: String,
    reset_timeout_hours: i64,
}

impl MemberService {
    pub fn new(
        repo: Arc<dyn MemberRepository>,
        auth_service: Arc<AuthService>,
        reset_tokens: Arc<ResetTokenStore>,
        email_sender: Arc<dyn EmailSender>,
        base_url: &str,
        reset_timeout_hours: i64,
    ) -> Self {
        Self {
            repo,
            auth_service,
            reset_tokens,
            email_sender,
            password_policy: PasswordPolicy::default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            reset_timeout_hours,
        }
    }

    /// Self-registration. The caller is expected to open a session for the
    /// returned member.
    pub async fn register(&self, form: RegistrationForm) -> Result<Member> {
        let username = form.username.trim().to_string();
        let email = forms::normalize_email(&form.email);

        let mut errors = FieldErrors::new();
        forms::check_username(&username, &mut errors);
        forms::check_required("email", &email, &mut errors);
        if let Err(e) = form.validate() {
            errors.extend_missing(e.into());
        }

        let national_id = forms::parse_cpf(&form.national_id, &mut errors);
        forms::check_phone(&form.phone, &mut errors);

        self.check_new_password(
            "password1",
            &form.password1,
            &form.password2,
            &UserAttributes {
                username: &username,
                first_name: &form.first_name,
                last_name: &form.last_name,
                email: &email,
            },
            &mut errors,
        );

        self.check_unique(None, Some(&username), &email, national_id.as_ref(), &mut errors)
            .await?;
        errors.into_result()?;

        let password_hash = AuthService::hash_password(&form.password1).await?;
        let member = self.repo
            .create(NewMember {
                username,
                email,
                password_hash,
                first_name: form.first_name.trim().to_string(),
                last_name: form.last_name.trim().to_string(),
                member_type: Some(MemberType::Affiliate),
                social_name: form.social_name.trim().to_string(),
                national_id,
                phone: form.phone.trim().to_string(),
                discord_handle: form.discord_handle.trim().to_string(),
                ..Default::default()
            })
            .await?;

        tracing::info!(member_id = %member.id, username = %member.account.username, "Member registered");
        Ok(member)
    }

    /// Checks credentials given a username or email. Every failure is the
    /// same `InvalidCredentials`.
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<Member> {
        let login = login.trim();
        if login.is_empty() || password.is_empty() {
            return Err(AppError::InvalidCredentials);
        }

        let member = match self.repo.find_by_username(login).await? {
            Some(member) => Some(member),
            None => self.repo.find_by_email(login).await?,
        };

        let Some(member) = member else {
            AuthService::verify_dummy_password(password).await;
            tracing::warn!("Failed login attempt for unknown account");
            return Err(AppError::InvalidCredentials);
        };

        let valid = match self.repo.password_hash(member.id).await? {
            Some(hash) => AuthService::verify_password(password, &hash).await.unwrap_or(false),
            None => false,
        };

        if !valid || !member.account.is_active {
            tracing::warn!(member_id = %member.id, "Failed login attempt");
            return Err(AppError::InvalidCredentials);
        }

        self.repo.touch_last_login(member.id).await?;
        tracing::info!(member_id = %member.id, "Member logged in");
        Ok(member)
    }

    /// Sends a reset link when an active account owns the address. The
    /// outcome is never reported back, so callers respond the same way
    /// whether or not the address is known.
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let email = forms::normalize_email(email);
        if email.is_empty() {
            return Ok(());
        }

        let Some(member) = self.repo.find_by_email(&email).await? else {
            tracing::info!("Password reset requested for unknown email");
            return Ok(());
        };

        if !member.account.is_active || self.repo.password_hash(member.id).await?.is_none() {
            tracing::info!(member_id = %member.id, "Password reset requested for inactive account");
            return Ok(());
        }

        let token = self.reset_tokens.issue(member.id).await?;
        let link = self.reset_link(member.id, &token);
        let message = password_reset_email(
            member.email(),
            &member.display_name(),
            &link,
            self.reset_timeout_hours,
        );

        if let Err(e) = self.email_sender.send(message).await {
            tracing::error!(member_id = %member.id, "Failed to send password reset email: {}", e);
        } else {
            tracing::info!(member_id = %member.id, "Password reset email sent");
        }

        Ok(())
    }

    pub fn reset_link(&self, member_id: Uuid, token: &str) -> String {
        format!("{}/reset/{}/{}/", self.base_url, encode_uid(member_id), token)
    }

    /// Resolves the member behind a reset link without consuming it.
    pub async fn check_reset_link(&self, uidb64: &str, token: &str) -> Result<Member> {
        let member_id = decode_uid(uidb64).ok_or(AppError::InvalidToken)?;
        let member = self.repo
            .find_by_id(member_id)
            .await?
            .ok_or(AppError::InvalidToken)?;

        if !member.account.is_active || !self.reset_tokens.is_valid(member.id, token).await? {
            return Err(AppError::InvalidToken);
        }

        Ok(member)
    }

    /// Sets a new password through a reset link. The token works once; on
    /// success every other reset token and every session of the member is
    /// dropped.
    pub async fn confirm_password_reset(
        &self,
        uidb64: &str,
        token: &str,
        form: SetPasswordForm,
    ) -> Result<Member> {
        let member = self.check_reset_link(uidb64, token).await?;

        let mut errors = FieldErrors::new();
        self.check_new_password(
            "new_password1",
            &form.new_password1,
            &form.new_password2,
            &UserAttributes {
                username: member.username(),
                first_name: &member.account.first_name,
                last_name: &member.account.last_name,
                email: member.email(),
            },
            &mut errors,
        );
        errors.into_result()?;

        let hash = AuthService::hash_password(&form.new_password1).await?;
        if !self.reset_tokens.redeem(member.id, token, &hash).await? {
            return Err(AppError::InvalidToken);
        }

        tracing::info!(member_id = %member.id, "Password reset completed");
        Ok(member)
    }

    pub async fn admin_create(&self, form: MemberForm) -> Result<Member> {
        let username = form.username.trim().to_string();
        let email = forms::normalize_email(&form.email);

        let mut errors = FieldErrors::new();
        forms::check_username(&username, &mut errors);
        forms::check_required("email", &email, &mut errors);
        if let Err(e) = form.validate() {
            errors.extend_missing(e.into());
        }
        let profile = ProfileFields::parse(&form, &mut errors);

        self.check_new_password(
            "password1",
            &form.password1,
            &form.password2,
            &UserAttributes {
                username: &username,
                first_name: &form.first_name,
                last_name: &form.last_name,
                email: &email,
            },
            &mut errors,
        );
        self.check_unique(None, Some(&username), &email, profile.national_id.as_ref(), &mut errors)
            .await?;
        errors.into_result()?;

        let password_hash = AuthService::hash_password(&form.password1).await?;
        let mut member = self.repo
            .create(NewMember {
                username,
                email,
                password_hash,
                first_name: form.first_name.trim().to_string(),
                last_name: form.last_name.trim().to_string(),
                is_staff: form.is_staff,
                is_superuser: form.is_superuser,
                member_type: Some(profile.member_type),
                social_name: form.social_name.trim().to_string(),
                national_id: profile.national_id,
                phone: form.phone.trim().to_string(),
                discord_handle: form.discord_handle.trim().to_string(),
                postal_code: profile.postal_code,
                street: form.street.trim().to_string(),
                number: form.number.trim().to_string(),
                complement: form.complement.trim().to_string(),
                neighborhood: form.neighborhood.trim().to_string(),
                city: Some(profile.city),
                state: Some(profile.state),
                association_date: profile.association_date,
            })
            .await?;

        if !form.active || !form.is_active {
            member = self.repo
                .update(member.id, UpdateMember {
                    active: Some(form.active),
                    is_active: Some(form.is_active),
                    ..Default::default()
                })
                .await?;
        }

        tracing::info!(member_id = %member.id, "Member created by staff");
        Ok(member)
    }

    /// Staff edit of role, contact, address and status fields.
    pub async fn admin_update(&self, id: Uuid, form: MemberForm) -> Result<Member> {
        let existing = self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Membro não encontrado".to_string()))?;

        let email = forms::normalize_email(&form.email);
        let mut errors = FieldErrors::new();
        forms::check_required("email", &email, &mut errors);
        if let Err(e) = form.validate() {
            // username is read-only on edit
            let mut validation: FieldErrors = e.into();
            validation.remove("username");
            errors.extend_missing(validation);
        }
        let profile = ProfileFields::parse(&form, &mut errors);

        self.check_unique(Some(existing.id), None, &email, profile.national_id.as_ref(), &mut errors)
            .await?;
        errors.into_result()?;

        let member = self.repo
            .update(id, UpdateMember {
                email: Some(email),
                first_name: Some(form.first_name.trim().to_string()),
                last_name: Some(form.last_name.trim().to_string()),
                is_staff: Some(form.is_staff),
                is_superuser: Some(form.is_superuser),
                is_active: Some(form.is_active),
                member_type: Some(profile.member_type),
                social_name: Some(form.social_name.trim().to_string()),
                national_id: Some(profile.national_id),
                phone: Some(form.phone.trim().to_string()),
                discord_handle: Some(form.discord_handle.trim().to_string()),
                postal_code: Some(profile.postal_code),
                street: Some(form.street.trim().to_string()),
                number: Some(form.number.trim().to_string()),
                complement: Some(form.complement.trim().to_string()),
                neighborhood: Some(form.neighborhood.trim().to_string()),
                city: Some(profile.city),
                state: Some(profile.state),
                association_date: Some(profile.association_date),
                active: Some(form.active),
            })
            .await?;

        if existing.account.is_active && !member.account.is_active {
            self.auth_service.invalidate_member_sessions(member.id).await?;
        }

        tracing::info!(member_id = %member.id, "Member updated by staff");
        Ok(member)
    }

    /// Soft delete and reactivation of the membership status.
    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<Member> {
        let member = self.repo.set_active(id, active).await?;
        tracing::info!(member_id = %member.id, active, "Membership status changed");
        Ok(member)
    }

    /// Points the member at a new photo and hands back the previous path so
    /// the caller can remove the old file.
    pub async fn replace_profile_photo(
        &self,
        id: Uuid,
        path: Option<String>,
    ) -> Result<(Member, Option<String>)> {
        let previous = self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Membro não encontrado".to_string()))?
            .profile_photo;

        let member = self.repo.set_profile_photo(id, path).await?;
        tracing::info!(member_id = %member.id, "Profile photo updated");
        Ok((member, previous))
    }

    fn check_new_password(
        &self,
        field: &str,
        password: &str,
        confirmation: &str,
        user: &UserAttributes<'_>,
        errors: &mut FieldErrors,
    ) {
        if password.is_empty() {
            errors.add(field, forms::REQUIRED);
            return;
        }
        if password != confirmation {
            let confirmation_field = if field == "new_password1" { "new_password2" } else { "password2" };
            errors.add(confirmation_field, PASSWORD_MISMATCH);
            return;
        }
        for message in self.password_policy.validate(password, user) {
            errors.add(field, message);
        }
    }

    /// Friendly duplicate messages before the insert. The UNIQUE indexes
    /// still decide races between concurrent writers.
    async fn check_unique(
        &self,
        current: Option<Uuid>,
        username: Option<&str>,
        email: &str,
        national_id: Option<&Cpf>,
        errors: &mut FieldErrors,
    ) -> Result<()> {
        let is_other = |found: &Member| Some(found.id) != current;

        if let Some(username) = username.filter(|u| !u.is_empty() && !errors.contains("username")) {
            if self.repo.find_by_username(username).await?.is_some_and(|m| is_other(&m)) {
                errors.add("username", "Um usuário com este nome de usuário já existe.");
            }
        }
        if !email.is_empty() && !errors.contains("email") {
            if self.repo.find_by_email(email).await?.is_some_and(|m| is_other(&m)) {
                errors.add("email", "Já existe um usuário com este e-mail.");
            }
        }
        if let Some(cpf) = national_id {
            if self.repo.find_by_national_id(cpf).await?.is_some_and(|m| is_other(&m)) {
                errors.add("national_id", "Já existe um usuário com este CPF.");
            }
        }

        Ok(())
    }
}

/// Typed profile values parsed out of a staff form.
struct ProfileFields {
    member_type: MemberType,
    national_id: Option<Cpf>,
    postal_code: Option<Cep>,
    city: String,
    state: FederativeUnit,
    association_date: Option<chrono::NaiveDate>,
}

impl ProfileFields {
    fn parse(form: &MemberForm, errors: &mut FieldErrors) -> Self {
        forms::check_phone(&form.phone, errors);
        let city = form.city.trim();
        Self {
            member_type: forms::parse_member_type(&form.member_type, errors),
            national_id: forms::parse_cpf(&form.national_id, errors),
            postal_code: forms::parse_cep(&form.postal_code, errors),
            city: if city.is_empty() { DEFAULT_CITY.to_string() } else { city.to_string() },
            state: forms::parse_state(&form.state, errors),
            association_date: forms::parse_date("association_date", &form.association_date, errors),
        }
    }
}
