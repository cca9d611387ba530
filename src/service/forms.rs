use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use validator::Validate;

use crate::domain::*;
use crate::error::FieldErrors;

pub const REQUIRED: &str = "Este campo é obrigatório.";

/// Public sign-up form. Member type is not offered; self-registered members
/// start as affiliates.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RegistrationForm {
    #[serde(default)]
    #[validate(length(max = 150, message = "Use no máximo 150 caracteres."))]
    pub username: String,
    #[serde(default)]
    #[validate(email(message = "Informe um endereço de email válido."))]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Use no máximo 150 caracteres."))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Use no máximo 150 caracteres."))]
    pub last_name: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Use no máximo 150 caracteres."))]
    pub social_name: String,
    #[serde(default)]
    pub national_id: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "Use no máximo 100 caracteres."))]
    pub discord_handle: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetPasswordForm {
    #[serde(default)]
    pub new_password1: String,
    #[serde(default)]
    pub new_password2: String,
}

/// Staff form for creating and editing members. `username` and the
/// password pair only apply on creation.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MemberForm {
    #[serde(default)]
    #[validate(length(max = 150, message = "Use no máximo 150 caracteres."))]
    pub username: String,
    #[serde(default)]
    #[validate(email(message = "Informe um endereço de email válido."))]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Use no máximo 150 caracteres."))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Use no máximo 150 caracteres."))]
    pub last_name: String,
    #[serde(default, deserialize_with = "checkbox")]
    pub is_staff: bool,
    #[serde(default, deserialize_with = "checkbox")]
    pub is_superuser: bool,
    #[serde(default, deserialize_with = "checkbox")]
    pub is_active: bool,
    #[serde(default)]
    pub member_type: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Use no máximo 150 caracteres."))]
    pub social_name: String,
    #[serde(default)]
    pub national_id: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "Use no máximo 100 caracteres."))]
    pub discord_handle: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    #[validate(length(max = 200, message = "Use no máximo 200 caracteres."))]
    pub street: String,
    #[serde(default)]
    #[validate(length(max = 20, message = "Use no máximo 20 caracteres."))]
    pub number: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "Use no máximo 100 caracteres."))]
    pub complement: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "Use no máximo 100 caracteres."))]
    pub neighborhood: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "Use no máximo 100 caracteres."))]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub association_date: String,
    #[serde(default, deserialize_with = "checkbox")]
    pub active: bool,
}

impl MemberForm {
    /// Pre-filled edit form for an existing member.
    pub fn from_member(member: &Member) -> Self {
        Self {
            username: member.account.username.clone(),
            email: member.account.email.clone(),
            password1: String::new(),
            password2: String::new(),
            first_name: member.account.first_name.clone(),
            last_name: member.account.last_name.clone(),
            is_staff: member.account.is_staff,
            is_superuser: member.account.is_superuser,
            is_active: member.account.is_active,
            member_type: member.member_type.code().to_string(),
            social_name: member.social_name.clone(),
            national_id: member.national_id.as_ref().map(Cpf::formatted).unwrap_or_default(),
            phone: member.phone.clone(),
            discord_handle: member.discord_handle.clone(),
            postal_code: member.postal_code.as_ref().map(|c| c.to_string()).unwrap_or_default(),
            street: member.street.clone(),
            number: member.number.clone(),
            complement: member.complement.clone(),
            neighborhood: member.neighborhood.clone(),
            city: member.city.clone(),
            state: member.state.code().to_string(),
            association_date: member
                .association_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            active: member.active,
        }
    }

    /// Blank creation form with the store defaults pre-selected.
    pub fn blank() -> Self {
        Self {
            is_active: true,
            active: true,
            member_type: MemberType::default().code().to_string(),
            city: DEFAULT_CITY.to_string(),
            state: FederativeUnit::default().code().to_string(),
            ..Default::default()
        }
    }
}

/// HTML checkboxes are simply absent when unchecked.
fn checkbox<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(matches!(
        value.as_deref().map(str::trim),
        Some(v) if !v.is_empty() && v != "false" && v != "0" && v != "off"
    ))
}

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[\w.@+-]+$").expect("username pattern is valid"))
}

/// Lowercases the domain part; the local part is kept as typed.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

pub(crate) fn check_username(username: &str, errors: &mut FieldErrors) {
    if username.is_empty() {
        errors.add("username", REQUIRED);
    } else if !username_pattern().is_match(username) {
        errors.add(
            "username",
            "Informe um nome de usuário válido. Use apenas letras, números e os caracteres @/./+/-/_.",
        );
    }
}

pub(crate) fn check_required(field: &str, value: &str, errors: &mut FieldErrors) {
    if value.trim().is_empty() {
        errors.add(field, REQUIRED);
    }
}

pub(crate) fn parse_cpf(value: &str, errors: &mut FieldErrors) -> Option<Cpf> {
    if value.trim().is_empty() {
        return None;
    }
    match Cpf::parse(value) {
        Ok(cpf) => Some(cpf),
        Err(e) => {
            errors.add("national_id", e.to_string());
            None
        }
    }
}

pub(crate) fn parse_cep(value: &str, errors: &mut FieldErrors) -> Option<Cep> {
    if value.trim().is_empty() {
        return None;
    }
    match Cep::parse(value) {
        Ok(cep) => Some(cep),
        Err(e) => {
            errors.add("postal_code", e.to_string());
            None
        }
    }
}

pub(crate) fn check_phone(value: &str, errors: &mut FieldErrors) {
    if !value.trim().is_empty() && !is_valid_phone(value) {
        errors.add(
            "phone",
            "Informe um telefone válido, com 9 a 15 dígitos. Ex.: +5521999999999",
        );
    }
}

pub(crate) fn parse_member_type(value: &str, errors: &mut FieldErrors) -> MemberType {
    if value.trim().is_empty() {
        return MemberType::default();
    }
    MemberType::from_code(value.trim()).unwrap_or_else(|| {
        errors.add("member_type", "Selecione um tipo de membro válido.");
        MemberType::default()
    })
}

pub(crate) fn parse_state(value: &str, errors: &mut FieldErrors) -> FederativeUnit {
    if value.trim().is_empty() {
        return FederativeUnit::default();
    }
    FederativeUnit::from_str(value.trim()).unwrap_or_else(|_| {
        errors.add("state", "Selecione uma UF válida.");
        FederativeUnit::default()
    })
}

pub(crate) fn parse_date(field: &str, value: &str, errors: &mut FieldErrors) -> Option<NaiveDate> {
    if value.trim().is_empty() {
        return None;
    }
    match NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            errors.add(field, "Informe uma data válida (AAAA-MM-DD).");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email_lowercases_domain_only() {
        assert_eq!(normalize_email("  Ana.Souza@Example.COM "), "Ana.Souza@example.com");
        assert_eq!(normalize_email("no-at-sign"), "no-at-sign");
    }

    #[test]
    fn test_username_characters() {
        let mut errors = FieldErrors::new();
        check_username("ana.souza+rj@x", &mut errors);
        assert!(errors.is_empty());

        check_username("ana souza", &mut errors);
        assert!(errors.contains("username"));
    }

    #[test]
    fn test_checkbox_fields_from_urlencoded() {
        let form: MemberForm = serde_urlencoded::from_str("username=a&is_staff=on&active=on").unwrap();
        assert!(form.is_staff);
        assert!(form.active);
        assert!(!form.is_superuser);
        assert!(!form.is_active);
    }

    #[test]
    fn test_field_parsers_report_errors() {
        let mut errors = FieldErrors::new();
        assert!(parse_cpf("123.456.789-00", &mut errors).is_none());
        assert!(parse_cep("2004", &mut errors).is_none());
        assert_eq!(parse_state("xx", &mut errors), FederativeUnit::default());
        assert_eq!(parse_member_type("ADMIN", &mut errors), MemberType::Affiliate);
        assert!(parse_date("association_date", "31/12/2024", &mut errors).is_none());
        check_phone("abc", &mut errors);

        for field in ["national_id", "postal_code", "state", "member_type", "association_date", "phone"] {
            assert!(errors.contains(field), "missing error for {}", field);
        }
    }

    #[test]
    fn test_blank_values_are_not_errors() {
        let mut errors = FieldErrors::new();
        assert!(parse_cpf("  ", &mut errors).is_none());
        assert!(parse_cep("", &mut errors).is_none());
        check_phone("", &mut errors);
        assert!(errors.is_empty());
    }
}
