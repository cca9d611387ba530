use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::brazil::{Cep, Cpf, FederativeUnit};

pub const DEFAULT_CITY: &str = "Rio de Janeiro";

/// Login identity shared by every member: credentials, names and the
/// staff/superuser/active flags. The password hash is stored alongside but
/// only the auth layer reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    /// Login gate. Distinct from [`Member::active`].
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

impl Account {
    /// `"{first} {last}"`, trimmed; empty when neither is set.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub account: Account,
    pub member_type: MemberType,
    pub social_name: String,
    pub national_id: Option<Cpf>,
    pub phone: String,
    pub discord_handle: String,
    pub postal_code: Option<Cep>,
    pub street: String,
    pub number: String,
    pub complement: String,
    pub neighborhood: String,
    pub city: String,
    pub state: FederativeUnit,
    pub association_date: Option<NaiveDate>,
    /// Membership status used for listings; does not block login.
    pub active: bool,
    pub profile_photo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberType {
    Board,
    Associate,
    #[default]
    Affiliate,
    Collective,
}

impl MemberType {
    pub const ALL: [MemberType; 4] = [
        MemberType::Board,
        MemberType::Associate,
        MemberType::Affiliate,
        MemberType::Collective,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            MemberType::Board => "BOARD",
            MemberType::Associate => "ASSOCIATE",
            MemberType::Affiliate => "AFFILIATE",
            MemberType::Collective => "COLLECTIVE",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MemberType::Board => "Diretoria",
            MemberType::Associate => "Associado",
            MemberType::Affiliate => "Afiliado",
            MemberType::Collective => "Coletivo/Institucional",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        MemberType::ALL.into_iter().find(|t| t.code() == code)
    }
}

/// Anything with an owning member, e.g. a company or project record.
pub trait Owned {
    fn owner_id(&self) -> Option<Uuid>;
}

impl Member {
    pub fn username(&self) -> &str {
        &self.account.username
    }

    pub fn email(&self) -> &str {
        &self.account.email
    }

    /// Social name, else full name, else username.
    pub fn display_name(&self) -> String {
        let social = self.social_name.trim();
        if !social.is_empty() {
            return social.to_string();
        }
        let full = self.account.full_name();
        if !full.is_empty() {
            return full;
        }
        self.account.username.clone()
    }

    /// `"{display_name} ({member type label})"`, as shown in listings.
    pub fn listing_label(&self) -> String {
        format!("{} ({})", self.display_name(), self.member_type.label())
    }

    pub fn initials(&self) -> String {
        let initials: String = self.display_name()
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .take(2)
            .collect::<String>()
            .to_uppercase();
        if initials.is_empty() { "?".to_string() } else { initials }
    }

    /// One-line postal address; empty when no street is recorded.
    pub fn full_address(&self) -> String {
        if self.street.trim().is_empty() {
            return String::new();
        }

        let mut parts = vec![self.street.trim().to_string()];
        if !self.number.trim().is_empty() {
            parts.push(format!("nº {}", self.number.trim()));
        }
        if !self.complement.trim().is_empty() {
            parts.push(self.complement.trim().to_string());
        }
        if !self.neighborhood.trim().is_empty() {
            parts.push(self.neighborhood.trim().to_string());
        }
        if !self.city.trim().is_empty() {
            parts.push(format!("{}/{}", self.city.trim(), self.state.code()));
        }
        if let Some(cep) = &self.postal_code {
            parts.push(format!("CEP: {}", cep));
        }

        parts.join(", ")
    }

    pub fn is_board(&self) -> bool {
        self.member_type == MemberType::Board
    }

    /// Associates include the board.
    pub fn is_associate(&self) -> bool {
        matches!(self.member_type, MemberType::Board | MemberType::Associate)
    }

    pub fn is_affiliate(&self) -> bool {
        self.member_type == MemberType::Affiliate
    }

    pub fn is_collective(&self) -> bool {
        self.member_type == MemberType::Collective
    }

    pub fn can_edit<T: Owned + ?Sized>(&self, target: &T) -> bool {
        can_edit(self, target)
    }
}

/// Board edits anything, associates edit what they own, affiliates and
/// collectives edit nothing.
pub fn can_edit<T: Owned + ?Sized>(actor: &Member, target: &T) -> bool {
    match actor.member_type {
        MemberType::Board => true,
        MemberType::Associate => target.owner_id() == Some(actor.id),
        MemberType::Affiliate | MemberType::Collective => false,
    }
}

/// Values for a member about to be inserted. Unset profile fields take the
/// store defaults (affiliate, Rio de Janeiro/RJ, active).
#[derive(Debug, Clone, Default)]
pub struct NewMember {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub member_type: Option<MemberType>,
    pub social_name: String,
    pub national_id: Option<Cpf>,
    pub phone: String,
    pub discord_handle: String,
    pub postal_code: Option<Cep>,
    pub street: String,
    pub number: String,
    pub complement: String,
    pub neighborhood: String,
    pub city: Option<String>,
    pub state: Option<FederativeUnit>,
    pub association_date: Option<NaiveDate>,
}

/// Partial update applied by administrators. `None` leaves a field as is;
/// the nested options clear nullable columns.
#[derive(Debug, Clone, Default)]
pub struct UpdateMember {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_staff: Option<bool>,
    pub is_superuser: Option<bool>,
    pub is_active: Option<bool>,
    pub member_type: Option<MemberType>,
    pub social_name: Option<String>,
    pub national_id: Option<Option<Cpf>>,
    pub phone: Option<String>,
    pub discord_handle: Option<String>,
    pub postal_code: Option<Option<Cep>>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<FederativeUnit>,
    pub association_date: Option<Option<NaiveDate>>,
    pub active: Option<bool>,
}

/// Search and filter options for member listings.
#[derive(Debug, Clone, Default)]
pub struct MemberFilter {
    pub search: Option<String>,
    pub member_type: Option<MemberType>,
    pub active: Option<bool>,
    pub is_staff: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_member(username: &str) -> Member {
        let now = Utc::now();
        Member {
            id: Uuid::new_v4(),
            account: Account {
                username: username.to_string(),
                email: format!("{}@example.com", username),
                first_name: String::new(),
                last_name: String::new(),
                is_staff: false,
                is_superuser: false,
                is_active: true,
                last_login: None,
                date_joined: now,
            },
            member_type: MemberType::default(),
            social_name: String::new(),
            national_id: None,
            phone: String::new(),
            discord_handle: String::new(),
            postal_code: None,
            street: String::new(),
            number: String::new(),
            complement: String::new(),
            neighborhood: String::new(),
            city: DEFAULT_CITY.to_string(),
            state: FederativeUnit::default(),
            association_date: None,
            active: true,
            profile_photo: None,
            created_at: now,
            updated_at: now,
        }
    }

    struct Project {
        owner: Option<Uuid>,
    }

    impl Owned for Project {
        fn owner_id(&self) -> Option<Uuid> {
            self.owner
        }
    }

    #[test]
    fn test_display_name_prefers_social_name() {
        let mut member = sample_member("ana");
        member.account.first_name = "Ana".to_string();
        member.account.last_name = "Souza".to_string();
        member.social_name = "Aninha".to_string();
        assert_eq!(member.display_name(), "Aninha");
    }

    #[test]
    fn test_display_name_falls_back_to_full_name_then_username() {
        let mut member = sample_member("ana");
        member.account.first_name = "Ana".to_string();
        member.account.last_name = "Souza".to_string();
        assert_eq!(member.display_name(), "Ana Souza");

        member.account.last_name.clear();
        assert_eq!(member.display_name(), "Ana");

        member.account.first_name.clear();
        member.social_name = "   ".to_string();
        assert_eq!(member.display_name(), "ana");
    }

    #[test]
    fn test_listing_label_includes_type() {
        let mut member = sample_member("bruno");
        member.member_type = MemberType::Collective;
        assert_eq!(member.listing_label(), "bruno (Coletivo/Institucional)");
    }

    #[test]
    fn test_defaults() {
        let member = sample_member("c");
        assert_eq!(member.member_type, MemberType::Affiliate);
        assert_eq!(member.state.code(), "RJ");
        assert_eq!(member.city, "Rio de Janeiro");
    }

    #[test]
    fn test_can_edit_by_member_type() {
        let mut actor = sample_member("actor");
        let own = Project { owner: Some(actor.id) };
        let other = Project { owner: Some(Uuid::new_v4()) };
        let orphan = Project { owner: None };

        actor.member_type = MemberType::Board;
        assert!(actor.can_edit(&own));
        assert!(actor.can_edit(&other));
        assert!(actor.can_edit(&orphan));

        actor.member_type = MemberType::Associate;
        assert!(actor.can_edit(&own));
        assert!(!actor.can_edit(&other));
        assert!(!actor.can_edit(&orphan));

        for member_type in [MemberType::Affiliate, MemberType::Collective] {
            actor.member_type = member_type;
            assert!(!actor.can_edit(&own));
            assert!(!actor.can_edit(&other));
        }
    }

    #[test]
    fn test_role_helpers() {
        let mut member = sample_member("d");
        member.member_type = MemberType::Board;
        assert!(member.is_board() && member.is_associate());
        member.member_type = MemberType::Associate;
        assert!(!member.is_board() && member.is_associate());
        member.member_type = MemberType::Collective;
        assert!(member.is_collective() && !member.is_affiliate());
    }

    #[test]
    fn test_full_address() {
        let mut member = sample_member("e");
        assert_eq!(member.full_address(), "");

        member.street = "Rua do Ouvidor".to_string();
        member.number = "50".to_string();
        member.neighborhood = "Centro".to_string();
        member.postal_code = Some(Cep::parse("20040030").unwrap());
        assert_eq!(
            member.full_address(),
            "Rua do Ouvidor, nº 50, Centro, Rio de Janeiro/RJ, CEP: 20040-030"
        );
    }

    #[test]
    fn test_member_type_codes_round_trip() {
        for member_type in MemberType::ALL {
            assert_eq!(MemberType::from_code(member_type.code()), Some(member_type));
        }
        assert_eq!(MemberType::from_code("ADMIN"), None);
    }
}
