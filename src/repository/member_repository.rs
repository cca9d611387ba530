use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{
        Account, Cep, Cpf, FederativeUnit, Member, MemberFilter, MemberType, NewMember,
        UpdateMember, DEFAULT_CITY,
    },
    error::{AppError, FieldErrors, Result},
    repository::MemberRepository,
};

const MEMBER_COLUMNS: &str = r#"
    id, username, email, first_name, last_name, is_staff, is_superuser, is_active,
    last_login, date_joined, member_type, social_name, national_id, phone,
    discord_handle, postal_code, street, number, complement, neighborhood, city,
    state, association_date, active, profile_photo, created_at, updated_at
"#;

// Database row struct that matches SQLite schema
#[derive(FromRow)]
struct MemberRow {
    id: String,
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    is_staff: bool,
    is_superuser: bool,
    is_active: bool,
    last_login: Option<NaiveDateTime>,
    date_joined: NaiveDateTime,
    member_type: String,
    social_name: String,
    national_id: Option<String>,
    phone: String,
    discord_handle: String,
    postal_code: Option<String>,
    street: String,
    number: String,
    complement: String,
    neighborhood: String,
    city: String,
    state: String,
    association_date: Option<NaiveDate>,
    active: bool,
    profile_photo: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteMemberRepository {
    pool: SqlitePool,
}

impl SqliteMemberRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_member(row: MemberRow) -> Result<Member> {
        Ok(Member {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            account: Account {
                username: row.username,
                email: row.email,
                first_name: row.first_name,
                last_name: row.last_name,
                is_staff: row.is_staff,
                is_superuser: row.is_superuser,
                is_active: row.is_active,
                last_login: row.last_login.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
                date_joined: DateTime::from_naive_utc_and_offset(row.date_joined, Utc),
            },
            member_type: MemberType::from_code(&row.member_type)
                .ok_or_else(|| AppError::Database(format!("Invalid member type: {}", row.member_type)))?,
            social_name: row.social_name,
            national_id: row.national_id
                .map(|cpf| Cpf::parse(&cpf))
                .transpose()
                .map_err(|e| AppError::Database(format!("Stored CPF is invalid: {}", e)))?,
            phone: row.phone,
            discord_handle: row.discord_handle,
            postal_code: row.postal_code
                .map(|cep| Cep::parse(&cep))
                .transpose()
                .map_err(|e| AppError::Database(format!("Stored CEP is invalid: {}", e)))?,
            street: row.street,
            number: row.number,
            complement: row.complement,
            neighborhood: row.neighborhood,
            city: row.city,
            state: row.state
                .parse::<FederativeUnit>()
                .map_err(AppError::Database)?,
            association_date: row.association_date,
            active: row.active,
            profile_photo: row.profile_photo,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<Member>> {
        let sql = format!("SELECT {} FROM members WHERE {} = ?", MEMBER_COLUMNS, column);
        let row = sqlx::query_as::<_, MemberRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_member).transpose()
    }

    async fn require(&self, id: Uuid) -> Result<Member> {
        self.find_by_id(id).await?
            .ok_or_else(|| AppError::NotFound("Member not found".to_string()))
    }

    fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &MemberFilter) {
        builder.push(" WHERE 1 = 1");

        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = like_pattern(&search.to_lowercase());
            builder.push(" AND (");
            for (i, column) in ["username", "first_name", "last_name", "social_name", "email"]
                .iter()
                .enumerate()
            {
                if i > 0 {
                    builder.push(" OR ");
                }
                builder.push(format!("LOWER({}) LIKE ", column));
                builder.push_bind(pattern.clone());
                builder.push(" ESCAPE '\\'");
            }

            // CPFs are stored as bare digits; let formatted searches match too.
            let digits: String = search.chars().filter(char::is_ascii_digit).collect();
            if !digits.is_empty() {
                builder.push(" OR national_id LIKE ");
                builder.push_bind(like_pattern(&digits));
                builder.push(" ESCAPE '\\'");
            }
            builder.push(")");
        }

        if let Some(member_type) = filter.member_type {
            builder.push(" AND member_type = ");
            builder.push_bind(member_type.code());
        }
        if let Some(active) = filter.active {
            builder.push(" AND active = ");
            builder.push_bind(active);
        }
        if let Some(is_staff) = filter.is_staff {
            builder.push(" AND is_staff = ");
            builder.push_bind(is_staff);
        }
    }
}

/// `%term%` with LIKE metacharacters escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Maps a UNIQUE violation on `members` to a field-level validation error so
/// the storage engine stays the final arbiter under concurrent registration.
fn map_write_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        let message = db_err.message();
        if message.contains("UNIQUE constraint failed") {
            if message.contains("members.username") {
                return AppError::InvalidFields(FieldErrors::single(
                    "username",
                    "Um usuário com este nome de usuário já existe.",
                ));
            }
            if message.contains("members.email") {
                return AppError::InvalidFields(FieldErrors::single(
                    "email",
                    "Já existe um usuário com este e-mail.",
                ));
            }
            if message.contains("members.national_id") {
                return AppError::InvalidFields(FieldErrors::single(
                    "national_id",
                    "Já existe um usuário com este CPF.",
                ));
            }
        }
    }
    AppError::Database(err.to_string())
}

#[async_trait]
impl MemberRepository for SqliteMemberRepository {
    async fn create(&self, new: NewMember) -> Result<Member> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        let member_type = new.member_type.unwrap_or_default();
        let state = new.state.unwrap_or_default();
        let city = new.city
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CITY.to_string());

        sqlx::query(
            r#"
            INSERT INTO members (
                id, username, email, password_hash, first_name, last_name,
                is_staff, is_superuser, is_active, date_joined,
                member_type, social_name, national_id, phone, discord_handle,
                postal_code, street, number, complement, neighborhood, city, state,
                association_date, active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(new.username.trim())
        .bind(new.email.trim())
        .bind(&new.password_hash)
        .bind(new.first_name.trim())
        .bind(new.last_name.trim())
        .bind(new.is_staff)
        .bind(new.is_superuser)
        .bind(now)
        .bind(member_type.code())
        .bind(new.social_name.trim())
        .bind(new.national_id.as_ref().map(Cpf::digits))
        .bind(new.phone.trim())
        .bind(new.discord_handle.trim())
        .bind(new.postal_code.as_ref().map(Cep::as_str))
        .bind(new.street.trim())
        .bind(new.number.trim())
        .bind(new.complement.trim())
        .bind(new.neighborhood.trim())
        .bind(city.trim())
        .bind(state.code())
        .bind(new.association_date)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created member".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Member>> {
        self.find_one("id", &id.to_string()).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Member>> {
        self.find_one("username", username.trim()).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Member>> {
        // The column is declared COLLATE NOCASE.
        self.find_one("email", email.trim()).await
    }

    async fn find_by_national_id(&self, cpf: &Cpf) -> Result<Option<Member>> {
        self.find_one("national_id", cpf.digits()).await
    }

    async fn list(&self, filter: &MemberFilter) -> Result<Vec<Member>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM members", MEMBER_COLUMNS));
        Self::push_filter(&mut builder, filter);
        builder.push(" ORDER BY LOWER(first_name), LOWER(last_name), LOWER(username)");
        builder.push(" LIMIT ");
        builder.push_bind(filter.limit.unwrap_or(-1));
        builder.push(" OFFSET ");
        builder.push_bind(filter.offset.unwrap_or(0));

        let rows = builder
            .build_query_as::<MemberRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter()
            .map(Self::row_to_member)
            .collect()
    }

    async fn count(&self, filter: &MemberFilter) -> Result<i64> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM members");
        Self::push_filter(&mut builder, filter);

        let count: i64 = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count)
    }

    async fn update(&self, id: Uuid, update: UpdateMember) -> Result<Member> {
        let existing = self.require(id).await?;

        let email = update.email.unwrap_or(existing.account.email);
        let first_name = update.first_name.unwrap_or(existing.account.first_name);
        let last_name = update.last_name.unwrap_or(existing.account.last_name);
        let is_staff = update.is_staff.unwrap_or(existing.account.is_staff);
        let is_superuser = update.is_superuser.unwrap_or(existing.account.is_superuser);
        let is_active = update.is_active.unwrap_or(existing.account.is_active);
        let member_type = update.member_type.unwrap_or(existing.member_type);
        let social_name = update.social_name.unwrap_or(existing.social_name);
        let national_id = update.national_id.unwrap_or(existing.national_id);
        let phone = update.phone.unwrap_or(existing.phone);
        let discord_handle = update.discord_handle.unwrap_or(existing.discord_handle);
        let postal_code = update.postal_code.unwrap_or(existing.postal_code);
        let street = update.street.unwrap_or(existing.street);
        let number = update.number.unwrap_or(existing.number);
        let complement = update.complement.unwrap_or(existing.complement);
        let neighborhood = update.neighborhood.unwrap_or(existing.neighborhood);
        let city = update.city.unwrap_or(existing.city);
        let state = update.state.unwrap_or(existing.state);
        let association_date = update.association_date.unwrap_or(existing.association_date);
        let active = update.active.unwrap_or(existing.active);

        sqlx::query(
            r#"
            UPDATE members
            SET email = ?, first_name = ?, last_name = ?,
                is_staff = ?, is_superuser = ?, is_active = ?,
                member_type = ?, social_name = ?, national_id = ?, phone = ?,
                discord_handle = ?, postal_code = ?, street = ?, number = ?,
                complement = ?, neighborhood = ?, city = ?, state = ?,
                association_date = ?, active = ?, updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(email.trim())
        .bind(first_name.trim())
        .bind(last_name.trim())
        .bind(is_staff)
        .bind(is_superuser)
        .bind(is_active)
        .bind(member_type.code())
        .bind(social_name.trim())
        .bind(national_id.as_ref().map(Cpf::digits))
        .bind(phone.trim())
        .bind(discord_handle.trim())
        .bind(postal_code.as_ref().map(Cep::as_str))
        .bind(street.trim())
        .bind(number.trim())
        .bind(complement.trim())
        .bind(neighborhood.trim())
        .bind(city.trim())
        .bind(state.code())
        .bind(association_date)
        .bind(active)
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated member".to_string())
        })
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Member> {
        let result = sqlx::query("UPDATE members SET active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Member not found".to_string()));
        }
        self.require(id).await
    }

    async fn set_profile_photo(&self, id: Uuid, path: Option<String>) -> Result<Member> {
        let result = sqlx::query("UPDATE members SET profile_photo = ?, updated_at = ? WHERE id = ?")
            .bind(path)
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Member not found".to_string()));
        }
        self.require(id).await
    }

    async fn password_hash(&self, id: Uuid) -> Result<Option<String>> {
        let hash = sqlx::query_scalar::<_, String>("SELECT password_hash FROM members WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        Ok(hash)
    }

    async fn set_password_hash(&self, id: Uuid, hash: &str) -> Result<()> {
        let result = sqlx::query("UPDATE members SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(hash)
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Member not found".to_string()));
        }
        Ok(())
    }

    async fn touch_last_login(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE members SET last_login = ? WHERE id = ?")
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn has_staff(&self) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM members WHERE is_staff = 1 LIMIT 1"
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("ana"), "%ana%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
