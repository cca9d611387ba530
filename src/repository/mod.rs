use async_trait::async_trait;
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod member_repository;

pub use member_repository::SqliteMemberRepository;

#[async_trait]
pub trait MemberRepository: Send + Sync {
    async fn create(&self, member: NewMember) -> Result<Member>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Member>>;
    async fn find_by_username(&self, username: &str) -> Result<Option<Member>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Member>>;
    async fn find_by_national_id(&self, cpf: &Cpf) -> Result<Option<Member>>;
    async fn list(&self, filter: &MemberFilter) -> Result<Vec<Member>>;
    async fn count(&self, filter: &MemberFilter) -> Result<i64>;
    async fn update(&self, id: Uuid, update: UpdateMember) -> Result<Member>;
    async fn set_active(&self, id: Uuid, active: bool) -> Result<Member>;
    async fn set_profile_photo(&self, id: Uuid, path: Option<String>) -> Result<Member>;
    async fn password_hash(&self, id: Uuid) -> Result<Option<String>>;
    async fn set_password_hash(&self, id: Uuid, hash: &str) -> Result<()>;
    async fn touch_last_login(&self, id: Uuid) -> Result<()>;
    async fn has_staff(&self) -> Result<bool>;
}
