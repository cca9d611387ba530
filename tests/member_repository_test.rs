use intranet::{
    domain::{Cep, Cpf, FederativeUnit, MemberFilter, MemberType, NewMember, UpdateMember},
    error::AppError,
    repository::{MemberRepository, SqliteMemberRepository},
    MIGRATOR,
};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

async fn test_pool() -> anyhow::Result<SqlitePool> {
    // One connection, otherwise every connection gets its own empty database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    MIGRATOR.run(&pool).await?;
    Ok(pool)
}

fn new_member(username: &str) -> NewMember {
    NewMember {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password_hash: "not-a-real-hash".to_string(),
        first_name: "Ana".to_string(),
        last_name: "Souza".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_member_crud() -> anyhow::Result<()> {
    let repo = SqliteMemberRepository::new(test_pool().await?);

    let member = repo.create(NewMember {
        national_id: Some(Cpf::parse("529.982.247-25")?),
        postal_code: Some(Cep::parse("20040-020")?),
        ..new_member("ana")
    }).await?;

    // Store defaults
    assert_eq!(member.account.username, "ana");
    assert_eq!(member.member_type, MemberType::Affiliate);
    assert_eq!(member.city, "Rio de Janeiro");
    assert_eq!(member.state, FederativeUnit::Rj);
    assert!(member.active);
    assert!(member.account.is_active);
    assert!(!member.account.is_staff);
    assert!(member.account.last_login.is_none());

    // Find by ID
    let found = repo.find_by_id(member.id).await?;
    assert_eq!(found.map(|m| m.id), Some(member.id));

    // Email lookups ignore case
    let found = repo.find_by_email("ANA@Example.com").await?;
    assert_eq!(found.map(|m| m.id), Some(member.id));

    // CPF round-trips as digits
    let cpf = Cpf::parse("52998224725")?;
    let found = repo.find_by_national_id(&cpf).await?;
    assert_eq!(
        found.and_then(|m| m.national_id).map(|c| c.formatted()),
        Some("529.982.247-25".to_string())
    );

    // Update
    let updated = repo.update(member.id, UpdateMember {
        member_type: Some(MemberType::Board),
        city: Some("Niterói".to_string()),
        national_id: Some(None),
        ..Default::default()
    }).await?;
    assert_eq!(updated.member_type, MemberType::Board);
    assert_eq!(updated.city, "Niterói");
    assert!(updated.national_id.is_none());
    assert_eq!(updated.account.email, "ana@example.com");

    // Activation flag
    let inactive = repo.set_active(member.id, false).await?;
    assert!(!inactive.active);

    Ok(())
}

#[tokio::test]
async fn test_unique_constraints_map_to_field_errors() -> anyhow::Result<()> {
    let repo = SqliteMemberRepository::new(test_pool().await?);
    let cpf = Cpf::parse("529.982.247-25")?;

    repo.create(NewMember { national_id: Some(cpf.clone()), ..new_member("ana") }).await?;

    // SQLite reports one violated index; keep the email distinct
    let err = repo.create(NewMember {
        email: "outra@example.com".to_string(),
        ..new_member("ana")
    }).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidFields(ref e) if e.contains("username")));

    let err = repo.create(NewMember {
        email: "ANA@example.com".to_string(),
        ..new_member("ana2")
    }).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidFields(ref e) if e.contains("email")));

    let err = repo.create(NewMember {
        national_id: Some(cpf),
        ..new_member("bia")
    }).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidFields(ref e) if e.contains("national_id")));

    let all = repo.count(&MemberFilter::default()).await?;
    assert_eq!(all, 1);

    Ok(())
}

#[tokio::test]
async fn test_list_filters_and_search() -> anyhow::Result<()> {
    let repo = SqliteMemberRepository::new(test_pool().await?);

    repo.create(NewMember {
        first_name: "Carla".to_string(),
        national_id: Some(Cpf::parse("529.982.247-25")?),
        member_type: Some(MemberType::Board),
        is_staff: true,
        ..new_member("carla")
    }).await?;
    repo.create(NewMember {
        first_name: "Bruno".to_string(),
        ..new_member("bruno")
    }).await?;
    let diego = repo.create(NewMember {
        first_name: "Diego".to_string(),
        ..new_member("diego")
    }).await?;
    repo.set_active(diego.id, false).await?;

    let all = repo.list(&MemberFilter::default()).await?;
    let names: Vec<_> = all.iter().map(|m| m.account.first_name.as_str()).collect();
    assert_eq!(names, vec!["Bruno", "Carla", "Diego"]);

    let board = repo.list(&MemberFilter {
        member_type: Some(MemberType::Board),
        ..Default::default()
    }).await?;
    assert_eq!(board.len(), 1);

    // Formatted CPF finds the digits-only column
    let by_cpf = repo.list(&MemberFilter {
        search: Some("529.982".to_string()),
        ..Default::default()
    }).await?;
    assert_eq!(by_cpf.len(), 1);
    assert_eq!(by_cpf[0].account.username, "carla");

    let inactive = repo.count(&MemberFilter { active: Some(false), ..Default::default() }).await?;
    assert_eq!(inactive, 1);

    let staff = repo.count(&MemberFilter { is_staff: Some(true), ..Default::default() }).await?;
    assert_eq!(staff, 1);
    assert!(repo.has_staff().await?);

    let page = repo.list(&MemberFilter { limit: Some(2), offset: Some(2), ..Default::default() }).await?;
    assert_eq!(page.len(), 1);

    // LIKE metacharacters are literal
    let none = repo.count(&MemberFilter { search: Some("%".to_string()), ..Default::default() }).await?;
    assert_eq!(none, 0);

    Ok(())
}

#[tokio::test]
async fn test_password_hashing() -> anyhow::Result<()> {
    use intranet::auth::AuthService;

    let repo = SqliteMemberRepository::new(test_pool().await?);
    let password = "tabuleiro-e-dados";
    let hash = AuthService::hash_password(password).await?;

    let member = repo.create(NewMember { password_hash: hash, ..new_member("ana") }).await?;
    let stored = repo.password_hash(member.id).await?.unwrap_or_default();

    assert!(AuthService::verify_password(password, &stored).await?);
    assert!(!AuthService::verify_password("wrong_password", &stored).await?);

    let replaced = AuthService::hash_password("outra-senha-longa").await?;
    repo.set_password_hash(member.id, &replaced).await?;
    let stored = repo.password_hash(member.id).await?.unwrap_or_default();
    assert!(AuthService::verify_password("outra-senha-longa", &stored).await?);
    assert!(!AuthService::verify_password(password, &stored).await?);

    repo.touch_last_login(member.id).await?;
    let reloaded = repo.find_by_id(member.id).await?.unwrap();
    assert!(reloaded.account.last_login.is_some());

    Ok(())
}
