use clap::{Parser, Subcommand};
use fake::{
    faker::name::raw::{FirstName, LastName},
    locales::PT_BR,
    Fake,
};
use rand::{seq::SliceRandom, Rng};
use sqlx::sqlite::SqlitePoolOptions;

use intranet::{
    auth::{password_policy::UserAttributes, AuthService, PasswordPolicy},
    config::Settings,
    domain::{Cep, Cpf, FederativeUnit, MemberType, NewMember},
    repository::{MemberRepository, SqliteMemberRepository},
    service::forms::normalize_email,
    MIGRATOR,
};

#[derive(Parser)]
#[command(name = "seed", about = "Administrative commands for the ACJogos-RJ intranet")]
struct Cli {
    /// Database URL; falls back to DATABASE_URL, then the configured one
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an active staff account with full privileges
    Createsuperuser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Fill the database with fictional members for local development
    Demo {
        #[arg(long, default_value_t = 20)]
        count: usize,
    },
}

const NEIGHBORHOODS: &[&str] = &[
    "Botafogo", "Tijuca", "Lapa", "Méier", "Copacabana", "Centro", "Laranjeiras", "Barra da Tijuca",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::new().unwrap_or_default();
    let database_url = cli
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or(settings.database.url);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    println!("📋 Running migrations...");
    MIGRATOR.run(&db_pool).await?;

    let repo = SqliteMemberRepository::new(db_pool.clone());

    match cli.command {
        Command::Createsuperuser { username, email, password } => {
            create_superuser(&repo, &username, &email, &password).await?
        }
        Command::Demo { count } => seed_demo(&repo, count).await?,
    }

    Ok(())
}

async fn create_superuser(
    repo: &SqliteMemberRepository,
    username: &str,
    email: &str,
    password: &str,
) -> anyhow::Result<()> {
    let email = normalize_email(email);

    if repo.find_by_username(username).await?.is_some() {
        anyhow::bail!("username '{}' is already taken", username);
    }
    if repo.find_by_email(&email).await?.is_some() {
        anyhow::bail!("email '{}' is already registered", email);
    }

    let problems = PasswordPolicy::default().validate(
        password,
        &UserAttributes { username, email: &email, ..Default::default() },
    );
    if !problems.is_empty() {
        anyhow::bail!("password rejected: {}", problems.join(" "));
    }

    let member = repo
        .create(NewMember {
            username: username.to_string(),
            email,
            password_hash: AuthService::hash_password(password).await?,
            is_staff: true,
            is_superuser: true,
            member_type: Some(MemberType::Board),
            ..Default::default()
        })
        .await?;

    println!("✅ Created superuser '{}' ({})", member.account.username, member.id);
    Ok(())
}

async fn seed_demo(repo: &SqliteMemberRepository, count: usize) -> anyhow::Result<()> {
    println!("👥 Creating {} demo members...", count);

    // Hashing is slow; every demo account shares one password.
    let password_hash = AuthService::hash_password("jogos-do-rio-2024").await?;
    let mut rng = rand::thread_rng();
    let mut created = 0;

    for i in 0..count {
        let first_name: String = FirstName(PT_BR).fake();
        let last_name: String = LastName(PT_BR).fake();
        let username = format!(
            "{}.{}{}",
            first_name.to_lowercase(),
            last_name.to_lowercase(),
            i
        )
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
        .collect::<String>();

        let mut base = [0u8; 9];
        for digit in base.iter_mut() {
            *digit = rng.gen_range(0..10);
        }
        let national_id = match Cpf::from_base(base) {
            Ok(cpf) => Some(cpf),
            // Repeated-digit bases are rejected; skip the CPF for that one.
            Err(_) => None,
        };

        let member_type = *MemberType::ALL.choose(&mut rng).unwrap_or(&MemberType::Affiliate);
        let neighborhood = NEIGHBORHOODS.choose(&mut rng).copied().unwrap_or("Centro");

        let result = repo
            .create(NewMember {
                email: format!("{}@example.com", username),
                username,
                password_hash: password_hash.clone(),
                first_name,
                last_name,
                member_type: Some(member_type),
                national_id,
                phone: format!("(21) 9{:04}-{:04}", rng.gen_range(0..10000), rng.gen_range(0..10000)),
                postal_code: Cep::parse(&format!("2{:04}-{:03}", rng.gen_range(0..10000), rng.gen_range(0..1000))).ok(),
                street: "Rua das Laranjeiras".to_string(),
                number: rng.gen_range(1..2000).to_string(),
                neighborhood: neighborhood.to_string(),
                state: Some(FederativeUnit::Rj),
                ..Default::default()
            })
            .await;

        match result {
            Ok(_) => created += 1,
            Err(e) => println!("  ⚠️  Skipped one member: {}", e),
        }
    }

    println!("✅ Created {} demo members (password: jogos-do-rio-2024)", created);
    Ok(())
}
