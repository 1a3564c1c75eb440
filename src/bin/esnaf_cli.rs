use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use esnaf_defterim::{
    auth::{AuthConfig, AuthService, PasswordHasher},
    config::{self, AppConfig},
    db::{self, DbPool},
    entities::user::Role,
    services::users::{NewUser, UserService},
};
use serde::Serialize;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Migrate => {
            db::run_migrations(&context.db)
                .await
                .context("failed to run migrations")?;
            println!("Migrations applied");
        }
        Commands::SeedAdmin(args) => handle_seed_admin(&context, args, cli.json).await?,
        Commands::CreateUser(args) => handle_create_user(&context, args, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "esnaf-cli", about = "Maintenance commands for the Esnaf Defterim backend", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Create the administrator account if it does not exist yet
    SeedAdmin(SeedAdminArgs),
    /// Create a shop account
    CreateUser(CreateUserArgs),
}

#[derive(Args)]
struct SeedAdminArgs {
    #[arg(long, default_value = "admin@kasap.com")]
    email: String,
    #[arg(long, default_value = "admin123")]
    password: String,
    #[arg(long, default_value = "Admin")]
    name: String,
}

#[derive(Args)]
struct CreateUserArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long, value_enum, default_value_t = RoleArg::Regular)]
    role: RoleArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Admin,
    Clerk,
    Regular,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Admin => Role::Admin,
            RoleArg::Clerk => Role::Clerk,
            RoleArg::Regular => Role::Regular,
        }
    }
}

async fn handle_seed_admin(context: &CliContext, args: SeedAdminArgs, json: bool) -> Result<()> {
    db::run_migrations(&context.db)
        .await
        .context("failed to run migrations")?;

    let (admin, created) = context
        .users
        .ensure_admin(&args.name, &args.email, &args.password)
        .await
        .context("failed to seed admin account")?;

    if json {
        print_json(&admin)?;
    } else if created {
        println!("Admin {} created (id {})", admin.email, admin.id);
    } else {
        println!("Admin {} already exists (id {})", admin.email, admin.id);
    }
    Ok(())
}

async fn handle_create_user(context: &CliContext, args: CreateUserArgs, json: bool) -> Result<()> {
    let user = context
        .users
        .register(NewUser {
            name: args.name,
            email: args.email,
            password: args.password,
            phone: args.phone,
            role: args.role.into(),
        })
        .await
        .context("failed to create user")?;

    if json {
        print_json(&user)?;
    } else {
        println!("User {} created (id {}, role {})", user.email, user.id, user.role);
    }
    Ok(())
}

struct CliContext {
    db: Arc<DbPool>,
    users: UserService,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config: AppConfig =
            config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        let db = Arc::new(db_pool);

        let auth = Arc::new(AuthService::new(AuthConfig::from(&config), db.clone()));
        let hasher = PasswordHasher::new(
            config.password_hash_memory_kib,
            config.password_hash_iterations,
        )
        .context("invalid password hashing parameters")?;

        Ok(Self {
            users: UserService::new(db.clone(), auth, hasher),
            db,
        })
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
