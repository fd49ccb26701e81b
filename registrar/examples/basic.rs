//! Basic example of the Registrar container.
//!
//! Run with `RUST_LOG=registrar_container=debug` to see registration and
//! resolution logs.

use std::sync::Arc;

use registrar::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// === Define your contracts and providers ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

impl Injectable for ConsoleLogger {
    fn descriptor() -> ProviderDescriptor<Self> {
        ProviderDescriptor::new()
            .constructor(|| ConsoleLogger)
            .implements::<dyn Logger>(|p| p)
    }
}

struct Config {
    database_url: String,
}

impl Injectable for Config {
    fn descriptor() -> ProviderDescriptor<Self> {
        // Built by a factory only: its field is a plain string.
        ProviderDescriptor::new()
    }
}

trait Database: Send + Sync {
    fn query(&self, sql: &str) -> String;
}

struct Postgres {
    config: Arc<Config>,
    logger: Arc<dyn Logger>,
}

impl Database for Postgres {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.config.database_url)
    }
}

impl Injectable for Postgres {
    fn descriptor() -> ProviderDescriptor<Self> {
        ProviderDescriptor::new()
            .constructor(|config: Arc<Config>, logger: Arc<dyn Logger>| Postgres { config, logger })
            .implements::<dyn Database>(|p| p)
    }
}

struct UserRepository {
    db: Arc<dyn Database>,
}

impl UserRepository {
    fn find_user(&self, id: u64) -> String {
        self.db.query(&format!("SELECT * FROM users WHERE id = {id}"))
    }
}

impl Injectable for UserRepository {
    fn descriptor() -> ProviderDescriptor<Self> {
        ProviderDescriptor::new().constructor(|db: Arc<dyn Database>| UserRepository { db })
    }
}

struct UserService {
    repo: Arc<UserRepository>,
    logger: Arc<dyn Logger>,
}

impl UserService {
    fn get_user(&self, id: u64) -> String {
        self.logger.log(&format!("Getting user {id}"));
        self.repo.find_user(id)
    }
}

impl Injectable for UserService {
    fn descriptor() -> ProviderDescriptor<Self> {
        ProviderDescriptor::new().constructor(|repo: Arc<UserRepository>, logger: Arc<dyn Logger>| {
            UserService { repo, logger }
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("basic=info,registrar_container=info")),
        )
        .init();

    let container = Container::new();

    // Config — singleton built by a factory
    container.register_with_factory::<Config, Config, _>(
        |_| {
            Ok(Config {
                database_url: "postgres://localhost/myapp".to_string(),
            })
        },
        Scope::Singleton,
        false,
    )?;
    // Logger — singleton
    container.register::<dyn Logger, ConsoleLogger>(Scope::Singleton)?;
    // Database — singleton (depends on Config + Logger)
    container.register::<dyn Database, Postgres>(Scope::Singleton)?;
    // UserRepository — managed (one per unit of work)
    container.register::<UserRepository, UserRepository>(Scope::Managed)?;
    // UserService — volatile (new each time)
    container.register::<UserService, UserService>(Scope::Volatile)?;

    println!("✅ {} registrations", container.registered_count());
    println!("{container:?}");

    // === One unit of work ===
    info!("Starting first unit of work");
    let service = container.resolve::<UserService>(Scope::Volatile)?;
    println!("👤 {}", service.get_user(42));

    let again = container.resolve::<UserService>(Scope::Volatile)?;
    println!("♻️  same repository: {}", Arc::ptr_eq(&service.repo, &again.repo));

    // === Next unit of work ===
    info!("Recycling managed instances");
    container.recycle_managed();
    let fresh = container.resolve::<UserService>(Scope::Volatile)?;
    println!("🆕 new repository: {}", !Arc::ptr_eq(&service.repo, &fresh.repo));

    // === Explicit resolution ===
    let postgres = container.resolve_explicit::<dyn Database, Postgres>(Scope::Singleton)?;
    println!("🐘 {}", postgres.config.database_url);

    // === Validation errors explain how to fix them ===
    struct Reports {
        _db: Arc<dyn Database>,
    }
    impl Injectable for Reports {
        fn descriptor() -> ProviderDescriptor<Self> {
            ProviderDescriptor::new()
                .constructor(|_db: Arc<dyn Database>| Reports { _db })
                .constructor(|_db: Arc<dyn Database>| Reports { _db })
        }
    }
    if let Err(err) = container.register::<Reports, Reports>(Scope::Volatile) {
        warn!("Reports registration rejected as expected");
        println!("❌ {err}");
    }

    container.clear_all();
    println!("🧹 {container:?}");

    println!("\n🎉 Everything works!");
    Ok(())
}
