//! Basic example of the Wiring container.
//!
//! Run with `RUST_LOG=wiring_container=debug` to watch bindings being
//! registered and constructed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::EnvFilter;
use wiring::prelude::*;

// === Define your traits and types ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

struct Config {
    database_url: String,
    debug: bool,
}

struct Database {
    url: String,
    logger: Arc<dyn Logger>,
    connected: AtomicBool,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.url)
    }
}

impl Initializable for Database {
    fn initialize(&self) -> std::result::Result<(), BoxError> {
        self.connected.store(true, Ordering::SeqCst);
        self.logger.log("Database connected");
        Ok(())
    }
}

impl Shutdownable for Database {
    fn shutdown(&self) -> std::result::Result<(), BoxError> {
        self.connected.store(false, Ordering::SeqCst);
        self.logger.log("Database disconnected");
        Ok(())
    }
}

struct UserRepository {
    db: Arc<Database>,
}

impl UserRepository {
    fn find_user(&self, id: u64) -> String {
        self.db.query(&format!("SELECT * FROM users WHERE id = {id}"))
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

// === Constructors ===

fn database(config: Arc<Config>, logger: Arc<dyn Logger>) -> Result<Database> {
    Ok(Database {
        url: config.database_url.clone(),
        logger,
        connected: AtomicBool::new(false),
    })
}

fn user_repository(db: Arc<Database>) -> Result<UserRepository> {
    Ok(UserRepository { db })
}

fn user_service(repo: Arc<UserRepository>, logger: Arc<dyn Logger>) -> Result<UserService> {
    Ok(UserService { repo, logger })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wiring_container=info")))
        .init();

    let container = Container::builder()
        .add(Bind::value(Config {
            database_url: "postgres://localhost/myapp".to_string(),
            debug: true,
        }))
        .add(Bind::value(ConsoleLogger).exposed_as(|logger: Arc<ConsoleLogger>| logger as Arc<dyn Logger>))
        .add(Bind::lazy(database).initializable().shutdownable())
        .add(Bind::lazy(user_repository))
        .add(Bind::lazy(user_service).named("users"))
        .build();

    println!("Container built: {container:?}");

    container.try_initialize()?;

    let config: Arc<Config> = container.try_get()?;
    println!("Config: database_url={}, debug={}", config.database_url, config.debug);

    let service: Arc<UserService> = container.try_get_named("users")?;
    println!("{}", service.get_user(42));

    // same instance, whichever way it is requested
    let again: Arc<UserService> = container.try_get()?;
    assert!(Arc::ptr_eq(&service, &again));

    if let Err(err) = container.try_get_named::<UserService>("user") {
        println!("Expected failure: {err}");
    }

    container.try_shutdown()?;
    if let Err(err) = container.try_get::<UserService>() {
        println!("After shutdown: {err}");
    }

    Ok(())
}
