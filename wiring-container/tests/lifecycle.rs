use std::any::type_name;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use wiring_container::error::LifecycleViolation;
use wiring_container::prelude::*;

type HookResult = std::result::Result<(), BoxError>;

#[derive(Default)]
struct Journal(Mutex<Vec<String>>);

impl Journal {
    fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

struct Database {
    journal: Arc<Journal>,
}

impl Initializable for Database {
    fn initialize(&self) -> HookResult {
        self.journal.record("db:init");
        Ok(())
    }
}

impl Shutdownable for Database {
    fn shutdown(&self) -> HookResult {
        self.journal.record("db:shutdown");
        Ok(())
    }
}

struct Cache {
    journal: Arc<Journal>,
}

impl Initializable for Cache {
    fn initialize(&self) -> HookResult {
        self.journal.record("cache:init");
        Ok(())
    }
}

impl Shutdownable for Cache {
    fn shutdown(&self) -> HookResult {
        self.journal.record("cache:shutdown");
        Ok(())
    }
}

struct Broken;

impl Initializable for Broken {
    fn initialize(&self) -> HookResult {
        Err("simulated".into())
    }
}

impl Shutdownable for Broken {
    fn shutdown(&self) -> HookResult {
        Err("simulated".into())
    }
}

struct Panicky;

impl Initializable for Panicky {
    fn initialize(&self) -> HookResult {
        panic!("hook exploded")
    }
}

impl Shutdownable for Panicky {
    fn shutdown(&self) -> HookResult {
        panic!("shutdown exploded")
    }
}

fn database(journal: Arc<Journal>) -> Result<Database> {
    journal.record("db:new");
    Ok(Database { journal })
}

fn cache(journal: Arc<Journal>) -> Result<Cache> {
    journal.record("cache:new");
    Ok(Cache { journal })
}

fn builder(journal: &Arc<Journal>) -> ContainerBuilder {
    Container::builder()
        .add(Bind::shared(journal.clone()))
        .add(Bind::lazy(database).initializable().shutdownable())
        .add(Bind::lazy(cache).initializable().shutdownable())
}

#[test]
fn initialize_constructs_and_runs_hooks_in_order() {
    let journal = Arc::new(Journal::default());
    let container = builder(&journal).build();
    assert_eq!(container.state(), LifecycleState::Built);

    container.try_initialize().unwrap();

    assert_eq!(container.state(), LifecycleState::Initialized);
    assert_eq!(journal.entries(), vec!["db:new", "cache:new", "db:init", "cache:init"]);
}

#[test]
fn initialize_twice_fails_without_rerunning_hooks() {
    let journal = Arc::new(Journal::default());
    let container = builder(&journal).build();
    container.try_initialize().unwrap();

    let err = container.try_initialize().unwrap_err();
    assert!(matches!(err, Error::Lifecycle(LifecycleViolation::AlreadyInitialized)));
    assert_eq!(journal.entries().iter().filter(|e| e.ends_with(":init")).count(), 2);
}

#[test]
fn initialize_failure_is_reported_and_partial() {
    let journal = Arc::new(Journal::default());
    let container = builder(&journal).add(Bind::value(Broken).initializable()).build();

    let err = container.try_initialize().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Initialization);
    assert_eq!(
        err.to_string(),
        format!("could not initialize dependency: {}, cause:\nsimulated", type_name::<Broken>())
    );
    assert_eq!(journal.entries(), vec!["db:new", "cache:new", "db:init", "cache:init"]);
}

#[test]
fn initialize_hook_panic_is_caught() {
    let container = Container::builder().add(Bind::value(Panicky).initializable()).build();

    let err = container.try_initialize().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Initialization);
    assert_eq!(err.root_kind(), Some(ErrorKind::ConstructorPanic));
    assert_eq!(err.root_cause().to_string(), "hook exploded");
}

#[test]
fn shutdown_only_touches_created_values() {
    let journal = Arc::new(Journal::default());
    let container = builder(&journal).build();

    let _cache: Arc<Cache> = container.get();
    container.try_shutdown().unwrap();

    assert_eq!(container.state(), LifecycleState::Shutdown);
    assert_eq!(journal.entries(), vec!["cache:new", "cache:shutdown"]);
}

#[test]
fn shutdown_runs_in_registration_order() {
    let journal = Arc::new(Journal::default());
    let container = builder(&journal).build();
    container.try_initialize().unwrap();
    container.try_shutdown().unwrap();

    let entries = journal.entries();
    assert_eq!(&entries[entries.len() - 2..], ["db:shutdown", "cache:shutdown"]);
}

#[test]
fn shutdown_failure_aborts_remaining_hooks() {
    let journal = Arc::new(Journal::default());
    let container = Container::builder()
        .add(Bind::shared(journal.clone()))
        .add(Bind::value(Broken).shutdownable())
        .add(Bind::lazy(cache).shutdownable())
        .build();
    let _cache: Arc<Cache> = container.get();

    let err = container.try_shutdown().unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("could not shutdown dependency: {}, cause:\nsimulated", type_name::<Broken>())
    );
    assert!(!journal.entries().contains(&"cache:shutdown".to_string()));
    assert_eq!(container.state(), LifecycleState::Shutdown);
}

#[test]
fn shutdown_hook_panic_is_caught() {
    let journal = Arc::new(Journal::default());
    let container = Container::builder()
        .add(Bind::shared(journal.clone()))
        .add(Bind::value(Panicky).shutdownable())
        .add(Bind::lazy(cache).shutdownable())
        .build();
    let _cache: Arc<Cache> = container.get();

    let err = container.try_shutdown().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Shutdown);
    assert_eq!(err.root_kind(), Some(ErrorKind::ConstructorPanic));
    assert_eq!(
        err.to_string(),
        format!("could not shutdown dependency: {}, cause:\nshutdown exploded", type_name::<Panicky>())
    );
    assert!(!journal.entries().contains(&"cache:shutdown".to_string()));
    assert_eq!(container.state(), LifecycleState::Shutdown);
}

#[test]
fn shutdown_twice_fails_without_rerunning_hooks() {
    let journal = Arc::new(Journal::default());
    let container = builder(&journal).build();
    container.try_initialize().unwrap();
    container.try_shutdown().unwrap();

    let err = container.try_shutdown().unwrap_err();
    assert_eq!(err.to_string(), "container lifecycle error: container already shutdown");
    assert_eq!(journal.entries().iter().filter(|e| e.ends_with(":shutdown")).count(), 2);
}

#[test]
fn nothing_resolves_after_shutdown() {
    let calls = Arc::new(AtomicUsize::new(0));
    let container = Container::builder()
        .add(Bind::value(Cache {
            journal: Arc::new(Journal::default()),
        }))
        .add(Bind::lazy({
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>(Broken)
            }
        }).named("broken"))
        .build();

    container.try_shutdown().unwrap();

    for err in [
        container.try_get::<Broken>().map(drop).unwrap_err(),
        container.try_get_named::<Broken>("broken").map(drop).unwrap_err(),
        container.try_get_all::<Cache>().map(drop).unwrap_err(),
    ] {
        assert!(matches!(err, Error::Lifecycle(LifecycleViolation::AlreadyShutdown)));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn initialize_after_shutdown_fails() {
    let journal = Arc::new(Journal::default());
    let container = builder(&journal).build();
    container.try_shutdown().unwrap();

    let err = container.try_initialize().unwrap_err();
    assert!(matches!(err, Error::Lifecycle(LifecycleViolation::AlreadyShutdown)));
    assert!(journal.entries().is_empty());
}

trait Store: Send + Sync {}

impl Store for Database {}

#[test]
fn hooks_registered_under_two_aliases_run_once() {
    let journal = Arc::new(Journal::default());
    let container = Container::builder()
        .add(Bind::shared(journal.clone()))
        .add(Bind::lazy(database).named("db").initializable())
        .add(
            Bind::lazy(database)
                .exposed_as(|db: Arc<Database>| db as Arc<dyn Store>)
                .initializable(),
        )
        .build();

    container.try_initialize().unwrap();
    assert_eq!(journal.entries(), vec!["db:new", "db:init"]);
}
