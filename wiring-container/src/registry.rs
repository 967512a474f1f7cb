//! Dependency registry: the three indexes a builder fills in.
//!
//! - by type: every binding exposed as a type, in registration order,
//! - by name: at most one binding per logical name,
//! - by identity: the binding already made for a constructor or shared
//!   value, so adding it again aliases instead of duplicating.
//!
//! A built container keeps an immutable snapshot of the first two.

use std::borrow::Cow;
use std::collections::HashMap;

use tracing::{debug, trace};

use crate::binding::{Binding, Exposure, Identity};
use crate::error::{Error, Result};
use crate::key::{DependencyKey, TypeKey};

/// One way to satisfy a request: a binding seen through an exposure.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub binding: Binding,
    pub exposure: Exposure,
}

impl Entry {
    pub fn new(binding: Binding, exposure: Exposure) -> Self {
        Self { binding, exposure }
    }

    /// Key of the concrete value behind this entry.
    pub fn provides_key(&self) -> DependencyKey {
        DependencyKey::from_type(self.binding.provides())
    }

    /// Rejects exposures that do not start from the binding's type.
    fn check(&self) -> Result<()> {
        if self.exposure.from_type() != self.binding.provides() {
            return Err(Error::InvalidType {
                key: self.provides_key(),
                expected: self.exposure.to_type(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Registry {
    by_type: HashMap<TypeKey, Vec<Entry>>,
    by_name: HashMap<Cow<'static, str>, Entry>,
    by_identity: HashMap<Identity, Binding>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the binding already registered under `identity`, or records
    /// `fresh` for it.
    ///
    /// # Errors
    /// Whatever made `fresh` invalid, when it ends up being used.
    pub fn unique_binding(&mut self, identity: Option<Identity>, fresh: Result<Binding>) -> Result<Binding> {
        let Some(identity) = identity else {
            return fresh;
        };
        if let Some(existing) = self.by_identity.get(&identity) {
            trace!(ty = %existing.provides(), "Reusing binding");
            return Ok(existing.clone());
        }

        let binding = fresh?;
        self.by_identity.insert(identity, binding.clone());
        Ok(binding)
    }

    /// Appends `entry` to the bucket of its exposed type.
    ///
    /// # Errors
    /// - [`Error::InvalidType`] if the exposure does not fit the binding.
    /// - [`Error::DuplicatedRegistration`] if the binding is already in the
    ///   bucket.
    pub fn register_type(&mut self, entry: Entry) -> Result<()> {
        entry.check()?;

        let to = entry.exposure.to_type();
        let bucket = self.by_type.entry(to).or_default();
        if bucket.iter().any(|e| e.binding.ptr_eq(&entry.binding)) {
            return Err(Error::DuplicatedRegistration {
                key: DependencyKey::from_type(to),
            });
        }

        debug!(ty = %entry.binding.provides(), exposed_as = %to, mode = %entry.binding.mode(), "Registered dependency");
        bucket.push(entry);
        Ok(())
    }

    /// Like [`Registry::register_type`], but adding the same binding twice
    /// is a no-op. Used for the lifecycle hook buckets.
    pub fn register_capability(&mut self, entry: Entry) -> Result<()> {
        entry.check()?;

        let bucket = self.by_type.entry(entry.exposure.to_type()).or_default();
        if !bucket.iter().any(|e| e.binding.ptr_eq(&entry.binding)) {
            trace!(ty = %entry.binding.provides(), capability = %entry.exposure.to_type(), "Registered capability");
            bucket.push(entry);
        }
        Ok(())
    }

    /// Binds `name` to `entry`.
    ///
    /// # Errors
    /// - [`Error::InvalidType`] if the exposure does not fit the binding.
    /// - [`Error::DuplicatedName`] if the name is taken.
    pub fn register_name(&mut self, name: Cow<'static, str>, entry: Entry) -> Result<()> {
        entry.check()?;

        if self.by_name.contains_key(&name) {
            return Err(Error::DuplicatedName { name: name.into_owned() });
        }

        debug!(name = %name, ty = %entry.binding.provides(), "Registered name");
        self.by_name.insert(name, entry);
        Ok(())
    }

    pub fn unregister_name(&mut self, name: &str) {
        if self.by_name.remove(name).is_some() {
            trace!(name, "Rolled back name");
        }
    }

    /// Entries exposed as `ty`, in registration order.
    pub fn by_type(&self, ty: TypeKey) -> &[Entry] {
        self.by_type.get(&ty).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn by_name(&self, name: &str) -> Option<&Entry> {
        self.by_name.get(name)
    }

    /// Names of every exposed type, sorted.
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .by_type
            .iter()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(ty, _)| ty.type_name())
            .collect();
        names.sort_unstable();
        names
    }

    /// Every registered logical name, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(AsRef::as_ref).collect();
        names.sort_unstable();
        names
    }

    /// Copy of the type and name indexes, for a built container.
    pub fn snapshot(&self) -> Self {
        Self {
            by_type: self.by_type.clone(),
            by_name: self.by_name.clone(),
            by_identity: HashMap::new(),
        }
    }

    /// Number of registrations, counting every type and name alias.
    pub fn len(&self) -> usize {
        self.by_type.values().map(Vec::len).sum::<usize>() + self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::Arc;

    struct Database;
    struct Cache;

    trait Store: Send + Sync {}
    impl Store for Database {}

    fn entry(binding: &Binding) -> Entry {
        Entry::new(binding.clone(), Exposure::identity::<Database>())
    }

    #[test]
    fn register_and_get() {
        let mut reg = Registry::new();
        let db = Binding::value(Database).unwrap();
        reg.register_type(entry(&db)).unwrap();

        assert_eq!(reg.by_type(TypeKey::of::<Database>()).len(), 1);
        assert!(reg.by_type(TypeKey::of::<Cache>()).is_empty());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn same_binding_twice_fails() {
        let mut reg = Registry::new();
        let db = Binding::value(Database).unwrap();
        reg.register_type(entry(&db)).unwrap();

        let err = reg.register_type(entry(&db)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicatedRegistration);
    }

    #[test]
    fn distinct_bindings_share_a_bucket_in_order() {
        let mut reg = Registry::new();
        let first = Binding::value(Database).unwrap();
        let second = Binding::value(Database).unwrap();
        reg.register_type(entry(&first)).unwrap();
        reg.register_type(entry(&second)).unwrap();

        let bucket = reg.by_type(TypeKey::of::<Database>());
        assert!(bucket[0].binding.ptr_eq(&first));
        assert!(bucket[1].binding.ptr_eq(&second));
    }

    #[test]
    fn exposure_must_fit_binding() {
        let mut reg = Registry::new();
        let cache = Binding::value(Cache).unwrap();

        let err = reg.register_type(entry(&cache)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidType);
    }

    #[test]
    fn trait_exposure_goes_to_trait_bucket() {
        let mut reg = Registry::new();
        let db = Binding::value(Database).unwrap();
        let exposure = Exposure::new(|db: Arc<Database>| db as Arc<dyn Store>);
        reg.register_type(Entry::new(db, exposure)).unwrap();

        assert!(reg.by_type(TypeKey::of::<Database>()).is_empty());
        assert_eq!(reg.by_type(TypeKey::of::<dyn Store>()).len(), 1);
    }

    #[test]
    fn duplicate_name_fails_and_rollback_frees_it() {
        let mut reg = Registry::new();
        let db = Binding::value(Database).unwrap();
        reg.register_name("db".into(), entry(&db)).unwrap();

        let err = reg.register_name("db".into(), entry(&db)).unwrap_err();
        assert_eq!(err.to_string(), "duplicated dependency name: db");

        reg.unregister_name("db");
        assert!(reg.by_name("db").is_none());
        reg.register_name("db".into(), entry(&db)).unwrap();
    }

    #[test]
    fn capabilities_are_idempotent() {
        let mut reg = Registry::new();
        let db = Binding::value(Database).unwrap();
        reg.register_capability(entry(&db)).unwrap();
        reg.register_capability(entry(&db)).unwrap();

        assert_eq!(reg.by_type(TypeKey::of::<Database>()).len(), 1);
    }

    #[test]
    fn identity_reuses_binding() {
        let mut reg = Registry::new();
        let shared = Arc::new(Database);
        let identity = Some(Identity::of_shared(&shared));

        let first = reg.unique_binding(identity, Binding::shared(shared.clone())).unwrap();
        let second = reg.unique_binding(identity, Binding::shared(shared.clone())).unwrap();
        assert!(first.ptr_eq(&second));

        let plain = reg.unique_binding(None, Binding::value(Database)).unwrap();
        assert!(!plain.ptr_eq(&first));
    }

    #[test]
    fn listings_are_sorted() {
        let mut reg = Registry::new();
        for name in ["zeta", "alpha", "mid"] {
            let db = Binding::value(Database).unwrap();
            reg.register_name(name.into(), entry(&db)).unwrap();
        }
        reg.register_type(entry(&Binding::value(Database).unwrap())).unwrap();
        let cache = Binding::value(Cache).unwrap();
        reg.register_type(Entry::new(cache, Exposure::identity::<Cache>())).unwrap();

        assert_eq!(reg.names(), vec!["alpha", "mid", "zeta"]);
        let types = reg.type_names();
        assert!(types.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(types.len(), 2);
    }

    #[test]
    fn snapshot_drops_identities() {
        let mut reg = Registry::new();
        let shared = Arc::new(Database);
        let identity = Some(Identity::of_shared(&shared));
        let binding = reg.unique_binding(identity, Binding::shared(shared.clone())).unwrap();
        reg.register_type(entry(&binding)).unwrap();

        let snapshot = reg.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.by_identity.is_empty());
        assert!(snapshot.type_names()[0].contains("Database"));
    }
}
