//! Bridged class registration
//!
//! Modules declare their bridged classes with a [`ClassProvider`] submitted
//! through `inventory`; [`Bridge::install`](super::Bridge::install) runs every
//! provider once and defines the collected classes in the runtime.

use ahash::AHashMap;
use parking_lot::RwLock;

use super::BridgeClass;
use crate::runtime::ClassDescriptor;

/// Load-time registration entry
pub struct ClassProvider {
    pub register: fn(&ClassRegistry),
}

inventory::collect!(ClassProvider);

#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: RwLock<AHashMap<&'static str, ClassDescriptor>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, class: ClassDescriptor) {
        self.classes.write().insert(class.name, class);
    }

    pub fn register_type<T: BridgeClass>(&self) {
        self.register(T::CLASS);
    }

    pub fn register_many<I>(&self, classes: I)
    where
        I: IntoIterator<Item = ClassDescriptor>,
    {
        let mut guard = self.classes.write();
        for class in classes {
            guard.insert(class.name, class);
        }
    }

    /// Run every provider submitted with `inventory`.
    pub fn load_providers(&self) {
        for provider in inventory::iter::<ClassProvider> {
            (provider.register)(self);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.read().contains_key(name)
    }

    pub fn resolve(&self, name: &str) -> Option<ClassDescriptor> {
        self.classes.read().get(name).copied()
    }

    pub fn all(&self) -> Vec<ClassDescriptor> {
        let mut classes: Vec<_> = self.classes.read().values().copied().collect();
        classes.sort_by_key(|class| class.name);
        classes
    }
}
