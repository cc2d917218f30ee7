//! Runtime class descriptors

use std::fmt;

use serde::Serialize;

/// Name of the integer field a proxy shell stores its native handle in.
pub const PTR_FIELD: &str = "ptr";

const BRIDGED_FIELDS: &[&str] = &[PTR_FIELD];

/// Describes a class the managed runtime can instantiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ClassDescriptor {
    /// Fully qualified class name, e.g. `demo/Counter`
    pub name: &'static str,
    /// Integer fields every instance carries
    pub fields: &'static [&'static str],
    /// Field whose value is handed to the finalizer hook when an instance is
    /// collected. Classes without one are never finalized.
    pub handle_field: Option<&'static str>,
}

impl ClassDescriptor {
    /// A proxy shell class: one `ptr` field, finalized with its value.
    pub const fn bridged(name: &'static str) -> Self {
        Self {
            name,
            fields: BRIDGED_FIELDS,
            handle_field: Some(PTR_FIELD),
        }
    }

    /// A plain runtime class with no native counterpart.
    pub const fn plain(name: &'static str) -> Self {
        Self {
            name,
            fields: &[],
            handle_field: None,
        }
    }

    pub fn is_finalizable(&self) -> bool {
        self.handle_field.is_some()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains(&field)
    }
}

impl fmt::Display for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridged_class_carries_ptr_field() {
        const CLASS: ClassDescriptor = ClassDescriptor::bridged("demo/Counter");
        assert!(CLASS.has_field(PTR_FIELD));
        assert!(CLASS.is_finalizable());
        assert_eq!(CLASS.to_string(), "demo/Counter");
    }

    #[test]
    fn plain_class_is_not_finalizable() {
        let class = ClassDescriptor::plain("demo/Holder");
        assert!(!class.is_finalizable());
        assert!(!class.has_field(PTR_FIELD));
    }
}
