//! Inclusion predicates consulted at every model inclusion decision.

use crate::descriptor::{AccessFlags, ClassDescriptor};

/// Three-way predicate over names, class descriptors and access flags.
pub trait Filter {
    /// Accept a raw qualified-name expression.
    fn accept_name(&self, expr: &str) -> bool;

    /// Accept a whole class descriptor.
    fn accept_class(&self, class: &ClassDescriptor) -> bool;

    /// Accept a member (field/method) by its access flags.
    fn accept_flags(&self, flags: AccessFlags) -> bool;
}

/// Includes everything.
#[derive(Debug, Default)]
pub struct AcceptAll;

impl Filter for AcceptAll {
    fn accept_name(&self, _expr: &str) -> bool {
        true
    }

    fn accept_class(&self, _class: &ClassDescriptor) -> bool {
        true
    }

    fn accept_flags(&self, _flags: AccessFlags) -> bool {
        true
    }
}

/// Includes only named public/protected elements. Includes all named
/// classes, as they may be subclassed by public/protected named classes.
#[derive(Debug, Default)]
pub struct PublicApiFilter;

impl Filter for PublicApiFilter {
    fn accept_name(&self, _expr: &str) -> bool {
        true
    }

    fn accept_class(&self, class: &ClassDescriptor) -> bool {
        is_named_class(&class.name)
    }

    fn accept_flags(&self, flags: AccessFlags) -> bool {
        flags.is_public() || flags.is_protected()
    }
}

/// A class is named iff the last `$`-segment of its qualified name does not
/// parse as an integer (anonymous classes compile to `Outer$1`, `Outer$2`, ...).
pub fn is_named_class(name: &str) -> bool {
    let leaf = match name.rsplit_once('$') {
        Some((_, leaf)) => leaf,
        None => name,
    };
    leaf.parse::<u32>().is_err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ACC_PROTECTED, ACC_PUBLIC};

    #[test]
    fn named_class_detection() {
        assert!(is_named_class("a.b.Foo"));
        assert!(is_named_class("a.b.Foo$Bar"));
        assert!(!is_named_class("a.b.Foo$1"));
        assert!(!is_named_class("a.b.Foo$Bar$12"));
    }

    #[test]
    fn public_api_filter_drops_non_public_members() {
        let filter = PublicApiFilter;
        assert!(filter.accept_flags(AccessFlags(ACC_PUBLIC)));
        assert!(filter.accept_flags(AccessFlags(ACC_PROTECTED)));
        assert!(!filter.accept_flags(AccessFlags(0)));
    }
}
