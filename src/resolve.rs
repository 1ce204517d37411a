//! Name resolution: dotted qualified names map to paths through the package
//! tree, `$`-delimited suffixes to paths through classifier nesting.

use crate::model::{ClassifierId, ClassifierKind, Model, Owner, PackageId};
use crate::registry;

/// Resolves a dotted package name, creating missing packages on demand when
/// `create` is set. The empty name resolves to the root package. Without
/// `create`, a missing segment returns `None` with no side effects.
pub fn resolve_package(model: &mut Model, dotted: &str, create: bool) -> Option<PackageId> {
    if dotted.is_empty() {
        return Some(model.root());
    }
    let (parent_name, leaf) = dotted.rsplit_once('.').unwrap_or(("", dotted));
    let parent = resolve_package(model, parent_name, create)?;
    match model.find_subpackage(parent, leaf) {
        Some(p) => Some(p),
        None if create => Some(model.add_package(parent, leaf)),
        None => None,
    }
}

/// Resolves a dotted, `$`-delimited classifier name. With `create_kind`,
/// missing packages and enclosing classifiers are created as encountered;
/// the missing classifier itself is created with the requested kind only at
/// the leaf (intermediate `$`-segments default to class placeholders).
pub fn resolve_classifier(
    model: &mut Model,
    name: &str,
    create_kind: Option<ClassifierKind>,
) -> Option<ClassifierId> {
    if name.is_empty() {
        return None;
    }
    let (pkg_name, local) = name.rsplit_once('.').unwrap_or(("", name));
    let pkg = resolve_package(model, pkg_name, create_kind.is_some())?;

    let mut owner = Owner::Package(pkg);
    let mut resolved = None;
    let mut segments = local.split('$').peekable();
    while let Some(segment) = segments.next() {
        let desired = match create_kind {
            Some(kind) if segments.peek().is_none() => Some(kind),
            Some(_) => Some(ClassifierKind::Class),
            None => None,
        };
        let id = registry::find_or_create(model, owner, segment, desired)?;
        owner = Owner::Classifier(id);
        resolved = Some(id);
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_packages_on_demand() {
        let mut model = Model::new("m");
        let pkg = resolve_package(&mut model, "a.b.c", true).unwrap();
        assert_eq!(model.package_qualified_name(pkg), "a.b.c");
        // second resolution reuses the same nodes
        assert_eq!(resolve_package(&mut model, "a.b.c", true), Some(pkg));
    }

    #[test]
    fn lookup_only_has_no_side_effects() {
        let mut model = Model::new("m");
        assert_eq!(resolve_package(&mut model, "a.b", false), None);
        assert!(model.package(model.root()).packages.is_empty());
        assert_eq!(resolve_classifier(&mut model, "a.Foo", None), None);
        assert!(model.package(model.root()).packages.is_empty());
    }

    #[test]
    fn resolves_nested_classifier_chains() {
        let mut model = Model::new("m");
        let inner =
            resolve_classifier(&mut model, "a.Outer$Mid$Inner", Some(ClassifierKind::Interface))
                .unwrap();
        assert_eq!(model.qualified_name(inner), "a.Outer$Mid$Inner");
        assert_eq!(model.classifier(inner).kind, ClassifierKind::Interface);

        // intermediates are class placeholders
        let mid = resolve_classifier(&mut model, "a.Outer$Mid", None).unwrap();
        assert_eq!(model.classifier(mid).kind, ClassifierKind::Class);
    }

    #[test]
    fn default_package_classifier() {
        let mut model = Model::new("m");
        let c = resolve_classifier(&mut model, "Standalone", Some(ClassifierKind::Class)).unwrap();
        assert_eq!(model.qualified_name(c), "Standalone");
    }
}
