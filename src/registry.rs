//! Classifier registry: find-or-create under an owner, plus the kind-fix
//! machine that corrects classifiers created from forward references.
//!
//! A name is first materialized by whichever context encounters it first
//! (a superclass reference creates a class placeholder; the class's own
//! descriptor may later reveal an interface). Because the kind is a plain
//! field on the arena node, fixing it mutates the slot in place: owner,
//! nested classifiers and incoming edges all survive, and no duplicate
//! sibling can appear.

use crate::descriptor::{AccessFlags, ClassDescriptor};
use crate::model::{ClassifierId, ClassifierKind, Model, Owner, Visibility};

/// Linear scan of `owner`'s children by name. An existing child is returned
/// as-is (its kind is never changed here); a missing child is created only
/// when `desired` is given.
pub fn find_or_create(
    model: &mut Model,
    owner: Owner,
    name: &str,
    desired: Option<ClassifierKind>,
) -> Option<ClassifierId> {
    if let Some(&found) = model
        .children_of(owner)
        .iter()
        .find(|&&c| model.classifier(c).name == name)
    {
        return Some(found);
    }
    desired.map(|kind| model.add_classifier(owner, name, kind))
}

/// Forces a classifier to the given kind. A kind change invalidates the
/// node's own inheritance edges and any incoming edge for which the node is
/// no longer a legal target; pass 1 re-establishes edges for the referenced
/// name after fixing, so nothing legitimate is lost.
pub fn replace_kind(model: &mut Model, id: ClassifierId, kind: ClassifierKind) {
    if model.classifier(id).kind == kind {
        return;
    }
    let data = model.classifier_mut(id);
    data.kind = kind;
    data.generals.clear();
    data.realizations.clear();
    if kind != ClassifierKind::Class {
        model.purge_incoming_generals(id);
    }
    if kind != ClassifierKind::Interface {
        model.purge_incoming_realizations(id);
    }
}

pub fn to_visibility(flags: AccessFlags) -> Visibility {
    if flags.is_public() {
        Visibility::Public
    } else if flags.is_protected() {
        Visibility::Protected
    } else {
        Visibility::Private
    }
}

/// Reconciles a classifier with its actual descriptor: corrects the kind if
/// a forward reference guessed wrong, then applies the descriptor's access
/// flags. After this call the classifier's kind exactly matches the
/// descriptor's interface flag.
pub fn fix_kind(model: &mut Model, id: ClassifierId, desc: &ClassDescriptor) -> ClassifierId {
    let target = if desc.is_interface() {
        ClassifierKind::Interface
    } else {
        ClassifierKind::Class
    };
    replace_kind(model, id, target);
    let data = model.classifier_mut(id);
    data.is_abstract = desc.flags.is_abstract();
    data.visibility = to_visibility(desc.flags);
    data.is_leaf = desc.flags.is_final();
    debug_assert_eq!(data.kind == ClassifierKind::Interface, desc.is_interface());
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ACC_ABSTRACT, ACC_FINAL, ACC_INTERFACE, ACC_PUBLIC};

    fn descriptor(name: &str, flags: u16) -> ClassDescriptor {
        ClassDescriptor {
            name: name.to_string(),
            superclass: None,
            interfaces: vec![],
            flags: AccessFlags(flags),
            major_version: 52,
            minor_version: 0,
            fields: vec![],
            methods: vec![],
        }
    }

    #[test]
    fn find_or_create_returns_existing_without_kind_change() {
        let mut model = Model::new("m");
        let root = Owner::Package(model.root());
        let first = find_or_create(&mut model, root, "Foo", Some(ClassifierKind::Interface)).unwrap();
        let again = find_or_create(&mut model, root, "Foo", Some(ClassifierKind::Class)).unwrap();
        assert_eq!(first, again);
        assert_eq!(model.classifier(again).kind, ClassifierKind::Interface);
        assert_eq!(find_or_create(&mut model, root, "Missing", None), None);
    }

    #[test]
    fn fix_kind_morphs_placeholder_in_place() {
        let mut model = Model::new("m");
        let root = Owner::Package(model.root());
        let c = model.add_classifier(root, "Foo", ClassifierKind::Class);
        let nested = model.add_classifier(Owner::Classifier(c), "Inner", ClassifierKind::Class);

        let fixed = fix_kind(
            &mut model,
            c,
            &descriptor("Foo", ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT),
        );
        assert_eq!(fixed, c);
        assert_eq!(model.classifier(c).kind, ClassifierKind::Interface);
        assert!(model.classifier(c).is_abstract);
        assert_eq!(model.classifier(c).visibility, Visibility::Public);
        // structural position survives the morph
        assert_eq!(model.classifier(c).nested, vec![nested]);
        assert_eq!(model.children_of(root).len(), 1);
    }

    #[test]
    fn fix_kind_applies_flags_without_kind_change() {
        let mut model = Model::new("m");
        let root = Owner::Package(model.root());
        let c = model.add_classifier(root, "Foo", ClassifierKind::Class);
        fix_kind(&mut model, c, &descriptor("Foo", ACC_FINAL));
        assert_eq!(model.classifier(c).kind, ClassifierKind::Class);
        assert!(model.classifier(c).is_leaf);
        assert_eq!(model.classifier(c).visibility, Visibility::Private);
    }

    #[test]
    fn replace_kind_clears_outgoing_edges() {
        let mut model = Model::new("m");
        let root = Owner::Package(model.root());
        let c = model.add_classifier(root, "Foo", ClassifierKind::Class);
        let sup = model.add_classifier(root, "Base", ClassifierKind::Class);
        model.add_generalization(c, sup);
        replace_kind(&mut model, c, ClassifierKind::Interface);
        assert!(model.classifier(c).generals.is_empty());
        // incoming edges held by others are unaffected by the morph
        model.add_dependency(sup, c);
        replace_kind(&mut model, c, ClassifierKind::Class);
        assert_eq!(model.classifier(sup).dependencies, vec![c]);
    }
}
