//! Dependency closure and model pruning.
//!
//! In dependencies-only mode the model is stripped down to the classifiers
//! that participate in the dependency closure: contained classifiers that no
//! inferred classifier refers back to are removed. A contained classifier
//! that is both a dependant and a dependency of inferred code sits on a
//! cycle; it is retained with its members stripped, and the run logs a
//! warning naming it. The retention test is a plain set intersection, not
//! SCC detection — multi-hop cycles may be under- or over-pruned, matching
//! the behavior this tool reverse-engineers.

use std::collections::BTreeSet;

use tracing::warn;

use crate::builder::TAG_INFERRED;
use crate::model::{ClassifierId, Model, PackageId};

/// Tags classifiers as inferred-candidates for downstream consumers.
/// Provenance tags accumulate; existing tags are never overwritten away.
pub fn tag_inferred(model: &mut Model, ids: &[ClassifierId]) {
    for &id in ids {
        model.annotate(id, TAG_INFERRED, "true");
    }
}

/// All types referenced by the given classifiers as field, parameter,
/// return or instruction-operand types.
pub fn referred_types(model: &Model, ids: &BTreeSet<ClassifierId>) -> BTreeSet<ClassifierId> {
    let mut referred = BTreeSet::new();
    for &id in ids {
        let data = model.classifier(id);
        for p in &data.properties {
            referred.insert(p.property_type);
        }
        for o in &data.operations {
            referred.extend(o.params.iter().copied());
            referred.extend(o.returns);
        }
        referred.extend(data.dependencies.iter().copied());
    }
    referred
}

/// Dependencies-only pruning over the finished model. `contained` holds the
/// classifiers built from the primary descriptor set; every other live
/// classifier exists only because something referenced it (classpath origin
/// or stub) and forms the inferred set.
pub fn prune_dependencies_only(model: &mut Model, contained: &[ClassifierId]) {
    let contained: BTreeSet<ClassifierId> = contained.iter().copied().collect();
    let inferred: BTreeSet<ClassifierId> = model
        .live_classifiers()
        .filter(|id| !contained.contains(id))
        .collect();
    let referred = referred_types(model, &inferred);

    let remove: BTreeSet<ClassifierId> = contained
        .iter()
        .copied()
        .filter(|id| !referred.contains(id))
        .collect();
    let retained: Vec<ClassifierId> = contained.intersection(&referred).copied().collect();
    if !retained.is_empty() {
        let names: Vec<String> = retained.iter().map(|&id| model.qualified_name(id)).collect();
        warn!(
            classifiers = ?names,
            "cyclic dependencies found; keeping referred classifiers without members"
        );
        for &id in &retained {
            model.strip_members(id);
        }
    }

    for &id in &inferred {
        model.annotate(id, TAG_INFERRED, "true");
    }
    for &id in &retained {
        model.annotate(id, TAG_INFERRED, "true");
    }

    for id in remove {
        remove_with_derived(model, id);
    }
}

/// Removes a classifier together with its derived array-type siblings
/// (classifiers whose name is the base name plus only bracket characters).
fn remove_with_derived(model: &mut Model, id: ClassifierId) {
    let base = model.classifier(id).name.clone();
    let owner = model.classifier(id).owner;
    let derived: Vec<ClassifierId> = model
        .children_of(owner)
        .iter()
        .copied()
        .filter(|&c| {
            let name = &model.classifier(c).name;
            name.len() > base.len()
                && name.starts_with(base.as_str())
                && name[base.len()..].chars().all(|ch| ch == '[' || ch == ']')
        })
        .collect();
    for d in derived {
        model.remove_classifier(d);
    }
    model.remove_classifier(id);
}

/// Depth-first removal of packages left without any packaged element.
/// A package survives as long as it transitively contains a classifier.
pub fn remove_empty_packages(model: &mut Model) {
    let root = model.root();
    prune_package(model, root);
}

fn prune_package(model: &mut Model, pkg: PackageId) {
    let children: Vec<PackageId> = model.package(pkg).packages.clone();
    for child in children {
        prune_package(model, child);
    }
    let data = model.package(pkg);
    if data.packages.is_empty() && data.classifiers.is_empty() {
        if let Some(parent) = data.parent {
            model.package_mut(parent).packages.retain(|&p| p != pkg);
        }
    }
}
