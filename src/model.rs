//! Arena-backed class-diagram model.
//!
//! Packages and classifiers live in flat arenas addressed by stable id
//! handles; every structural relationship (owner, nesting, inheritance,
//! member types, dependency edges) holds handles, never typed pointers. A
//! classifier's meta-kind is a plain field, so fixing a wrongly guessed
//! forward reference is an in-place mutation that preserves the node's
//! structural position and every incoming edge.

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassifierId(usize);

/// Owning container of a classifier: a package, or an enclosing classifier
/// for nested classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Package(PackageId),
    Classifier(ClassifierId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    Class,
    Interface,
    /// Primitive types and array types.
    Primitive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub property_type: ClassifierId,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_read_only: bool,
    pub is_leaf: bool,
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub name: String,
    pub params: Vec<ClassifierId>,
    /// `None` for void.
    pub returns: Option<ClassifierId>,
    pub visibility: Visibility,
    pub is_abstract: bool,
    pub is_static: bool,
    pub is_leaf: bool,
}

#[derive(Debug)]
pub struct PackageData {
    pub name: String,
    pub parent: Option<PackageId>,
    /// Ordered by name; child names are unique.
    pub packages: Vec<PackageId>,
    pub classifiers: Vec<ClassifierId>,
}

#[derive(Debug)]
pub struct ClassifierData {
    /// Local name segment; the qualified name is derived structurally.
    pub name: String,
    pub kind: ClassifierKind,
    pub visibility: Visibility,
    pub is_abstract: bool,
    pub is_leaf: bool,
    pub owner: Owner,
    pub nested: Vec<ClassifierId>,
    /// Superclass edges; Class to Class only.
    pub generals: Vec<ClassifierId>,
    /// Implemented-interface edges.
    pub realizations: Vec<ClassifierId>,
    pub properties: Vec<Property>,
    pub operations: Vec<Operation>,
    /// Usage links derived from instruction operands. Non-owning.
    pub dependencies: Vec<ClassifierId>,
    pub tags: BTreeMap<String, String>,
    dead: bool,
}

#[derive(Debug)]
pub struct Model {
    name: String,
    packages: Vec<PackageData>,
    classifiers: Vec<ClassifierData>,
    root: PackageId,
    tags: BTreeMap<String, String>,
    comments: Vec<String>,
}

impl Model {
    pub fn new(name: &str) -> Self {
        let root_data = PackageData {
            name: String::new(),
            parent: None,
            packages: Vec::new(),
            classifiers: Vec::new(),
        };
        Self {
            name: name.to_string(),
            packages: vec![root_data],
            classifiers: Vec::new(),
            root: PackageId(0),
            tags: BTreeMap::new(),
            comments: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> PackageId {
        self.root
    }

    pub fn package(&self, id: PackageId) -> &PackageData {
        &self.packages[id.0]
    }

    pub fn package_mut(&mut self, id: PackageId) -> &mut PackageData {
        &mut self.packages[id.0]
    }

    pub fn classifier(&self, id: ClassifierId) -> &ClassifierData {
        &self.classifiers[id.0]
    }

    pub fn classifier_mut(&mut self, id: ClassifierId) -> &mut ClassifierData {
        &mut self.classifiers[id.0]
    }

    pub fn find_subpackage(&self, parent: PackageId, name: &str) -> Option<PackageId> {
        self.package(parent)
            .packages
            .iter()
            .copied()
            .find(|&p| self.package(p).name == name)
    }

    /// Creates a subpackage, keeping the parent's child list ordered by name.
    pub fn add_package(&mut self, parent: PackageId, name: &str) -> PackageId {
        assert!(
            self.find_subpackage(parent, name).is_none(),
            "duplicate subpackage {name:?}"
        );
        let id = PackageId(self.packages.len());
        self.packages.push(PackageData {
            name: name.to_string(),
            parent: Some(parent),
            packages: Vec::new(),
            classifiers: Vec::new(),
        });
        let pos = self
            .package(parent)
            .packages
            .iter()
            .position(|&p| self.package(p).name.as_str() > name)
            .unwrap_or(self.package(parent).packages.len());
        self.package_mut(parent).packages.insert(pos, id);
        id
    }

    pub fn children_of(&self, owner: Owner) -> &[ClassifierId] {
        match owner {
            Owner::Package(p) => &self.package(p).classifiers,
            Owner::Classifier(c) => &self.classifier(c).nested,
        }
    }

    pub fn add_classifier(&mut self, owner: Owner, name: &str, kind: ClassifierKind) -> ClassifierId {
        assert!(
            !self
                .children_of(owner)
                .iter()
                .any(|&c| self.classifier(c).name == name),
            "duplicate classifier {name:?} under one owner"
        );
        let id = ClassifierId(self.classifiers.len());
        self.classifiers.push(ClassifierData {
            name: name.to_string(),
            kind,
            visibility: Visibility::Private,
            is_abstract: false,
            is_leaf: false,
            owner,
            nested: Vec::new(),
            generals: Vec::new(),
            realizations: Vec::new(),
            properties: Vec::new(),
            operations: Vec::new(),
            dependencies: Vec::new(),
            tags: BTreeMap::new(),
            dead: false,
        });
        match owner {
            Owner::Package(p) => self.package_mut(p).classifiers.push(id),
            Owner::Classifier(c) => self.classifier_mut(c).nested.push(id),
        }
        id
    }

    pub fn add_generalization(&mut self, from: ClassifierId, to: ClassifierId) {
        let data = self.classifier_mut(from);
        if !data.generals.contains(&to) {
            data.generals.push(to);
        }
    }

    pub fn add_realization(&mut self, from: ClassifierId, to: ClassifierId) {
        let data = self.classifier_mut(from);
        if !data.realizations.contains(&to) {
            data.realizations.push(to);
        }
    }

    pub fn add_dependency(&mut self, from: ClassifierId, to: ClassifierId) {
        if from == to {
            return;
        }
        let data = self.classifier_mut(from);
        if !data.dependencies.contains(&to) {
            data.dependencies.push(to);
        }
    }

    /// Dotted qualified name with `$`-delimited nesting, derived from the
    /// node's structural position.
    pub fn qualified_name(&self, id: ClassifierId) -> String {
        let data = self.classifier(id);
        match data.owner {
            Owner::Classifier(outer) => {
                format!("{}${}", self.qualified_name(outer), data.name)
            }
            Owner::Package(pkg) => {
                let prefix = self.package_qualified_name(pkg);
                if prefix.is_empty() {
                    data.name.clone()
                } else {
                    format!("{}.{}", prefix, data.name)
                }
            }
        }
    }

    pub fn package_qualified_name(&self, id: PackageId) -> String {
        let data = self.package(id);
        match data.parent {
            None => String::new(),
            Some(parent) => {
                let prefix = self.package_qualified_name(parent);
                if prefix.is_empty() {
                    data.name.clone()
                } else {
                    format!("{}.{}", prefix, data.name)
                }
            }
        }
    }

    /// Detaches a classifier from its owner and marks it (and its nested
    /// classifiers) dead. Dependency edges pointing at the removed node are
    /// not traversed; removal never cascades into referenced classifiers.
    pub fn remove_classifier(&mut self, id: ClassifierId) {
        let owner = self.classifier(id).owner;
        match owner {
            Owner::Package(p) => self.package_mut(p).classifiers.retain(|&c| c != id),
            Owner::Classifier(c) => self.classifier_mut(c).nested.retain(|&n| n != id),
        }
        self.mark_dead(id);
    }

    fn mark_dead(&mut self, id: ClassifierId) {
        let nested = self.classifier(id).nested.clone();
        self.classifier_mut(id).dead = true;
        for n in nested {
            self.mark_dead(n);
        }
    }

    pub fn is_live(&self, id: ClassifierId) -> bool {
        !self.classifier(id).dead
    }

    pub fn live_classifiers(&self) -> impl Iterator<Item = ClassifierId> + '_ {
        (0..self.classifiers.len())
            .map(ClassifierId)
            .filter(|&id| !self.classifier(id).dead)
    }

    /// Drops every generalization edge pointing at `id`. Used when a kind
    /// change makes `id` an invalid generalization target.
    pub fn purge_incoming_generals(&mut self, id: ClassifierId) {
        for data in &mut self.classifiers {
            data.generals.retain(|&g| g != id);
        }
    }

    /// Drops every realization edge pointing at `id`.
    pub fn purge_incoming_realizations(&mut self, id: ClassifierId) {
        for data in &mut self.classifiers {
            data.realizations.retain(|&r| r != id);
        }
    }

    pub fn strip_members(&mut self, id: ClassifierId) {
        let data = self.classifier_mut(id);
        data.properties.clear();
        data.operations.clear();
    }

    // Tag annotator: at most one value per key.

    pub fn annotate(&mut self, id: ClassifierId, key: &str, value: &str) {
        self.classifier_mut(id)
            .tags
            .insert(key.to_string(), value.to_string());
    }

    pub fn deannotate(&mut self, id: ClassifierId, key: &str) {
        self.classifier_mut(id).tags.remove(key);
    }

    pub fn tag_value(&self, id: ClassifierId, key: &str) -> Option<&str> {
        self.classifier(id).tags.get(key).map(String::as_str)
    }

    pub fn set_model_tag(&mut self, key: &str, value: &str) {
        self.tags.insert(key.to_string(), value.to_string());
    }

    pub fn model_tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn add_comment(&mut self, body: &str) {
        self.comments.push(body.to_string());
    }

    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    pub fn export(&self) -> ModelExport {
        ModelExport {
            name: self.name.clone(),
            tags: self.tags.clone(),
            comments: self.comments.clone(),
            packages: self
                .package(self.root)
                .packages
                .iter()
                .map(|&p| self.export_package(p))
                .collect(),
            classifiers: self
                .package(self.root)
                .classifiers
                .iter()
                .map(|&c| self.export_classifier(c))
                .collect(),
        }
    }

    fn export_package(&self, id: PackageId) -> PackageExport {
        let data = self.package(id);
        PackageExport {
            name: data.name.clone(),
            packages: data.packages.iter().map(|&p| self.export_package(p)).collect(),
            classifiers: data
                .classifiers
                .iter()
                .map(|&c| self.export_classifier(c))
                .collect(),
        }
    }

    fn export_classifier(&self, id: ClassifierId) -> ClassifierExport {
        let data = self.classifier(id);
        ClassifierExport {
            name: data.name.clone(),
            kind: data.kind,
            visibility: data.visibility,
            is_abstract: data.is_abstract,
            is_leaf: data.is_leaf,
            tags: data.tags.clone(),
            generalizations: data.generals.iter().map(|&g| self.qualified_name(g)).collect(),
            realizations: data
                .realizations
                .iter()
                .map(|&r| self.qualified_name(r))
                .collect(),
            dependencies: data
                .dependencies
                .iter()
                .map(|&d| self.qualified_name(d))
                .collect(),
            properties: data
                .properties
                .iter()
                .map(|p| PropertyExport {
                    name: p.name.clone(),
                    property_type: self.qualified_name(p.property_type),
                    visibility: p.visibility,
                    is_static: p.is_static,
                    is_read_only: p.is_read_only,
                    is_leaf: p.is_leaf,
                })
                .collect(),
            operations: data
                .operations
                .iter()
                .map(|o| OperationExport {
                    name: o.name.clone(),
                    params: o.params.iter().map(|&p| self.qualified_name(p)).collect(),
                    returns: o.returns.map(|r| self.qualified_name(r)),
                    visibility: o.visibility,
                    is_abstract: o.is_abstract,
                    is_static: o.is_static,
                    is_leaf: o.is_leaf,
                })
                .collect(),
            nested: data.nested.iter().map(|&n| self.export_classifier(n)).collect(),
        }
    }
}

/// Serializable view of the finished model, with all handles resolved to
/// qualified names.
#[derive(Debug, Serialize)]
pub struct ModelExport {
    pub name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<String>,
    pub packages: Vec<PackageExport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub classifiers: Vec<ClassifierExport>,
}

#[derive(Debug, Serialize)]
pub struct PackageExport {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<PackageExport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub classifiers: Vec<ClassifierExport>,
}

#[derive(Debug, Serialize)]
pub struct ClassifierExport {
    pub name: String,
    pub kind: ClassifierKind,
    pub visibility: Visibility,
    pub is_abstract: bool,
    pub is_leaf: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub generalizations: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub realizations: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyExport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operations: Vec<OperationExport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<ClassifierExport>,
}

#[derive(Debug, Serialize)]
pub struct PropertyExport {
    pub name: String,
    pub property_type: String,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_read_only: bool,
    pub is_leaf: bool,
}

#[derive(Debug, Serialize)]
pub struct OperationExport {
    pub name: String,
    pub params: Vec<String>,
    pub returns: Option<String>,
    pub visibility: Visibility,
    pub is_abstract: bool,
    pub is_static: bool,
    pub is_leaf: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packages_stay_ordered_by_name() {
        let mut model = Model::new("m");
        let root = model.root();
        model.add_package(root, "zoo");
        model.add_package(root, "abc");
        model.add_package(root, "mid");
        let names: Vec<&str> = model
            .package(root)
            .packages
            .iter()
            .map(|&p| model.package(p).name.as_str())
            .collect();
        assert_eq!(names, ["abc", "mid", "zoo"]);
    }

    #[test]
    fn qualified_names_follow_structure() {
        let mut model = Model::new("m");
        let root = model.root();
        let a = model.add_package(root, "a");
        let b = model.add_package(a, "b");
        let outer = model.add_classifier(Owner::Package(b), "Outer", ClassifierKind::Class);
        let inner = model.add_classifier(Owner::Classifier(outer), "Inner", ClassifierKind::Class);
        assert_eq!(model.qualified_name(outer), "a.b.Outer");
        assert_eq!(model.qualified_name(inner), "a.b.Outer$Inner");
    }

    #[test]
    fn remove_classifier_detaches_and_kills_nested() {
        let mut model = Model::new("m");
        let root = model.root();
        let a = model.add_package(root, "a");
        let outer = model.add_classifier(Owner::Package(a), "Outer", ClassifierKind::Class);
        let inner = model.add_classifier(Owner::Classifier(outer), "Inner", ClassifierKind::Class);
        model.remove_classifier(outer);
        assert!(model.package(a).classifiers.is_empty());
        assert!(!model.is_live(outer));
        assert!(!model.is_live(inner));
    }

    #[test]
    fn tags_hold_one_value_per_key() {
        let mut model = Model::new("m");
        let root = model.root();
        let c = model.add_classifier(Owner::Package(root), "C", ClassifierKind::Class);
        model.annotate(c, "classpath", "true");
        model.annotate(c, "classpath", "false");
        assert_eq!(model.tag_value(c, "classpath"), Some("false"));
        model.deannotate(c, "classpath");
        assert_eq!(model.tag_value(c, "classpath"), None);
    }
}
