//! Two-pass model construction driver.
//!
//! Pass 1 establishes classifier identity and the inheritance/realization
//! hierarchy, and resolves every referenced type up front: once another
//! classifier holds an edge to a type, that type's kind can still be fixed
//! in place, but no new referenced types may appear in pass 2. Pass 2
//! attaches properties, operations and the instruction-derived dependency
//! edges to classifiers that already exist.
//!
//! Classpath descriptors are added only when a classifier with their name
//! was already referenced, so pass 1 over the classpath set iterates to a
//! fixed point. Membership is monotonic; descriptors still unresolved at
//! the fixed point are reported back as skipped.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::descriptor::{ClassDescriptor, FieldDescriptor, JavaType, MethodCode, MethodDescriptor, OperandRef};
use crate::error::{ModelError, Result};
use crate::filter::Filter;
use crate::model::{ClassifierId, ClassifierKind, Model, Operation, Owner, Property};
use crate::prune;
use crate::registry;
use crate::resolve::resolve_classifier;

pub const TAG_CLASSPATH: &str = "classpath";
pub const TAG_INFERRED: &str = "inferred";

/// Cooperative cancellation probe, polled between descriptors and between
/// phases, never mid-descriptor.
pub trait CancelProbe {
    fn is_cancelled(&self) -> bool;
}

/// Probe that never cancels.
#[derive(Debug, Default)]
pub struct NeverCancel;

impl CancelProbe for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl<F: Fn() -> bool> CancelProbe for F {
    fn is_cancelled(&self) -> bool {
        self()
    }
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Include classifier properties and operations.
    pub include_features: bool,
    /// Include elements that are only referred to by bytecode instructions.
    pub include_instruction_references: bool,
    /// Keep only classifiers that participate in the dependency closure.
    pub dependencies_only: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            include_features: true,
            include_instruction_references: false,
            dependencies_only: false,
        }
    }
}

/// Result of a run. A cancelled run keeps the partially built model and
/// reports `complete = false`; it is never rolled back.
#[derive(Debug)]
pub struct RunOutcome {
    pub model: Model,
    pub complete: bool,
    /// Classpath descriptors that were never referenced from the model.
    pub skipped: Vec<String>,
}

pub struct ModelBuilder<'a> {
    model: Model,
    filter: &'a dyn Filter,
    cancel: &'a dyn CancelProbe,
    options: BuildOptions,
    max_major: u16,
    max_minor: u16,
    preverified: bool,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(
        model_name: &str,
        filter: &'a dyn Filter,
        cancel: &'a dyn CancelProbe,
        options: BuildOptions,
    ) -> Self {
        Self {
            model: Model::new(model_name),
            filter,
            cancel,
            options,
            max_major: 0,
            max_minor: 0,
            preverified: false,
        }
    }

    /// Runs the full conversion over the contained and classpath descriptor
    /// sets. `inputs` names the input sources for the provenance comment.
    pub fn run(
        mut self,
        contained: &[ClassDescriptor],
        classpath: &[ClassDescriptor],
        inputs: &[String],
    ) -> Result<RunOutcome> {
        match self.run_phases(contained, classpath, inputs) {
            Ok(skipped) => Ok(RunOutcome {
                model: self.model,
                complete: true,
                skipped,
            }),
            Err(ModelError::Cancelled) => {
                info!("run cancelled; partial model retained");
                Ok(RunOutcome {
                    model: self.model,
                    complete: false,
                    skipped: Vec::new(),
                })
            }
            Err(e) => Err(e),
        }
    }

    fn run_phases(
        &mut self,
        contained: &[ClassDescriptor],
        classpath: &[ClassDescriptor],
        inputs: &[String],
    ) -> Result<Vec<String>> {
        for desc in contained.iter().chain(classpath) {
            self.observe_version(desc);
        }

        info!("adding classifiers");
        for desc in contained {
            self.add_classifier(desc, false)?;
            self.check_cancelled()?;
        }
        let skipped = self.add_classifiers_closure(classpath)?;
        self.check_cancelled()?;

        info!("adding classifier members");
        let skipped_names: HashSet<&str> = skipped.iter().map(String::as_str).collect();
        for desc in contained {
            self.add_members(desc)?;
            self.check_cancelled()?;
        }
        for desc in classpath {
            if skipped_names.contains(desc.name.as_str()) {
                continue;
            }
            self.add_members(desc)?;
            self.check_cancelled()?;
        }

        let contained_ids = self.find_classifiers(contained);
        let classpath_ids =
            self.find_classifiers_excluding(classpath, &skipped_names);
        if self.options.dependencies_only {
            info!("removing classifiers outside the dependency closure");
            prune::prune_dependencies_only(&mut self.model, &contained_ids);
        } else {
            info!("tagging inferred classifiers");
            let all: Vec<ClassifierId> = contained_ids
                .iter()
                .chain(&classpath_ids)
                .copied()
                .collect();
            prune::tag_inferred(&mut self.model, &all);
        }
        self.check_cancelled()?;

        info!("removing empty packages");
        prune::remove_empty_packages(&mut self.model);
        self.check_cancelled()?;

        info!("adding run metadata");
        self.model
            .set_model_tag("majorBytecodeFormatVersion", &self.max_major.to_string());
        self.model
            .set_model_tag("minorBytecodeFormatVersion", &self.max_minor.to_string());
        self.model
            .set_model_tag("preverified", &self.preverified.to_string());
        self.model.add_comment(&format!(
            "Generated by class-modeler {} from: {}",
            env!("CARGO_PKG_VERSION"),
            inputs.join(", ")
        ));
        Ok(skipped)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ModelError::Cancelled);
        }
        Ok(())
    }

    fn observe_version(&mut self, desc: &ClassDescriptor) {
        if (desc.major_version, desc.minor_version) > (self.max_major, self.max_minor) {
            self.max_major = desc.major_version;
            self.max_minor = desc.minor_version;
        }
    }

    fn accept(&self, desc: &ClassDescriptor) -> bool {
        self.filter.accept_name(&desc.name) && self.filter.accept_class(desc)
    }

    /// Pass 1 for one descriptor. Returns whether a classifier was added;
    /// false when filtered out, or when a classpath class is not referenced
    /// by anything in the model yet.
    fn add_classifier(&mut self, desc: &ClassDescriptor, is_classpath: bool) -> Result<bool> {
        if !self.accept(desc) {
            debug!(class = %desc.name, "skipped filtered class");
            return Ok(false);
        }
        debug!(class = %desc.name, "adding classifier");
        let id = if is_classpath {
            match resolve_classifier(&mut self.model, &desc.name, None) {
                Some(id) => id,
                // not referenced from the model yet
                None => return Ok(false),
            }
        } else {
            let kind = if desc.is_interface() {
                ClassifierKind::Interface
            } else {
                ClassifierKind::Class
            };
            resolve_classifier(&mut self.model, &desc.name, Some(kind))
                .expect("resolution with create cannot fail")
        };
        let id = registry::fix_kind(&mut self.model, id, desc);
        if is_classpath {
            self.model.annotate(id, TAG_CLASSPATH, "true");
        }
        // referenced types get their correct kind in pass 1; replacing an
        // already-referenced type later is unsafe
        self.add_referenced_interfaces(desc);
        self.add_referenced_generals(desc);
        self.add_interface_realizations(id, desc);
        self.add_generalizations(id, desc);
        if self.options.include_features {
            self.add_property_types(desc)?;
            self.add_operation_types(desc)?;
        }
        if self.options.include_instruction_references {
            self.add_operand_types(desc);
        }
        Ok(true)
    }

    /// Iterates pass 1 over the classpath set to a fixed point; returns the
    /// descriptors that were never added.
    fn add_classifiers_closure(&mut self, classpath: &[ClassDescriptor]) -> Result<Vec<String>> {
        let mut process: Vec<&ClassDescriptor> = classpath.iter().collect();
        loop {
            let mut remaining = Vec::new();
            let mut added = false;
            for desc in process {
                if self.add_classifier(desc, true)? {
                    added = true;
                } else {
                    remaining.push(desc);
                }
                self.check_cancelled()?;
            }
            process = remaining;
            if !added {
                break;
            }
        }
        Ok(process.into_iter().map(|d| d.name.clone()).collect())
    }

    /// Interfaces implemented by the descriptor, created at the correct kind.
    fn add_referenced_interfaces(&mut self, desc: &ClassDescriptor) {
        for name in &desc.interfaces {
            let id = resolve_classifier(&mut self.model, name, Some(ClassifierKind::Interface))
                .expect("resolution with create cannot fail");
            registry::replace_kind(&mut self.model, id, ClassifierKind::Interface);
            // it has an implementor
            self.model.classifier_mut(id).is_leaf = false;
        }
    }

    /// Superclass of the descriptor, created at the correct kind.
    fn add_referenced_generals(&mut self, desc: &ClassDescriptor) {
        if let Some(superclass) = desc.superclass_name() {
            let id = resolve_classifier(&mut self.model, superclass, Some(ClassifierKind::Class))
                .expect("resolution with create cannot fail");
            registry::replace_kind(&mut self.model, id, ClassifierKind::Class);
        }
    }

    fn add_interface_realizations(&mut self, id: ClassifierId, desc: &ClassDescriptor) {
        for name in &desc.interfaces {
            let iface = resolve_classifier(&mut self.model, name, None)
                .expect("interface resolved in add_referenced_interfaces");
            assert_eq!(
                self.model.classifier(iface).kind,
                ClassifierKind::Interface,
                "realization target {name} must be an interface"
            );
            self.model.add_realization(id, iface);
        }
    }

    fn add_generalizations(&mut self, id: ClassifierId, desc: &ClassDescriptor) {
        // interfaces do not extend classes in this model
        if self.model.classifier(id).kind == ClassifierKind::Interface {
            return;
        }
        if let Some(superclass) = desc.superclass_name() {
            let target = resolve_classifier(&mut self.model, superclass, None)
                .expect("superclass resolved in add_referenced_generals");
            assert_eq!(
                self.model.classifier(target).kind,
                ClassifierKind::Class,
                "generalization target {superclass} must be a class"
            );
            self.model.add_generalization(id, target);
        }
    }

    /// Resolves a declared type into the model, creating primitive nodes,
    /// class stubs and array siblings as needed.
    fn resolve_type(&mut self, ty: &JavaType) -> Option<ClassifierId> {
        match ty {
            JavaType::Primitive(p) => {
                let root = Owner::Package(self.model.root());
                registry::find_or_create(
                    &mut self.model,
                    root,
                    p.source_name(),
                    Some(ClassifierKind::Primitive),
                )
            }
            JavaType::Object(name) => {
                resolve_classifier(&mut self.model, name, Some(ClassifierKind::Class))
            }
            JavaType::Array { elem, dims } => {
                let base = self.resolve_type(elem)?;
                let owner = self.model.classifier(base).owner;
                let mut name = self.model.classifier(base).name.clone();
                let mut id = base;
                for _ in 0..*dims {
                    name.push_str("[]");
                    id = registry::find_or_create(
                        &mut self.model,
                        owner,
                        &name,
                        Some(ClassifierKind::Primitive),
                    )?;
                }
                Some(id)
            }
        }
    }

    /// Lookup-only counterpart of [`Self::resolve_type`] for pass 2, which
    /// must never create.
    fn find_type(&mut self, ty: &JavaType) -> Option<ClassifierId> {
        match ty {
            JavaType::Primitive(p) => {
                let root = Owner::Package(self.model.root());
                registry::find_or_create(&mut self.model, root, p.source_name(), None)
            }
            JavaType::Object(name) => resolve_classifier(&mut self.model, name, None),
            JavaType::Array { elem, dims } => {
                let base = self.find_type(elem)?;
                let owner = self.model.classifier(base).owner;
                let mut name = self.model.classifier(base).name.clone();
                let mut id = base;
                for _ in 0..*dims {
                    name.push_str("[]");
                    id = registry::find_or_create(&mut self.model, owner, &name, None)?;
                }
                Some(id)
            }
        }
    }

    fn add_property_types(&mut self, desc: &ClassDescriptor) -> Result<()> {
        for field in self.accepted_fields(desc) {
            debug!(class = %desc.name, field = %field.name, "resolving property type");
            if self.resolve_type(&field.field_type).is_none() {
                return Err(ModelError::UnresolvedType {
                    class: desc.name.clone(),
                    member: field.name.clone(),
                    signature: field.field_type.signature(),
                });
            }
        }
        Ok(())
    }

    fn add_operation_types(&mut self, desc: &ClassDescriptor) -> Result<()> {
        for method in self.accepted_methods(desc) {
            debug!(class = %desc.name, method = %method.name, "resolving operation types");
            let types = method
                .signature
                .params
                .iter()
                .chain(method.signature.ret.as_ref());
            for ty in types {
                if self.resolve_type(ty).is_none() {
                    return Err(ModelError::UnresolvedType {
                        class: desc.name.clone(),
                        member: method.name.clone(),
                        signature: method.signature.signature(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Creates stubs for every type referenced by instruction operands.
    /// Dependency edges are attached in pass 2.
    fn add_operand_types(&mut self, desc: &ClassDescriptor) {
        for method in self.accepted_methods(desc) {
            let Some(code) = &method.code else { continue };
            for operand in &code.operands {
                match operand {
                    OperandRef::Type { name } => {
                        resolve_classifier(&mut self.model, name, Some(ClassifierKind::Class));
                    }
                    OperandRef::Field {
                        class, field_type, ..
                    } => {
                        resolve_classifier(&mut self.model, class, Some(ClassifierKind::Class));
                        self.resolve_type(field_type);
                    }
                    OperandRef::Method {
                        class, signature, ..
                    } => {
                        resolve_classifier(&mut self.model, class, Some(ClassifierKind::Class));
                        for ty in signature.params.iter().chain(signature.ret.as_ref()) {
                            self.resolve_type(ty);
                        }
                    }
                }
            }
        }
    }

    /// Pass 2 for one descriptor: attach members and instruction-derived
    /// dependency edges to the already-existing classifier.
    fn add_members(&mut self, desc: &ClassDescriptor) -> Result<()> {
        if !self.accept(desc) {
            return Ok(());
        }
        let id = resolve_classifier(&mut self.model, &desc.name, None)
            .expect("classifier must exist after pass 1");
        if self.options.include_features {
            for field in self.accepted_fields(desc) {
                self.add_property(id, desc, field)?;
            }
            for method in self.accepted_methods(desc) {
                self.add_operation(id, desc, method)?;
            }
        }
        for method in self.accepted_methods(desc) {
            if let Some(code) = &method.code {
                if code.stack_map {
                    // monotonic; never reset
                    self.preverified = true;
                }
                if self.options.include_instruction_references {
                    self.add_operand_dependencies(id, code);
                }
            }
        }
        Ok(())
    }

    fn accepted_fields<'d>(&self, desc: &'d ClassDescriptor) -> Vec<&'d FieldDescriptor> {
        desc.fields
            .iter()
            .filter(|f| self.filter.accept_flags(f.flags))
            .collect()
    }

    fn accepted_methods<'d>(&self, desc: &'d ClassDescriptor) -> Vec<&'d MethodDescriptor> {
        desc.methods
            .iter()
            .filter(|m| self.filter.accept_flags(m.flags))
            .collect()
    }

    fn add_property(
        &mut self,
        id: ClassifierId,
        desc: &ClassDescriptor,
        field: &FieldDescriptor,
    ) -> Result<()> {
        if self
            .model
            .classifier(id)
            .properties
            .iter()
            .any(|p| p.name == field.name)
        {
            return Ok(());
        }
        let property_type =
            self.find_type(&field.field_type)
                .ok_or_else(|| ModelError::UnresolvedType {
                    class: desc.name.clone(),
                    member: field.name.clone(),
                    signature: field.field_type.signature(),
                })?;
        self.model.classifier_mut(id).properties.push(Property {
            name: field.name.clone(),
            property_type,
            visibility: registry::to_visibility(field.flags),
            is_static: field.flags.is_static(),
            is_read_only: field.flags.is_final(),
            is_leaf: field.flags.is_final(),
        });
        Ok(())
    }

    fn add_operation(
        &mut self,
        id: ClassifierId,
        desc: &ClassDescriptor,
        method: &MethodDescriptor,
    ) -> Result<()> {
        let unresolved = || ModelError::UnresolvedType {
            class: desc.name.clone(),
            member: method.name.clone(),
            signature: method.signature.signature(),
        };
        let mut params = Vec::with_capacity(method.signature.params.len());
        for ty in &method.signature.params {
            params.push(self.find_type(ty).ok_or_else(unresolved)?);
        }
        let returns = match &method.signature.ret {
            Some(ty) => Some(self.find_type(ty).ok_or_else(unresolved)?),
            None => None,
        };
        // overloads are distinct; identity is (owner, name, parameter types)
        if self
            .model
            .classifier(id)
            .operations
            .iter()
            .any(|o| o.name == method.name && o.params == params)
        {
            return Ok(());
        }
        self.model.classifier_mut(id).operations.push(Operation {
            name: method.name.clone(),
            params,
            returns,
            visibility: registry::to_visibility(method.flags),
            is_abstract: method.flags.is_abstract(),
            is_static: method.flags.is_static(),
            is_leaf: method.flags.is_final(),
        });
        Ok(())
    }

    fn add_operand_dependencies(&mut self, id: ClassifierId, code: &MethodCode) {
        for operand in &code.operands {
            match operand {
                OperandRef::Type { name } => {
                    if let Some(target) = resolve_classifier(&mut self.model, name, None) {
                        self.model.add_dependency(id, target);
                    }
                }
                OperandRef::Field {
                    class, field_type, ..
                } => {
                    if let Some(target) = resolve_classifier(&mut self.model, class, None) {
                        self.model.add_dependency(id, target);
                    }
                    if let Some(target) = self.find_type(field_type) {
                        self.model.add_dependency(id, target);
                    }
                }
                OperandRef::Method {
                    class, signature, ..
                } => {
                    if let Some(target) = resolve_classifier(&mut self.model, class, None) {
                        self.model.add_dependency(id, target);
                    }
                    for ty in signature.params.iter().chain(signature.ret.as_ref()) {
                        if let Some(target) = self.find_type(ty) {
                            self.model.add_dependency(id, target);
                        }
                    }
                }
            }
        }
    }

    fn find_classifiers(&mut self, descs: &[ClassDescriptor]) -> Vec<ClassifierId> {
        let empty = HashSet::new();
        self.find_classifiers_excluding(descs, &empty)
    }

    fn find_classifiers_excluding(
        &mut self,
        descs: &[ClassDescriptor],
        excluded: &HashSet<&str>,
    ) -> Vec<ClassifierId> {
        let mut ids = Vec::new();
        for desc in descs {
            if excluded.contains(desc.name.as_str()) || !self.accept(desc) {
                continue;
            }
            if let Some(id) = resolve_classifier(&mut self.model, &desc.name, None) {
                ids.push(id);
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ACC_INTERFACE, ACC_PUBLIC, AccessFlags};
    use crate::filter::AcceptAll;

    fn class(name: &str) -> ClassDescriptor {
        ClassDescriptor {
            name: name.to_string(),
            superclass: None,
            interfaces: vec![],
            flags: AccessFlags(ACC_PUBLIC),
            major_version: 52,
            minor_version: 0,
            fields: vec![],
            methods: vec![],
        }
    }

    fn interface(name: &str) -> ClassDescriptor {
        ClassDescriptor {
            flags: AccessFlags(ACC_PUBLIC | ACC_INTERFACE),
            ..class(name)
        }
    }

    fn run(contained: Vec<ClassDescriptor>, classpath: Vec<ClassDescriptor>) -> RunOutcome {
        let builder = ModelBuilder::new("m", &AcceptAll, &NeverCancel, BuildOptions::default());
        builder
            .run(&contained, &classpath, &["test".to_string()])
            .unwrap()
    }

    #[test]
    fn classifier_kind_matches_descriptor() {
        let outcome = run(vec![class("a.A"), interface("a.I")], vec![]);
        let mut model = outcome.model;
        let a = resolve_classifier(&mut model, "a.A", None).unwrap();
        let i = resolve_classifier(&mut model, "a.I", None).unwrap();
        assert_eq!(model.classifier(a).kind, ClassifierKind::Class);
        assert_eq!(model.classifier(i).kind, ClassifierKind::Interface);
    }

    #[test]
    fn superclass_and_interfaces_are_wired() {
        let mut sub = class("a.Sub");
        sub.superclass = Some("a.Base".to_string());
        sub.interfaces = vec!["a.I".to_string()];
        let outcome = run(vec![sub, class("a.Base"), interface("a.I")], vec![]);
        let mut model = outcome.model;
        let sub = resolve_classifier(&mut model, "a.Sub", None).unwrap();
        let base = resolve_classifier(&mut model, "a.Base", None).unwrap();
        let iface = resolve_classifier(&mut model, "a.I", None).unwrap();
        assert_eq!(model.classifier(sub).generals, vec![base]);
        assert_eq!(model.classifier(sub).realizations, vec![iface]);
        // the interface gained an implementor
        assert!(!model.classifier(iface).is_leaf);
    }

    #[test]
    fn interfaces_get_no_generalization() {
        let mut iface = interface("a.I");
        iface.superclass = Some("java.lang.Object".to_string());
        let outcome = run(vec![iface], vec![]);
        let mut model = outcome.model;
        let i = resolve_classifier(&mut model, "a.I", None).unwrap();
        assert!(model.classifier(i).generals.is_empty());
    }

    #[test]
    fn unreferenced_classpath_descriptors_are_skipped() {
        let outcome = run(vec![class("a.A")], vec![class("b.Unused")]);
        assert_eq!(outcome.skipped, vec!["b.Unused".to_string()]);
        assert!(outcome.complete);
    }

    #[test]
    fn cancellation_keeps_partial_model() {
        let cancel = || true;
        let builder = ModelBuilder::new("m", &AcceptAll, &cancel, BuildOptions::default());
        let outcome = builder
            .run(&[class("a.A")], &[], &["test".to_string()])
            .unwrap();
        assert!(!outcome.complete);
        // pass 1 ran for the first descriptor before the first poll
        let mut model = outcome.model;
        assert!(resolve_classifier(&mut model, "a.A", None).is_some());
    }

    #[test]
    fn max_format_version_is_tracked() {
        let mut old = class("a.Old");
        old.major_version = 49;
        old.minor_version = 3;
        let mut new = class("a.New");
        new.major_version = 52;
        let outcome = run(vec![old, new], vec![]);
        assert_eq!(
            outcome.model.model_tag("majorBytecodeFormatVersion"),
            Some("52")
        );
        assert_eq!(
            outcome.model.model_tag("minorBytecodeFormatVersion"),
            Some("0")
        );
        assert_eq!(outcome.model.model_tag("preverified"), Some("false"));
    }
}
