//! # class-modeler
//!
//! Reverse-engineers a class-diagram model from compiled Java class
//! descriptors: packages, classifiers, inheritance, typed members and the
//! instruction-derived reference graph, with an optional dependencies-only
//! output mode.
//!
//! ## Architecture
//!
//! - **descriptor**: decoded class-file descriptors (the collaborator input surface)
//! - **filter**: inclusion predicates (accept-all, public-API-only)
//! - **model**: arena-backed package/classifier/member model with provenance tags
//! - **resolve**: dotted and `$`-delimited name resolution over the model
//! - **registry**: classifier find-or-create and the kind-fix machine
//! - **builder**: the two-pass conversion driver with classpath closure
//! - **prune**: dependency-closure pruning and empty-package removal
//! - **error**: core error taxonomy
//! - **cli**: command-line argument surface for the thin binary entry point

pub mod builder;
pub mod cli;
pub mod descriptor;
pub mod error;
pub mod filter;
pub mod model;
pub mod prune;
pub mod registry;
pub mod resolve;
