//! Compiled-program representation consumed by the catalog builder.
//!
//! The builder only talks to [`ProgramQuery`]. [`Program`] is the in-memory
//! implementation produced by [`crate::SourceLoader`]; tests and other front
//! ends can supply their own.

mod store;
mod types;

pub use store::Program;
pub use types::{
    ConstantDeclaration, Declaration, IntKind, MethodDecl, NamedType, ReturnSite, ReturnValue,
    TargetType, CRATE_ROOT,
};

use std::sync::Arc;

/// Read-only queries over an already type-checked program.
pub trait ProgramQuery: Send + Sync {
    /// Look up a named type and its underlying representation.
    fn resolve_type(&self, target: &TargetType) -> Option<NamedType>;

    /// Find a method declared on `target` in any `impl` block.
    fn method_by_name(&self, target: &TargetType, name: &str) -> Option<MethodDecl>;

    /// Statically evaluate every return site of `method`'s body.
    fn evaluate_constant_return(&self, method: &MethodDecl) -> Vec<ReturnSite>;

    /// All declarations of `package` in source order, `None` if the package was not analyzed.
    fn declarations_of(&self, package: &str) -> Option<Vec<Declaration>>;
}

impl<T: ProgramQuery + ?Sized> ProgramQuery for &T {
    fn resolve_type(&self, target: &TargetType) -> Option<NamedType> {
        (**self).resolve_type(target)
    }

    fn method_by_name(&self, target: &TargetType, name: &str) -> Option<MethodDecl> {
        (**self).method_by_name(target, name)
    }

    fn evaluate_constant_return(&self, method: &MethodDecl) -> Vec<ReturnSite> {
        (**self).evaluate_constant_return(method)
    }

    fn declarations_of(&self, package: &str) -> Option<Vec<Declaration>> {
        (**self).declarations_of(package)
    }
}

impl<T: ProgramQuery + ?Sized> ProgramQuery for Arc<T> {
    fn resolve_type(&self, target: &TargetType) -> Option<NamedType> {
        (**self).resolve_type(target)
    }

    fn method_by_name(&self, target: &TargetType, name: &str) -> Option<MethodDecl> {
        (**self).method_by_name(target, name)
    }

    fn evaluate_constant_return(&self, method: &MethodDecl) -> Vec<ReturnSite> {
        (**self).evaluate_constant_return(method)
    }

    fn declarations_of(&self, package: &str) -> Option<Vec<Declaration>> {
        (**self).declarations_of(package)
    }
}
