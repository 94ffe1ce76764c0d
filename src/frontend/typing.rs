//! Type-level resolution: aliases, primitive paths and integer kinds.
//!
//! A named type is integer-backed when its representation reduces to an
//! integer primitive: `struct E(i32)`, `struct E(Raw)` with `type Raw = i32;`,
//! `struct E(core::primitive::u16)`, `struct E(Inner)` where `Inner` is
//! itself integer-backed, or a fieldless enum (its `#[repr]`).

use std::collections::{BTreeMap, HashMap, HashSet};

use super::resolve::{path_segments, resolve, Names, Scope};
use crate::program::{IntKind, TargetType};

/// Alias chains and nested newtypes deeper than this are treated as opaque.
const MAX_TYPE_DEPTH: usize = 16;

/// A type expression together with the package it was written in.
#[derive(Debug, Clone)]
pub(crate) struct TypeDef {
    pub package: String,
    pub self_ty: Option<TargetType>,
    pub ty: syn::Type,
}

/// Everything type-shaped the collector found, keyed by fully-qualified path.
#[derive(Debug, Default)]
pub(crate) struct TypeTable {
    /// `type X = ...;`
    pub aliases: HashMap<String, TypeDef>,
    /// Field type of single-field structs
    pub fields: HashMap<String, TypeDef>,
    /// Types whose integer kind is known directly: fieldless enums, external types
    pub kinds: HashMap<String, IntKind>,
    /// Every named type, analyzed or external
    pub named: HashSet<String>,
}

/// Resolves type expressions against a [`TypeTable`] and the import scopes.
pub(crate) struct TypeResolver<'a> {
    pub scopes: &'a BTreeMap<String, Scope>,
    pub names: &'a Names,
    pub table: &'a TypeTable,
}

impl TypeResolver<'_> {
    /// Integer kind `ty` reduces to, following aliases and newtypes.
    pub fn int_kind(&self, package: &str, ty: &syn::Type, self_ty: Option<&TargetType>) -> Option<IntKind> {
        self.int_kind_at(package, ty, self_ty, 0)
    }

    /// Named type `ty` denotes, following aliases.
    pub fn named(&self, package: &str, ty: &syn::Type, self_ty: Option<&TargetType>) -> Option<TargetType> {
        self.named_at(package, ty, self_ty, 0)
    }

    fn int_kind_at(
        &self,
        package: &str,
        ty: &syn::Type,
        self_ty: Option<&TargetType>,
        depth: usize,
    ) -> Option<IntKind> {
        if depth > MAX_TYPE_DEPTH {
            return None;
        }
        let path = match ty {
            syn::Type::Paren(inner) => return self.int_kind_at(package, &inner.elem, self_ty, depth),
            syn::Type::Group(inner) => return self.int_kind_at(package, &inner.elem, self_ty, depth),
            syn::Type::Path(type_path) if type_path.qself.is_none() => &type_path.path,
            _ => return None,
        };

        if let Some(full) = self.resolve_path(package, path, self_ty) {
            if let Some(def) = self.table.aliases.get(&full) {
                return self.int_kind_at(&def.package, &def.ty, def.self_ty.as_ref(), depth + 1);
            }
            if let Some(kind) = self.table.kinds.get(&full) {
                return Some(*kind);
            }
            if let Some(def) = self.table.fields.get(&full) {
                return self.int_kind_at(&def.package, &def.ty, def.self_ty.as_ref(), depth + 1);
            }
        }
        primitive_kind(ty)
    }

    fn named_at(
        &self,
        package: &str,
        ty: &syn::Type,
        self_ty: Option<&TargetType>,
        depth: usize,
    ) -> Option<TargetType> {
        if depth > MAX_TYPE_DEPTH {
            return None;
        }
        match ty {
            syn::Type::Paren(inner) => self.named_at(package, &inner.elem, self_ty, depth),
            syn::Type::Group(inner) => self.named_at(package, &inner.elem, self_ty, depth),
            syn::Type::Path(type_path) if type_path.qself.is_none() => {
                let full = self.resolve_path(package, &type_path.path, self_ty)?;
                if let Some(def) = self.table.aliases.get(&full) {
                    return self.named_at(&def.package, &def.ty, def.self_ty.as_ref(), depth + 1);
                }
                if self.table.named.contains(&full) {
                    TargetType::parse(&full)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn resolve_path(&self, package: &str, path: &syn::Path, self_ty: Option<&TargetType>) -> Option<String> {
        if path.leading_colon.is_some() {
            return None;
        }
        let scope = self.scopes.get(package)?;
        resolve(scope, self.names, &path_segments(path), self_ty)
    }
}

/// Integer primitive spelled directly: `u16`, `core::primitive::u16`,
/// `::std::primitive::u16`.
pub(crate) fn primitive_kind(ty: &syn::Type) -> Option<IntKind> {
    match ty {
        syn::Type::Path(type_path) if type_path.qself.is_none() => {
            let segments = path_segments(&type_path.path);
            match segments.as_slice() {
                [name] if type_path.path.leading_colon.is_none() => IntKind::from_name(name),
                [root, primitive, name]
                    if (root == "core" || root == "std") && primitive == "primitive" =>
                {
                    IntKind::from_name(name)
                }
                _ => None,
            }
        }
        syn::Type::Paren(inner) => primitive_kind(&inner.elem),
        syn::Type::Group(inner) => primitive_kind(&inner.elem),
        _ => None,
    }
}
