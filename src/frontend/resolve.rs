//! Path resolution within one crate.
//!
//! Paths are resolved to fully-qualified strings rooted at `crate`. The
//! resolver knows `crate`, `self`, `super`, `Self`, explicit `use` aliases
//! and glob imports; anything else is taken relative to the current package.

use std::collections::{HashMap, HashSet};

use crate::program::{TargetType, CRATE_ROOT};

/// Join a parent path and a segment with `::`.
pub(crate) fn join(parent: &str, segment: &str) -> String {
    format!("{parent}::{segment}")
}

/// Parent package of `package`, `None` at the crate root.
pub(crate) fn parent(package: &str) -> Option<&str> {
    package.rsplit_once("::").map(|(parent, _)| parent)
}

/// Import table of one package.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    pub package: String,
    /// local name -> fully-qualified path
    pub aliases: HashMap<String, String>,
    /// packages imported with `use path::*`
    pub globs: Vec<String>,
}

impl Scope {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            ..Default::default()
        }
    }

    /// Record the imports of one `use` item.
    pub fn add_use(&mut self, tree: &syn::UseTree) {
        let mut prefix = Vec::new();
        self.add_use_tree(&mut prefix, tree);
    }

    fn add_use_tree(&mut self, prefix: &mut Vec<String>, tree: &syn::UseTree) {
        match tree {
            syn::UseTree::Path(path) => {
                prefix.push(path.ident.to_string());
                self.add_use_tree(prefix, &path.tree);
                prefix.pop();
            }
            syn::UseTree::Name(name) => {
                let ident = name.ident.to_string();
                if ident == "self" {
                    if let (Some(last), Some(full)) = (prefix.last(), self.absolute(prefix)) {
                        self.aliases.insert(last.clone(), full);
                    }
                } else {
                    prefix.push(ident.clone());
                    if let Some(full) = self.absolute(prefix) {
                        self.aliases.insert(ident, full);
                    }
                    prefix.pop();
                }
            }
            syn::UseTree::Rename(rename) => {
                prefix.push(rename.ident.to_string());
                if let Some(full) = self.absolute(prefix) {
                    self.aliases.insert(rename.rename.to_string(), full);
                }
                prefix.pop();
            }
            syn::UseTree::Glob(_) => {
                if let Some(full) = self.absolute(prefix) {
                    self.globs.push(full);
                }
            }
            syn::UseTree::Group(group) => {
                for item in &group.items {
                    self.add_use_tree(prefix, item);
                }
            }
        }
    }

    /// Resolve a `use` path. Only `crate`/`self`/`super` anchors and
    /// package-relative names are meaningful; other crates pass through.
    fn absolute(&self, segments: &[String]) -> Option<String> {
        let (base, rest) = anchor(&self.package, segments, None)?;
        let base = base.unwrap_or_else(|| join(&self.package, &segments[0]));
        Some(rest.iter().fold(base, |acc, seg| join(&acc, seg)))
    }
}

/// Every fully-qualified item and package path known to the program.
#[derive(Debug, Clone, Default)]
pub(crate) struct Names {
    pub items: HashSet<String>,
    pub packages: HashSet<String>,
}

impl Names {
    pub fn contains(&self, path: &str) -> bool {
        self.items.contains(path) || self.packages.contains(path)
    }
}

/// Handle the anchor segment (`crate`, `self`, `super`, `Self`).
///
/// Returns the anchored base (or `None` if the first segment is a plain
/// name) and the remaining segments. Returns `None` altogether when the
/// anchor cannot be applied (e.g. `super` at the root, `Self` outside an impl).
fn anchor<'s>(
    package: &str,
    segments: &'s [String],
    self_ty: Option<&TargetType>,
) -> Option<(Option<String>, &'s [String])> {
    let first = segments.first()?;
    match first.as_str() {
        "crate" => Some((Some(CRATE_ROOT.to_string()), &segments[1..])),
        "self" => Some((Some(package.to_string()), &segments[1..])),
        "Self" => Some((Some(self_ty?.qualified()), &segments[1..])),
        "super" => {
            let supers = segments.iter().take_while(|s| *s == "super").count();
            let mut base = package;
            for _ in 0..supers {
                base = parent(base)?;
            }
            Some((Some(base.to_string()), &segments[supers..]))
        }
        _ => Some((None, &segments[1..])),
    }
}

/// Resolve `segments` as written in `scope`'s package to a fully-qualified path.
pub(crate) fn resolve(
    scope: &Scope,
    names: &Names,
    segments: &[String],
    self_ty: Option<&TargetType>,
) -> Option<String> {
    let (base, rest) = anchor(&scope.package, segments, self_ty)?;
    let base = match base {
        Some(base) => base,
        None => {
            let name = &segments[0];
            let local = join(&scope.package, name);
            if let Some(full) = scope.aliases.get(name) {
                full.clone()
            } else if names.contains(&local) {
                local
            } else if let Some(glob) = scope
                .globs
                .iter()
                .find(|glob| names.contains(&join(glob, name)))
            {
                join(glob, name)
            } else {
                local
            }
        }
    };
    Some(rest.iter().fold(base, |acc, seg| join(&acc, seg)))
}

/// Identifiers of a plain path (no generics inspected).
pub(crate) fn path_segments(path: &syn::Path) -> Vec<String> {
    path.segments.iter().map(|s| s.ident.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(path: &str) -> Vec<String> {
        path.split("::").map(str::to_string).collect()
    }

    fn scope_with(package: &str, uses: &[&str]) -> Scope {
        let mut scope = Scope::new(package);
        for src in uses {
            let item: syn::ItemUse = syn::parse_str(src).unwrap();
            scope.add_use(&item.tree);
        }
        scope
    }

    #[test]
    fn anchors() {
        let scope = Scope::new("crate::api::auth");
        let names = Names::default();
        let self_ty = TargetType::new("crate::errors", "AppError");

        assert_eq!(
            resolve(&scope, &names, &segs("crate::errors::AppError"), None).unwrap(),
            "crate::errors::AppError"
        );
        assert_eq!(
            resolve(&scope, &names, &segs("super::Code"), None).unwrap(),
            "crate::api::Code"
        );
        assert_eq!(
            resolve(&scope, &names, &segs("super::super::Code"), None).unwrap(),
            "crate::Code"
        );
        assert_eq!(
            resolve(&scope, &names, &segs("self::Code"), None).unwrap(),
            "crate::api::auth::Code"
        );
        assert_eq!(
            resolve(&scope, &names, &segs("Self::NOT_FOUND"), Some(&self_ty)).unwrap(),
            "crate::errors::AppError::NOT_FOUND"
        );
        assert!(resolve(&Scope::new("crate"), &names, &segs("super::X"), None).is_none());
        assert!(resolve(&scope, &names, &segs("Self::X"), None).is_none());
    }

    #[test]
    fn use_aliases_and_renames() {
        let scope = scope_with(
            "crate::api",
            &[
                "use crate::errors::{AppError, Other as Renamed};",
                "use super::codes::{self};",
            ],
        );
        let names = Names::default();

        assert_eq!(
            resolve(&scope, &names, &segs("AppError"), None).unwrap(),
            "crate::errors::AppError"
        );
        assert_eq!(
            resolve(&scope, &names, &segs("Renamed"), None).unwrap(),
            "crate::errors::Other"
        );
        assert_eq!(
            resolve(&scope, &names, &segs("codes::BASE"), None).unwrap(),
            "crate::codes::BASE"
        );
    }

    #[test]
    fn globs_only_used_for_known_names() {
        let scope = scope_with("crate::api", &["use crate::errors::*;"]);
        let mut names = Names::default();
        names.items.insert("crate::errors::AppError".into());

        assert_eq!(
            resolve(&scope, &names, &segs("AppError"), None).unwrap(),
            "crate::errors::AppError"
        );
        assert_eq!(
            resolve(&scope, &names, &segs("Unknown"), None).unwrap(),
            "crate::api::Unknown"
        );
    }

    #[test]
    fn local_items_shadow_globs() {
        let scope = scope_with("crate::api", &["use crate::errors::*;"]);
        let mut names = Names::default();
        names.items.insert("crate::errors::AppError".into());
        names.items.insert("crate::api::AppError".into());

        assert_eq!(
            resolve(&scope, &names, &segs("AppError"), None).unwrap(),
            "crate::api::AppError"
        );
    }
}
