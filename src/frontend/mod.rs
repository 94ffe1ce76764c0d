//! Rust source front end.
//!
//! Parses a crate's sources with `syn` and builds the immutable [`Program`]
//! the catalog builder queries. Building runs in three passes:
//!
//! 1. collect types, aliases, constants, impls and imports per package and
//!    reduce each named type to its underlying integer kind
//! 2. resolve impl targets, attaching associated consts, methods and `const fn`s
//! 3. evaluate every constant (memoized, cycle-safe, wrapped to its type)

mod collect;
mod eval;
pub(crate) mod resolve;
mod returns;
mod typing;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use quote::ToTokens;
use tracing::{debug, info};

use crate::error::LoadError;
use crate::program::{
    ConstantDeclaration, Declaration, IntKind, MethodDecl, NamedType, Program, TargetType,
    CRATE_ROOT,
};
use collect::{Collector, ConstOwner, RawConst, RawConstFn, RawRepr};
use resolve::{join, Names, Scope};
use typing::{TypeDef, TypeResolver, TypeTable};

pub(crate) use eval::{ConstEnv, ConstFn, Evaluator};
pub(crate) use returns::{return_sites, returned_values};

struct Source {
    module: String,
    text: String,
}

/// Collects Rust sources and builds a [`Program`] from them.
#[derive(Default)]
pub struct SourceLoader {
    sources: Vec<Source>,
    externals: Vec<NamedType>,
}

impl SourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the source text of one module (`crate`, `crate::errors`, ...).
    pub fn add_source(
        &mut self,
        module: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<&mut Self, LoadError> {
        let module = module.into();
        validate_module_path(&module)?;
        if self.sources.iter().any(|s| s.module == module) {
            return Err(LoadError::DuplicateModule(module));
        }
        self.sources.push(Source {
            module,
            text: text.into(),
        });
        Ok(self)
    }

    /// Add one file as module `module`.
    pub fn add_file(
        &mut self,
        module: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<&mut Self, LoadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.add_source(module, text)
    }

    /// Add every `.rs` file under a crate's source root.
    ///
    /// `lib.rs` (or `main.rs` when there is no `lib.rs`) is the crate root,
    /// `a.rs` and `a/mod.rs` are `crate::a`, `a/b.rs` is `crate::a::b`.
    /// The `bin/` directory is skipped.
    pub fn load_dir(&mut self, root: impl AsRef<Path>) -> Result<&mut Self, LoadError> {
        let root = root.as_ref();
        let files = find_rust_files(root, root)?;
        let has_lib = files.iter().any(|f| f == &root.join("lib.rs"));

        for file in files {
            if has_lib && file == root.join("main.rs") {
                continue;
            }
            let Some(module) = module_path_for(root, &file) else {
                continue;
            };
            debug!("Adding {} as {}", file.display(), module);
            self.add_file(module, &file)?;
        }
        Ok(self)
    }

    /// Register a named type whose package is not part of the analyzed sources.
    pub fn add_external_type(
        &mut self,
        package: impl Into<String>,
        name: impl Into<String>,
        underlying: impl Into<String>,
    ) -> &mut Self {
        self.externals.push(NamedType {
            target: TargetType::new(package, name),
            underlying: underlying.into(),
            line: 0,
        });
        self
    }

    pub fn build(&self) -> Result<Program, LoadError> {
        let mut collector = Collector::default();
        for source in &self.sources {
            let file = syn::parse_file(&source.text)
                .map_err(|err| LoadError::parse(&source.module, &err))?;
            debug!("Parsed module {} ({} items)", source.module, file.items.len());
            collector.collect_file(&source.module, &file);
        }

        let Collector {
            types: raw_types,
            aliases,
            consts: mut raw_consts,
            impls,
            functions,
            scopes,
            ..
        } = collector;

        // Pass 1: everything nameable before impls are resolved.
        let mut names = Names::default();
        names.packages.extend(scopes.keys().cloned());

        let mut table = TypeTable::default();
        for raw in &raw_types {
            let path = raw.target.qualified();
            match &raw.repr {
                RawRepr::Field(ty) => {
                    table.fields.insert(
                        path.clone(),
                        TypeDef {
                            package: raw.target.package.clone(),
                            self_ty: Some(raw.target.clone()),
                            ty: ty.clone(),
                        },
                    );
                }
                RawRepr::Enum(kind) => {
                    table.kinds.insert(path.clone(), *kind);
                }
                RawRepr::Other(_) => {}
            }
            names.items.insert(path.clone());
            table.named.insert(path);
        }
        for external in &self.externals {
            let path = external.target.qualified();
            if let Some(kind) = external.int_kind() {
                table.kinds.entry(path.clone()).or_insert(kind);
            }
            names.items.insert(path.clone());
            table.named.insert(path);
        }
        for alias in aliases {
            let path = join(&alias.package, &alias.name);
            names.items.insert(path.clone());
            table.aliases.insert(
                path,
                TypeDef {
                    package: alias.package,
                    self_ty: None,
                    ty: alias.ty,
                },
            );
        }
        for raw in &raw_consts {
            names.items.insert(raw.path());
        }
        let mut pending_fns: Vec<(String, String, Option<TargetType>, RawConstFn)> = Vec::new();
        for function in &functions {
            let path = join(&function.package, &function.name);
            names.items.insert(path.clone());
            if let Some(const_fn) = &function.const_fn {
                pending_fns.push((path, function.package.clone(), None, const_fn.clone()));
            }
        }

        let mut types: HashMap<TargetType, NamedType> = HashMap::new();
        let mut type_seqs: Vec<(usize, NamedType)> = Vec::new();
        {
            let resolver = TypeResolver {
                scopes: &scopes,
                names: &names,
                table: &table,
            };
            for raw in raw_types {
                let underlying = match &raw.repr {
                    RawRepr::Field(ty) => resolver
                        .int_kind(&raw.target.package, ty, Some(&raw.target))
                        .map(|kind| kind.to_string())
                        .unwrap_or_else(|| ty.to_token_stream().to_string()),
                    RawRepr::Enum(kind) => kind.to_string(),
                    RawRepr::Other(text) => text.clone(),
                };
                let named = NamedType {
                    target: raw.target.clone(),
                    underlying,
                    line: raw.line,
                };
                types.insert(raw.target, named.clone());
                type_seqs.push((raw.seq, named));
            }
        }
        for external in &self.externals {
            types
                .entry(external.target.clone())
                .or_insert_with(|| external.clone());
        }

        // Pass 2: attach associated consts and methods to their types.
        let mut methods: HashMap<TargetType, Vec<MethodDecl>> = HashMap::new();
        for raw_impl in impls {
            let owner = TypeResolver {
                scopes: &scopes,
                names: &names,
                table: &table,
            }
            .named(&raw_impl.package, &raw_impl.self_ty, None);
            let Some(owner) = owner else {
                debug!(
                    "Skipping impl for unresolved type `{}` in {}",
                    raw_impl.self_ty.to_token_stream(),
                    raw_impl.package
                );
                continue;
            };

            for item in raw_impl.consts {
                let raw = RawConst {
                    name: item.name,
                    scope_package: raw_impl.package.clone(),
                    owner: ConstOwner::Type(owner.clone()),
                    declared_ty: item.ty,
                    expr: item.expr,
                    doc: item.doc,
                    line: item.line,
                    seq: item.seq,
                };
                names.items.insert(raw.path());
                raw_consts.push(raw);
            }

            let entry = methods.entry(owner.clone()).or_default();
            for method in raw_impl.methods {
                if let Some(const_fn) = method.const_fn {
                    pending_fns.push((
                        join(&owner.qualified(), &method.name),
                        raw_impl.package.clone(),
                        Some(owner.clone()),
                        const_fn,
                    ));
                }
                entry.push(MethodDecl {
                    owner: owner.clone(),
                    name: method.name,
                    package: raw_impl.package.clone(),
                    trait_name: raw_impl.trait_name.clone(),
                    has_receiver: method.has_receiver,
                    arity: method.arity,
                    result_arity: method.result_arity,
                    body: method.body,
                    line: method.line,
                });
            }
        }

        let resolver = TypeResolver {
            scopes: &scopes,
            names: &names,
            table: &table,
        };
        let const_fns: HashMap<String, ConstFn> = pending_fns
            .into_iter()
            .map(|(path, package, self_ty, raw)| {
                let result_kind = raw
                    .output
                    .as_ref()
                    .and_then(|ty| resolver.int_kind(&package, ty, self_ty.as_ref()));
                let function = ConstFn {
                    package,
                    self_ty,
                    params: raw.params,
                    result_kind,
                    body: raw.body,
                };
                (path, function)
            })
            .collect();
        let kinds: HashMap<String, IntKind> = raw_consts
            .iter()
            .filter_map(|raw| {
                let kind = resolver.int_kind(&raw.scope_package, &raw.declared_ty, raw.self_ty())?;
                Some((raw.path(), kind))
            })
            .collect();

        // Pass 3: evaluate constants.
        let mut env = LoadEnv::new(&resolver, &const_fns, kinds, &raw_consts);
        let paths: Vec<String> = raw_consts.iter().map(RawConst::path).collect();
        for path in &paths {
            env.constant(path);
        }
        let values = env.into_values();

        let mut ordered: BTreeMap<String, Vec<(usize, Declaration)>> = scopes
            .keys()
            .map(|package| (package.clone(), Vec::new()))
            .collect();

        for (seq, named) in type_seqs {
            if let Some(decls) = ordered.get_mut(&named.target.package) {
                decls.push((seq, Declaration::Type(named)));
            }
        }
        for function in functions {
            if let Some(decls) = ordered.get_mut(&function.package) {
                decls.push((
                    function.seq,
                    Declaration::Function {
                        name: function.name,
                        line: function.line,
                    },
                ));
            }
        }

        let mut constant_values = HashMap::new();
        for (raw, path) in raw_consts.iter().zip(&paths) {
            let value = match values.get(path).copied().flatten() {
                Some(value) => {
                    constant_values.insert(path.clone(), value);
                    value.to_string()
                }
                None => raw.expr.to_token_stream().to_string(),
            };
            let ty = resolver.named(&raw.scope_package, &raw.declared_ty, raw.self_ty());
            let Some(decls) = ordered.get_mut(raw.package()) else {
                debug!("Dropping constant {} of unanalyzed package", path);
                continue;
            };
            decls.push((
                raw.seq,
                Declaration::Constant(ConstantDeclaration {
                    name: raw.name.clone(),
                    package: raw.package().to_string(),
                    ty,
                    value,
                    doc: raw.doc.clone(),
                    line: raw.line,
                }),
            ));
        }

        let packages: BTreeMap<String, (Vec<Declaration>, Scope)> = ordered
            .into_iter()
            .map(|(package, mut decls)| {
                decls.sort_by_key(|(seq, _)| *seq);
                let scope = scopes.get(&package).cloned().unwrap_or_default();
                (package, (decls.into_iter().map(|(_, d)| d).collect(), scope))
            })
            .collect();

        info!(
            "Loaded {} packages with {} named types, {} constants and {} const fns",
            packages.len(),
            types.len(),
            raw_consts.len(),
            const_fns.len()
        );

        Ok(Program::new(
            packages,
            types,
            methods,
            constant_values,
            const_fns,
            names,
        ))
    }
}

/// Constant environment used while building: evaluates on demand, memoizes,
/// wraps each value to its declared integer kind and treats reference cycles
/// as not evaluable.
struct LoadEnv<'a> {
    resolver: &'a TypeResolver<'a>,
    const_fns: &'a HashMap<String, ConstFn>,
    /// Integer kind of each constant's declared type
    kinds: HashMap<String, IntKind>,
    consts: HashMap<String, &'a RawConst>,
    values: HashMap<String, Option<i128>>,
    in_progress: HashSet<String>,
}

impl<'a> LoadEnv<'a> {
    fn new(
        resolver: &'a TypeResolver<'a>,
        const_fns: &'a HashMap<String, ConstFn>,
        kinds: HashMap<String, IntKind>,
        raw_consts: &'a [RawConst],
    ) -> Self {
        Self {
            resolver,
            const_fns,
            kinds,
            consts: raw_consts.iter().map(|c| (c.path(), c)).collect(),
            values: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    fn into_values(self) -> HashMap<String, Option<i128>> {
        self.values
    }
}

impl<'a> ConstEnv for LoadEnv<'a> {
    fn scope(&self, package: &str) -> Option<&Scope> {
        self.resolver.scopes.get(package)
    }

    fn names(&self) -> &Names {
        self.resolver.names
    }

    fn is_type(&self, path: &str) -> bool {
        self.resolver.table.named.contains(path)
    }

    fn constant(&mut self, path: &str) -> Option<i128> {
        if let Some(value) = self.values.get(path) {
            return *value;
        }
        let raw: &'a RawConst = self.consts.get(path).copied()?;
        if !self.in_progress.insert(path.to_string()) {
            debug!("Constant cycle through {}", path);
            return None;
        }

        let value =
            Evaluator::new(self, raw.scope_package.clone(), raw.self_ty().cloned()).eval(&raw.expr);
        let value = value.and_then(|value| match self.kinds.get(path) {
            Some(kind) => kind.wrap(value),
            None => Some(value),
        });

        self.in_progress.remove(path);
        self.values.insert(path.to_string(), value);
        value
    }

    fn const_fn(&self, path: &str) -> Option<ConstFn> {
        self.const_fns.get(path).cloned()
    }

    fn cast_kind(&self, package: &str, ty: &syn::Type, self_ty: Option<&TargetType>) -> Option<IntKind> {
        self.resolver.int_kind(package, ty, self_ty)
    }
}

fn validate_module_path(module: &str) -> Result<(), LoadError> {
    let mut segments = module.split("::");
    let valid = segments.next() == Some(CRATE_ROOT)
        && segments.all(|seg| {
            !seg.is_empty()
                && seg.chars().all(|c| c.is_alphanumeric() || c == '_')
                && !seg.starts_with(|c: char| c.is_ascii_digit())
        });
    if valid {
        Ok(())
    } else {
        Err(LoadError::InvalidModulePath(module.to_string()))
    }
}

/// Module path of `file` relative to the source root.
fn module_path_for(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let mut segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    let file_name = segments.pop()?;
    let stem = file_name.strip_suffix(".rs")?;

    let is_root = segments.is_empty() && (stem == "lib" || stem == "main");
    if !is_root && stem != "mod" {
        segments.push(stem.to_string());
    }

    let mut module = CRATE_ROOT.to_string();
    for segment in segments {
        module.push_str("::");
        module.push_str(&segment);
    }
    Some(module)
}

/// Recursively find `.rs` files, sorted for deterministic module order.
fn find_rust_files(root: &Path, dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let io_err = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()
        .map_err(io_err)?;
    entries.sort();

    let mut files = Vec::new();
    for path in entries {
        if path.is_dir() {
            if dir == root && path.file_name().map(|n| n == "bin").unwrap_or(false) {
                continue;
            }
            files.extend(find_rust_files(root, &path)?);
        } else if path.extension().map(|ext| ext == "rs").unwrap_or(false) {
            files.push(path);
        }
    }
    Ok(files)
}
