//! In-memory program produced by the source front end.

use std::collections::{BTreeMap, HashMap};

use quote::ToTokens;
use tracing::warn;

use super::types::{Declaration, MethodDecl, NamedType, ReturnSite, ReturnValue, TargetType};
use super::ProgramQuery;
use crate::frontend::resolve::{Names, Scope};
use crate::frontend::{return_sites, returned_values, ConstEnv, ConstFn, Evaluator};

#[derive(Debug, Clone)]
struct Package {
    declarations: Vec<Declaration>,
    scope: Scope,
}

/// Immutable, fully-loaded program.
///
/// Built once by [`crate::SourceLoader`]; safe to share across threads.
#[derive(Debug, Clone)]
pub struct Program {
    packages: BTreeMap<String, Package>,
    types: HashMap<TargetType, NamedType>,
    methods: HashMap<TargetType, Vec<MethodDecl>>,
    /// Evaluated constants by fully-qualified path
    constants: HashMap<String, i128>,
    const_fns: HashMap<String, ConstFn>,
    names: Names,
}

impl Program {
    pub(crate) fn new(
        packages: BTreeMap<String, (Vec<Declaration>, Scope)>,
        types: HashMap<TargetType, NamedType>,
        methods: HashMap<TargetType, Vec<MethodDecl>>,
        constants: HashMap<String, i128>,
        const_fns: HashMap<String, ConstFn>,
        names: Names,
    ) -> Self {
        Self {
            packages: packages
                .into_iter()
                .map(|(path, (declarations, scope))| (path, Package { declarations, scope }))
                .collect(),
            types,
            methods,
            constants,
            const_fns,
            names,
        }
    }

    /// Analyzed package paths in sorted order
    pub fn package_paths(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }
}

impl ProgramQuery for Program {
    fn resolve_type(&self, target: &TargetType) -> Option<NamedType> {
        self.types.get(target).cloned()
    }

    fn method_by_name(&self, target: &TargetType, name: &str) -> Option<MethodDecl> {
        self.methods
            .get(target)?
            .iter()
            .find(|method| method.name == name)
            .cloned()
    }

    fn evaluate_constant_return(&self, method: &MethodDecl) -> Vec<ReturnSite> {
        let block: syn::Block = match syn::parse_str(&method.body) {
            Ok(block) => block,
            Err(err) => {
                warn!("Cannot re-parse body of {}::{}: {}", method.owner, method.name, err);
                return Vec::new();
            }
        };

        let mut env = QueryEnv { program: self };
        return_sites(&block)
            .iter()
            .map(|site| {
                let values = returned_values(site)
                    .into_iter()
                    .map(|expr| {
                        let mut evaluator =
                            Evaluator::new(&mut env, method.package.clone(), Some(method.owner.clone()));
                        match evaluator.eval(expr) {
                            Some(value) => ReturnValue::Constant(value.to_string()),
                            None => ReturnValue::Opaque(expr.to_token_stream().to_string()),
                        }
                    })
                    .collect();
                ReturnSite { values }
            })
            .collect()
    }

    fn declarations_of(&self, package: &str) -> Option<Vec<Declaration>> {
        self.packages
            .get(package)
            .map(|package| package.declarations.clone())
    }
}

/// Constant environment over an already-built program.
struct QueryEnv<'p> {
    program: &'p Program,
}

impl ConstEnv for QueryEnv<'_> {
    fn scope(&self, package: &str) -> Option<&Scope> {
        self.program.packages.get(package).map(|p| &p.scope)
    }

    fn names(&self) -> &Names {
        &self.program.names
    }

    fn is_type(&self, path: &str) -> bool {
        TargetType::parse(path)
            .map(|target| self.program.types.contains_key(&target))
            .unwrap_or(false)
    }

    fn constant(&mut self, path: &str) -> Option<i128> {
        self.program.constants.get(path).copied()
    }

    fn const_fn(&self, path: &str) -> Option<ConstFn> {
        self.program.const_fns.get(path).cloned()
    }
}
