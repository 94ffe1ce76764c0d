//! Status-error catalog builder.
//!
//! For a named integer type, finds every constant of exactly that type in its
//! declaring package, derives message and talkable flag from the constant's
//! doc comment, adds the type's service code to each raw value, and returns
//! the descriptors sorted by code. Results are cached per type for the
//! lifetime of the builder.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use status_types::{ErrorDescriptor, SERVICE_CODE_METHOD, SERVICE_CODE_TRAIT};
use tracing::{debug, info, trace};

use crate::config::CatalogConfig;
use crate::doc::parse_descriptor_with;
use crate::error::CatalogError;
use crate::program::{Declaration, MethodDecl, ProgramQuery, TargetType};

type Catalog = HashMap<TargetType, Arc<[ErrorDescriptor]>>;

/// Builds and caches status-error catalogs over one program.
///
/// The cache lock is held for the whole check/compute/store sequence, so
/// each type is scanned at most once even with concurrent callers.
/// The lock is builder-wide: catalog builds for different types are also
/// serialized, one scan at a time.
#[derive(Debug)]
pub struct CatalogBuilder<P> {
    program: P,
    config: CatalogConfig,
    catalog: Mutex<Catalog>,
}

impl<P: ProgramQuery> CatalogBuilder<P> {
    pub fn new(program: P) -> Self {
        Self::with_config(program, CatalogConfig::default())
    }

    pub fn with_config(program: P, config: CatalogConfig) -> Self {
        Self {
            program,
            config,
            catalog: Mutex::new(HashMap::new()),
        }
    }

    pub fn program(&self) -> &P {
        &self.program
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Catalog for `target`, sorted ascending by code.
    ///
    /// # Panics
    ///
    /// Panics when `target` is not an integer-backed type or one of its
    /// constants has no integer value. Both are caller mistakes, not data
    /// errors; use [`Self::try_catalog_for`] to observe them as values.
    pub fn catalog_for(&self, target: &TargetType) -> Vec<ErrorDescriptor> {
        match self.try_catalog_for(target) {
            Ok(descriptors) => descriptors,
            Err(err) => panic!("{err}"),
        }
    }

    /// Like [`Self::catalog_for`] for a qualified path such as `crate::errors::AppError`.
    ///
    /// A path without `::` names no type and yields an empty catalog.
    pub fn catalog_for_path(&self, path: &str) -> Vec<ErrorDescriptor> {
        match TargetType::parse(path) {
            Some(target) => self.catalog_for(&target),
            None => Vec::new(),
        }
    }

    /// Catalog for `target`, reporting contract violations as errors.
    pub fn try_catalog_for(&self, target: &TargetType) -> Result<Vec<ErrorDescriptor>, CatalogError> {
        let mut catalog = self.lock();

        if let Some(cached) = catalog.get(target) {
            trace!("Catalog cache hit for {}", target);
            return Ok(cached.to_vec());
        }

        let Some(descriptors) = self.scan(target)? else {
            return Ok(Vec::new());
        };

        let descriptors: Arc<[ErrorDescriptor]> = descriptors.into();
        catalog.insert(target.clone(), Arc::clone(&descriptors));
        Ok(descriptors.to_vec())
    }

    /// Types whose catalog has been computed, sorted
    pub fn cached_types(&self) -> Vec<TargetType> {
        let mut types: Vec<TargetType> = self.lock().keys().cloned().collect();
        types.sort();
        types
    }

    fn lock(&self) -> MutexGuard<'_, Catalog> {
        // Entries are inserted whole, so a poisoned map is still consistent.
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Scan the program for `target`'s constants.
    ///
    /// `Ok(None)` is a soft miss (type or package unknown) and is not cached.
    fn scan(&self, target: &TargetType) -> Result<Option<Vec<ErrorDescriptor>>, CatalogError> {
        let Some(named) = self.program.resolve_type(target) else {
            debug!("Type {} not found in program", target);
            return Ok(None);
        };

        if named.int_kind().is_none() {
            return Err(CatalogError::NotAnInteger {
                type_name: target.to_string(),
                underlying: named.underlying,
                line: named.line,
            });
        }

        let Some(declarations) = self.program.declarations_of(&target.package) else {
            debug!("Package {} of {} is not analyzed", target.package, target);
            return Ok(None);
        };

        let service_code = self.service_code(target);

        let mut descriptors = Vec::new();
        for constant in declarations.iter().filter_map(Declaration::as_constant) {
            if constant.ty.as_ref() != Some(target) {
                continue;
            }

            let raw: i64 = constant.value.trim().parse().map_err(|_| {
                CatalogError::UnparseableConstant {
                    type_name: target.to_string(),
                    key: constant.name.clone(),
                    value: constant.value.clone(),
                    line: constant.line,
                }
            })?;
            let code = raw
                .checked_add(service_code)
                .ok_or_else(|| CatalogError::CodeOverflow {
                    type_name: target.to_string(),
                    key: constant.name.clone(),
                    raw,
                    offset: service_code,
                    line: constant.line,
                })?;

            let (message, talkable) = parse_descriptor_with(&constant.doc, &self.config.talk_marker);
            descriptors.push(ErrorDescriptor {
                key: constant.name.clone(),
                code,
                message,
                talkable,
            });
        }

        descriptors.sort_by_key(|descriptor| descriptor.code);

        info!(
            "Built status error catalog for {}: {} errors (service code {})",
            target,
            descriptors.len(),
            service_code
        );
        Ok(Some(descriptors))
    }

    /// Offset from the type's service-code method, 0 when absent or not a
    /// single integer literal.
    fn service_code(&self, target: &TargetType) -> i64 {
        let Some(method) = self.service_code_method(target) else {
            return 0;
        };
        if method.arity != 0 || method.result_arity != 1 {
            debug!(
                "{}::{} (line {}) takes {} arguments and returns {} values, ignoring",
                target, method.name, method.line, method.arity, method.result_arity
            );
            return 0;
        }

        let sites = self.program.evaluate_constant_return(&method);
        let [site] = sites.as_slice() else {
            debug!(
                "{}::{} (line {}) has {} return sites, ignoring",
                target,
                method.name,
                method.line,
                sites.len()
            );
            return 0;
        };
        let [value] = site.values.as_slice() else {
            return 0;
        };

        value
            .literal()
            .and_then(|literal| literal.parse::<i64>().ok())
            .unwrap_or(0)
    }

    /// The configured method, else the method of an `impl ServiceCode for T`.
    fn service_code_method(&self, target: &TargetType) -> Option<MethodDecl> {
        self.program
            .method_by_name(target, &self.config.service_code_method)
            .or_else(|| {
                self.program
                    .method_by_name(target, SERVICE_CODE_METHOD)
                    .filter(|method| method.trait_name.as_deref() == Some(SERVICE_CODE_TRAIT))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{
        ConstantDeclaration, MethodDecl, NamedType, ReturnSite, ReturnValue,
    };
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Hand-built program so the builder is exercised without the front end.
    #[derive(Default)]
    struct FakeProgram {
        types: Vec<NamedType>,
        methods: Vec<(MethodDecl, Vec<ReturnSite>)>,
        packages: HashMap<String, Vec<Declaration>>,
        scans: AtomicUsize,
    }

    impl FakeProgram {
        fn with_type(mut self, package: &str, name: &str, underlying: &str) -> Self {
            self.types.push(NamedType {
                target: TargetType::new(package, name),
                underlying: underlying.into(),
                line: 1,
            });
            self.packages.entry(package.to_string()).or_default();
            self
        }

        fn with_const(mut self, ty: &TargetType, name: &str, value: &str, doc: &str) -> Self {
            self.packages
                .entry(ty.package.clone())
                .or_default()
                .push(Declaration::Constant(ConstantDeclaration {
                    name: name.into(),
                    package: ty.package.clone(),
                    ty: Some(ty.clone()),
                    value: value.into(),
                    doc: doc.into(),
                    line: 1,
                }));
            self
        }

        fn with_method(mut self, owner: &TargetType, name: &str, arity: usize, sites: Vec<ReturnSite>) -> Self {
            let result_arity = sites.first().map(|s| s.values.len()).unwrap_or(1);
            self.methods.push((
                MethodDecl {
                    owner: owner.clone(),
                    name: name.into(),
                    package: owner.package.clone(),
                    trait_name: None,
                    has_receiver: true,
                    arity,
                    result_arity,
                    body: String::new(),
                    line: 1,
                },
                sites,
            ));
            self
        }

        fn implementing(mut self, trait_name: &str) -> Self {
            if let Some((method, _)) = self.methods.last_mut() {
                method.trait_name = Some(trait_name.into());
            }
            self
        }
    }

    impl ProgramQuery for FakeProgram {
        fn resolve_type(&self, target: &TargetType) -> Option<NamedType> {
            self.types.iter().find(|t| &t.target == target).cloned()
        }

        fn method_by_name(&self, target: &TargetType, name: &str) -> Option<MethodDecl> {
            self.methods
                .iter()
                .find(|(m, _)| &m.owner == target && m.name == name)
                .map(|(m, _)| m.clone())
        }

        fn evaluate_constant_return(&self, method: &MethodDecl) -> Vec<ReturnSite> {
            self.methods
                .iter()
                .find(|(m, _)| m == method)
                .map(|(_, sites)| sites.clone())
                .unwrap_or_default()
        }

        fn declarations_of(&self, package: &str) -> Option<Vec<Declaration>> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            self.packages.get(package).cloned()
        }
    }

    fn literal(value: &str) -> Vec<ReturnSite> {
        vec![ReturnSite {
            values: vec![ReturnValue::Constant(value.into())],
        }]
    }

    fn app_error() -> TargetType {
        TargetType::new("crate::errors", "AppError")
    }

    fn codes(descriptors: &[ErrorDescriptor]) -> Vec<i64> {
        descriptors.iter().map(|d| d.code).collect()
    }

    #[test]
    fn offset_applied_and_sorted() {
        let t = app_error();
        let program = FakeProgram::default()
            .with_type("crate::errors", "AppError", "i32")
            .with_const(&t, "Third", "3", "")
            .with_const(&t, "First", "1", "@errTalk first")
            .with_const(&t, "Second", "2", "second")
            .with_method(&t, "service_code", 0, literal("300"));

        let catalog = CatalogBuilder::new(program).catalog_for(&t);
        assert_eq!(codes(&catalog), vec![301, 302, 303]);
        assert_eq!(
            catalog[0],
            ErrorDescriptor::new("First", 301, "first").enable_talk()
        );
        assert_eq!(catalog[1], ErrorDescriptor::new("Second", 302, "second"));
        assert_eq!(catalog[2], ErrorDescriptor::new("Third", 303, ""));
    }

    #[test]
    fn second_call_is_cache_hit() {
        let t = app_error();
        let program = FakeProgram::default()
            .with_type("crate::errors", "AppError", "i32")
            .with_const(&t, "A", "1", "");
        let builder = CatalogBuilder::new(program);

        let first = builder.catalog_for(&t);
        let second = builder.catalog_for(&t);
        assert_eq!(first, second);
        assert_eq!(builder.program().scans.load(Ordering::SeqCst), 1);
        assert_eq!(builder.cached_types(), vec![t]);
    }

    #[test]
    fn other_named_types_excluded() {
        let t = app_error();
        let other = TargetType::new("crate::errors", "OtherError");
        let program = FakeProgram::default()
            .with_type("crate::errors", "AppError", "i32")
            .with_type("crate::errors", "OtherError", "i32")
            .with_const(&t, "Mine", "1", "")
            .with_const(&other, "Theirs", "1", "");

        let catalog = CatalogBuilder::new(program).catalog_for(&t);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].key, "Mine");
    }

    #[test]
    fn unknown_type_or_package_is_empty_and_uncached() {
        let program = FakeProgram::default();
        let builder = CatalogBuilder::new(program);
        assert!(builder.catalog_for(&app_error()).is_empty());

        let mut program = FakeProgram::default().with_type("crate::dep", "DepError", "u16");
        program.packages.clear();
        let builder = CatalogBuilder::new(program);
        assert!(builder
            .catalog_for(&TargetType::new("crate::dep", "DepError"))
            .is_empty());
        assert!(builder.cached_types().is_empty());
    }

    #[test]
    fn empty_package_scan_is_cached() {
        let program = FakeProgram::default().with_type("crate::errors", "AppError", "u8");
        let builder = CatalogBuilder::new(program);
        assert!(builder.catalog_for(&app_error()).is_empty());
        assert!(builder.catalog_for(&app_error()).is_empty());
        assert_eq!(builder.program().scans.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "underlying must be an int or uint")]
    fn string_type_is_fatal() {
        let program = FakeProgram::default().with_type("crate::errors", "AppError", "String");
        CatalogBuilder::new(program).catalog_for(&app_error());
    }

    #[test]
    fn contract_violation_leaves_builder_usable() {
        let label = TargetType::new("crate::errors", "Label");
        let t = app_error();
        let program = FakeProgram::default()
            .with_type("crate::errors", "Label", "String")
            .with_type("crate::errors", "AppError", "i64")
            .with_const(&t, "A", "5", "");
        let builder = CatalogBuilder::new(program);

        let err = builder.try_catalog_for(&label).unwrap_err();
        assert!(matches!(err, CatalogError::NotAnInteger { .. }));
        assert_eq!(codes(&builder.catalog_for(&t)), vec![5]);
    }

    #[test]
    fn unparseable_constant_is_contract_violation() {
        let t = app_error();
        let program = FakeProgram::default()
            .with_type("crate::errors", "AppError", "i32")
            .with_const(&t, "Dynamic", "AppError (compute ())", "");

        let err = CatalogBuilder::new(program).try_catalog_for(&t).unwrap_err();
        assert_eq!(
            err,
            CatalogError::UnparseableConstant {
                type_name: "crate::errors::AppError".into(),
                key: "Dynamic".into(),
                value: "AppError (compute ())".into(),
                line: 1,
            }
        );
    }

    #[test]
    fn overflow_is_contract_violation() {
        let t = app_error();
        let program = FakeProgram::default()
            .with_type("crate::errors", "AppError", "i64")
            .with_const(&t, "Max", &i64::MAX.to_string(), "")
            .with_method(&t, "service_code", 0, literal("1"));

        let err = CatalogBuilder::new(program).try_catalog_for(&t).unwrap_err();
        assert!(matches!(err, CatalogError::CodeOverflow { .. }));
    }

    #[test]
    fn service_code_shapes_that_default_to_zero() {
        let t = app_error();
        let base = || {
            FakeProgram::default()
                .with_type("crate::errors", "AppError", "i32")
                .with_const(&t, "A", "1", "")
        };

        let cases = vec![
            // takes an argument
            base().with_method(&t, "service_code", 1, literal("300")),
            // two return sites
            base().with_method(
                &t,
                "service_code",
                0,
                [literal("300"), literal("400")].concat(),
            ),
            // tuple return
            base().with_method(
                &t,
                "service_code",
                0,
                vec![ReturnSite {
                    values: vec![
                        ReturnValue::Constant("3".into()),
                        ReturnValue::Constant("4".into()),
                    ],
                }],
            ),
            // not a constant
            base().with_method(
                &t,
                "service_code",
                0,
                vec![ReturnSite {
                    values: vec![ReturnValue::Opaque("self . 0".into())],
                }],
            ),
            // literal out of i64 range
            base().with_method(&t, "service_code", 0, literal("99999999999999999999")),
            // differently named
            base().with_method(&t, "namespace", 0, literal("300")),
        ];

        for program in cases {
            assert_eq!(codes(&CatalogBuilder::new(program).catalog_for(&t)), vec![1]);
        }
    }

    #[test]
    fn configured_method_and_marker() {
        let t = app_error();
        let program = FakeProgram::default()
            .with_type("crate::errors", "AppError", "i32")
            .with_const(&t, "A", "1", "@public shown")
            .with_method(&t, "namespace", 0, literal("1000"));
        let config = CatalogConfig {
            service_code_method: "namespace".into(),
            talk_marker: "@public ".into(),
        };

        let catalog = CatalogBuilder::with_config(program, config).catalog_for(&t);
        assert_eq!(
            catalog,
            vec![ErrorDescriptor::new("A", 1001, "shown").enable_talk()]
        );
    }

    #[test]
    fn service_code_trait_impl_recognised_under_any_configured_name() {
        let t = app_error();
        let config = || CatalogConfig {
            service_code_method: "namespace".into(),
            ..CatalogConfig::default()
        };
        let base = || {
            FakeProgram::default()
                .with_type("crate::errors", "AppError", "i32")
                .with_const(&t, "A", "1", "")
        };

        let via_trait = base()
            .with_method(&t, "service_code", 0, literal("2000"))
            .implementing("ServiceCode");
        let catalog = CatalogBuilder::with_config(via_trait, config()).catalog_for(&t);
        assert_eq!(codes(&catalog), vec![2001]);

        let inherent = base().with_method(&t, "service_code", 0, literal("2000"));
        let catalog = CatalogBuilder::with_config(inherent, config()).catalog_for(&t);
        assert_eq!(codes(&catalog), vec![1]);

        let other_trait = base()
            .with_method(&t, "service_code", 0, literal("2000"))
            .implementing("Namespaced");
        let catalog = CatalogBuilder::with_config(other_trait, config()).catalog_for(&t);
        assert_eq!(codes(&catalog), vec![1]);
    }

    #[test]
    fn constant_errors_report_line() {
        let t = app_error();
        let program = FakeProgram::default()
            .with_type("crate::errors", "AppError", "i32")
            .with_const(&t, "Dynamic", "compute ()", "");
        let err = CatalogBuilder::new(program).try_catalog_for(&t).unwrap_err();
        assert_eq!(
            err.to_string(),
            "status error constant crate::errors::AppError::Dynamic at line 1 has non-integer value `compute ()`"
        );
    }

    #[test]
    fn catalog_for_path() {
        let t = app_error();
        let program = FakeProgram::default()
            .with_type("crate::errors", "AppError", "i32")
            .with_const(&t, "A", "7", "");
        let builder = CatalogBuilder::new(program);
        assert_eq!(codes(&builder.catalog_for_path("crate::errors::AppError")), vec![7]);
        assert!(builder.catalog_for_path("AppError").is_empty());
    }

    #[test]
    fn concurrent_callers_scan_once() {
        let t = app_error();
        let mut program = FakeProgram::default().with_type("crate::errors", "AppError", "i32");
        for i in 0..50 {
            program = program.with_const(&t, &format!("E{i}"), &i.to_string(), "");
        }
        let builder = Arc::new(CatalogBuilder::new(program));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let builder = Arc::clone(&builder);
                let t = t.clone();
                std::thread::spawn(move || builder.catalog_for(&t))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(builder.program().scans.load(Ordering::SeqCst), 1);
    }

    proptest! {
        #[test]
        fn codes_are_sorted(raw in prop::collection::vec(-1_000_000i64..1_000_000, 0..40), offset in -1000i64..1000) {
            let t = app_error();
            let mut program = FakeProgram::default()
                .with_type("crate::errors", "AppError", "i64")
                .with_method(&t, "service_code", 0, literal(&offset.to_string()));
            for (i, value) in raw.iter().enumerate() {
                program = program.with_const(&t, &format!("E{i}"), &value.to_string(), "");
            }

            let catalog = CatalogBuilder::new(program).catalog_for(&t);
            prop_assert_eq!(catalog.len(), raw.len());
            prop_assert!(catalog.windows(2).all(|pair| pair[0].code <= pair[1].code));

            let mut expected: Vec<i64> = raw.iter().map(|v| v + offset).collect();
            expected.sort();
            prop_assert_eq!(codes(&catalog), expected);
        }
    }
}
