//! First pass over parsed files: gather types, constants, impls and imports
//! per package before anything is resolved.

use std::collections::BTreeMap;

use quote::ToTokens;
use syn::{Fields, FnArg, ImplItem, Item, ReturnType};

use super::resolve::{join, Scope};
use crate::program::{IntKind, TargetType};

#[derive(Debug)]
pub(crate) struct RawType {
    pub target: TargetType,
    pub repr: RawRepr,
    pub line: usize,
    pub seq: usize,
}

/// Representation of a named type before aliases are resolved.
#[derive(Debug, Clone)]
pub(crate) enum RawRepr {
    /// Single-field struct
    Field(syn::Type),
    /// Fieldless enum with its `#[repr]`
    Enum(IntKind),
    /// Any other shape, as text
    Other(String),
}

/// `type Name = Ty;`
#[derive(Debug)]
pub(crate) struct RawAlias {
    pub package: String,
    pub name: String,
    pub ty: syn::Type,
}

/// Callable parts of a `const fn` without receiver or generics.
#[derive(Debug, Clone)]
pub(crate) struct RawConstFn {
    pub params: Vec<String>,
    pub output: Option<syn::Type>,
    pub body: String,
}

/// Where a constant belongs once resolved.
#[derive(Debug, Clone)]
pub(crate) enum ConstOwner {
    /// Module-level `const`
    Module,
    /// Associated const or enum variant of a named type
    Type(TargetType),
}

#[derive(Debug, Clone)]
pub(crate) struct RawConst {
    pub name: String,
    /// Package whose imports apply to the expression
    pub scope_package: String,
    pub owner: ConstOwner,
    pub declared_ty: syn::Type,
    pub expr: syn::Expr,
    pub doc: String,
    pub line: usize,
    pub seq: usize,
}

impl RawConst {
    /// Fully-qualified path other expressions refer to this constant by.
    pub fn path(&self) -> String {
        match &self.owner {
            ConstOwner::Module => join(&self.scope_package, &self.name),
            ConstOwner::Type(target) => join(&target.qualified(), &self.name),
        }
    }

    /// Package the constant is a declaration of.
    pub fn package(&self) -> &str {
        match &self.owner {
            ConstOwner::Module => &self.scope_package,
            ConstOwner::Type(target) => &target.package,
        }
    }

    pub fn self_ty(&self) -> Option<&TargetType> {
        match &self.owner {
            ConstOwner::Module => None,
            ConstOwner::Type(target) => Some(target),
        }
    }
}

#[derive(Debug)]
pub(crate) struct RawMethod {
    pub name: String,
    pub has_receiver: bool,
    pub const_fn: Option<RawConstFn>,
    pub arity: usize,
    pub result_arity: usize,
    pub body: String,
    pub line: usize,
}

#[derive(Debug)]
pub(crate) struct RawImplConst {
    pub name: String,
    pub ty: syn::Type,
    pub expr: syn::Expr,
    pub doc: String,
    pub line: usize,
    pub seq: usize,
}

#[derive(Debug)]
pub(crate) struct RawImpl {
    pub package: String,
    pub self_ty: syn::Type,
    /// Last segment of the implemented trait, `None` for inherent impls
    pub trait_name: Option<String>,
    pub consts: Vec<RawImplConst>,
    pub methods: Vec<RawMethod>,
}

#[derive(Debug)]
pub(crate) struct RawFunction {
    pub package: String,
    pub name: String,
    pub const_fn: Option<RawConstFn>,
    pub line: usize,
    pub seq: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Collector {
    pub types: Vec<RawType>,
    pub aliases: Vec<RawAlias>,
    pub consts: Vec<RawConst>,
    pub impls: Vec<RawImpl>,
    pub functions: Vec<RawFunction>,
    pub scopes: BTreeMap<String, Scope>,
    seq: usize,
}

impl Collector {
    pub fn collect_file(&mut self, package: &str, file: &syn::File) {
        self.collect_items(package, &file.items);
    }

    fn next_seq(&mut self) -> usize {
        self.seq += 1;
        self.seq
    }

    fn collect_items(&mut self, package: &str, items: &[Item]) {
        self.scopes
            .entry(package.to_string())
            .or_insert_with(|| Scope::new(package));

        for item in items {
            match item {
                Item::Use(item_use) => {
                    if let Some(scope) = self.scopes.get_mut(package) {
                        scope.add_use(&item_use.tree);
                    }
                }
                Item::Struct(item_struct) => {
                    let seq = self.next_seq();
                    self.types.push(RawType {
                        target: TargetType::new(package, item_struct.ident.to_string()),
                        repr: struct_repr(&item_struct.fields),
                        line: line_of(&item_struct.ident),
                        seq,
                    });
                }
                Item::Enum(item_enum) => self.collect_enum(package, item_enum),
                Item::Type(item_type) if item_type.generics.params.is_empty() => {
                    self.aliases.push(RawAlias {
                        package: package.to_string(),
                        name: item_type.ident.to_string(),
                        ty: (*item_type.ty).clone(),
                    });
                }
                Item::Const(item_const) => {
                    let seq = self.next_seq();
                    self.consts.push(RawConst {
                        name: item_const.ident.to_string(),
                        scope_package: package.to_string(),
                        owner: ConstOwner::Module,
                        declared_ty: (*item_const.ty).clone(),
                        expr: (*item_const.expr).clone(),
                        doc: doc_text(&item_const.attrs),
                        line: line_of(&item_const.ident),
                        seq,
                    });
                }
                Item::Fn(item_fn) => {
                    let seq = self.next_seq();
                    self.functions.push(RawFunction {
                        package: package.to_string(),
                        name: item_fn.sig.ident.to_string(),
                        const_fn: const_fn(&item_fn.sig, &item_fn.block),
                        line: line_of(&item_fn.sig.ident),
                        seq,
                    });
                }
                Item::Impl(item_impl) => self.collect_impl(package, item_impl),
                Item::Mod(item_mod) => {
                    if let Some((_, items)) = &item_mod.content {
                        let nested = join(package, &item_mod.ident.to_string());
                        self.collect_items(&nested, items);
                    }
                }
                _ => {}
            }
        }
    }

    fn collect_enum(&mut self, package: &str, item_enum: &syn::ItemEnum) {
        let target = TargetType::new(package, item_enum.ident.to_string());
        let fieldless = item_enum
            .variants
            .iter()
            .all(|v| matches!(v.fields, Fields::Unit));
        let repr = if fieldless {
            RawRepr::Enum(repr_int(&item_enum.attrs).unwrap_or(IntKind::Isize))
        } else {
            RawRepr::Other("enum".to_string())
        };

        let seq = self.next_seq();
        self.types.push(RawType {
            target: target.clone(),
            repr,
            line: line_of(&item_enum.ident),
            seq,
        });

        if !fieldless {
            return;
        }

        // Variants without a discriminant continue from the previous one.
        let mut prev: Option<&syn::Ident> = None;
        for variant in &item_enum.variants {
            let expr: syn::Expr = match (&variant.discriminant, prev) {
                (Some((_, expr)), _) => expr.clone(),
                (None, Some(prev)) => syn::parse_quote!(Self::#prev + 1),
                (None, None) => syn::parse_quote!(0),
            };
            let seq = self.next_seq();
            self.consts.push(RawConst {
                name: variant.ident.to_string(),
                scope_package: package.to_string(),
                owner: ConstOwner::Type(target.clone()),
                declared_ty: syn::parse_quote!(Self),
                expr,
                doc: doc_text(&variant.attrs),
                line: line_of(&variant.ident),
                seq,
            });
            prev = Some(&variant.ident);
        }
    }

    fn collect_impl(&mut self, package: &str, item_impl: &syn::ItemImpl) {
        let mut raw = RawImpl {
            package: package.to_string(),
            self_ty: (*item_impl.self_ty).clone(),
            trait_name: item_impl
                .trait_
                .as_ref()
                .and_then(|(_, path, _)| path.segments.last())
                .map(|segment| segment.ident.to_string()),
            consts: Vec::new(),
            methods: Vec::new(),
        };

        for item in &item_impl.items {
            match item {
                ImplItem::Const(item_const) => {
                    let seq = self.next_seq();
                    raw.consts.push(RawImplConst {
                        name: item_const.ident.to_string(),
                        ty: item_const.ty.clone(),
                        expr: item_const.expr.clone(),
                        doc: doc_text(&item_const.attrs),
                        line: line_of(&item_const.ident),
                        seq,
                    });
                }
                ImplItem::Fn(item_fn) => {
                    let sig = &item_fn.sig;
                    raw.methods.push(RawMethod {
                        name: sig.ident.to_string(),
                        has_receiver: sig.receiver().is_some(),
                        const_fn: const_fn(sig, &item_fn.block),
                        arity: sig
                            .inputs
                            .iter()
                            .filter(|input| matches!(input, FnArg::Typed(_)))
                            .count(),
                        result_arity: result_arity(&sig.output),
                        body: item_fn.block.to_token_stream().to_string(),
                        line: line_of(&sig.ident),
                    });
                }
                _ => {}
            }
        }

        self.impls.push(raw);
    }
}

fn line_of(ident: &syn::Ident) -> usize {
    ident.span().start().line
}

fn struct_repr(fields: &Fields) -> RawRepr {
    match fields {
        Fields::Unnamed(unnamed) if unnamed.unnamed.len() == 1 => {
            RawRepr::Field(unnamed.unnamed[0].ty.clone())
        }
        Fields::Named(named) if named.named.len() == 1 => RawRepr::Field(named.named[0].ty.clone()),
        Fields::Unit => RawRepr::Other("()".to_string()),
        other => RawRepr::Other(format!("struct {}", other.to_token_stream())),
    }
}

/// Parameters and body of a receiver-less, non-generic `const fn`.
fn const_fn(sig: &syn::Signature, block: &syn::Block) -> Option<RawConstFn> {
    if sig.constness.is_none() || sig.receiver().is_some() || !sig.generics.params.is_empty() {
        return None;
    }
    let params = sig
        .inputs
        .iter()
        .map(|input| match input {
            FnArg::Typed(typed) => match typed.pat.as_ref() {
                syn::Pat::Ident(pat) => Some(pat.ident.to_string()),
                _ => None,
            },
            FnArg::Receiver(_) => None,
        })
        .collect::<Option<Vec<_>>>()?;
    let output = match &sig.output {
        ReturnType::Type(_, ty) => Some((**ty).clone()),
        ReturnType::Default => None,
    };
    Some(RawConstFn {
        params,
        output,
        body: block.to_token_stream().to_string(),
    })
}

/// Integer kind named in `#[repr(..)]`, if any.
fn repr_int(attrs: &[syn::Attribute]) -> Option<IntKind> {
    let mut found = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("repr")) {
        let _ = attr.parse_nested_meta(|meta| {
            if let Some(ident) = meta.path.get_ident() {
                if let Some(kind) = IntKind::from_name(&ident.to_string()) {
                    found = Some(kind);
                }
            }
            // skip arguments such as `align(8)`
            if meta.input.peek(syn::token::Paren) {
                let _args;
                syn::parenthesized!(_args in meta.input);
            }
            Ok(())
        });
    }
    found
}

fn result_arity(output: &ReturnType) -> usize {
    match output {
        ReturnType::Default => 0,
        ReturnType::Type(_, ty) => match ty.as_ref() {
            syn::Type::Tuple(tuple) => tuple.elems.len(),
            syn::Type::Never(_) => 0,
            _ => 1,
        },
    }
}

/// Documentation text of an item: `#[doc]` values with one leading space
/// stripped per line, joined by newlines.
pub(crate) fn doc_text(attrs: &[syn::Attribute]) -> String {
    let mut lines = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("doc") {
            continue;
        }
        let syn::Meta::NameValue(meta) = &attr.meta else {
            continue;
        };
        if let syn::Expr::Lit(syn::ExprLit {
            lit: syn::Lit::Str(text),
            ..
        }) = &meta.value
        {
            for line in text.value().split('\n') {
                lines.push(line.strip_prefix(' ').unwrap_or(line).to_string());
            }
        }
    }
    lines.join("\n")
}
