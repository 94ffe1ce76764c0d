//! Integer constant evaluation over `syn` expressions.
//!
//! Evaluates the subset of const expressions status error declarations use:
//! literals, arithmetic and bit operators, casts, newtype constructors,
//! single-field struct literals, field projections, references to other
//! constants and calls to `const fn`s with a single return expression.
//! Anything outside that subset is "not evaluable" (`None`).

use std::collections::HashMap;

use syn::{BinOp, Expr, Lit, UnOp};
use tracing::debug;

use super::resolve::{path_segments, resolve, Names, Scope};
use super::returns::{return_sites, returned_values};
use super::typing::primitive_kind;
use crate::program::{IntKind, TargetType};

/// Nested `const fn` calls deeper than this are not evaluable.
const MAX_CALL_DEPTH: usize = 32;

/// A `const fn` callable from constant expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ConstFn {
    /// Package whose imports apply to the body
    pub package: String,
    /// Type of the enclosing `impl` block, for `Self`
    pub self_ty: Option<TargetType>,
    pub params: Vec<String>,
    /// Integer kind of the return type, used to wrap the result
    pub result_kind: Option<IntKind>,
    pub body: String,
}

/// What the evaluator needs from its surroundings.
pub(crate) trait ConstEnv {
    fn scope(&self, package: &str) -> Option<&Scope>;
    fn names(&self) -> &Names;
    /// Is `path` a named type (newtype constructors, struct literals)?
    fn is_type(&self, path: &str) -> bool;
    /// Value of the constant at fully-qualified `path`.
    fn constant(&mut self, path: &str) -> Option<i128>;
    /// `const fn` at fully-qualified `path`.
    fn const_fn(&self, path: &str) -> Option<ConstFn>;

    /// Integer kind an `as` cast to `ty` wraps into.
    fn cast_kind(&self, _package: &str, ty: &syn::Type, _self_ty: Option<&TargetType>) -> Option<IntKind> {
        primitive_kind(ty)
    }
}

pub(crate) struct Evaluator<'e, E: ConstEnv> {
    env: &'e mut E,
    package: String,
    self_ty: Option<TargetType>,
    /// Bound `const fn` parameters
    locals: HashMap<String, i128>,
    depth: usize,
}

impl<'e, E: ConstEnv> Evaluator<'e, E> {
    pub fn new(env: &'e mut E, package: impl Into<String>, self_ty: Option<TargetType>) -> Self {
        Self {
            env,
            package: package.into(),
            self_ty,
            locals: HashMap::new(),
            depth: 0,
        }
    }

    pub fn eval(&mut self, expr: &Expr) -> Option<i128> {
        match expr {
            Expr::Lit(lit) => eval_lit(&lit.lit),
            Expr::Paren(inner) => self.eval(&inner.expr),
            Expr::Group(inner) => self.eval(&inner.expr),
            Expr::Unary(unary) => {
                let value = self.eval(&unary.expr)?;
                match unary.op {
                    UnOp::Neg(_) => value.checked_neg(),
                    // `!0u16` is 65535, not -1
                    UnOp::Not(_) => match self.static_kind(&unary.expr) {
                        Some(kind) => kind.wrap(!value),
                        None => Some(!value),
                    },
                    _ => None,
                }
            }
            Expr::Binary(binary) => {
                let lhs = self.eval(&binary.left)?;
                let rhs = self.eval(&binary.right)?;
                eval_binary(&binary.op, lhs, rhs)
            }
            Expr::Cast(cast) => {
                let value = self.eval(&cast.expr)?;
                match self.env.cast_kind(&self.package, &cast.ty, self.self_ty.as_ref()) {
                    Some(kind) => kind.wrap(value),
                    None => Some(value),
                }
            }
            Expr::Path(path) if path.qself.is_none() => {
                if let Some(ident) = path.path.get_ident() {
                    if let Some(value) = self.locals.get(&ident.to_string()) {
                        return Some(*value);
                    }
                }
                let full = self.resolve(&path.path)?;
                self.env.constant(&full)
            }
            // Newtype constructor `AppError(3)` or `const fn` call `AppError::new(3)`
            Expr::Call(call) => {
                let Expr::Path(func) = call.func.as_ref() else {
                    return None;
                };
                if func.qself.is_some() {
                    return None;
                }
                let full = self.resolve(&func.path)?;
                if self.env.is_type(&full) {
                    if call.args.len() != 1 {
                        return None;
                    }
                    return self.eval(call.args.first()?);
                }
                let args = call
                    .args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Option<Vec<_>>>()?;
                self.call(&full, args)
            }
            // Single-field struct literal: `AppError { code: 3 }`
            Expr::Struct(lit) if lit.fields.len() == 1 && lit.rest.is_none() => {
                let full = self.resolve(&lit.path)?;
                if !self.env.is_type(&full) {
                    return None;
                }
                self.eval(&lit.fields.first()?.expr)
            }
            // Projection of a single-field value: `BASE.0`, `BASE.code`
            Expr::Field(field) => self.eval(&field.base),
            Expr::Block(block) if block.label.is_none() => match block.block.stmts.as_slice() {
                [syn::Stmt::Expr(inner, None)] => self.eval(inner),
                _ => None,
            },
            _ => None,
        }
    }

    /// Evaluate the single return expression of the `const fn` at `path`.
    fn call(&mut self, path: &str, args: Vec<i128>) -> Option<i128> {
        if self.depth >= MAX_CALL_DEPTH {
            debug!("Call depth exceeded evaluating {}", path);
            return None;
        }
        let function = self.env.const_fn(path)?;
        if function.params.len() != args.len() {
            return None;
        }

        let block: syn::Block = syn::parse_str(&function.body).ok()?;
        let sites = return_sites(&block);
        let [site] = sites.as_slice() else {
            return None;
        };
        let values = returned_values(site);
        let [value] = values.as_slice() else {
            return None;
        };

        let mut callee = Evaluator {
            env: &mut *self.env,
            package: function.package.clone(),
            self_ty: function.self_ty.clone(),
            locals: function.params.iter().cloned().zip(args).collect(),
            depth: self.depth + 1,
        };
        let result = callee.eval(value)?;
        match function.result_kind {
            Some(kind) => kind.wrap(result),
            None => Some(result),
        }
    }

    /// Integer kind evident from the expression itself: a literal suffix or a cast.
    fn static_kind(&self, expr: &Expr) -> Option<IntKind> {
        match expr {
            Expr::Lit(syn::ExprLit {
                lit: Lit::Int(int), ..
            }) => IntKind::from_name(int.suffix()),
            Expr::Paren(inner) => self.static_kind(&inner.expr),
            Expr::Group(inner) => self.static_kind(&inner.expr),
            Expr::Unary(unary) => self.static_kind(&unary.expr),
            Expr::Binary(binary) => self
                .static_kind(&binary.left)
                .or_else(|| self.static_kind(&binary.right)),
            Expr::Cast(cast) => self
                .env
                .cast_kind(&self.package, &cast.ty, self.self_ty.as_ref()),
            _ => None,
        }
    }

    fn resolve(&self, path: &syn::Path) -> Option<String> {
        if path.leading_colon.is_some() {
            return None;
        }
        let scope = self.env.scope(&self.package)?;
        resolve(
            scope,
            self.env.names(),
            &path_segments(path),
            self.self_ty.as_ref(),
        )
    }
}

fn eval_lit(lit: &Lit) -> Option<i128> {
    match lit {
        Lit::Int(int) => int.base10_parse::<i128>().ok(),
        Lit::Byte(byte) => Some(i128::from(byte.value())),
        _ => None,
    }
}

fn eval_binary(op: &BinOp, lhs: i128, rhs: i128) -> Option<i128> {
    match op {
        BinOp::Add(_) => lhs.checked_add(rhs),
        BinOp::Sub(_) => lhs.checked_sub(rhs),
        BinOp::Mul(_) => lhs.checked_mul(rhs),
        BinOp::Div(_) => lhs.checked_div(rhs),
        BinOp::Rem(_) => lhs.checked_rem(rhs),
        BinOp::Shl(_) => lhs.checked_shl(u32::try_from(rhs).ok()?),
        BinOp::Shr(_) => lhs.checked_shr(u32::try_from(rhs).ok()?),
        BinOp::BitAnd(_) => Some(lhs & rhs),
        BinOp::BitOr(_) => Some(lhs | rhs),
        BinOp::BitXor(_) => Some(lhs ^ rhs),
        _ => None,
    }
}
