//! Return-site collection for function bodies.

use syn::visit::{self, Visit};
use syn::{Block, Expr, Stmt};

/// Macros that never produce a value.
const DIVERGING_MACROS: &[&str] = &["panic", "unreachable", "todo", "unimplemented"];

/// Every expression `block` can return: explicit `return` expressions first,
/// then the tail expression. Branches of a tail `if`/`match` are separate
/// sites. Closures, async blocks and nested items are not descended into.
pub(crate) fn return_sites(block: &Block) -> Vec<Expr> {
    let mut finder = ReturnFinder::default();
    finder.visit_block(block);

    let mut sites = finder.sites;
    if let Some(tail) = tail_expr(block) {
        collect_tail(tail, &mut sites);
    }
    sites
}

/// Values produced by one return expression; tuples spread into elements.
pub(crate) fn returned_values(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::Tuple(tuple) => tuple.elems.iter().collect(),
        Expr::Paren(inner) => returned_values(&inner.expr),
        other => vec![other],
    }
}

fn tail_expr(block: &Block) -> Option<&Expr> {
    match block.stmts.last()? {
        Stmt::Expr(expr, None) => Some(expr),
        _ => None,
    }
}

fn collect_tail(expr: &Expr, sites: &mut Vec<Expr>) {
    match expr {
        Expr::If(expr_if) => {
            if let Some(tail) = tail_expr(&expr_if.then_branch) {
                collect_tail(tail, sites);
            }
            if let Some((_, else_branch)) = &expr_if.else_branch {
                collect_tail(else_branch, sites);
            }
        }
        Expr::Match(expr_match) => {
            for arm in &expr_match.arms {
                collect_tail(&arm.body, sites);
            }
        }
        Expr::Block(expr_block) => {
            if let Some(tail) = tail_expr(&expr_block.block) {
                collect_tail(tail, sites);
            }
        }
        Expr::Unsafe(expr_unsafe) => {
            if let Some(tail) = tail_expr(&expr_unsafe.block) {
                collect_tail(tail, sites);
            }
        }
        // already collected by the visitor
        Expr::Return(_) => {}
        Expr::Macro(mac) if is_diverging(&mac.mac) => {}
        other => sites.push(other.clone()),
    }
}

fn is_diverging(mac: &syn::Macro) -> bool {
    mac.path
        .get_ident()
        .map(|ident| DIVERGING_MACROS.iter().any(|name| ident == name))
        .unwrap_or(false)
}

#[derive(Default)]
struct ReturnFinder {
    sites: Vec<Expr>,
}

impl<'ast> Visit<'ast> for ReturnFinder {
    fn visit_expr_return(&mut self, node: &'ast syn::ExprReturn) {
        match &node.expr {
            Some(expr) => {
                self.sites.push((**expr).clone());
                visit::visit_expr(self, expr);
            }
            None => self.sites.push(syn::parse_quote!(())),
        }
    }

    fn visit_expr_closure(&mut self, _node: &'ast syn::ExprClosure) {}

    fn visit_expr_async(&mut self, _node: &'ast syn::ExprAsync) {}

    fn visit_item(&mut self, _node: &'ast syn::Item) {}
}
