// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Generic rewrite engine over plan trees and expressions
//!
//! All node walkers are postorder: children are rewritten before their parent
//! sees them. The first error aborts the walk and no partial tree escapes.

use super::context::QueryContext;
use super::logical::LogicalNode;
use super::optimizer::OptimizerResult;
use crate::ast::Expression;

/// Rewrite every node of the tree, children first
pub fn transform_up<F>(ctx: &QueryContext, node: LogicalNode, f: &mut F) -> OptimizerResult<LogicalNode>
where
    F: FnMut(LogicalNode) -> OptimizerResult<LogicalNode>,
{
    transform_up_with_selector(ctx, node, &|_, _, _| true, f)
}

/// Like `transform_up`, but only descends into a child when
/// `selector(parent, child, child_index)` holds. Skipped subtrees are
/// returned untouched.
pub fn transform_up_with_selector<S, F>(
    ctx: &QueryContext,
    node: LogicalNode,
    selector: &S,
    f: &mut F,
) -> OptimizerResult<LogicalNode>
where
    S: Fn(&LogicalNode, &LogicalNode, usize) -> bool,
    F: FnMut(LogicalNode) -> OptimizerResult<LogicalNode>,
{
    ctx.check_cancelled()?;

    let descend: Vec<bool> = node
        .children()
        .into_iter()
        .enumerate()
        .map(|(i, child)| selector(&node, child, i))
        .collect();

    let node = node.map_children(|i, child| {
        if descend[i] {
            transform_up_with_selector(ctx, child, selector, &mut *f)
        } else {
            Ok(child)
        }
    })?;

    f(node)
}

/// Rewrite an expression tree, children first
pub fn transform_expression_up<F>(expr: Expression, f: &mut F) -> OptimizerResult<Expression>
where
    F: FnMut(Expression) -> OptimizerResult<Expression>,
{
    let expr = expr.map_children(|child| transform_expression_up(child, &mut *f))?;
    f(expr)
}

/// Rewrite the direct expressions of a single node
pub fn transform_expressions<F>(node: LogicalNode, f: &mut F) -> OptimizerResult<LogicalNode>
where
    F: FnMut(Expression) -> OptimizerResult<Expression>,
{
    node.map_expressions(|e| transform_expression_up(e, &mut *f))
}

/// Rewrite the expressions of every node in the tree
pub fn transform_expressions_up<F>(
    ctx: &QueryContext,
    node: LogicalNode,
    f: &mut F,
) -> OptimizerResult<LogicalNode>
where
    F: FnMut(Expression) -> OptimizerResult<Expression>,
{
    transform_up(ctx, node, &mut |n| transform_expressions(n, &mut *f))
}

/// Visit nodes parents first. Returning `false` stops descent below a node.
pub fn inspect<F>(node: &LogicalNode, f: &mut F)
where
    F: FnMut(&LogicalNode) -> bool,
{
    if f(node) {
        for child in node.children() {
            inspect(child, f);
        }
    }
}

/// Visit every expression held by any node of the tree. Subquery plans are
/// not entered.
pub fn inspect_expressions<F>(node: &LogicalNode, f: &mut F)
where
    F: FnMut(&Expression) -> bool,
{
    inspect(node, &mut |n| {
        for expr in n.expressions() {
            expr.inspect(f);
        }
        true
    });
}
