// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Logical plan optimizer - runs the pushdown rules over a resolved plan
//!
//! Rules run in a fixed order:
//! - Filter pushdown (with index conversion first, when enabled)
//! - Subquery alias filter pushdown
//! - Projection pushdown
//!
//! Nested plans (derived tables and subquery expressions) are optimized after
//! the outer tree, so filters moved below a subquery alias are pushed further
//! into the derived table.

use log::{debug, info};
use std::time::{Duration, Instant};

use crate::ast::{Expression, SubqueryExpression};
use crate::plan::config::OptimizerConfig;
use crate::plan::context::QueryContext;
use crate::plan::logical::{LogicalNode, LogicalPlan};
use crate::plan::optimizer::{OptimizationLevel, OptimizerResult};
use crate::plan::optimizers::logical::predicate_pushdown::{outside_derived_tables, pushdown_filters};
use crate::plan::optimizers::logical::projection_pushdown::pushdown_projections;
use crate::plan::optimizers::logical::subquery_alias_pushdown::pushdown_subquery_alias_filters;
use crate::plan::optimizers::physical::index_selection::{ConjunctIndexSelector, IndexLookupProvider};
use crate::plan::scope::Scope;
use crate::plan::transform::{transform_expression_up, transform_up_with_selector};

const FILTER_PUSHDOWN: &str = "pushdown_filters";
const SUBQUERY_ALIAS_PUSHDOWN: &str = "pushdown_subquery_alias_filters";
const PROJECTION_PUSHDOWN: &str = "pushdown_projections";

/// One rule application recorded when tracing is enabled
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTrace {
    pub rule: &'static str,
    /// Whether the rule produced a different tree
    pub changed: bool,
    pub elapsed: Duration,
}

/// Optimized plan plus the rule trace, empty unless tracing is enabled
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub plan: LogicalPlan,
    pub trace: Vec<RuleTrace>,
}

/// Optimizer for logical plans
#[derive(Debug)]
pub struct LogicalOptimizer {
    config: OptimizerConfig,
    index_provider: Box<dyn IndexLookupProvider>,
}

impl LogicalOptimizer {
    /// Create a new logical optimizer using the default index selector
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            config,
            index_provider: Box::new(ConjunctIndexSelector),
        }
    }

    pub fn with_level(level: OptimizationLevel) -> Self {
        Self::new(OptimizerConfig::with_level(level))
    }

    /// Replace the collaborator choosing index lookups
    pub fn with_index_provider<P: IndexLookupProvider + 'static>(mut self, provider: P) -> Self {
        self.index_provider = Box::new(provider);
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Optimize a logical plan. `scope` holds the outer query nodes when the
    /// plan is itself a correlated subquery, and is empty otherwise.
    pub fn optimize(
        &self,
        ctx: &QueryContext,
        plan: LogicalPlan,
        scope: &Scope,
    ) -> OptimizerResult<OptimizationResult> {
        let level = self.config.optimization_level;
        if level == OptimizationLevel::None {
            debug!("optimization level is none, plan left unchanged");
            return Ok(OptimizationResult {
                plan,
                trace: Vec::new(),
            });
        }

        debug!("optimizing plan at level {}", level);
        self.log_skipped_rules();

        let start = Instant::now();
        let mut trace = Vec::new();
        let tracing = if self.config.trace { Some(&mut trace) } else { None };
        let root = self.optimize_node(ctx, plan.root, scope, tracing)?;

        debug!("plan optimized in {:?}", start.elapsed());

        Ok(OptimizationResult {
            plan: LogicalPlan::new(root),
            trace,
        })
    }

    fn log_skipped_rules(&self) {
        if !self.config.filter_pushdown_enabled() {
            info!("rule {} disabled by configuration", FILTER_PUSHDOWN);
        } else if !self.config.index_pushdown_enabled() {
            info!("index pushdown disabled by configuration");
        }
        if !self.config.subquery_alias_pushdown_enabled() {
            info!("rule {} disabled by configuration", SUBQUERY_ALIAS_PUSHDOWN);
        }
        if !self.config.projection_pushdown_enabled() {
            info!("rule {} disabled by configuration", PROJECTION_PUSHDOWN);
        }
    }

    /// Run the enabled rules over one tree, then over its nested plans
    fn optimize_node(
        &self,
        ctx: &QueryContext,
        node: LogicalNode,
        scope: &Scope,
        mut trace: Option<&mut Vec<RuleTrace>>,
    ) -> OptimizerResult<LogicalNode> {
        let mut node = node;

        if self.config.filter_pushdown_enabled() {
            let provider = if self.config.index_pushdown_enabled() {
                Some(self.index_provider.as_ref())
            } else {
                None
            };
            node = apply_rule(FILTER_PUSHDOWN, node, &mut trace, |n| {
                pushdown_filters(ctx, n, scope, provider)
            })?;
        }

        if self.config.subquery_alias_pushdown_enabled() {
            node = apply_rule(SUBQUERY_ALIAS_PUSHDOWN, node, &mut trace, |n| {
                pushdown_subquery_alias_filters(ctx, n, scope)
            })?;
        }

        if self.config.projection_pushdown_enabled() {
            node = apply_rule(PROJECTION_PUSHDOWN, node, &mut trace, |n| {
                pushdown_projections(ctx, n, scope)
            })?;
        }

        self.optimize_nested_plans(ctx, node, scope)
    }

    /// Derived tables see no outer scope; a subquery expression sees the node
    /// holding it on top of the current scope.
    fn optimize_nested_plans(
        &self,
        ctx: &QueryContext,
        node: LogicalNode,
        scope: &Scope,
    ) -> OptimizerResult<LogicalNode> {
        transform_up_with_selector(ctx, node, &outside_derived_tables, &mut |n| match n {
            LogicalNode::SubqueryAlias { name, input } => {
                let input = self.optimize_node(ctx, *input, &Scope::new(), None)?;
                Ok(LogicalNode::SubqueryAlias {
                    name,
                    input: Box::new(input),
                })
            }
            other if holds_subquery(&other) => {
                let inner_scope = scope.new_scope(other.clone());
                other.map_expressions(|e| {
                    transform_expression_up(e, &mut |e| match e {
                        Expression::Subquery(subquery) => {
                            let plan = self.optimize_node(ctx, *subquery.plan, &inner_scope, None)?;
                            Ok(Expression::Subquery(SubqueryExpression {
                                plan: Box::new(plan),
                            }))
                        }
                        other => Ok(other),
                    })
                })
            }
            other => Ok(other),
        })
    }
}

fn holds_subquery(node: &LogicalNode) -> bool {
    let mut found = false;
    for expr in node.expressions() {
        expr.inspect(&mut |e| {
            if matches!(e, Expression::Subquery(_)) {
                found = true;
            }
            !found
        });
    }
    found
}

fn apply_rule<F>(
    rule: &'static str,
    node: LogicalNode,
    trace: &mut Option<&mut Vec<RuleTrace>>,
    f: F,
) -> OptimizerResult<LogicalNode>
where
    F: FnOnce(LogicalNode) -> OptimizerResult<LogicalNode>,
{
    match trace {
        Some(trace) => {
            let before = node.clone();
            let start = Instant::now();
            let after = f(node)?;
            trace.push(RuleTrace {
                rule,
                changed: after != before,
                elapsed: start.elapsed(),
            });
            Ok(after)
        }
        None => f(node),
    }
}
