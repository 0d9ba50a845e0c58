// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Expression subsystem: scalar expression tree and row evaluation

pub mod eval;
pub mod expression;

pub use expression::{
    AliasExpression, BinaryExpression, ColumnRef, Expression, FunctionCall, Operator,
    SubqueryExpression, UnresolvedColumn,
};
