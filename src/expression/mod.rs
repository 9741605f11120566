//! Expression evaluation for attribute statements.
//!
//! Statement conditions and dynamic values are written in a small expression
//! language evaluated over a JSON context (`entityId`, `groupName`, `groups`,
//! `attr`, `attrs`, `eattr`, `eattrs`, `idsByType`, `groupsObj`). The engine
//! is pluggable through [`ExpressionEvaluator`]; [`BuiltinExpressionEngine`]
//! is the default and caches compiled expressions by source text.
//!
//! ```rust
//! use attribute_engine::expression::{BuiltinExpressionEngine, EvaluationContext, ExpressionEvaluator};
//! use serde_json::json;
//!
//! let engine = BuiltinExpressionEngine::new();
//! let compiled = engine.compile("attrs['cn'].size() > 0").unwrap();
//!
//! let mut context = EvaluationContext::new();
//! context.insert("attrs".to_string(), json!({"cn": ["Alice"]}));
//! assert!(engine.evaluate_boolean(&compiled, &context).unwrap());
//! ```

pub mod interpreter;
pub mod parser;

pub use parser::{BinaryOp, Expr, UnaryOp, parse_expression};

use crate::error::{ExpressionError, ExpressionResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Variables visible to an expression.
pub type EvaluationContext = serde_json::Map<String, Value>;

/// Compiles and evaluates expressions.
pub trait ExpressionEvaluator: Send + Sync {
    /// Compiled form of one expression.
    type Compiled: Send + Sync;

    fn compile(&self, expression: &str) -> ExpressionResult<Self::Compiled>;

    fn evaluate_value(
        &self,
        compiled: &Self::Compiled,
        context: &EvaluationContext,
    ) -> ExpressionResult<Value>;

    /// Evaluate a condition. Null and non-boolean results are errors.
    fn evaluate_boolean(
        &self,
        compiled: &Self::Compiled,
        context: &EvaluationContext,
    ) -> ExpressionResult<bool> {
        match self.evaluate_value(compiled, context)? {
            Value::Bool(result) => Ok(result),
            Value::Null => Err(ExpressionError::NullResult),
            other => Err(ExpressionError::NotBoolean {
                actual: other.to_string(),
            }),
        }
    }
}

const MAX_CACHED_EXPRESSIONS: usize = 1024;

/// Built-in expression engine with a compile cache.
#[derive(Debug, Default)]
pub struct BuiltinExpressionEngine {
    cache: RwLock<HashMap<String, Arc<Expr>>>,
}

impl BuiltinExpressionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached compiled expressions.
    pub fn cached_expressions(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ExpressionEvaluator for BuiltinExpressionEngine {
    type Compiled = Arc<Expr>;

    fn compile(&self, expression: &str) -> ExpressionResult<Arc<Expr>> {
        if let Some(cached) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(expression)
        {
            return Ok(Arc::clone(cached));
        }

        let compiled = Arc::new(parse_expression(expression)?);
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if cache.len() >= MAX_CACHED_EXPRESSIONS {
            log::debug!("Expression cache full, clearing {} entries", cache.len());
            cache.clear();
        }
        cache.insert(expression.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }

    fn evaluate_value(
        &self,
        compiled: &Arc<Expr>,
        context: &EvaluationContext,
    ) -> ExpressionResult<Value> {
        interpreter::evaluate(compiled, context)
    }
}
