/*
 * registry.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Named asynchronous helper functions available to call expressions.
 */

//! Function registry.
//!
//! A [`FunctionRegistry`] maps dotted names to asynchronous functions. Names
//! are stored as a tree of namespaces, so `utils.getImage` lives in the
//! `utils` namespace. Lookup walks the tree one segment at a time; a missing
//! segment at any depth is an [`CmsError::UnresolvedFunction`].
//!
//! The registry is immutable once built and is shared by every request.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use crate::error::CmsError;
use crate::expr::CallName;

/// Error returned by a registered function.
pub type FunctionError = Box<dyn std::error::Error + Send + Sync>;

/// A named helper that a call expression can invoke.
#[async_trait]
pub trait CmsFunction: Send + Sync {
    /// Call the function with already-resolved arguments.
    async fn call(&self, args: Vec<Value>) -> Result<Value, FunctionError>;
}

/// Function backed by a closure returning a future.
struct FnFunction<F> {
    f: F,
}

#[async_trait]
impl<F> CmsFunction for FnFunction<F>
where
    F: Fn(Vec<Value>) -> BoxFuture<'static, Result<Value, FunctionError>> + Send + Sync,
{
    async fn call(&self, args: Vec<Value>) -> Result<Value, FunctionError> {
        (self.f)(args).await
    }
}

/// Wrap an async closure as a [`CmsFunction`].
///
/// ```ignore
/// let get_image = function_fn(|_args| async { Ok(json!({ "image": "x.jpg" })) });
/// ```
pub fn function_fn<F, Fut>(f: F) -> Arc<dyn CmsFunction>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, FunctionError>> + Send + 'static,
{
    Arc::new(FnFunction {
        f: move |args: Vec<Value>| -> BoxFuture<'static, Result<Value, FunctionError>> {
            Box::pin(f(args))
        },
    })
}

/// Function that ignores its arguments and returns a fixed value.
#[derive(Debug, Clone)]
pub struct ConstantFunction {
    value: Value,
}

#[async_trait]
impl CmsFunction for ConstantFunction {
    async fn call(&self, _args: Vec<Value>) -> Result<Value, FunctionError> {
        Ok(self.value.clone())
    }
}

/// Wrap a fixed value as a [`CmsFunction`].
pub fn constant(value: Value) -> Arc<dyn CmsFunction> {
    Arc::new(ConstantFunction { value })
}

/// Errors raised while building a registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The name is empty or has an empty segment.
    #[error("Invalid function name: `{0}`")]
    InvalidName(String),

    /// The name collides with an existing function or namespace.
    #[error("Function name `{0}` conflicts with an existing registration")]
    Conflict(String),
}

enum Entry {
    Function(Arc<dyn CmsFunction>),
    Namespace(BTreeMap<String, Entry>),
}

/// Immutable mapping from dotted names to functions.
#[derive(Default)]
pub struct FunctionRegistry {
    root: BTreeMap<String, Entry>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl FunctionRegistry {
    /// An empty registry. Every call expression fails to resolve against it.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> FunctionRegistryBuilder {
        FunctionRegistryBuilder::default()
    }

    /// Find the function registered under `name`.
    pub fn lookup(&self, name: &CallName) -> Result<Arc<dyn CmsFunction>, CmsError> {
        let unresolved = || CmsError::UnresolvedFunction {
            name: name.to_string(),
        };

        let mut level = &self.root;
        let mut segments = name.segments().iter().peekable();
        while let Some(segment) = segments.next() {
            let entry = level.get(segment).ok_or_else(unresolved)?;
            match (entry, segments.peek()) {
                (Entry::Function(f), None) => return Ok(f.clone()),
                (Entry::Namespace(children), Some(_)) => level = children,
                _ => return Err(unresolved()),
            }
        }
        Err(unresolved())
    }

    /// All registered function names, sorted.
    pub fn names(&self) -> Vec<String> {
        fn collect(prefix: &str, level: &BTreeMap<String, Entry>, out: &mut Vec<String>) {
            for (key, entry) in level {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                match entry {
                    Entry::Function(_) => out.push(name),
                    Entry::Namespace(children) => collect(&name, children, out),
                }
            }
        }

        let mut out = Vec::new();
        collect("", &self.root, &mut out);
        out
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

/// Builder for [`FunctionRegistry`].
#[derive(Default)]
pub struct FunctionRegistryBuilder {
    root: BTreeMap<String, Entry>,
}

impl FunctionRegistryBuilder {
    /// Register `function` under a dotted `name`, creating namespaces as needed.
    pub fn register(
        mut self,
        name: &str,
        function: Arc<dyn CmsFunction>,
    ) -> Result<Self, RegistryError> {
        let segments: Vec<&str> = name.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }

        let (last, namespaces) = segments
            .split_last()
            .ok_or_else(|| RegistryError::InvalidName(name.to_string()))?;

        let mut level = &mut self.root;
        for segment in namespaces {
            let entry = level
                .entry((*segment).to_string())
                .or_insert_with(|| Entry::Namespace(BTreeMap::new()));
            level = match entry {
                Entry::Namespace(children) => children,
                Entry::Function(_) => return Err(RegistryError::Conflict(name.to_string())),
            };
        }

        if level.contains_key(*last) {
            return Err(RegistryError::Conflict(name.to_string()));
        }
        level.insert((*last).to_string(), Entry::Function(function));

        Ok(self)
    }

    /// Register a closure under a dotted name.
    pub fn register_fn<F, Fut>(self, name: &str, f: F) -> Result<Self, RegistryError>
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, FunctionError>> + Send + 'static,
    {
        self.register(name, function_fn(f))
    }

    pub fn build(self) -> FunctionRegistry {
        FunctionRegistry { root: self.root }
    }
}
