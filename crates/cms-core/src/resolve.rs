/*
 * resolve.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Concurrent resolution of call-expression fields.
 */

//! Concurrent resolution of page data.
//!
//! Every top-level field is classified once. Literal fields are copied
//! through; call-expression fields become independent futures that are
//! driven concurrently and joined. The first failure fails the whole page
//! and drops the remaining in-flight calls.
//!
//! Arguments read only from the immutable [`ResolutionContext`]; no call
//! observes another field's resolved value.
//! The output keeps the input's field order regardless of completion order.

use std::sync::Arc;

use futures::future::try_join_all;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::args::{ResolutionContext, resolve_args};
use crate::error::{CmsError, Result};
use crate::expr::{CallExpr, FieldExpr, classify};
use crate::observer::{NoopObserver, ResolveObserver};
use crate::registry::{CmsFunction, FunctionRegistry};
use crate::value::PageData;

/// Per-request resolution settings.
#[derive(Clone)]
pub struct ResolveOptions {
    /// Report every resolved call to `observer`.
    pub debug: bool,
    /// Receives debug records.
    pub observer: Arc<dyn ResolveObserver>,
    /// Abandons resolution when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            debug: false,
            observer: Arc::new(NoopObserver),
            cancel: None,
        }
    }
}

impl ResolveOptions {
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ResolveObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

enum Slot<'a> {
    Literal(&'a Value),
    Call(usize),
}

/// Resolve every call-expression field in `data`.
///
/// # Errors
///
/// - [`CmsError::UnresolvedFunction`] if any call names an unknown function.
///   No function is invoked in that case.
/// - [`CmsError::ResolutionFailure`] for the first call that fails.
/// - [`CmsError::Cancelled`] if `options.cancel` fires first.
pub async fn resolve_data(
    data: &PageData,
    registry: &FunctionRegistry,
    ctx: &ResolutionContext,
    options: &ResolveOptions,
) -> Result<PageData> {
    let mut slots = Vec::with_capacity(data.len());
    let mut calls = Vec::new();

    for (field, value) in data {
        match classify(value) {
            FieldExpr::Literal(v) => slots.push((field, Slot::Literal(v))),
            FieldExpr::Call(call) => {
                let function = registry.lookup(&call.name)?;
                let args = resolve_args(&call.args, ctx);
                slots.push((field, Slot::Call(calls.len())));
                calls.push(resolve_call(field, call, function, args, options));
            }
        }
    }

    tracing::trace!(
        fields = data.len(),
        calls = calls.len(),
        "Resolving page data"
    );

    let joined = try_join_all(calls);
    let mut values = match &options.cancel {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(CmsError::Cancelled),
                result = joined => result?,
            }
        }
        None => joined.await?,
    };

    let mut resolved = PageData::new();
    for (field, slot) in slots {
        let value = match slot {
            Slot::Literal(v) => v.clone(),
            Slot::Call(index) => std::mem::take(&mut values[index]),
        };
        resolved.insert(field.clone(), value);
    }

    Ok(resolved)
}

async fn resolve_call(
    field: &str,
    call: CallExpr,
    function: Arc<dyn CmsFunction>,
    args: Vec<Value>,
    options: &ResolveOptions,
) -> Result<Value> {
    let value = function
        .call(args)
        .await
        .map_err(|source| CmsError::ResolutionFailure {
            field: field.to_string(),
            expression: call.source.clone(),
            source,
        })?;

    if options.debug {
        options
            .observer
            .on_call_resolved(field, &call.source, &value);
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FunctionError, constant};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn page(value: Value) -> PageData {
        match value {
            Value::Object(map) => map,
            _ => panic!("test page data must be an object"),
        }
    }

    fn ctx_for(data: &PageData) -> ResolutionContext {
        ResolutionContext::new(json!({ "path": "/page-one" }), Value::Object(data.clone()))
    }

    #[derive(Default)]
    struct RecordingObserver {
        records: Mutex<Vec<(String, String, Value)>>,
    }

    impl ResolveObserver for RecordingObserver {
        fn on_call_resolved(&self, field: &str, expression: &str, value: &Value) {
            self.records.lock().unwrap().push((
                field.to_string(),
                expression.to_string(),
                value.clone(),
            ));
        }
    }

    #[tokio::test]
    async fn test_literals_pass_through_with_empty_registry() {
        let data = page(json!({
            "_template": "",
            "key1": "value1",
            "count": 3,
            "nested": { "hero": "getImage()" },
            "sentence": "blah asdjasd a getImage()"
        }));
        let resolved = resolve_data(
            &data,
            &FunctionRegistry::empty(),
            &ctx_for(&data),
            &ResolveOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(resolved, data);
    }

    #[tokio::test]
    async fn test_resolves_call_fields() {
        let data = page(json!({
            "_template": "",
            "key1": "value1",
            "hero": "getImage()"
        }));
        let registry = FunctionRegistry::builder()
            .register("getImage", constant(json!({ "image": "x.jpg" })))
            .unwrap()
            .build();
        let resolved = resolve_data(&data, &registry, &ctx_for(&data), &ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(
            Value::Object(resolved),
            json!({ "_template": "", "key1": "value1", "hero": { "image": "x.jpg" } })
        );
    }

    #[tokio::test]
    async fn test_namespaced_call_with_page_argument() {
        let data = page(json!({ "key1": "value1", "hero": "utils.getImage(page.key1, 'large')" }));
        let registry = FunctionRegistry::builder()
            .register_fn("utils.getImage", |args| async move { Ok(Value::Array(args)) })
            .unwrap()
            .build();
        let resolved = resolve_data(&data, &registry, &ctx_for(&data), &ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(resolved["hero"], json!(["value1", "large"]));
    }

    #[tokio::test]
    async fn test_arguments_see_pre_resolution_page() {
        let data = page(json!({ "a": "first()", "b": "echo(page.a)" }));
        let registry = FunctionRegistry::builder()
            .register("first", constant(json!("resolved")))
            .unwrap()
            .register_fn("echo", |args| async move {
                Ok(args.into_iter().next().unwrap_or_default())
            })
            .unwrap()
            .build();
        let resolved = resolve_data(&data, &registry, &ctx_for(&data), &ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(resolved["b"], json!("first()"));
    }

    #[tokio::test]
    async fn test_every_function_called_exactly_once() {
        let counters: Vec<Arc<AtomicUsize>> = (0..5).map(|_| Arc::new(AtomicUsize::new(0))).collect();
        let mut builder = FunctionRegistry::builder();
        let mut fields = serde_json::Map::new();
        for (i, counter) in counters.iter().enumerate() {
            let counter = counter.clone();
            builder = builder
                .register_fn(&format!("fns.f{}", i), move |_args| {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(json!(i))
                    }
                })
                .unwrap();
            fields.insert(format!("field{}", i), json!(format!("fns.f{}()", i)));
        }
        let registry = builder.build();

        let resolved = resolve_data(&fields, &registry, &ctx_for(&fields), &ResolveOptions::default())
            .await
            .unwrap();

        for (i, counter) in counters.iter().enumerate() {
            assert_eq!(counter.load(Ordering::SeqCst), 1, "fns.f{} call count", i);
            assert_eq!(resolved[&format!("field{}", i)], json!(i));
        }
    }

    #[tokio::test]
    async fn test_calls_run_concurrently() {
        // Each function waits for the other; sequential execution would never finish.
        let barrier = Arc::new(tokio::sync::Barrier::new(2));
        let b1 = barrier.clone();
        let b2 = barrier.clone();
        let registry = FunctionRegistry::builder()
            .register_fn("left", move |_| {
                let b = b1.clone();
                async move {
                    b.wait().await;
                    Ok(json!("left"))
                }
            })
            .unwrap()
            .register_fn("right", move |_| {
                let b = b2.clone();
                async move {
                    b.wait().await;
                    Ok(json!("right"))
                }
            })
            .unwrap()
            .build();
        let data = page(json!({ "a": "left()", "b": "right()" }));

        let resolved = tokio::time::timeout(
            Duration::from_secs(5),
            resolve_data(&data, &registry, &ctx_for(&data), &ResolveOptions::default()),
        )
        .await
        .expect("calls should run concurrently")
        .unwrap();
        assert_eq!(Value::Object(resolved), json!({ "a": "left", "b": "right" }));
    }

    #[tokio::test]
    async fn test_output_keeps_field_order() {
        let registry = FunctionRegistry::builder()
            .register_fn("slow", |_| async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(json!("slow"))
            })
            .unwrap()
            .register("fast", constant(json!("fast")))
            .unwrap()
            .build();
        let data = page(json!({ "z": "slow()", "m": 1, "a": "fast()" }));
        let resolved = resolve_data(&data, &registry, &ctx_for(&data), &ResolveOptions::default())
            .await
            .unwrap();
        let keys: Vec<&str> = resolved.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "m", "a"]);
    }

    #[tokio::test]
    async fn test_unresolved_function_fails_without_calls() {
        let called = Arc::new(AtomicUsize::new(0));
        let c = called.clone();
        let registry = FunctionRegistry::builder()
            .register_fn("known", move |_| {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::Null)
                }
            })
            .unwrap()
            .build();
        let data = page(json!({ "a": "known()", "b": "utils.unknown()" }));
        let err = resolve_data(&data, &registry, &ctx_for(&data), &ResolveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CmsError::UnresolvedFunction { ref name } if name == "utils.unknown"));
        assert_eq!(called.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_call_fails_everything() {
        let registry = FunctionRegistry::builder()
            .register("ok", constant(json!("fine")))
            .unwrap()
            .register_fn("broken", |_| async {
                Err::<Value, FunctionError>("service unavailable".into())
            })
            .unwrap()
            .build();
        let data = page(json!({ "a": "ok()", "b": "broken(page.a)" }));
        let err = resolve_data(&data, &registry, &ctx_for(&data), &ResolveOptions::default())
            .await
            .unwrap_err();
        match err {
            CmsError::ResolutionFailure {
                field,
                expression,
                source,
            } => {
                assert_eq!(field, "b");
                assert_eq!(expression, "broken(page.a)");
                assert_eq!(source.to_string(), "service unavailable");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancellation() {
        let registry = FunctionRegistry::builder()
            .register_fn("forever", |_| futures::future::pending())
            .unwrap()
            .build();
        let data = page(json!({ "a": "forever()" }));
        let token = CancellationToken::new();
        token.cancel();
        let options = ResolveOptions::default().with_cancel(token);
        let err = resolve_data(&data, &registry, &ctx_for(&data), &options)
            .await
            .unwrap_err();
        assert!(matches!(err, CmsError::Cancelled));
    }

    #[tokio::test]
    async fn test_debug_records_each_resolved_call() {
        let registry = FunctionRegistry::builder()
            .register("getImage", constant(json!({ "image": "x.jpg" })))
            .unwrap()
            .build();
        let data = page(json!({ "title": "Hello", "hero": "getImage()" }));
        let observer = Arc::new(RecordingObserver::default());

        let options = ResolveOptions::default().with_observer(observer.clone());
        resolve_data(&data, &registry, &ctx_for(&data), &options)
            .await
            .unwrap();
        assert!(observer.records.lock().unwrap().is_empty());

        let options = options.debug(true);
        resolve_data(&data, &registry, &ctx_for(&data), &options)
            .await
            .unwrap();
        assert_eq!(
            *observer.records.lock().unwrap(),
            vec![(
                "hero".to_string(),
                "getImage()".to_string(),
                json!({ "image": "x.jpg" })
            )]
        );
    }
}
