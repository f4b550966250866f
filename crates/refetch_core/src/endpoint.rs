// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Endpoint definitions: named operations with handlers and tag rules.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::TransportError;
use crate::key::CacheKey;
use crate::tag::Tag;
use crate::token::CancelToken;

/// Whether an endpoint reads data or changes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointKind {
    /// A read operation whose results are cached and shared.
    Query,
    /// A write operation that runs once per invocation and invalidates tags.
    Mutation,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
        })
    }
}

type ExecuteFn =
    Arc<dyn Fn(Value, CancelToken) -> BoxFuture<'static, Result<Value, TransportError>> + Send + Sync>;
type TagsFn = Arc<dyn Fn(&Value) -> Vec<Tag> + Send + Sync>;
type KeyFn = Arc<dyn Fn(&Value) -> CacheKey + Send + Sync>;

/// A named operation the engine knows how to execute.
///
/// Endpoints are defined up front and registered with the engine builder;
/// the set is closed once the engine is built. A query endpoint declares the
/// tags its results provide, a mutation endpoint the tags it invalidates.
/// Both rules may depend on the arguments of the individual call.
///
/// # Examples
///
/// ```
/// use refetch_core::{Endpoint, Tag};
/// use serde_json::json;
///
/// let get_post = Endpoint::query("getPost", |args, _token| async move {
///     Ok(json!({"id": args["id"], "name": "A post"}))
/// })
/// .provides(|args| vec![Tag::new(format!("Post:{}", args["id"]))]);
///
/// assert_eq!(get_post.cache_key(&json!({"id": 7})).as_str(), r#"getPost({"id":7})"#);
/// assert_eq!(get_post.provided_tags(&json!({"id": 7})), vec![Tag::new("Post:7")]);
/// ```
#[derive(Clone)]
pub struct Endpoint {
    name: String,
    kind: EndpointKind,
    execute: ExecuteFn,
    key_fn: Option<KeyFn>,
    provides: Option<TagsFn>,
    invalidates: Option<TagsFn>,
}

impl Endpoint {
    /// Defines a query endpoint with the given handler.
    pub fn query<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value, CancelToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TransportError>> + Send + 'static,
    {
        Self::new(name, EndpointKind::Query, handler)
    }

    /// Defines a mutation endpoint with the given handler.
    pub fn mutation<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value, CancelToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TransportError>> + Send + 'static,
    {
        Self::new(name, EndpointKind::Mutation, handler)
    }

    fn new<F, Fut>(name: impl Into<String>, kind: EndpointKind, handler: F) -> Self
    where
        F: Fn(Value, CancelToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TransportError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            kind,
            execute: Arc::new(move |args, token| Box::pin(handler(args, token))),
            key_fn: None,
            provides: None,
            invalidates: None,
        }
    }

    /// Sets the tags this endpoint's results provide. Query endpoints only.
    #[must_use]
    pub fn provides(mut self, tags: impl Fn(&Value) -> Vec<Tag> + Send + Sync + 'static) -> Self {
        self.provides = Some(Arc::new(tags));
        self
    }

    /// Sets the tags a successful invocation invalidates. Mutation endpoints
    /// only.
    #[must_use]
    pub fn invalidates(mut self, tags: impl Fn(&Value) -> Vec<Tag> + Send + Sync + 'static) -> Self {
        self.invalidates = Some(Arc::new(tags));
        self
    }

    /// Overrides cache key derivation for this endpoint.
    ///
    /// The default derives `name(stable_args)`; a custom function can, for
    /// instance, ignore argument fields that do not affect the result.
    #[must_use]
    pub fn key_fn(mut self, key: impl Fn(&Value) -> CacheKey + Send + Sync + 'static) -> Self {
        self.key_fn = Some(Arc::new(key));
        self
    }

    /// The endpoint's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is a query or a mutation endpoint.
    #[must_use]
    pub fn kind(&self) -> EndpointKind {
        self.kind
    }

    /// Derives the cache key for a call with the given arguments.
    #[must_use]
    pub fn cache_key(&self, args: &Value) -> CacheKey {
        match &self.key_fn {
            Some(key) => key(args),
            None => CacheKey::derive(&self.name, args),
        }
    }

    /// The tags a result for the given arguments provides.
    #[must_use]
    pub fn provided_tags(&self, args: &Value) -> Vec<Tag> {
        self.provides.as_ref().map_or_else(Vec::new, |f| f(args))
    }

    /// The tags a successful call with the given arguments invalidates.
    #[must_use]
    pub fn invalidated_tags(&self, args: &Value) -> Vec<Tag> {
        self.invalidates.as_ref().map_or_else(Vec::new, |f| f(args))
    }

    /// Starts the handler for one request.
    ///
    /// The handler is invoked synchronously; the returned future completes
    /// when the transport does.
    pub fn start(
        &self,
        args: Value,
        token: CancelToken,
    ) -> BoxFuture<'static, Result<Value, TransportError>> {
        (self.execute)(args, token)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("has_key_fn", &self.key_fn.is_some())
            .field("has_provides", &self.provides.is_some())
            .field("has_invalidates", &self.invalidates.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn default_key_uses_stable_args() {
        let endpoint = Endpoint::query("getPost", |_, _| async { Ok(Value::Null) });
        let key = endpoint.cache_key(&json!({"b": 2, "a": 1}));
        assert_eq!(key.as_str(), r#"getPost({"a":1,"b":2})"#);
    }

    #[test]
    fn custom_key_fn_takes_precedence() {
        let endpoint = Endpoint::query("getPost", |_, _| async { Ok(Value::Null) })
            .key_fn(|args| CacheKey::from_raw(format!("post-{}", args["id"])));
        assert_eq!(endpoint.cache_key(&json!({"id": 3})).as_str(), "post-3");
    }

    #[test]
    fn tags_default_to_empty() {
        let endpoint = Endpoint::mutation("deletePost", |_, _| async { Ok(Value::Null) });
        assert!(endpoint.provided_tags(&json!(1)).is_empty());
        assert!(endpoint.invalidated_tags(&json!(1)).is_empty());
    }

    #[test]
    fn arg_dependent_tags_see_the_arguments() {
        let endpoint = Endpoint::mutation("deletePost", |_, _| async { Ok(Value::Null) })
            .invalidates(|args| vec![Tag::new(format!("Post:{args}")), Tag::new("Post:LIST")]);
        assert_eq!(
            endpoint.invalidated_tags(&json!(2)),
            vec![Tag::new("Post:2"), Tag::new("Post:LIST")]
        );
    }

    #[test]
    fn start_runs_the_handler() {
        let endpoint = Endpoint::query("ping", |args, _| async move { Ok(args) });
        let result = futures::executor::block_on(endpoint.start(json!("pong"), CancelToken::new()));
        assert_eq!(result, Ok(json!("pong")));
    }
}
