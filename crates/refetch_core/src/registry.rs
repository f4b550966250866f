// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The closed set of endpoints an engine serves.

use std::collections::HashMap;
use std::sync::Arc;

use crate::endpoint::{Endpoint, EndpointKind};
use crate::error::{Error, Result};

/// An immutable name-to-endpoint map, validated at construction.
///
/// Registration happens once, before the engine starts serving requests, so
/// lookups never race with modification and a duplicate name is a
/// construction-time error rather than a runtime surprise.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    endpoints: HashMap<String, Arc<Endpoint>>,
}

impl Registry {
    /// Builds a registry from a list of endpoint definitions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateEndpoint`] if two definitions share a name.
    pub fn from_endpoints(endpoints: impl IntoIterator<Item = Endpoint>) -> Result<Self> {
        let mut map = HashMap::new();
        for endpoint in endpoints {
            let name = endpoint.name().to_string();
            if map.insert(name.clone(), Arc::new(endpoint)).is_some() {
                return Err(Error::DuplicateEndpoint { name });
            }
        }
        Ok(Self { endpoints: map })
    }

    /// Looks up a query endpoint by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEndpoint`] if the name is not registered or
    /// names a mutation endpoint.
    pub fn resolve_query(&self, name: &str) -> Result<Arc<Endpoint>> {
        self.resolve(name, EndpointKind::Query)
    }

    /// Looks up a mutation endpoint by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownEndpoint`] if the name is not registered or
    /// names a query endpoint.
    pub fn resolve_mutation(&self, name: &str) -> Result<Arc<Endpoint>> {
        self.resolve(name, EndpointKind::Mutation)
    }

    fn resolve(&self, name: &str, kind: EndpointKind) -> Result<Arc<Endpoint>> {
        match self.endpoints.get(name) {
            Some(endpoint) if endpoint.kind() == kind => Ok(Arc::clone(endpoint)),
            _ => Err(Error::UnknownEndpoint {
                name: name.to_string(),
                kind,
            }),
        }
    }

    /// The number of registered endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    fn noop_query(name: &str) -> Endpoint {
        Endpoint::query(name, |_, _| async { Ok(Value::Null) })
    }

    fn noop_mutation(name: &str) -> Endpoint {
        Endpoint::mutation(name, |_, _| async { Ok(Value::Null) })
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = Registry::from_endpoints([noop_query("getPosts"), noop_query("getPosts")]);
        assert!(matches!(
            result,
            Err(Error::DuplicateEndpoint { name }) if name == "getPosts"
        ));
    }

    #[test]
    fn duplicate_check_spans_kinds() {
        let result = Registry::from_endpoints([noop_query("posts"), noop_mutation("posts")]);
        assert!(matches!(result, Err(Error::DuplicateEndpoint { .. })));
    }

    #[test]
    fn resolve_enforces_the_endpoint_kind() {
        let registry =
            Registry::from_endpoints([noop_query("getPosts"), noop_mutation("deletePost")])
                .expect("no duplicates");

        assert!(registry.resolve_query("getPosts").is_ok());
        assert!(registry.resolve_mutation("deletePost").is_ok());

        let err = registry
            .resolve_mutation("getPosts")
            .expect_err("kind mismatch");
        assert!(matches!(
            err,
            Error::UnknownEndpoint { name, kind: EndpointKind::Mutation } if name == "getPosts"
        ));
    }

    #[test]
    fn unknown_names_fail_resolution() {
        let registry = Registry::from_endpoints([]).expect("empty is fine");
        assert!(registry.resolve_query("missing").is_err());
        assert!(registry.is_empty());
    }
}
