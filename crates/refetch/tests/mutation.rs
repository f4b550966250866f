// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for mutations and tag-driven invalidation.

use refetch::{Clock, Endpoint, Engine, MutationOptions, QueryStatus, Tag};
use refetch_core::testing::FakeTransport;
use serde_json::{Value, json};

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

/// Queries and mutations go through separate transports so tests can tell
/// refetch traffic from mutation traffic.
fn engine_with(queries: &FakeTransport, mutations: &FakeTransport) -> Engine {
    Engine::builder(Clock::system())
        .endpoint(
            Endpoint::query("getPosts", queries.handler())
                .provides(|_| vec![Tag::new("Post:LIST")]),
        )
        .endpoint(
            Endpoint::query("getUser", queries.handler()).provides(|args| {
                vec![Tag::new(format!("User:{args}"))]
            }),
        )
        .endpoint(
            Endpoint::mutation("deletePost", mutations.handler()).invalidates(|args| {
                vec![Tag::new(format!("Post:{args}")), Tag::new("Post:LIST")]
            }),
        )
        .build()
        .expect("endpoint names are unique")
}

#[tokio::test]
async fn a_successful_mutation_refetches_providing_queries() {
    let queries = FakeTransport::new();
    let mutations = FakeTransport::new();
    let engine = engine_with(&queries, &mutations);

    let posts = engine.subscribe("getPosts", Value::Null).expect("known endpoint");
    let user = engine.subscribe("getUser", json!(9)).expect("known endpoint");
    queries.resolve_next(Ok(json!([{"id": 1}, {"id": 2}])));
    queries.resolve_next(Ok(json!({"id": 9})));
    settle().await;
    assert_eq!(queries.call_count(), 2);

    let active = engine
        .invoke("deletePost", json!(2), MutationOptions::new())
        .expect("known endpoint");
    settle().await;
    assert_eq!(mutations.calls(), vec![json!(2)]);

    mutations.resolve_next(Ok(Value::Null));
    let result = active.await;
    assert_eq!(result, Ok(Value::Null));

    // By the time the mutation resolves, the list query is already pending
    // again; the unrelated user query is untouched.
    let snapshot = engine.snapshot();
    let list = snapshot.entry(posts.key()).expect("entry exists");
    assert_eq!(list.status(), QueryStatus::Pending);
    assert_eq!(list.data(), Some(&json!([{"id": 1}, {"id": 2}])));
    assert_eq!(
        snapshot.entry(user.key()).expect("entry exists").status(),
        QueryStatus::Fulfilled
    );
    assert_eq!(queries.call_count(), 3);

    queries.resolve_next(Ok(json!([{"id": 1}])));
    settle().await;
    assert_eq!(
        engine.snapshot().entry(posts.key()).expect("entry exists").data(),
        Some(&json!([{"id": 1}]))
    );
}

#[tokio::test]
async fn a_failed_mutation_invalidates_nothing() {
    let queries = FakeTransport::new();
    let mutations = FakeTransport::new();
    let engine = engine_with(&queries, &mutations);

    let posts = engine.subscribe("getPosts", Value::Null).expect("known endpoint");
    queries.resolve_next(Ok(json!([{"id": 1}])));
    settle().await;

    let active = engine
        .invoke("deletePost", json!(1), MutationOptions::new())
        .expect("known endpoint");
    mutations.resolve_next(Err(refetch::TransportError::new("forbidden")));

    let result = active.await;
    assert_eq!(result, Err(refetch::TransportError::new("forbidden")));

    assert_eq!(queries.call_count(), 1);
    assert_eq!(
        engine.snapshot().entry(posts.key()).expect("entry exists").status(),
        QueryStatus::Fulfilled
    );
}

#[tokio::test]
async fn untracked_mutation_records_vanish_after_settlement() {
    let queries = FakeTransport::new();
    let mutations = FakeTransport::new();
    let engine = engine_with(&queries, &mutations);

    let active = engine
        .invoke("deletePost", json!(1), MutationOptions::new())
        .expect("known endpoint");
    let id = active.request_id();
    assert!(engine.snapshot().mutation(id).is_some());

    mutations.resolve_next(Ok(Value::Null));
    active.await.expect("mutation succeeds");
    assert!(engine.snapshot().mutation(id).is_none());
}

#[tokio::test]
async fn tracked_mutations_are_observable_until_forgotten() {
    let queries = FakeTransport::new();
    let mutations = FakeTransport::new();
    let engine = engine_with(&queries, &mutations);

    let active = engine
        .invoke("deletePost", json!(7), MutationOptions::tracked())
        .expect("known endpoint");
    let id = active.request_id();
    let selector = engine.select_mutation(id);

    let view = selector.view(&engine.snapshot());
    assert!(view.is_loading);

    mutations.resolve_next(Ok(json!({"deleted": 7})));
    active.await.expect("mutation succeeds");

    let view = selector.view(&engine.snapshot());
    assert!(view.is_success);
    assert_eq!(view.result, Some(json!({"deleted": 7})));

    engine.forget_mutation(id);
    let view = selector.view(&engine.snapshot());
    assert!(view.is_uninitialized);
}

#[tokio::test]
async fn mutations_never_deduplicate() {
    let queries = FakeTransport::new();
    let mutations = FakeTransport::new();
    let engine = engine_with(&queries, &mutations);

    let a = engine
        .invoke("deletePost", json!(1), MutationOptions::new())
        .expect("known endpoint");
    let b = engine
        .invoke("deletePost", json!(1), MutationOptions::new())
        .expect("known endpoint");

    assert_ne!(a.request_id(), b.request_id());
    assert_eq!(mutations.call_count(), 2);
}

#[tokio::test]
async fn invoking_a_query_endpoint_as_a_mutation_fails() {
    let queries = FakeTransport::new();
    let mutations = FakeTransport::new();
    let engine = engine_with(&queries, &mutations);

    assert!(engine
        .invoke("getPosts", Value::Null, MutationOptions::new())
        .is_err());
    assert_eq!(queries.call_count(), 0);
}
