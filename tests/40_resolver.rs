mod common;

use std::sync::Arc;

use anyhow::Result;
use tenant_router::router::ResolveError;

use common::{tenant, TestApp};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_access_across_threads_fetches_once() -> Result<()> {
    let app = TestApp::new([tenant("A1", "postgres://db-a/app", "a1-secret", None)?]);

    let handles: Vec<_> = (0..64)
        .map(|_| {
            let resolver = app.resolver.clone();
            tokio::spawn(async move { resolver.get_client_for_tenant("A1", false).await })
        })
        .collect();

    let mut clients = Vec::new();
    for handle in handles {
        clients.push(handle.await??.client);
    }

    assert_eq!(app.registry.reads(), 1);
    assert_eq!(app.factory.builds(), 1);
    assert!(clients.iter().all(|c| Arc::ptr_eq(c, &clients[0])));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_tenants_resolve_independently() -> Result<()> {
    let app = TestApp::new([
        tenant("A1", "postgres://db-a/app", "a1-secret", Some("legacy-77"))?,
        tenant("C3", "postgres://db-c/app", "c3-secret", None)?,
    ]);

    let (a1, c3, b2) = tokio::join!(
        app.resolver.get_client_for_tenant("A1", false),
        app.resolver.get_client_for_tenant("C3", false),
        app.resolver.get_client_for_tenant("B2", false),
    );

    let (a1, c3) = (a1?, c3?);
    assert_eq!(a1.data_source_tenant_id, "legacy-77");
    assert_eq!(c3.data_source_tenant_id, "C3");
    assert!(!Arc::ptr_eq(&a1.client, &c3.client));
    assert_eq!(b2.unwrap_err(), ResolveError::NotConfigured);
    assert_eq!(app.registry.reads(), 3);
    Ok(())
}

#[tokio::test]
async fn force_refresh_builds_a_new_client() -> Result<()> {
    let app = TestApp::new([tenant("A1", "postgres://db-a/app", "a1-secret", None)?]);

    let first = app.resolver.get_client_for_tenant("A1", false).await?;
    let refreshed = app.resolver.get_client_for_tenant("A1", true).await?;

    assert!(!Arc::ptr_eq(&first.client, &refreshed.client));
    assert_eq!(app.registry.reads(), 2);
    Ok(())
}
