mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use tenant_router::registry::TenantStatus;

use common::{tenant, TestApp};

#[tokio::test]
async fn context_carries_the_mapped_identifier() -> Result<()> {
    let app = TestApp::new([tenant("A1", "postgres://db-a/app", "a1-secret", Some("legacy-77"))?]);
    let token = app.token("A1", "full")?;

    let (status, body) = app.call(Method::GET, "/api/tenant/context", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["data_source_tenant_id"], "legacy-77");
    assert_eq!(body["data"]["scope_predicate"], "tenant_id = $1");
    assert_eq!(body["data"]["calling_user"]["tenant_id"], "A1");
    assert_eq!(body["data"]["calling_user"]["user_id"], "user-1");
    Ok(())
}

#[tokio::test]
async fn repeated_requests_reuse_the_cached_client() -> Result<()> {
    let app = TestApp::new([tenant("A1", "postgres://db-a/app", "a1-secret", None)?]);
    let token = app.token("A1", "full")?;

    for _ in 0..5 {
        let (status, _) = app.call(Method::GET, "/api/tenant/context", Some(&token)).await?;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(app.registry.reads(), 1);
    assert_eq!(app.factory.builds(), 1);
    Ok(())
}

#[tokio::test]
async fn every_resolution_failure_looks_the_same() -> Result<()> {
    let mut suspended = tenant("S1", "postgres://db-s/app", "s1-secret", None)?;
    suspended.status = Some(TenantStatus::Suspended);
    let mut broken = tenant("X1", "postgres://db-x/app", "x1-secret", None)?;
    if let Some(descriptor) = broken.data_source.as_mut() {
        descriptor.encrypted_read_credential = "enc:v1:v9:AAAAAAAAAAAAAAAA:AAAA".to_string();
    }
    let app = TestApp::new([suspended, broken]);

    let mut bodies = Vec::new();
    for tenant_id in ["B2", "S1", "X1"] {
        let token = app.token(tenant_id, "full")?;
        let (status, body) = app.call(Method::GET, "/api/tenant/context", Some(&token)).await?;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "tenant {tenant_id}");
        bodies.push(body);
    }

    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[1], bodies[2]);
    assert_eq!(bodies[0]["message"], "Service temporarily unavailable");
    Ok(())
}

#[tokio::test]
async fn unknown_tenant_is_not_negatively_cached() -> Result<()> {
    let app = TestApp::new([]);
    let token = app.token("B2", "full")?;

    app.call(Method::GET, "/api/tenant/context", Some(&token)).await?;
    app.call(Method::GET, "/api/tenant/context", Some(&token)).await?;
    assert_eq!(app.registry.reads(), 2);

    // Provisioning the tenant takes effect on the very next request.
    app.registry.upsert(tenant("B2", "postgres://db-b/app", "b2-secret", None)?);
    let (status, _) = app.call(Method::GET, "/api/tenant/context", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}
