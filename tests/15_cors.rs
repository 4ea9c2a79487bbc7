mod common;

use anyhow::Result;
use axum::http::header;

use common::{header_list, preflight, router, router_with, seeded_store, test_config};

const FRONT_END: &str = "http://localhost:3000";

#[tokio::test]
async fn configured_origin_is_allowed_with_credentials() -> Result<()> {
    let store = seeded_store();

    let (status, headers) = preflight(router(&store), "/messages", FRONT_END, "POST").await?;

    assert!(status.is_success());
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).and_then(|v| v.to_str().ok()),
        Some(FRONT_END)
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).and_then(|v| v.to_str().ok()),
        Some("true")
    );
    let methods = header_list(&headers, header::ACCESS_CONTROL_ALLOW_METHODS);
    assert!(methods.contains(&"POST".to_string()), "{:?}", methods);
    assert_eq!(store.request_count(), 0);
    Ok(())
}

#[tokio::test]
async fn foreign_origin_gets_no_allow_origin() -> Result<()> {
    let store = seeded_store();

    for path in ["/messages", "/messages/delete", "/health"] {
        let (_, headers) = preflight(router(&store), path, "http://evil.example", "POST").await?;
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none(), "{}", path);
    }

    assert_eq!(store.request_count(), 0);
    Ok(())
}

#[tokio::test]
async fn only_get_and_post_are_advertised() -> Result<()> {
    let store = seeded_store();

    for method in ["PUT", "DELETE", "PATCH"] {
        let (_, headers) = preflight(router(&store), "/messages", FRONT_END, method).await?;
        let methods = header_list(&headers, header::ACCESS_CONTROL_ALLOW_METHODS);
        assert!(!methods.contains(&method.to_string()), "{} advertised: {:?}", method, methods);
        assert!(methods.iter().all(|m| m == "GET" || m == "POST"), "{:?}", methods);
    }
    Ok(())
}

#[tokio::test]
async fn origin_list_comes_from_config() -> Result<()> {
    let store = seeded_store();
    let mut config = test_config();
    config.security.cors_origins = vec!["https://messages.acme.io".to_string()];

    let (_, headers) = preflight(router_with(&store, config.clone()), "/messages", "https://messages.acme.io", "POST").await?;
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).and_then(|v| v.to_str().ok()),
        Some("https://messages.acme.io")
    );

    // The development default is no longer in the list
    let (_, headers) = preflight(router_with(&store, config), "/messages", FRONT_END, "POST").await?;
    assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    Ok(())
}
