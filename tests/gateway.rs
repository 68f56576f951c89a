//! Gateway server driven by a TOML config.

use std::time::Duration;

use route_proxy::config::parse_config;
use route_proxy::{GatewayServer, Shutdown};
use tokio::net::TcpListener;

mod common;

#[tokio::test]
async fn test_configured_routes_forward() {
    let (users, users_recorder) = common::start_recording_backend(200, "users").await;
    let closed = common::closed_addr().await;

    let config = parse_config(&format!(
        r#"
        [listener]
        bind_address = "127.0.0.1:0"

        [[routes]]
        name = "users"
        path = "/users/{{*rest}}"
        host = "http://{users}"

        [routes.options]
        headers = {{ x-gateway = "route-proxy" }}

        [[routes]]
        name = "down"
        path = "/down"
        host = "http://{closed}"
        "#
    ))
    .unwrap();

    let shutdown = Shutdown::new();
    let server = GatewayServer::new(config);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let gateway = listener.local_addr().unwrap();
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    let client = common::client();

    let res = client
        .post(format!("http://{gateway}/users/42?expand=true"))
        .header("content-type", "application/x-www-form-urlencoded")
        .body("name=Ada&roles[]=admin")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "users");

    let received = users_recorder.last().unwrap();
    assert_eq!(received.uri, "/users/42?expand=true");
    assert_eq!(received.body, "name=Ada&roles[]=admin".as_bytes());
    assert_eq!(received.headers["x-gateway"], "route-proxy");
    assert!(received.headers.contains_key("x-request-id"));

    let res = client
        .get(format!("http://{gateway}/down"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 500);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["message"], "Backend service is down (ECONNREFUSED)");

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}
