//! TTL and lazy-expiration behavior over a live connection.

use std::time::Duration;

use crate::helpers::TestServer;

#[tokio::test]
async fn key_expires_after_ttl() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    client.ok(&["SET", "k", "v"]).await;
    assert_eq!(client.get_int(&["EXPIRE", "k", "1"]).await, 1);

    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(client.get_int(&["EXISTS", "k"]).await, 0);
    assert_eq!(client.get_int(&["TTL", "k"]).await, -2);
    assert_eq!(client.get_bulk(&["GET", "k"]).await, None);
}

#[tokio::test]
async fn ttl_reply_codes() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    assert_eq!(client.get_int(&["TTL", "missing"]).await, -2);

    client.ok(&["SET", "k", "v"]).await;
    assert_eq!(client.get_int(&["TTL", "k"]).await, -1);

    assert_eq!(client.get_int(&["EXPIRE", "k", "100"]).await, 1);
    let ttl = client.get_int(&["TTL", "k"]).await;
    assert!((98..=100).contains(&ttl), "ttl was {ttl}");
}

#[tokio::test]
async fn expire_on_missing_key_returns_zero() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    assert_eq!(client.get_int(&["EXPIRE", "missing", "60"]).await, 0);
}

#[tokio::test]
async fn set_with_ex_and_px() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    client.ok(&["SET", "a", "v", "EX", "100"]).await;
    let ttl = client.get_int(&["TTL", "a"]).await;
    assert!((98..=100).contains(&ttl), "ttl was {ttl}");

    client.ok(&["SET", "b", "v", "PX", "300"]).await;
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(client.get_bulk(&["GET", "b"]).await, None);
}

#[tokio::test]
async fn overwrite_clears_ttl() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    client.ok(&["SET", "k", "v", "EX", "100"]).await;
    client.ok(&["SET", "k", "w"]).await;
    assert_eq!(client.get_int(&["TTL", "k"]).await, -1);
}

#[tokio::test]
async fn expired_keys_hidden_from_keys() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    client.ok(&["SET", "live", "v"]).await;
    client.ok(&["SET", "dead", "v", "PX", "100"]).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(client.get_list(&["KEYS", "*"]).await, vec!["live"]);
}
