//! String and keyspace commands over a live connection.

use bytes::Bytes;
use cinder_protocol::Frame;

use crate::helpers::TestServer;

#[tokio::test]
async fn set_get_del() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    client.ok(&["SET", "a", "hello"]).await;
    assert_eq!(client.get_bulk(&["GET", "a"]).await, Some("hello".into()));
    assert_eq!(client.get_int(&["DEL", "a"]).await, 1);
    assert_eq!(client.get_bulk(&["GET", "a"]).await, None);
    assert_eq!(client.get_int(&["DEL", "a"]).await, 0);
}

#[tokio::test]
async fn setnx_first_writer_wins() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    assert_eq!(client.get_int(&["SETNX", "k", "v1"]).await, 1);
    assert_eq!(client.get_int(&["SETNX", "k", "v2"]).await, 0);
    assert_eq!(client.get_bulk(&["GET", "k"]).await, Some("v1".into()));
}

#[tokio::test]
async fn set_nx_xx_options() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    // XX on a missing key is blocked
    assert_eq!(client.cmd(&["SET", "k", "v", "XX"]).await, Frame::Null);
    // NX on a missing key applies
    client.ok(&["SET", "k", "v", "NX"]).await;
    // NX again is blocked
    assert_eq!(client.cmd(&["SET", "k", "w", "NX"]).await, Frame::Null);
    // conflicting options are a syntax error
    let msg = client.err(&["SET", "k", "v", "NX", "XX"]).await;
    assert!(msg.contains("syntax error"), "got: {msg}");
}

#[tokio::test]
async fn incr_decr() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    assert_eq!(client.get_int(&["INCR", "n"]).await, 1);
    assert_eq!(client.get_int(&["INCR", "n"]).await, 2);
    assert_eq!(client.get_int(&["DECR", "n"]).await, 1);

    client.ok(&["SET", "s", "abc"]).await;
    let msg = client.err(&["INCR", "s"]).await;
    assert!(msg.contains("not an integer"), "got: {msg}");
}

#[tokio::test]
async fn getrange_and_strlen() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    client.ok(&["SET", "k", "Hello World"]).await;
    assert_eq!(
        client.get_bulk(&["GETRANGE", "k", "0", "4"]).await,
        Some("Hello".into())
    );
    assert_eq!(
        client.get_bulk(&["GETRANGE", "k", "-5", "-1"]).await,
        Some("World".into())
    );
    assert_eq!(
        client.get_bulk(&["GETRANGE", "missing", "0", "-1"]).await,
        Some(String::new())
    );
    assert_eq!(client.get_int(&["STRLEN", "k"]).await, 11);
    assert_eq!(client.get_int(&["STRLEN", "missing"]).await, 0);
}

#[tokio::test]
async fn exists_counts_keys() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    client.ok(&["SET", "a", "1"]).await;
    client.ok(&["SET", "b", "2"]).await;
    assert_eq!(client.get_int(&["EXISTS", "a", "b", "missing"]).await, 2);
    assert_eq!(client.get_int(&["EXISTS", "missing"]).await, 0);
}

#[tokio::test]
async fn rename_moves_value() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    client.ok(&["SET", "a", "1"]).await;
    client.ok(&["SET", "b", "2"]).await;
    client.ok(&["RENAME", "a", "b"]).await;
    assert_eq!(client.get_bulk(&["GET", "b"]).await, Some("1".into()));
    assert_eq!(client.get_int(&["EXISTS", "a"]).await, 0);

    let msg = client.err(&["RENAME", "missing", "x"]).await;
    assert!(msg.contains("no such key"), "got: {msg}");
}

#[tokio::test]
async fn type_reports_value_kind() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    assert_eq!(
        client.cmd(&["TYPE", "nope"]).await,
        Frame::Simple("none".into())
    );
    client.ok(&["SET", "s", "v"]).await;
    client.get_int(&["RPUSH", "l", "a"]).await;
    assert_eq!(
        client.cmd(&["TYPE", "s"]).await,
        Frame::Simple("string".into())
    );
    assert_eq!(
        client.cmd(&["TYPE", "l"]).await,
        Frame::Simple("list".into())
    );
}

#[tokio::test]
async fn wrongtype_errors() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    client.get_int(&["RPUSH", "l", "a"]).await;
    let msg = client.err(&["GET", "l"]).await;
    assert!(msg.starts_with("WRONGTYPE"), "got: {msg}");

    client.ok(&["SET", "s", "v"]).await;
    let msg = client.err(&["LPUSH", "s", "x"]).await;
    assert!(msg.starts_with("WRONGTYPE"), "got: {msg}");
}

#[tokio::test]
async fn keys_glob_patterns() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    client.ok(&["SET", "user:1", "a"]).await;
    client.ok(&["SET", "user:2", "b"]).await;
    client.ok(&["SET", "item:1", "c"]).await;

    let mut keys = client.get_list(&["KEYS", "*"]).await;
    keys.sort();
    assert_eq!(keys, vec!["item:1", "user:1", "user:2"]);

    let mut keys = client.get_list(&["KEYS", "user:?"]).await;
    keys.sort();
    assert_eq!(keys, vec!["user:1", "user:2"]);
}

#[tokio::test]
async fn scan_visits_every_key() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    for i in 0..25 {
        client.ok(&["SET", &format!("k{i}"), "v"]).await;
    }

    let mut cursor = "0".to_string();
    let mut seen = std::collections::HashSet::new();
    loop {
        let reply = client.cmd(&["SCAN", &cursor, "COUNT", "7"]).await;
        let Frame::Array(parts) = reply else {
            panic!("expected array reply");
        };
        let Frame::Bulk(next) = &parts[0] else {
            panic!("expected bulk cursor");
        };
        let Frame::Array(keys) = &parts[1] else {
            panic!("expected key array");
        };
        for key in keys {
            let Frame::Bulk(data) = key else {
                panic!("expected bulk key");
            };
            seen.insert(String::from_utf8_lossy(data).to_string());
        }
        cursor = String::from_utf8_lossy(next).to_string();
        if cursor == "0" {
            break;
        }
    }
    assert_eq!(seen.len(), 25);
}

#[tokio::test]
async fn select_isolates_databases() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    client.ok(&["SET", "k", "zero"]).await;
    client.ok(&["SELECT", "1"]).await;
    assert_eq!(client.get_bulk(&["GET", "k"]).await, None);
    client.ok(&["SET", "k", "one"]).await;
    client.ok(&["SELECT", "0"]).await;
    assert_eq!(client.get_bulk(&["GET", "k"]).await, Some("zero".into()));

    let msg = client.err(&["SELECT", "99"]).await;
    assert!(msg.contains("invalid DB index"), "got: {msg}");
}

#[tokio::test]
async fn flushdb_and_flushall() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    client.ok(&["SET", "a", "1"]).await;
    client.ok(&["SELECT", "1"]).await;
    client.ok(&["SET", "b", "2"]).await;

    client.ok(&["FLUSHDB"]).await;
    assert_eq!(client.get_bulk(&["GET", "b"]).await, None);
    client.ok(&["SELECT", "0"]).await;
    assert_eq!(client.get_bulk(&["GET", "a"]).await, Some("1".into()));

    client.ok(&["FLUSHALL"]).await;
    assert_eq!(client.get_bulk(&["GET", "a"]).await, None);
}

#[tokio::test]
async fn binary_safe_values() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    // value with an embedded null byte survives the round trip
    let args: [&[u8]; 3] = [b"SET", b"bin", &[0u8, 1, 255]];
    let reply = client.cmd_bytes(&args).await;
    assert_eq!(reply, Frame::Simple("OK".into()));
    assert_eq!(
        client.cmd(&["GET", "bin"]).await,
        Frame::Bulk(Bytes::from_static(&[0u8, 1, 255]))
    );
}

#[tokio::test]
async fn unknown_command_is_reported() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    let msg = client.err(&["FROBNICATE", "x"]).await;
    assert!(msg.contains("unknown command"), "got: {msg}");
}

#[tokio::test]
async fn ping_echo_info() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    assert_eq!(client.cmd(&["PING"]).await, Frame::Simple("PONG".into()));
    assert_eq!(
        client.get_bulk(&["ECHO", "hello"]).await,
        Some("hello".into())
    );
    let info = client.get_bulk(&["INFO"]).await.unwrap();
    assert!(info.contains("# Server"), "got: {info}");
}
