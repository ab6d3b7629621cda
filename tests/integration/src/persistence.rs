//! Durability: state survives a server restart via the append-only
//! file. The harness kills the process hard, so recovery here always
//! exercises the log-replay path; snapshot loading is covered by the
//! persistence crate's unit tests.

use std::time::Duration;

use crate::helpers::{ServerOptions, TestServer};

fn aof_options(path: &std::path::Path) -> ServerOptions {
    ServerOptions {
        use_aof: true,
        use_rdb: false,
        data_dir_path: Some(path.to_path_buf()),
        ..ServerOptions::default()
    }
}

/// Gives the AOF writer thread a moment to drain the channel before
/// the process is killed.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(300)).await;
}

#[tokio::test]
async fn writes_survive_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let server = TestServer::start_with(aof_options(dir.path()));
        let mut client = server.connect_authed().await;
        client.ok(&["SET", "x", "1"]).await;
        client.get_int(&["LPUSH", "L", "a", "b"]).await;
        client.get_int(&["EXPIRE", "x", "3600"]).await;
        settle().await;
    }

    let server = TestServer::start_with(aof_options(dir.path()));
    let mut client = server.connect_authed().await;

    assert_eq!(client.get_bulk(&["GET", "x"]).await, Some("1".into()));
    let ttl = client.get_int(&["TTL", "x"]).await;
    assert!(ttl > 0 && ttl <= 3600, "ttl was {ttl}");
    assert_eq!(
        client.get_list(&["LRANGE", "L", "0", "-1"]).await,
        vec!["b", "a"]
    );
}

#[tokio::test]
async fn deletes_and_overwrites_survive_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let server = TestServer::start_with(aof_options(dir.path()));
        let mut client = server.connect_authed().await;
        client.ok(&["SET", "keep", "old"]).await;
        client.ok(&["SET", "keep", "new"]).await;
        client.ok(&["SET", "gone", "x"]).await;
        client.get_int(&["DEL", "gone"]).await;
        client.get_int(&["INCR", "n"]).await;
        client.get_int(&["INCR", "n"]).await;
        settle().await;
    }

    let server = TestServer::start_with(aof_options(dir.path()));
    let mut client = server.connect_authed().await;

    assert_eq!(client.get_bulk(&["GET", "keep"]).await, Some("new".into()));
    assert_eq!(client.get_int(&["EXISTS", "gone"]).await, 0);
    assert_eq!(client.get_bulk(&["GET", "n"]).await, Some("2".into()));
}

#[tokio::test]
async fn list_mutations_survive_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let server = TestServer::start_with(aof_options(dir.path()));
        let mut client = server.connect_authed().await;
        client.get_int(&["RPUSH", "L", "a", "b", "c", "d"]).await;
        client.get_bulk(&["LPOP", "L"]).await;
        client.get_list(&["RPOP", "L", "1"]).await;
        client.ok(&["LTRIM", "L", "0", "0"]).await;
        settle().await;
    }

    let server = TestServer::start_with(aof_options(dir.path()));
    let mut client = server.connect_authed().await;
    assert_eq!(client.get_list(&["LRANGE", "L", "0", "-1"]).await, vec!["b"]);
}

#[tokio::test]
async fn selected_database_is_recorded_in_the_log() {
    let dir = tempfile::tempdir().unwrap();

    {
        let server = TestServer::start_with(aof_options(dir.path()));
        let mut client = server.connect_authed().await;
        client.ok(&["SELECT", "3"]).await;
        client.ok(&["SET", "k", "db3"]).await;
        settle().await;
    }

    let server = TestServer::start_with(aof_options(dir.path()));
    let mut client = server.connect_authed().await;

    assert_eq!(client.get_bulk(&["GET", "k"]).await, None);
    client.ok(&["SELECT", "3"]).await;
    assert_eq!(client.get_bulk(&["GET", "k"]).await, Some("db3".into()));
}

#[tokio::test]
async fn flushall_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let server = TestServer::start_with(aof_options(dir.path()));
        let mut client = server.connect_authed().await;
        client.ok(&["SET", "a", "1"]).await;
        client.ok(&["FLUSHALL"]).await;
        client.ok(&["SET", "b", "2"]).await;
        settle().await;
    }

    let server = TestServer::start_with(aof_options(dir.path()));
    let mut client = server.connect_authed().await;
    assert_eq!(client.get_bulk(&["GET", "a"]).await, None);
    assert_eq!(client.get_bulk(&["GET", "b"]).await, Some("2".into()));
}

#[tokio::test]
async fn log_file_is_plain_text_lines() {
    let dir = tempfile::tempdir().unwrap();

    {
        let server = TestServer::start_with(aof_options(dir.path()));
        let mut client = server.connect_authed().await;
        client.ok(&["SET", "a", "1"]).await;
        client.get_int(&["DEL", "a"]).await;
        settle().await;
    }

    let content = std::fs::read_to_string(dir.path().join("appendonly.aof")).unwrap();
    assert_eq!(content, "SET 0 a 1\nDEL 0 a\n");
}
