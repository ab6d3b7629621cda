//! List command semantics over a live connection.

use cinder_protocol::Frame;

use crate::helpers::TestServer;

#[tokio::test]
async fn push_order_and_range() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    // LPUSH a b c: each argument is prepended, final argument leads
    assert_eq!(client.get_int(&["LPUSH", "L", "a", "b", "c"]).await, 3);
    assert_eq!(
        client.get_list(&["LRANGE", "L", "0", "-1"]).await,
        vec!["c", "b", "a"]
    );

    assert_eq!(client.get_int(&["RPUSH", "L", "d"]).await, 4);
    assert_eq!(
        client.get_list(&["LRANGE", "L", "0", "-1"]).await,
        vec!["c", "b", "a", "d"]
    );
}

#[tokio::test]
async fn pop_from_both_ends() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    client.get_int(&["LPUSH", "L", "a", "b", "c"]).await;
    client.get_int(&["RPUSH", "L", "d"]).await;

    assert_eq!(client.get_bulk(&["LPOP", "L"]).await, Some("c".into()));
    assert_eq!(client.get_bulk(&["RPOP", "L"]).await, Some("d".into()));
    assert_eq!(
        client.get_list(&["LRANGE", "L", "0", "-1"]).await,
        vec!["b", "a"]
    );
}

#[tokio::test]
async fn pop_with_count() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    client
        .get_int(&["RPUSH", "L", "a", "b", "c", "d", "e"])
        .await;

    assert_eq!(
        client.get_list(&["LPOP", "L", "2"]).await,
        vec!["a", "b"]
    );
    // RPOP with a count returns the tail slice in list order
    assert_eq!(
        client.get_list(&["RPOP", "L", "2"]).await,
        vec!["d", "e"]
    );
    // zero count: empty array, nothing removed
    assert_eq!(client.get_list(&["LPOP", "L", "0"]).await, Vec::<String>::new());
    assert_eq!(client.get_list(&["LRANGE", "L", "0", "-1"]).await, vec!["c"]);
    // count past the end caps at the length
    assert_eq!(client.get_list(&["LPOP", "L", "10"]).await, vec!["c"]);
}

#[tokio::test]
async fn pop_missing_key() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    assert_eq!(client.cmd(&["LPOP", "nope"]).await, Frame::Null);
    assert_eq!(client.cmd(&["LPOP", "nope", "3"]).await, Frame::NullArray);
}

#[tokio::test]
async fn pop_negative_count_is_error() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    client.get_int(&["RPUSH", "L", "a"]).await;
    let msg = client.err(&["LPOP", "L", "-1"]).await;
    assert!(msg.contains("out of range"), "got: {msg}");
}

#[tokio::test]
async fn ltrim_keeps_range() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    client.get_int(&["RPUSH", "L", "a", "b", "c", "d"]).await;
    client.ok(&["LTRIM", "L", "1", "2"]).await;
    assert_eq!(
        client.get_list(&["LRANGE", "L", "0", "-1"]).await,
        vec!["b", "c"]
    );
}

#[tokio::test]
async fn ltrim_empty_range_deletes_key() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    client.get_int(&["RPUSH", "L", "a", "b"]).await;
    client.ok(&["LTRIM", "L", "3", "1"]).await;
    assert_eq!(client.get_int(&["EXISTS", "L"]).await, 0);
    assert_eq!(
        client.cmd(&["TYPE", "L"]).await,
        Frame::Simple("none".into())
    );
}

#[tokio::test]
async fn lrange_clamps_and_inverts() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    client.get_int(&["RPUSH", "L", "a", "b", "c"]).await;
    assert_eq!(
        client.get_list(&["LRANGE", "L", "0", "99"]).await,
        vec!["a", "b", "c"]
    );
    assert_eq!(
        client.get_list(&["LRANGE", "L", "-2", "-1"]).await,
        vec!["b", "c"]
    );
    assert_eq!(
        client.get_list(&["LRANGE", "L", "2", "1"]).await,
        Vec::<String>::new()
    );
    assert_eq!(
        client.get_list(&["LRANGE", "missing", "0", "-1"]).await,
        Vec::<String>::new()
    );
}

#[tokio::test]
async fn full_list_scenario() {
    let server = TestServer::start();
    let mut client = server.connect_authed().await;

    client.get_int(&["LPUSH", "L", "a", "b", "c"]).await;
    assert_eq!(
        client.get_list(&["LRANGE", "L", "0", "-1"]).await,
        vec!["c", "b", "a"]
    );
    client.get_int(&["RPUSH", "L", "d"]).await;
    assert_eq!(client.get_bulk(&["LPOP", "L"]).await, Some("c".into()));
    assert_eq!(client.get_bulk(&["RPOP", "L"]).await, Some("d".into()));
    client.ok(&["LTRIM", "L", "1", "2"]).await;
    assert_eq!(client.get_list(&["LRANGE", "L", "0", "-1"]).await, vec!["a"]);
}
