//! Per-connection dispatcher.
//!
//! Reads frames from a TCP stream, routes them through the store, and
//! writes replies back. Supports pipelining by draining every complete
//! frame from a single read. Each connection owns its session state
//! (authentication flag and selected database), which disappears with
//! the task on disconnect.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use cinder_core::{IncrError, Popped, Store, TtlResult, DB_COUNT};
use cinder_protocol::{parse_frame, Command, Frame, SetExpire};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::Config;

/// Initial read buffer capacity; covers most commands without
/// over-allocating for simple SET/GET traffic.
const BUF_CAPACITY: usize = 4096;

/// Maximum read buffer size before the client is disconnected.
/// Prevents a slow or malicious client from consuming unbounded
/// memory with incomplete frames.
const MAX_BUF_SIZE: usize = 64 * 1024 * 1024;

/// Per-connection session state.
struct Session {
    authenticated: bool,
    db: usize,
}

impl Session {
    fn new() -> Self {
        Self {
            authenticated: false,
            db: 0,
        }
    }
}

/// Drives a single client connection to completion.
///
/// The loop exits on client EOF, on QUIT, or when the byte stream
/// cannot be framed (there is no way to resynchronize after that).
pub async fn handle(
    mut stream: TcpStream,
    store: Arc<Store>,
    config: Arc<Config>,
) -> std::io::Result<()> {
    let mut session = Session::new();
    let mut buf = BytesMut::with_capacity(BUF_CAPACITY);
    let mut out = BytesMut::with_capacity(BUF_CAPACITY);

    loop {
        if buf.len() > MAX_BUF_SIZE {
            let mut err_buf = BytesMut::new();
            Frame::Error("ERR max buffer size exceeded, closing connection".into())
                .serialize(&mut err_buf);
            let _ = stream.write_all(&err_buf).await;
            return Ok(());
        }

        // a zero-byte read is a clean client EOF: exit silently
        if stream.read_buf(&mut buf).await? == 0 {
            return Ok(());
        }

        // drain every complete frame (pipelining), batching replies
        out.clear();
        let mut closing = false;
        loop {
            match parse_frame(&buf) {
                Ok(Some((frame, consumed))) => {
                    let _ = buf.split_to(consumed);
                    let (reply, close) = process(frame, &mut session, &store, &config).await;
                    reply.serialize(&mut out);
                    if close {
                        closing = true;
                        break;
                    }
                }
                Ok(None) => break, // need more data
                Err(e) => {
                    Frame::Error(format!("ERR protocol error: {e}")).serialize(&mut out);
                    stream.write_all(&out).await?;
                    return Ok(());
                }
            }
        }

        if !out.is_empty() {
            stream.write_all(&out).await?;
        }
        if closing {
            return Ok(());
        }
    }
}

/// Converts a raw frame into a command, applies the auth gate, and
/// executes. The boolean asks the caller to close the connection.
async fn process(
    frame: Frame,
    session: &mut Session,
    store: &Store,
    config: &Config,
) -> (Frame, bool) {
    let cmd = match Command::from_frame(frame) {
        Ok(cmd) => cmd,
        Err(e) => return (Frame::Error(format!("ERR {e}")), false),
    };

    if config.requires_auth() && !session.authenticated && !matches!(cmd, Command::Auth { .. }) {
        return (
            Frame::Error("NOAUTH Authentication required.".into()),
            false,
        );
    }

    if cmd == Command::Quit {
        return (Frame::Simple("OK".into()), true);
    }

    (execute(cmd, session, store, config).await, false)
}

/// Executes a parsed command against the session's selected database.
async fn execute(cmd: Command, session: &mut Session, store: &Store, config: &Config) -> Frame {
    let db = session.db;
    match cmd {
        // -- session --
        Command::Auth { password } => {
            if !config.requires_auth() {
                return Frame::Error("ERR Client sent AUTH, but no password is set".into());
            }
            if password == config.password {
                session.authenticated = true;
                Frame::Simple("OK".into())
            } else {
                Frame::Error("ERR invalid password".into())
            }
        }

        Command::Select { index } => {
            if (0..DB_COUNT as i64).contains(&index) {
                session.db = index as usize;
                Frame::Simple("OK".into())
            } else {
                Frame::Error("ERR invalid DB index".into())
            }
        }

        // handled in process()
        Command::Quit => Frame::Simple("OK".into()),

        Command::Ping(None) => Frame::Simple("PONG".into()),
        Command::Ping(Some(msg)) => Frame::Bulk(msg),
        Command::Echo(msg) => Frame::Bulk(msg),

        Command::Info => {
            let counts = store.key_counts().await;
            let mut info = format!(
                "# Server\r\nversion:{}\r\n\r\n# Keyspace\r\n",
                env!("CARGO_PKG_VERSION")
            );
            for (db, count) in counts.iter().enumerate() {
                if *count > 0 {
                    info.push_str(&format!("db{db}:keys={count}\r\n"));
                }
            }
            Frame::bulk(info)
        }

        // -- strings --
        Command::Set {
            key,
            value,
            nx,
            xx,
            expire,
        } => {
            let ttl = expire.map(|e| match e {
                SetExpire::Ex(secs) => Duration::from_secs(secs),
                SetExpire::Px(millis) => Duration::from_millis(millis),
            });
            if store.set(db, &key, value, ttl, nx, xx).await {
                Frame::Simple("OK".into())
            } else {
                Frame::Null
            }
        }

        Command::Get { key } => match store.get(db, &key).await {
            Ok(Some(data)) => Frame::Bulk(data),
            Ok(None) => Frame::Null,
            Err(e) => Frame::Error(e.to_string()),
        },

        Command::GetRange { key, start, end } => match store.getrange(db, &key, start, end).await {
            Ok(data) => Frame::Bulk(data),
            Err(e) => Frame::Error(e.to_string()),
        },

        Command::StrLen { key } => match store.strlen(db, &key).await {
            Ok(len) => Frame::Integer(len as i64),
            Err(e) => Frame::Error(e.to_string()),
        },

        Command::SetNx { key, value } => {
            Frame::Integer(i64::from(store.set_nx(db, &key, value).await))
        }

        Command::Incr { key } => integer_reply(store.incr(db, &key).await),
        Command::Decr { key } => integer_reply(store.decr(db, &key).await),

        // -- keyspace --
        Command::Del { key } => Frame::Integer(store.del(db, &key).await as i64),

        Command::Exists { keys } => Frame::Integer(store.exists(db, &keys).await as i64),

        Command::Expire { key, seconds } => {
            Frame::Integer(i64::from(store.expire(db, &key, seconds).await))
        }

        Command::Ttl { key } => match store.ttl(db, &key).await {
            TtlResult::Seconds(s) => Frame::Integer(s as i64),
            TtlResult::NoExpiry => Frame::Integer(-1),
            TtlResult::NotFound => Frame::Integer(-2),
        },

        Command::Rename { key, newkey } => match store.rename(db, &key, &newkey).await {
            Ok(()) => Frame::Simple("OK".into()),
            Err(e) => Frame::Error(e.to_string()),
        },

        Command::Type { key } => Frame::Simple(store.value_type(db, &key).await.into()),

        Command::Keys { pattern } => match store.keys(db, &pattern).await {
            Ok(keys) => Frame::Array(keys.into_iter().map(Frame::bulk).collect()),
            Err(e) => Frame::Error(e.to_string()),
        },

        Command::Scan {
            cursor,
            pattern,
            count,
        } => match store
            .scan(db, cursor, pattern.as_deref(), count.unwrap_or(0))
            .await
        {
            Ok((next_cursor, keys)) => Frame::Array(vec![
                Frame::bulk(next_cursor.to_string()),
                Frame::Array(keys.into_iter().map(Frame::bulk).collect()),
            ]),
            Err(e) => Frame::Error(e.to_string()),
        },

        Command::FlushDb => {
            store.flush_db(db).await;
            Frame::Simple("OK".into())
        }

        Command::FlushAll => {
            store.flush_all().await;
            Frame::Simple("OK".into())
        }

        // -- lists --
        Command::LPush { key, values } => match store.lpush(db, &key, &values).await {
            Ok(len) => Frame::Integer(len as i64),
            Err(e) => Frame::Error(e.to_string()),
        },

        Command::RPush { key, values } => match store.rpush(db, &key, &values).await {
            Ok(len) => Frame::Integer(len as i64),
            Err(e) => Frame::Error(e.to_string()),
        },

        Command::LPop { key, count } => pop_reply(store.lpop(db, &key, count).await, count),
        Command::RPop { key, count } => pop_reply(store.rpop(db, &key, count).await, count),

        Command::LRange { key, start, stop } => match store.lrange(db, &key, start, stop).await {
            Ok(items) => Frame::Array(items.into_iter().map(Frame::Bulk).collect()),
            Err(e) => Frame::Error(e.to_string()),
        },

        Command::LTrim { key, start, stop } => match store.ltrim(db, &key, start, stop).await {
            Ok(()) => Frame::Simple("OK".into()),
            Err(e) => Frame::Error(e.to_string()),
        },

        Command::Unknown(name) => Frame::Error(format!("ERR unknown command '{name}'")),
    }
}

fn integer_reply(result: Result<i64, IncrError>) -> Frame {
    match result {
        Ok(val) => Frame::Integer(val),
        Err(e) => Frame::Error(e.to_string()),
    }
}

/// Maps a pop result to the wire: a bare pop yields a bulk or null
/// bulk; a pop with a count always yields an array (null array when
/// the key is absent).
fn pop_reply(
    result: Result<Option<Popped>, cinder_core::PopError>,
    count: Option<i64>,
) -> Frame {
    match result {
        Ok(Some(Popped::One(data))) => Frame::Bulk(data),
        Ok(Some(Popped::Many(items))) => {
            Frame::Array(items.into_iter().map(Frame::Bulk).collect())
        }
        Ok(None) => {
            if count.is_some() {
                Frame::NullArray
            } else {
                Frame::Null
            }
        }
        Err(e) => Frame::Error(e.to_string()),
    }
}
