//! Command parsing from request frames.
//!
//! Converts a parsed [`Frame`] (expected to be an array of bulk
//! strings) into a typed [`Command`]. Arity and option validation
//! happen here, keeping protocol-level concerns out of the store.

use bytes::Bytes;

use crate::error::ProtocolError;
use crate::types::Frame;

/// Expiration option for the SET command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetExpire {
    /// EX seconds.
    Ex(u64),
    /// PX milliseconds.
    Px(u64),
}

/// A parsed client command, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// AUTH <password>.
    Auth { password: String },

    /// SELECT <index>. Switches the session's database.
    Select { index: i64 },

    /// QUIT. Replies OK and closes the connection.
    Quit,

    /// PING with an optional message.
    Ping(Option<Bytes>),

    /// ECHO <message>.
    Echo(Bytes),

    /// INFO. Returns a short server section.
    Info,

    /// SET <key> <value> [NX|XX] [EX seconds | PX milliseconds].
    Set {
        key: String,
        value: Bytes,
        nx: bool,
        xx: bool,
        expire: Option<SetExpire>,
    },

    /// GET <key>.
    Get { key: String },

    /// GETRANGE <key> <start> <end>.
    GetRange { key: String, start: i64, end: i64 },

    /// STRLEN <key>.
    StrLen { key: String },

    /// DEL <key>.
    Del { key: String },

    /// EXISTS <key> [key ...].
    Exists { keys: Vec<String> },

    /// SETNX <key> <value>.
    SetNx { key: String, value: Bytes },

    /// EXPIRE <key> <seconds>.
    Expire { key: String, seconds: i64 },

    /// INCR <key>.
    Incr { key: String },

    /// DECR <key>.
    Decr { key: String },

    /// TTL <key>.
    Ttl { key: String },

    /// LPUSH <key> <value> [value ...].
    LPush { key: String, values: Vec<Bytes> },

    /// RPUSH <key> <value> [value ...].
    RPush { key: String, values: Vec<Bytes> },

    /// LPOP <key> [count].
    LPop { key: String, count: Option<i64> },

    /// RPOP <key> [count].
    RPop { key: String, count: Option<i64> },

    /// LRANGE <key> <start> <stop>.
    LRange { key: String, start: i64, stop: i64 },

    /// LTRIM <key> <start> <stop>.
    LTrim { key: String, start: i64, stop: i64 },

    /// RENAME <key> <newkey>.
    Rename { key: String, newkey: String },

    /// TYPE <key>.
    Type { key: String },

    /// KEYS <pattern>.
    Keys { pattern: String },

    /// SCAN <cursor> [MATCH pattern] [COUNT n].
    Scan {
        cursor: u64,
        pattern: Option<String>,
        count: Option<usize>,
    },

    /// FLUSHDB.
    FlushDb,

    /// FLUSHALL.
    FlushAll,

    /// A command name we don't recognize.
    Unknown(String),
}

impl Command {
    /// Parses a [`Frame`] into a [`Command`].
    ///
    /// Expects an array frame where the first element is the command
    /// name and the rest are arguments.
    pub fn from_frame(frame: Frame) -> Result<Command, ProtocolError> {
        let frames = match frame {
            Frame::Array(frames) => frames,
            _ => {
                return Err(ProtocolError::InvalidCommandFrame(
                    "expected array frame".into(),
                ));
            }
        };

        if frames.is_empty() {
            return Err(ProtocolError::InvalidCommandFrame(
                "empty command array".into(),
            ));
        }

        let name = extract_string(&frames[0])?;
        let name_upper = name.to_ascii_uppercase();
        let args = &frames[1..];

        match name_upper.as_str() {
            "AUTH" => parse_auth(args),
            "SELECT" => parse_select(args),
            "QUIT" => expect_no_args(args, "QUIT", Command::Quit),
            "PING" => parse_ping(args),
            "ECHO" => parse_echo(args),
            "INFO" => Ok(Command::Info),
            "SET" => parse_set(args),
            "GET" => parse_single_key(args, "GET", |key| Command::Get { key }),
            "GETRANGE" => parse_key_range(args, "GETRANGE", |key, start, end| {
                Command::GetRange { key, start, end }
            }),
            "STRLEN" => parse_single_key(args, "STRLEN", |key| Command::StrLen { key }),
            "DEL" => parse_single_key(args, "DEL", |key| Command::Del { key }),
            "EXISTS" => parse_exists(args),
            "SETNX" => parse_setnx(args),
            "EXPIRE" => parse_expire(args),
            "INCR" => parse_single_key(args, "INCR", |key| Command::Incr { key }),
            "DECR" => parse_single_key(args, "DECR", |key| Command::Decr { key }),
            "TTL" => parse_single_key(args, "TTL", |key| Command::Ttl { key }),
            "LPUSH" => parse_push(args, "LPUSH", |key, values| Command::LPush { key, values }),
            "RPUSH" => parse_push(args, "RPUSH", |key, values| Command::RPush { key, values }),
            "LPOP" => parse_pop(args, "LPOP", |key, count| Command::LPop { key, count }),
            "RPOP" => parse_pop(args, "RPOP", |key, count| Command::RPop { key, count }),
            "LRANGE" => parse_key_range(args, "LRANGE", |key, start, stop| {
                Command::LRange { key, start, stop }
            }),
            "LTRIM" => parse_key_range(args, "LTRIM", |key, start, stop| {
                Command::LTrim { key, start, stop }
            }),
            "RENAME" => parse_rename(args),
            "TYPE" => parse_single_key(args, "TYPE", |key| Command::Type { key }),
            "KEYS" => parse_keys(args),
            "SCAN" => parse_scan(args),
            "FLUSHDB" => expect_no_args(args, "FLUSHDB", Command::FlushDb),
            "FLUSHALL" => expect_no_args(args, "FLUSHALL", Command::FlushAll),
            _ => Ok(Command::Unknown(name)),
        }
    }
}

/// Extracts a UTF-8 string from a Bulk or Simple frame.
fn extract_string(frame: &Frame) -> Result<String, ProtocolError> {
    match frame {
        Frame::Bulk(data) => String::from_utf8(data.to_vec())
            .map_err(|_| ProtocolError::InvalidCommandFrame("argument is not valid utf-8".into())),
        Frame::Simple(s) => Ok(s.clone()),
        _ => Err(ProtocolError::InvalidCommandFrame(
            "expected bulk or simple string argument".into(),
        )),
    }
}

/// Extracts raw bytes from a Bulk or Simple frame.
fn extract_bytes(frame: &Frame) -> Result<Bytes, ProtocolError> {
    match frame {
        Frame::Bulk(data) => Ok(data.clone()),
        Frame::Simple(s) => Ok(Bytes::from(s.clone().into_bytes())),
        _ => Err(ProtocolError::InvalidCommandFrame(
            "expected bulk or simple string argument".into(),
        )),
    }
}

/// Parses a string argument as a signed integer.
fn parse_i64(frame: &Frame) -> Result<i64, ProtocolError> {
    let s = extract_string(frame)?;
    s.parse::<i64>().map_err(|_| {
        ProtocolError::InvalidCommandFrame("value is not an integer or out of range".into())
    })
}

fn expect_no_args(args: &[Frame], cmd: &str, out: Command) -> Result<Command, ProtocolError> {
    if args.is_empty() {
        Ok(out)
    } else {
        Err(ProtocolError::WrongArity(cmd.into()))
    }
}

fn parse_single_key(
    args: &[Frame],
    cmd: &str,
    build: impl FnOnce(String) -> Command,
) -> Result<Command, ProtocolError> {
    if args.len() != 1 {
        return Err(ProtocolError::WrongArity(cmd.into()));
    }
    Ok(build(extract_string(&args[0])?))
}

fn parse_key_range(
    args: &[Frame],
    cmd: &str,
    build: impl FnOnce(String, i64, i64) -> Command,
) -> Result<Command, ProtocolError> {
    if args.len() != 3 {
        return Err(ProtocolError::WrongArity(cmd.into()));
    }
    let key = extract_string(&args[0])?;
    let start = parse_i64(&args[1])?;
    let stop = parse_i64(&args[2])?;
    Ok(build(key, start, stop))
}

fn parse_auth(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 1 {
        return Err(ProtocolError::WrongArity("AUTH".into()));
    }
    let password = extract_string(&args[0])?;
    Ok(Command::Auth { password })
}

fn parse_select(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 1 {
        return Err(ProtocolError::WrongArity("SELECT".into()));
    }
    let index = extract_string(&args[0])?
        .parse::<i64>()
        .map_err(|_| ProtocolError::InvalidCommandFrame("invalid DB index".into()))?;
    Ok(Command::Select { index })
}

fn parse_ping(args: &[Frame]) -> Result<Command, ProtocolError> {
    match args.len() {
        0 => Ok(Command::Ping(None)),
        1 => Ok(Command::Ping(Some(extract_bytes(&args[0])?))),
        _ => Err(ProtocolError::WrongArity("PING".into())),
    }
}

fn parse_echo(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 1 {
        return Err(ProtocolError::WrongArity("ECHO".into()));
    }
    Ok(Command::Echo(extract_bytes(&args[0])?))
}

fn parse_set(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() < 2 {
        return Err(ProtocolError::WrongArity("SET".into()));
    }

    let key = extract_string(&args[0])?;
    let value = extract_bytes(&args[1])?;

    let mut nx = false;
    let mut xx = false;
    let mut expire = None;

    let mut i = 2;
    while i < args.len() {
        let opt = extract_string(&args[i])?.to_ascii_uppercase();
        match opt.as_str() {
            "NX" => {
                nx = true;
                i += 1;
            }
            "XX" => {
                xx = true;
                i += 1;
            }
            "EX" | "PX" => {
                let amount = args
                    .get(i + 1)
                    .ok_or_else(|| ProtocolError::InvalidCommandFrame("syntax error".into()))
                    .and_then(|frame| {
                        extract_string(frame)?.parse::<u64>().map_err(|_| {
                            ProtocolError::InvalidCommandFrame(
                                "value is not an integer or out of range".into(),
                            )
                        })
                    })?;
                if amount == 0 {
                    return Err(ProtocolError::InvalidCommandFrame(
                        "invalid expire time in 'SET' command".into(),
                    ));
                }
                expire = Some(if opt == "EX" {
                    SetExpire::Ex(amount)
                } else {
                    SetExpire::Px(amount)
                });
                i += 2;
            }
            _ => {
                return Err(ProtocolError::InvalidCommandFrame("syntax error".into()));
            }
        }
    }

    if nx && xx {
        return Err(ProtocolError::InvalidCommandFrame("syntax error".into()));
    }

    Ok(Command::Set {
        key,
        value,
        nx,
        xx,
        expire,
    })
}

fn parse_exists(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.is_empty() {
        return Err(ProtocolError::WrongArity("EXISTS".into()));
    }
    let keys = args
        .iter()
        .map(extract_string)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Command::Exists { keys })
}

fn parse_setnx(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 2 {
        return Err(ProtocolError::WrongArity("SETNX".into()));
    }
    let key = extract_string(&args[0])?;
    let value = extract_bytes(&args[1])?;
    Ok(Command::SetNx { key, value })
}

fn parse_expire(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 2 {
        return Err(ProtocolError::WrongArity("EXPIRE".into()));
    }
    let key = extract_string(&args[0])?;
    let seconds = parse_i64(&args[1])?;
    Ok(Command::Expire { key, seconds })
}

fn parse_push(
    args: &[Frame],
    cmd: &str,
    build: impl FnOnce(String, Vec<Bytes>) -> Command,
) -> Result<Command, ProtocolError> {
    if args.len() < 2 {
        return Err(ProtocolError::WrongArity(cmd.into()));
    }
    let key = extract_string(&args[0])?;
    let values = args[1..]
        .iter()
        .map(extract_bytes)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(build(key, values))
}

fn parse_pop(
    args: &[Frame],
    cmd: &str,
    build: impl FnOnce(String, Option<i64>) -> Command,
) -> Result<Command, ProtocolError> {
    if args.is_empty() || args.len() > 2 {
        return Err(ProtocolError::WrongArity(cmd.into()));
    }
    let key = extract_string(&args[0])?;
    let count = match args.get(1) {
        Some(frame) => Some(parse_i64(frame)?),
        None => None,
    };
    Ok(build(key, count))
}

fn parse_rename(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 2 {
        return Err(ProtocolError::WrongArity("RENAME".into()));
    }
    let key = extract_string(&args[0])?;
    let newkey = extract_string(&args[1])?;
    Ok(Command::Rename { key, newkey })
}

fn parse_keys(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.len() != 1 {
        return Err(ProtocolError::WrongArity("KEYS".into()));
    }
    let pattern = extract_string(&args[0])?;
    Ok(Command::Keys { pattern })
}

fn parse_scan(args: &[Frame]) -> Result<Command, ProtocolError> {
    if args.is_empty() {
        return Err(ProtocolError::WrongArity("SCAN".into()));
    }
    let cursor = extract_string(&args[0])?
        .parse::<u64>()
        .map_err(|_| ProtocolError::InvalidCommandFrame("invalid cursor".into()))?;

    let mut pattern = None;
    let mut count = None;

    let mut i = 1;
    while i < args.len() {
        let opt = extract_string(&args[i])?.to_ascii_uppercase();
        let value = args
            .get(i + 1)
            .ok_or_else(|| ProtocolError::InvalidCommandFrame("syntax error".into()))?;
        match opt.as_str() {
            "MATCH" => pattern = Some(extract_string(value)?),
            "COUNT" => {
                count = Some(extract_string(value)?.parse::<usize>().map_err(|_| {
                    ProtocolError::InvalidCommandFrame(
                        "value is not an integer or out of range".into(),
                    )
                })?);
            }
            _ => {
                return Err(ProtocolError::InvalidCommandFrame("syntax error".into()));
            }
        }
        i += 2;
    }

    Ok(Command::Scan {
        cursor,
        pattern,
        count,
    })
}
