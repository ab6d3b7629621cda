//! Test helpers for spawning a cinder-server and sending commands.

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use cinder_protocol::{parse_frame, Frame};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// The AUTH password servers are started with unless overridden.
pub const TEST_PASSWORD: &str = "guest";

/// A cinder-server subprocess managed by the test harness.
pub struct TestServer {
    child: Child,
    pub port: u16,
    _data_dir: Option<tempfile::TempDir>,
}

/// Options for starting a test server.
#[derive(Default)]
pub struct ServerOptions {
    /// Enable the append-only file.
    pub use_aof: bool,
    /// Enable periodic snapshots.
    pub use_rdb: bool,
    /// Owned temp directory (cleaned up when the server drops).
    pub data_dir: Option<tempfile::TempDir>,
    /// Use an existing path without taking ownership. Wins over
    /// `data_dir` when both are set.
    pub data_dir_path: Option<PathBuf>,
}

impl TestServer {
    /// Starts a new server on a random port with persistence disabled.
    pub fn start() -> Self {
        Self::start_with(ServerOptions::default())
    }

    /// Starts a new server with custom options. Blocks until it
    /// accepts connections (up to 5 seconds).
    pub fn start_with(opts: ServerOptions) -> Self {
        let binary = server_binary();
        let port = find_free_port();

        let mut cmd = Command::new(&binary);
        cmd.env("HOST", "127.0.0.1");
        cmd.env("PORT", port.to_string());
        cmd.env("USE_AOF", if opts.use_aof { "true" } else { "false" });
        cmd.env("USE_RDB", if opts.use_rdb { "true" } else { "false" });
        // suppress tracing output in tests
        cmd.env("RUST_LOG", "error");

        let data_dir = if opts.use_aof || opts.use_rdb {
            if let Some(ref path) = opts.data_dir_path {
                cmd.env("DATA_DIR", path);
                None // caller manages the directory lifetime
            } else {
                let dir = opts
                    .data_dir
                    .unwrap_or_else(|| tempfile::tempdir().unwrap());
                cmd.env("DATA_DIR", dir.path());
                Some(dir)
            }
        } else {
            None
        };

        let child = cmd
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .unwrap_or_else(|e| {
                panic!("failed to spawn cinder-server at {}: {e}", binary.display())
            });

        // wait for the server to be ready
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            if std::time::Instant::now() > deadline {
                panic!("cinder-server failed to start within 5 seconds on port {port}");
            }
            if std::net::TcpStream::connect(format!("127.0.0.1:{port}")).is_ok() {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        Self {
            child,
            port,
            _data_dir: data_dir,
        }
    }

    /// Connects a raw (unauthenticated) test client.
    pub async fn connect(&self) -> TestClient {
        TestClient::connect(self.port).await
    }

    /// Connects and authenticates with the default password.
    pub async fn connect_authed(&self) -> TestClient {
        let mut client = self.connect().await;
        client.ok(&["AUTH", TEST_PASSWORD]).await;
        client
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A minimal RESP client for integration testing.
pub struct TestClient {
    stream: TcpStream,
    buf: BytesMut,
}

impl TestClient {
    async fn connect(port: u16) -> Self {
        let stream = TcpStream::connect(format!("127.0.0.1:{port}"))
            .await
            .unwrap_or_else(|e| panic!("failed to connect to 127.0.0.1:{port}: {e}"));
        Self {
            stream,
            buf: BytesMut::with_capacity(4096),
        }
    }

    /// Sends a command and returns the parsed response frame.
    pub async fn cmd(&mut self, args: &[&str]) -> Frame {
        let args: Vec<&[u8]> = args.iter().map(|a| a.as_bytes()).collect();
        self.cmd_bytes(&args).await
    }

    /// Sends a command with binary-safe arguments.
    pub async fn cmd_bytes(&mut self, args: &[&[u8]]) -> Frame {
        let parts: Vec<Frame> = args
            .iter()
            .map(|a| Frame::Bulk(Bytes::copy_from_slice(a)))
            .collect();
        let frame = Frame::Array(parts);

        let mut out = BytesMut::new();
        frame.serialize(&mut out);
        self.stream.write_all(&out).await.unwrap();

        self.read_frame().await
    }

    /// Reads the next frame from the connection.
    pub async fn read_frame(&mut self) -> Frame {
        loop {
            match parse_frame(&self.buf) {
                Ok(Some((frame, consumed))) => {
                    let _ = self.buf.split_to(consumed);
                    return frame;
                }
                Ok(None) => {
                    let n = self.stream.read_buf(&mut self.buf).await.unwrap();
                    if n == 0 {
                        panic!("server closed connection while waiting for response");
                    }
                }
                Err(e) => panic!("protocol error: {e}"),
            }
        }
    }

    /// Sends a command and extracts the bulk string value.
    pub async fn get_bulk(&mut self, args: &[&str]) -> Option<String> {
        match self.cmd(args).await {
            Frame::Bulk(data) => Some(String::from_utf8_lossy(&data).to_string()),
            Frame::Null | Frame::NullArray => None,
            other => panic!("expected Bulk or Null, got {other:?}"),
        }
    }

    /// Sends a command and extracts the integer value.
    pub async fn get_int(&mut self, args: &[&str]) -> i64 {
        match self.cmd(args).await {
            Frame::Integer(n) => n,
            other => panic!("expected Integer, got {other:?}"),
        }
    }

    /// Sends a command and expects a Simple "OK" response.
    pub async fn ok(&mut self, args: &[&str]) {
        match self.cmd(args).await {
            Frame::Simple(s) if s == "OK" => {}
            other => panic!("expected OK, got {other:?}"),
        }
    }

    /// Sends a command and expects an error. Returns the message.
    pub async fn err(&mut self, args: &[&str]) -> String {
        match self.cmd(args).await {
            Frame::Error(msg) => msg,
            other => panic!("expected Error, got {other:?}"),
        }
    }

    /// Sends a command and extracts an array of bulk strings.
    pub async fn get_list(&mut self, args: &[&str]) -> Vec<String> {
        match self.cmd(args).await {
            Frame::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Frame::Bulk(data) => String::from_utf8_lossy(&data).to_string(),
                    other => panic!("expected Bulk element, got {other:?}"),
                })
                .collect(),
            other => panic!("expected Array, got {other:?}"),
        }
    }
}

/// Finds a free TCP port by binding to port 0.
fn find_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Locates the cinder-server binary in the cargo target directory.
fn server_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    // test binary lives in target/debug/deps/, go up to target/debug/
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("cinder-server");
    if !path.exists() {
        panic!(
            "cinder-server binary not found. run `cargo build` first.\nlooked at: {}",
            path.display()
        );
    }
    path
}
