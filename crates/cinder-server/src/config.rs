//! Server configuration from environment variables.
//!
//! | Variable  | Meaning                          | Default |
//! |-----------|----------------------------------|---------|
//! | HOST      | bind address (empty = all)       | ``      |
//! | PORT      | bind port                        | `6379`  |
//! | PASSWORD  | AUTH secret                      | `guest` |
//! | USE_RDB   | `true`/`false` enable snapshots  | `true`  |
//! | USE_AOF   | `true`/`false` enable the log    | `true`  |
//! | DATA_DIR  | directory for persisted files    | `data`  |
//!
//! Unset or empty variables keep their defaults.

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: String,
    pub password: String,
    pub use_rdb: bool,
    pub use_aof: bool,
    pub data_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: "6379".into(),
            password: "guest".into(),
            use_rdb: true,
            use_aof: true,
            data_dir: "data".into(),
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable source. Split out so
    /// tests don't have to mutate the process environment.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        let set = |target: &mut String, name: &str| {
            if let Some(val) = lookup(name).filter(|v| !v.is_empty()) {
                *target = val;
            }
        };
        set(&mut config.host, "HOST");
        set(&mut config.port, "PORT");
        set(&mut config.password, "PASSWORD");
        set(&mut config.data_dir, "DATA_DIR");

        if let Some(val) = lookup("USE_RDB").filter(|v| !v.is_empty()) {
            config.use_rdb = val == "true";
        }
        if let Some(val) = lookup("USE_AOF").filter(|v| !v.is_empty()) {
            config.use_aof = val == "true";
        }

        config
    }

    /// Returns the socket address to bind. An empty host means all
    /// interfaces.
    pub fn bind_addr(&self) -> String {
        let host = if self.host.is_empty() {
            "0.0.0.0"
        } else {
            &self.host
        };
        format!("{host}:{}", self.port)
    }

    /// Whether clients must AUTH before issuing commands.
    pub fn requires_auth(&self) -> bool {
        !self.password.is_empty()
    }
}
