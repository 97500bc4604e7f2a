//! Deployment profiles.
//!
//! Which data centre to talk to is decided by an explicit [`Env`] value that
//! callers build once and pass down, instead of a process-wide flag.
//!
//! | Mode | Host | Port | Path |
//! |------|------|------|------|
//! | `Sandbox` | `149.154.167.40` | 443 | `/apiw1` |
//! | `Live` | `149.154.167.50` | 443 | `/apiw1` |
//!
//! # Example
//! ```rust
//! use layer_http::{Env, Mode};
//!
//! let mut env = Env::default();
//! assert!(env.is_sandbox());
//! env.set_live();
//! assert_eq!(env.mode(), Mode::Live);
//! assert_eq!(env.profile().host, "149.154.167.50");
//! ```

use std::fmt;
use std::str::FromStr;

use crate::connection::HttpOptions;
use crate::errors::ConfigError;

/// Environment variable read by [`Env::from_env`].
pub const MODE_VAR: &str = "LAYER_HTTP_MODE";

/// Path on the data centre that accepts MTProto-over-HTTP.
pub const API_PATH: &str = "/apiw1";

/// Application credentials registered with Telegram.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppIdentity {
    pub api_id:     i32,
    pub api_hash:   &'static str,
    pub title:      &'static str,
    pub short_name: &'static str,
}

const APP: AppIdentity = AppIdentity {
    api_id:     64682,
    api_hash:   "d691dfefc9c339286b7417485001707c",
    title:      "My Global iD",
    short_name: "myglobalid",
};

/// Everything that differs between deployments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Profile {
    pub host: &'static str,
    pub port: u16,
    pub path: &'static str,
    pub app:  AppIdentity,
}

impl Profile {
    pub const SANDBOX: Profile = Profile { host: "149.154.167.40", port: 443, path: API_PATH, app: APP };
    pub const LIVE:    Profile = Profile { host: "149.154.167.50", port: 443, path: API_PATH, app: APP };

    /// Adapter options pointing at this profile's data centre.
    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            protocol: None,
            host:     Some(self.host.to_string()),
            port:     Some(self.port),
            path:     Some(self.path.to_string()),
        }
    }
}

// ─── Mode ─────────────────────────────────────────────────────────────────────

/// Deployment mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    #[default]
    Sandbox,
    Live,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Live    => "live",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("sandbox") {
            Ok(Self::Sandbox)
        } else if s.eq_ignore_ascii_case("live") {
            Ok(Self::Live)
        } else {
            Err(ConfigError::UnknownMode(s.to_string()))
        }
    }
}

// ─── Env ──────────────────────────────────────────────────────────────────────

/// The selected deployment. Starts in [`Mode::Sandbox`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Env {
    mode: Mode,
}

impl Env {
    pub fn new(mode: Mode) -> Self {
        Self { mode }
    }

    /// Read the mode from [`MODE_VAR`]. Unset means sandbox.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(MODE_VAR) {
            Ok(v)  => Ok(Self::new(v.parse()?)),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn mode(&self) -> Mode { self.mode }

    pub fn is_sandbox(&self) -> bool { self.mode == Mode::Sandbox }

    pub fn is_live(&self) -> bool { self.mode == Mode::Live }

    pub fn set_sandbox(&mut self) {
        self.mode = Mode::Sandbox;
        log::debug!("[env] mode = {}", self.mode);
    }

    pub fn set_live(&mut self) {
        self.mode = Mode::Live;
        log::debug!("[env] mode = {}", self.mode);
    }

    pub fn profile(&self) -> &'static Profile {
        match self.mode {
            Mode::Sandbox => &Profile::SANDBOX,
            Mode::Live    => &Profile::LIVE,
        }
    }

    /// Shorthand for `self.profile().http_options()`.
    pub fn http_options(&self) -> HttpOptions {
        self.profile().http_options()
    }
}
