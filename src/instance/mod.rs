//! Instance resolution - which database endpoints a directory maps to

pub mod hosts;
pub mod params;

pub use hosts::{HostToken, parse_host_token, split_host_list};
pub use params::ConnectParams;

use crate::fs::Dir;
use crate::shellout::{self, Variables};
use indexmap::IndexSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use thiserror::Error;

/// How long a `host-wrapper` command may run
pub const HOST_WRAPPER_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid host \"{0}\"")]
    InvalidHost(String),

    #[error("invalid port \"{port}\" for host {host}")]
    InvalidPort { host: String, port: String },

    #[error("unterminated quote in host list: {0}")]
    UnterminatedQuote(String),

    #[error("port {port} for host {host} conflicts with configured port {configured}")]
    PortConflict {
        host: String,
        port: u16,
        configured: u16,
    },

    #[error("host-wrapper: {0}")]
    HostWrapper(#[from] shellout::Error),

    #[error("invalid connect-options \"{options}\": {reason}")]
    InvalidConnectOptions { options: String, reason: String },

    #[error("connect-options: option {0} cannot be overridden")]
    BlockedOption(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A resolved, addressable database server
#[derive(Debug, Clone)]
pub struct Instance {
    pub host: String,
    pub port: u16,
    /// Unix socket path; when set, `port` is unused
    pub socket: Option<String>,
    pub params: ConnectParams,
}

impl Instance {
    pub fn tcp(host: impl Into<String>, port: u16, params: ConnectParams) -> Self {
        Self {
            host: host.into(),
            port,
            socket: None,
            params,
        }
    }

    pub fn unix(host: impl Into<String>, socket: impl Into<String>, params: ConnectParams) -> Self {
        Self {
            host: host.into(),
            port: 0,
            socket: Some(socket.into()),
            params,
        }
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.socket {
            Some(socket) => write!(f, "{}:{socket}", self.host),
            None => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

// Identity is the address string; parameters do not distinguish instances.
impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for Instance {}

impl Hash for Instance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

/// Resolve the instances `dir` maps to.
///
/// No `host` configured yields an empty list. With `host-wrapper` set, the
/// wrapper's output supplies the host list; otherwise `host` itself does.
/// Duplicates are dropped, keeping first-seen order.
pub fn resolve(dir: &Dir) -> Result<Vec<Instance>> {
    let config = &dir.config;
    let host = config.get("host").trim();
    if host.is_empty() {
        return Ok(Vec::new());
    }

    let params = ConnectParams::with_options(config.get("connect-options"))?;
    let port_changed = config.changed("port");
    let port = hosts::parse_port(host, config.get("port"))?;
    let socket_changed = config.changed("socket");
    let socket = crate::paths::expand(config.get("socket"))
        .display()
        .to_string();

    let wrapper = config.get("host-wrapper").trim();
    let tokens = if wrapper.is_empty() {
        split_host_list(host)?
    } else {
        let vars = wrapper_variables(dir, host);
        let output = shellout::run_templated_command(wrapper, &vars, Some(HOST_WRAPPER_TIMEOUT))?;
        let tokens = split_host_list(&output)?;
        log::debug!(
            "{}: host-wrapper returned {} host(s)",
            dir.rel_path(),
            tokens.len()
        );
        tokens
    };

    let mut seen = IndexSet::new();
    let mut instances = Vec::new();
    for token in tokens {
        let parsed = parse_host_token(&token)?;
        if let Some(explicit) = parsed.port
            && port_changed
            && explicit != port
        {
            return Err(Error::PortConflict {
                host: parsed.host,
                port: explicit,
                configured: port,
            });
        }

        let instance = if parsed.host == "localhost"
            && parsed.port.is_none()
            && (socket_changed || !port_changed)
        {
            Instance::unix(parsed.host, socket.clone(), params.clone())
        } else {
            Instance::tcp(parsed.host, parsed.port.unwrap_or(port), params.clone())
        };
        if seen.insert(instance.to_string()) {
            instances.push(instance);
        }
    }
    Ok(instances)
}

fn wrapper_variables(dir: &Dir, host: &str) -> Variables {
    let mut vars = Variables::new();
    vars.insert("HOST".into(), host.to_string());
    vars.insert("ENVIRONMENT".into(), dir.config.environment().to_string());
    vars.insert("DIRNAME".into(), dir.base_name());
    vars.insert("DIRPATH".into(), dir.path.display().to_string());
    vars.insert("SCHEMA".into(), dir.config.get("schema").to_string());
    vars
}
