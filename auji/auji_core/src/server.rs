//! ASGI server invocation.
//!
//! Builds the `python -m uvicorn <app> --reload --host <host> --port <port>`
//! command run from inside the isolated environment.

use std::io;
use std::net::{IpAddr, SocketAddr, TcpListener};
use std::path::Path;

use log::debug;

use crate::config::ServerConfig;
use crate::environment::LaunchEnvironment;
use crate::error::ServerError;
use crate::process::CommandSpec;

/// Parse the configured host and port into a socket address.
///
/// # Arguments
///
/// * `host` - An IPv4 or IPv6 address. Host names are rejected.
/// * `port` - The bind port.
///
/// # Returns
///
/// The socket address, or [`ServerError::InvalidAddress`].
pub fn parse_bind_address(host: &str, port: u16) -> Result<SocketAddr, ServerError> {
    let ip: IpAddr = host
        .trim()
        .parse()
        .map_err(|_| ServerError::InvalidAddress(host.to_string()))?;
    Ok(SocketAddr::new(ip, port))
}

/// Check that an application target has the `module:attribute` form.
pub fn validate_app_target(app: &str) -> Result<(), ServerError> {
    let invalid = || ServerError::InvalidApp(app.to_string());

    let (module, attribute) = app.split_once(':').ok_or_else(invalid)?;

    if attribute.is_empty() || attribute.contains(':') {
        return Err(invalid());
    }

    let module_ok = !module.is_empty()
        && module.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
                && chars.all(|c| c.is_alphanumeric() || c == '_')
        });

    if module_ok {
        Ok(())
    } else {
        Err(invalid())
    }
}

/// Build the server command for the given interpreter.
///
/// The command runs in `project_dir` and carries the launch environment.
pub fn server_command(
    config: &ServerConfig,
    interpreter: &Path,
    project_dir: &Path,
    environment: &LaunchEnvironment,
) -> CommandSpec {
    let mut spec = CommandSpec::new(interpreter)
        .args(["-m", config.module.as_str(), config.app.as_str()]);

    if config.reload {
        spec = spec.arg("--reload");
    }

    spec = spec
        .args(["--host", config.host.as_str()])
        .args(["--port".to_string(), config.port.to_string()])
        .current_dir(project_dir);

    environment.apply(spec)
}

/// Whether a TCP listener can currently bind `addr`.
///
/// Only "address in use" counts as unavailable; any other bind failure is
/// returned as an error.
pub fn is_port_available(addr: SocketAddr) -> io::Result<bool> {
    match TcpListener::bind(addr) {
        Ok(listener) => {
            debug!("Bind probe on {} succeeded", addr);
            drop(listener);
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::AddrInUse => Ok(false),
        Err(e) => Err(e),
    }
}
