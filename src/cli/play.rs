//! Session command implementation.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use ratchet::config::RuntimeConfig;
use ratchet::game::Team;
use ratchet::gateway::Link;
use ratchet::sandbox::Bundle;
use ratchet::session::Session;
use ratchet::transport::Client;
use tracing::info;

use super::CliError;

/// Team name meaning "no program".
const NO_PROGRAM: &str = "/";

/// Execute the play command.
///
/// # Errors
///
/// Returns an error if a bot fails to load, the authority cannot be reached,
/// or the session ends with a fatal error.
pub(crate) fn execute(
    teams: &[(String, PathBuf); 2],
    host: Option<IpAddr>,
    port: Option<u16>,
    bytecode_limit: Option<i64>,
    debug: bool,
) -> Result<(), CliError> {
    let defaults = RuntimeConfig::default();
    let config = RuntimeConfig {
        host: host.unwrap_or(defaults.host),
        port: port.unwrap_or(defaults.port),
        bytecode_limit: bytecode_limit.unwrap_or(defaults.bytecode_limit),
        debug,
        ..defaults
    };
    if config.bytecode_limit <= 0 {
        return Err(CliError::new("bytecode limit must be positive"));
    }

    let mut programs = Vec::new();
    for (team, (name, dir)) in [Team::A, Team::B].into_iter().zip(teams) {
        if name == NO_PROGRAM {
            info!(team = team.label(), "no program");
            continue;
        }
        let path = dir.join(name);
        let bundle = Bundle::from_dir(&path)?;
        info!(team = team.label(), bot = %path.display(), modules = bundle.len(), "loaded");
        programs.push((team, Arc::new(bundle)));
    }

    let addr = config.addr();
    info!(%addr, "connecting");
    let client = Client::connect(addr, config.retry_interval)?;
    let session = Session::new(Link::new(client), config);
    let mut session = programs
        .into_iter()
        .fold(session, |session, (team, bundle)| session.with_program(team, bundle));
    session.run()?;
    info!("session finished");
    Ok(())
}
