//! HP iLO client
//!
//! iLO is driven over its SSH command channel. There is no token exchange:
//! authenticating the channel is the login, and every operation is a command
//! string whose stdout is matched for the vendor's success phrasing.

use tracing::debug;

use osprey_common::{BmcVendor, Credentials, PowerState};

use crate::error::{BmcError, Result};
use crate::ssh::{SshConfig, SshExec, SshSession};

fn expect_success(command: &str, stdout: &str, markers: &[&str]) -> Result<()> {
    if markers.iter().any(|marker| stdout.contains(marker)) {
        Ok(())
    } else {
        Err(BmcError::CommandFailed {
            command: command.to_string(),
            output: stdout.trim().to_string(),
        })
    }
}

fn parse_power_state(stdout: &str) -> PowerState {
    if stdout.contains("currently: On") {
        PowerState::On
    } else if stdout.contains("currently: Off") {
        PowerState::Off
    } else {
        PowerState::Unknown
    }
}

/// Client for one iLO, owning its SSH channel.
///
/// Like the iDRAC client this is a single-owner resource; operations take
/// `&mut self` and callers must not share it.
pub struct IloClient<E: SshExec = SshSession> {
    config: SshConfig,
    credentials: Credentials,
    session: Option<E>,
}

impl<E: SshExec> IloClient<E> {
    pub fn new(config: SshConfig, credentials: Credentials) -> Self {
        Self {
            config,
            credentials,
            session: None,
        }
    }

    /// Wrap an already-established channel
    pub fn with_session(config: SshConfig, credentials: Credentials, session: E) -> Self {
        Self {
            config,
            credentials,
            session: Some(session),
        }
    }

    /// Replace the credentials used by the next channel establishment. A
    /// live channel keeps running under the identity it was opened with.
    pub fn update_credentials(&mut self, credentials: Credentials) {
        self.credentials = credentials;
    }

    pub fn vendor(&self) -> BmcVendor {
        BmcVendor::Ilo
    }

    /// Open the channel if none is live. A dropped channel is reopened; a
    /// live one is reused as-is.
    pub async fn ensure_session(&mut self) -> Result<()> {
        if let Some(session) = &self.session {
            if session.is_connected() {
                return Ok(());
            }
            self.session = None;
        }

        let session = E::connect(&self.config, &self.credentials).await?;
        debug!(host = %self.config.host, "ilo ssh channel established");
        self.session = Some(session);
        Ok(())
    }

    async fn run(&mut self, command: &str) -> Result<String> {
        self.ensure_session().await?;
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| BmcError::Ssh("no ssh channel".to_string()))?;
        session.exec(command).await
    }

    pub async fn power_on(&mut self) -> Result<()> {
        let output = self.run("power on").await?;
        expect_success("power on", &output, &["successful", "Server powering on"])
    }

    pub async fn power_off(&mut self) -> Result<()> {
        let output = self.run("power off hard").await?;
        expect_success(
            "power off hard",
            &output,
            &["successful", "Server powering off"],
        )
    }

    pub async fn power_cycle(&mut self) -> Result<()> {
        let output = self.run("power reset").await?;
        expect_success(
            "power reset",
            &output,
            &["successful", "initiated successfully", "Server resetting"],
        )
    }

    pub async fn power_state(&mut self) -> Result<PowerState> {
        let output = self.run("power").await?;
        Ok(parse_power_state(&output))
    }

    /// Tear the channel down
    pub async fn close(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            session.close().await?;
        }
        Ok(())
    }
}
