//! SSH command transport
//!
//! Some BMCs (HP iLO in particular) are driven over an SSH command channel
//! rather than REST. For those, "login" is simply channel establishment:
//! once the channel is authenticated there is no separate token exchange.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client;
use russh_keys::key::PublicKey;
use tokio::net::TcpStream;

use osprey_common::Credentials;

use crate::error::{BmcError, Result};

/// SSH transport configuration
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// BMC hostname or IP
    pub host: String,
    /// SSH port (default 22)
    pub port: u16,
    /// Connect / inactivity timeout in seconds
    pub timeout_secs: u64,
}

impl SshConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            timeout_secs: 30,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Command executor over an established SSH channel
#[async_trait]
pub trait SshExec: Send + Sized {
    /// Establish the channel; authenticating here is the vendor login
    async fn connect(config: &SshConfig, credentials: &Credentials) -> Result<Self>;

    /// Run one command and collect its stdout
    async fn exec(&mut self, command: &str) -> Result<String>;

    fn is_connected(&self) -> bool;

    async fn close(self) -> Result<()>;
}

struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, _key: &PublicKey) -> std::result::Result<bool, Self::Error> {
        // BMC host keys are self-generated on first boot; there is no
        // known_hosts to verify against.
        Ok(true)
    }
}

/// russh-backed [`SshExec`]
pub struct SshSession {
    handle: client::Handle<ClientHandler>,
    host: String,
}

impl SshSession {
    pub fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait]
impl SshExec for SshSession {
    async fn connect(config: &SshConfig, credentials: &Credentials) -> Result<Self> {
        let client_config = Arc::new(client::Config {
            inactivity_timeout: Some(Duration::from_secs(config.timeout_secs)),
            ..Default::default()
        });

        let addr = format!("{}:{}", config.host, config.port);
        let stream = tokio::time::timeout(
            Duration::from_secs(config.timeout_secs),
            TcpStream::connect(&addr),
        )
        .await
        .map_err(|_| BmcError::Ssh(format!("connection timeout to {addr}")))?
        .map_err(|err| BmcError::Ssh(format!("failed to connect to {addr}: {err}")))?;

        let mut handle = client::connect_stream(client_config, stream, ClientHandler).await?;

        let authenticated = handle
            .authenticate_password(&credentials.username, &credentials.password)
            .await?;
        if !authenticated {
            return Err(BmcError::AuthFailed(format!(
                "ssh login rejected for {}@{}",
                credentials.username, config.host
            )));
        }

        Ok(Self {
            handle,
            host: config.host.clone(),
        })
    }

    async fn exec(&mut self, command: &str) -> Result<String> {
        let mut channel = self.handle.channel_open_session().await?;
        channel.exec(true, command).await?;

        let mut stdout = Vec::new();
        loop {
            match channel.wait().await {
                Some(russh::ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(russh::ChannelMsg::ExtendedData { .. })
                | Some(russh::ChannelMsg::ExitStatus { .. })
                | Some(russh::ChannelMsg::Eof) => {}
                Some(russh::ChannelMsg::Close) | None => break,
                _ => {}
            }
        }

        Ok(String::from_utf8_lossy(&stdout).to_string())
    }

    fn is_connected(&self) -> bool {
        !self.handle.is_closed()
    }

    async fn close(self) -> Result<()> {
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}
