//! Osprey BMC sessions and configuration reconciliation
//!
//! This crate talks to server BMCs (Dell iDRAC, HP iLO) to manage local
//! accounts, LDAP role groups, and BIOS settings. It covers the vendor
//! session lifecycle (login, token capture, reuse, logout) and the
//! idempotent reconciliation of desired state against the device.
//!
//! # Supported vendors
//!
//! - **Dell iDRAC**: cookie/token HTTPS login plus the Redfish job queue
//!   for BIOS settings
//! - **HP iLO**: SSH command channel; authenticating the channel is the
//!   login
//!
//! # Example
//!
//! ```no_run
//! use osprey_bmc::{DesiredUser, HttpConfig, IdracClient, Role};
//! use osprey_common::Credentials;
//!
//! # async fn example() -> osprey_bmc::error::Result<()> {
//! let config = HttpConfig::new("10.1.2.3").with_insecure(true);
//! let mut client = IdracClient::new(&config, Credentials::new("root", "calvin"))?;
//!
//! // Session is established lazily on the first authenticated call and
//! // reused afterwards.
//! let report = client
//!     .apply_users(&[DesiredUser {
//!         name: "alice".to_string(),
//!         password: "hunter2".to_string(),
//!         role: Role::Admin,
//!         enable: true,
//!     }])
//!     .await?;
//!
//! for failure in &report.failures {
//!     eprintln!("{}: {}", failure.entity, failure.error);
//! }
//!
//! client.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Reconciliation is best-effort per entry: one account failing to write
//! does not stop the rest of the batch. Validation problems and session
//! failures abort up front, before anything is mutated.

pub mod error;
pub mod idrac;
pub mod ilo;
pub mod reconcile;
pub mod redfish;
pub mod session;
pub mod ssh;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{BmcError, Result};
pub use idrac::IdracClient;
pub use ilo::IloClient;
pub use reconcile::{
    plan, DesiredEntry, EntryFailure, PlannedAction, PlannedEntry, ReconcileReport, SlotRecord,
};
pub use redfish::{BiosSettings, Job, JobState, RedfishBios, BIOS_JOB_TYPE};
pub use session::{Session, SessionToken};
pub use ssh::{SshConfig, SshExec, SshSession};
pub use transport::{HttpConfig, HttpTransport, Response, Transport};
pub use types::{
    DesiredUser, LdapConfig, LdapRoleGroup, LdapRoleGroupCfg, Role, UserSlot,
};
