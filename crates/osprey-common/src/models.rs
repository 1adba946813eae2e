//! Shared value types for BMC management.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Power state of a managed server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    /// Machine is powered on
    On,
    /// Machine is powered off
    Off,
    /// Power state is unknown
    Unknown,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::On => write!(f, "on"),
            PowerState::Off => write!(f, "off"),
            PowerState::Unknown => write!(f, "unknown"),
        }
    }
}

/// BMC vendor family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BmcVendor {
    /// Dell iDRAC
    Idrac,
    /// HP iLO
    Ilo,
    /// Anything else, by name
    Other(String),
}

impl fmt::Display for BmcVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BmcVendor::Idrac => write!(f, "iDRAC"),
            BmcVendor::Ilo => write!(f, "iLO"),
            BmcVendor::Other(name) => write!(f, "{}", name),
        }
    }
}

/// BMC login credentials.
///
/// This is a plain value. A session captures the credentials it was
/// established with; swapping credentials on a client never rewrites a live
/// session, it only changes what the next login uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Device facts read once per session from the BMC.
///
/// Populated by the vendor client right after login; consumers treat it as
/// read-only. Deeper inventory (NICs, disks, CPUs) is out of scope here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceFacts {
    /// Service tag / serial number
    pub serial: String,
    /// Chassis model name
    pub model: String,
    /// Current chassis power state
    pub power_state: Option<PowerState>,
    /// BIOS or firmware version string
    pub firmware_version: Option<String>,
}
