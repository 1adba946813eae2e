//! Dell iDRAC client
//!
//! Sessions use the cookie/token login protocol: credentials are POSTed to
//! the login endpoint, the response body carries an `authResult` code, and
//! the `XSRF-TOKEN` response header (plus the session cookie) authenticates
//! every later call. Account and LDAP role-group reconciliation run over the
//! attribute-registry endpoints; BIOS settings go through the Redfish job
//! queue in [`crate::redfish`].

use std::collections::BTreeMap;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use osprey_common::{BmcVendor, Credentials, DeviceFacts, PowerState};

use crate::error::{BmcError, Result};
use crate::reconcile::{plan, PlannedAction, ReconcileReport};
use crate::redfish::{BiosSettings, Job, RedfishBios, BIOS_JOB_TYPE, SYSTEM_PATH};
use crate::session::{Session, SessionToken};
use crate::transport::{HttpConfig, HttpTransport, Response, Transport};
use crate::types::{
    validate_ldap_groups, validate_users, DesiredUser, LdapConfig, LdapPayload, LdapRoleGroup,
    LdapRoleGroupCfg, LdapRoleGroupPayload, UserPayload, UserSlot,
};

const LOGIN_PATH: &str = "/data/login";
const LOGOUT_PATH: &str = "/data/logout";
const USERS_PATH: &str = "/sysmgmt/2017/server/configgroup/iDRAC.Users";
const LDAP_PATH: &str = "/sysmgmt/2017/server/configgroup/iDRAC.LDAP";
const LDAP_GROUPS_PATH: &str = "/sysmgmt/2017/server/configgroup/iDRAC.LDAPRoleGroup";
const USER_DELETE_PATH: &str = "/sysmgmt/2012/server/user";

/// Slot 1 is reserved by the firmware and must never be written
const RESERVED_USER_SLOTS: &[u8] = &[1];

/// Redfish view of the system resource, for the post-login facts read
#[derive(Debug, Deserialize)]
struct SystemResource {
    #[serde(rename = "SerialNumber", default)]
    serial_number: String,
    #[serde(rename = "Model", default)]
    model: String,
    #[serde(rename = "PowerState", default)]
    power_state: Option<String>,
    #[serde(rename = "BiosVersion", default)]
    bios_version: Option<String>,
}

fn parse_auth_result(body: &str) -> Option<i32> {
    // The login response is a small XML document; authResult is the only
    // element we care about.
    let start = body.find("<authResult>")? + "<authResult>".len();
    let end = body[start..].find("</authResult>")? + start;
    body[start..end].trim().parse().ok()
}

/// Client for one iDRAC, owning its transport and session.
///
/// Session-mutating operations take `&mut self`: a client is a single-owner
/// resource and is not meant to be shared across callers.
pub struct IdracClient<T: Transport> {
    transport: T,
    credentials: Credentials,
    session: Option<Session>,
    facts: Option<DeviceFacts>,
}

impl IdracClient<HttpTransport> {
    /// Build a client over HTTPS. No network traffic happens until the
    /// first authenticated call.
    pub fn new(config: &HttpConfig, credentials: Credentials) -> Result<Self> {
        Ok(Self::with_transport(
            HttpTransport::new(config)?,
            credentials,
        ))
    }
}

impl<T: Transport> IdracClient<T> {
    pub fn with_transport(transport: T, credentials: Credentials) -> Self {
        Self {
            transport,
            credentials,
            session: None,
            facts: None,
        }
    }

    /// Replace the credentials used by the next login. A live session keeps
    /// the credentials it was established with.
    pub fn update_credentials(&mut self, credentials: Credentials) {
        self.credentials = credentials;
    }

    /// Facts read from the device after login, if a session is live
    pub fn facts(&self) -> Option<&DeviceFacts> {
        self.facts.as_ref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn vendor(&self) -> BmcVendor {
        BmcVendor::Idrac
    }

    /// Establish a session if none is live. Calling this with a live
    /// session is a no-op; there is no re-login.
    pub async fn ensure_session(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }

        let session = self.login().await?;
        self.session = Some(session);

        // One-time facts load; until it succeeds no read from this
        // connection is considered valid, so failure tears the fresh
        // session back down.
        match self.load_facts().await {
            Ok(facts) => {
                self.facts = Some(facts);
                Ok(())
            }
            Err(err) => {
                self.session = None;
                Err(err)
            }
        }
    }

    async fn login(&self) -> Result<Session> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("user", &self.credentials.username)
            .append_pair("password", &self.credentials.password)
            .finish();

        let response = self
            .transport
            .post(
                LOGIN_PATH,
                body.into_bytes(),
                &[("Content-Type", "application/x-www-form-urlencoded")],
            )
            .await?;

        if response.status == StatusCode::NOT_FOUND {
            return Err(BmcError::EndpointNotFound(format!(
                "login endpoint {LOGIN_PATH}"
            )));
        }
        if response.status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(BmcError::SessionLimitReached(
                "device refused a new session".to_string(),
            ));
        }
        if !response.status.is_success() {
            return Err(BmcError::RequestFailed {
                context: "login".to_string(),
                status: response.status,
                body: response.text(),
            });
        }

        let text = response.text();
        let code = parse_auth_result(&text).ok_or_else(|| BmcError::UnmarshalFailed {
            context: "login".to_string(),
            reason: "no authResult in response".to_string(),
        })?;
        // 0 is a clean login; 7 is password-expiry-pending, still usable.
        if code != 0 && code != 7 {
            return Err(BmcError::AuthFailed(format!(
                "login rejected with auth result {code}"
            )));
        }

        let token = if let Some(token) = response.header("XSRF-TOKEN") {
            SessionToken::Xsrf(token.to_string())
        } else if let Some(cookie) = response.header("Set-Cookie") {
            SessionToken::Cookie(cookie.to_string())
        } else {
            return Err(BmcError::UnmarshalFailed {
                context: "login".to_string(),
                reason: "no session token in response".to_string(),
            });
        };

        debug!(auth_result = code, "idrac login accepted");
        Ok(Session::new(token, self.credentials.clone()))
    }

    /// Log out and drop the session. Local state is cleared even when the
    /// logout request itself fails.
    pub async fn close(&mut self) -> Result<()> {
        self.facts = None;
        if let Some(session) = self.session.take() {
            let headers = session.auth_headers();
            self.transport
                .get(LOGOUT_PATH, &headers)
                .await?
                .require_success("GET logout")?;
            debug!("idrac session closed");
        }
        Ok(())
    }

    fn auth_headers(&self) -> Vec<(&'static str, &str)> {
        self.session
            .as_ref()
            .map(Session::auth_headers)
            .unwrap_or_default()
    }

    async fn load_facts(&self) -> Result<DeviceFacts> {
        let headers = self.auth_headers();
        let response = self
            .transport
            .get(SYSTEM_PATH, &headers)
            .await?
            .require_success("GET system resource")?;
        let system: SystemResource = response.json("system resource")?;

        Ok(DeviceFacts {
            serial: system.serial_number,
            model: system.model,
            power_state: system.power_state.map(|state| match state.as_str() {
                "On" => PowerState::On,
                "Off" => PowerState::Off,
                _ => PowerState::Unknown,
            }),
            firmware_version: system.bios_version,
        })
    }

    fn parse_slot_map<S: DeserializeOwned>(
        response: &Response,
        prefix: &str,
    ) -> Result<BTreeMap<u8, S>> {
        let raw: BTreeMap<String, S> = response.json(prefix)?;
        let mut slots = BTreeMap::new();
        for (key, value) in raw {
            let index = key
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('.'))
                .and_then(|rest| rest.parse::<u8>().ok());
            match index {
                Some(id) => {
                    slots.insert(id, value);
                }
                None => {
                    return Err(BmcError::UnmarshalFailed {
                        context: prefix.to_string(),
                        reason: format!("unexpected slot key {key:?}"),
                    });
                }
            }
        }
        Ok(slots)
    }

    async fn fetch_users(&self) -> Result<BTreeMap<u8, UserSlot>> {
        let headers = self.auth_headers();
        let response = self
            .transport
            .get(USERS_PATH, &headers)
            .await?
            .require_success("GET iDRAC.Users")?;
        Self::parse_slot_map(&response, "iDRAC.Users")
    }

    /// Full account slot map, read fresh from the device
    pub async fn current_users(&mut self) -> Result<BTreeMap<u8, UserSlot>> {
        self.ensure_session().await?;
        self.fetch_users().await
    }

    async fn put_user(&self, slot: u8, desired: &DesiredUser) -> Result<()> {
        let payload = UserPayload::for_user(desired);
        let body = serde_json::to_vec(&payload).map_err(|err| BmcError::UnmarshalFailed {
            context: format!("iDRAC.Users.{slot}"),
            reason: err.to_string(),
        })?;

        let headers = self.auth_headers();
        self.transport
            .put(&format!("{USERS_PATH}.{slot}"), body, &headers)
            .await?
            .require_success(&format!("PUT iDRAC.Users.{slot}"))?;
        Ok(())
    }

    async fn delete_user(&self, slot: u8) -> Result<()> {
        let headers = self.auth_headers();
        self.transport
            .delete(&format!("{USER_DELETE_PATH}?userid={slot}"), &headers)
            .await?
            .require_success(&format!("DELETE user {slot}"))?;
        Ok(())
    }

    /// Reconcile local accounts against the desired list.
    ///
    /// Validation runs before anything is written; after that each entry is
    /// best-effort, with failures collected in the report.
    pub async fn apply_users(&mut self, desired: &[DesiredUser]) -> Result<ReconcileReport> {
        validate_users(desired)?;
        self.ensure_session().await?;

        let current = self.fetch_users().await?;
        let planned = plan(&current, desired, RESERVED_USER_SLOTS);

        let mut report = ReconcileReport::default();
        for entry in planned {
            match entry.action {
                PlannedAction::Write { slot } => {
                    match self.put_user(slot, &desired[entry.index]).await {
                        Ok(()) => report.written.push((entry.key, slot)),
                        Err(err) => {
                            warn!(user = %entry.key, slot, error = %err, "user slot write failed");
                            report.fail(entry.key, err);
                        }
                    }
                }
                PlannedAction::Remove { slot } => match self.delete_user(slot).await {
                    Ok(()) => report.removed.push((entry.key, slot)),
                    Err(err) => {
                        warn!(user = %entry.key, slot, error = %err, "user removal failed");
                        report.fail(entry.key, err);
                    }
                },
                PlannedAction::Skip => report.skipped.push(entry.key),
                PlannedAction::NoFreeSlot => {
                    warn!(user = %entry.key, "no free slot");
                    let err = BmcError::NoFreeSlot {
                        entity: entry.key.clone(),
                    };
                    report.fail(entry.key, err);
                }
            }
        }
        Ok(report)
    }

    async fn fetch_ldap_groups(&self) -> Result<BTreeMap<u8, LdapRoleGroup>> {
        let headers = self.auth_headers();
        let response = self
            .transport
            .get(LDAP_GROUPS_PATH, &headers)
            .await?
            .require_success("GET iDRAC.LDAPRoleGroup")?;
        Self::parse_slot_map(&response, "iDRAC.LDAPRoleGroup")
    }

    /// Full role-group slot map, read fresh from the device
    pub async fn current_ldap_groups(&mut self) -> Result<BTreeMap<u8, LdapRoleGroup>> {
        self.ensure_session().await?;
        self.fetch_ldap_groups().await
    }

    async fn put_role_group(&self, slot: u8, group: LdapRoleGroup) -> Result<()> {
        let body = serde_json::to_vec(&LdapRoleGroupPayload { group }).map_err(|err| {
            BmcError::UnmarshalFailed {
                context: format!("iDRAC.LDAPRoleGroup.{slot}"),
                reason: err.to_string(),
            }
        })?;

        let headers = self.auth_headers();
        self.transport
            .put(&format!("{LDAP_GROUPS_PATH}.{slot}"), body, &headers)
            .await?
            .require_success(&format!("PUT iDRAC.LDAPRoleGroup.{slot}"))?;
        Ok(())
    }

    /// Write the directory-service settings
    pub async fn apply_ldap_config(&mut self, config: &LdapConfig) -> Result<()> {
        config.validate()?;
        self.ensure_session().await?;

        let body = serde_json::to_vec(&LdapPayload::from_config(config)).map_err(|err| {
            BmcError::UnmarshalFailed {
                context: "iDRAC.LDAP".to_string(),
                reason: err.to_string(),
            }
        })?;
        let headers = self.auth_headers();
        self.transport
            .put(LDAP_PATH, body, &headers)
            .await?
            .require_success("PUT iDRAC.LDAP")?;
        Ok(())
    }

    /// Reconcile LDAP role groups. Removal on this vendor is a blank-out:
    /// the slot keeps existing with DN "" and privilege "0".
    pub async fn apply_ldap_groups(
        &mut self,
        desired: &[LdapRoleGroupCfg],
    ) -> Result<ReconcileReport> {
        validate_ldap_groups(desired)?;
        self.ensure_session().await?;

        let current = self.fetch_ldap_groups().await?;
        let planned = plan(&current, desired, &[]);

        let mut report = ReconcileReport::default();
        for entry in planned {
            match entry.action {
                PlannedAction::Write { slot } => {
                    let cfg = &desired[entry.index];
                    let group =
                        LdapRoleGroup::new(cfg.group_dn.clone(), cfg.role.privileges().privilege);
                    match self.put_role_group(slot, group).await {
                        Ok(()) => report.written.push((entry.key, slot)),
                        Err(err) => {
                            warn!(group = %entry.key, slot, error = %err, "role group write failed");
                            report.fail(entry.key, err);
                        }
                    }
                }
                PlannedAction::Remove { slot } => {
                    match self.put_role_group(slot, LdapRoleGroup::tombstone()).await {
                        Ok(()) => report.removed.push((entry.key, slot)),
                        Err(err) => {
                            warn!(group = %entry.key, slot, error = %err, "role group tombstone failed");
                            report.fail(entry.key, err);
                        }
                    }
                }
                PlannedAction::Skip => report.skipped.push(entry.key),
                PlannedAction::NoFreeSlot => {
                    warn!(group = %entry.key, "no free role group slot");
                    let err = BmcError::NoFreeSlot {
                        entity: entry.key.clone(),
                    };
                    report.fail(entry.key, err);
                }
            }
        }
        Ok(report)
    }

    /// Current BIOS attribute snapshot
    pub async fn bios_settings(&mut self) -> Result<BiosSettings> {
        self.ensure_session().await?;
        RedfishBios::new(&self.transport, self.session.as_ref())
            .current()
            .await
    }

    /// Diff desired BIOS settings against the device and queue the change.
    /// Returns the job ID, or `None` when nothing differs.
    pub async fn apply_bios_settings(&mut self, desired: &BiosSettings) -> Result<Option<String>> {
        self.ensure_session().await?;
        RedfishBios::new(&self.transport, self.session.as_ref())
            .submit(desired)
            .await
    }

    /// IDs of every job in the queue
    pub async fn bios_jobs(&mut self) -> Result<Vec<String>> {
        self.ensure_session().await?;
        RedfishBios::new(&self.transport, self.session.as_ref())
            .list_jobs()
            .await
    }

    /// Poll one job by ID
    pub async fn bios_job(&mut self, job_id: &str) -> Result<Job> {
        self.ensure_session().await?;
        RedfishBios::new(&self.transport, self.session.as_ref())
            .job(job_id)
            .await
    }

    /// Purge a BIOS configuration job that is still scheduled
    pub async fn purge_bios_job(&mut self, job_id: &str) -> Result<()> {
        self.ensure_session().await?;
        RedfishBios::new(&self.transport, self.session.as_ref())
            .purge_job(job_id, BIOS_JOB_TYPE)
            .await
    }
}
