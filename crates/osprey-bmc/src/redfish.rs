//! Redfish BIOS settings and the asynchronous job protocol
//!
//! BIOS changes on Redfish vendors are two-step: PATCH the pending-settings
//! resource with only the attributes that differ, then enqueue a
//! configuration job pointing at that resource. The change takes effect when
//! the job runs (typically at next reboot). Job state is poll-only.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BmcError, Result};
use crate::session::Session;
use crate::transport::Transport;

/// Dell system resource path
pub const SYSTEM_PATH: &str = "/redfish/v1/Systems/System.Embedded.1";
/// Dell manager resource path (owns the job queue)
pub const MANAGER_PATH: &str = "/redfish/v1/Managers/iDRAC.Embedded.1";
/// Job type a BIOS settings change enqueues
pub const BIOS_JOB_TYPE: &str = "BIOSConfiguration";

/// BIOS attributes the reconciler manages.
///
/// Every field is a scalar string on the wire; `None` means "no change".
/// The same type serves as full snapshot (read) and sparse delta (write):
/// unset fields are omitted from serialization, which is exactly the
/// "changed fields only" PATCH body the vendor expects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiosSettings {
    #[serde(rename = "BootMode", skip_serializing_if = "Option::is_none")]
    pub boot_mode: Option<String>,
    #[serde(rename = "BootSeqRetry", skip_serializing_if = "Option::is_none")]
    pub boot_seq_retry: Option<String>,
    #[serde(rename = "InternalUsb", skip_serializing_if = "Option::is_none")]
    pub internal_usb: Option<String>,
    #[serde(rename = "SriovGlobalEnable", skip_serializing_if = "Option::is_none")]
    pub sriov_global_enable: Option<String>,
    #[serde(rename = "SysProfile", skip_serializing_if = "Option::is_none")]
    pub sys_profile: Option<String>,
    #[serde(rename = "ProcVirtualization", skip_serializing_if = "Option::is_none")]
    pub proc_virtualization: Option<String>,
    #[serde(rename = "LogicalProc", skip_serializing_if = "Option::is_none")]
    pub logical_proc: Option<String>,
    #[serde(rename = "MemTest", skip_serializing_if = "Option::is_none")]
    pub mem_test: Option<String>,
    #[serde(rename = "SecureBoot", skip_serializing_if = "Option::is_none")]
    pub secure_boot: Option<String>,
    #[serde(rename = "AcPwrRcvry", skip_serializing_if = "Option::is_none")]
    pub ac_pwr_rcvry: Option<String>,
}

fn changed(desired: &Option<String>, current: &Option<String>) -> Option<String> {
    match desired {
        Some(want) if current.as_deref() != Some(want.as_str()) => Some(want.clone()),
        _ => None,
    }
}

impl BiosSettings {
    /// Field-by-field delta of `desired` against `current`.
    ///
    /// Neither input is mutated. A field lands in the delta only when the
    /// caller set it and the device disagrees; everything else stays unset.
    pub fn diff(desired: &BiosSettings, current: &BiosSettings) -> BiosSettings {
        BiosSettings {
            boot_mode: changed(&desired.boot_mode, &current.boot_mode),
            boot_seq_retry: changed(&desired.boot_seq_retry, &current.boot_seq_retry),
            internal_usb: changed(&desired.internal_usb, &current.internal_usb),
            sriov_global_enable: changed(&desired.sriov_global_enable, &current.sriov_global_enable),
            sys_profile: changed(&desired.sys_profile, &current.sys_profile),
            proc_virtualization: changed(&desired.proc_virtualization, &current.proc_virtualization),
            logical_proc: changed(&desired.logical_proc, &current.logical_proc),
            mem_test: changed(&desired.mem_test, &current.mem_test),
            secure_boot: changed(&desired.secure_boot, &current.secure_boot),
            ac_pwr_rcvry: changed(&desired.ac_pwr_rcvry, &current.ac_pwr_rcvry),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == BiosSettings::default()
    }
}

/// `{"Attributes": {...}}` wrapper used by both the snapshot read and the
/// delta PATCH
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributesEnvelope {
    #[serde(rename = "Attributes")]
    pub attributes: BiosSettings,
}

/// Lifecycle of a queued configuration job
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum JobState {
    Scheduled,
    Running,
    Completed,
    Failed,
    Other(String),
}

impl From<String> for JobState {
    fn from(state: String) -> Self {
        match state.as_str() {
            "Scheduled" => JobState::Scheduled,
            "Running" => JobState::Running,
            "Completed" => JobState::Completed,
            "Failed" => JobState::Failed,
            _ => JobState::Other(state),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Scheduled => write!(f, "Scheduled"),
            JobState::Running => write!(f, "Running"),
            JobState::Completed => write!(f, "Completed"),
            JobState::Failed => write!(f, "Failed"),
            JobState::Other(state) => write!(f, "{}", state),
        }
    }
}

/// One entry from the job queue
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    #[serde(rename = "Id")]
    pub job_id: String,
    #[serde(rename = "JobType")]
    pub job_type: String,
    #[serde(rename = "JobState")]
    pub job_state: JobState,
}

#[derive(Debug, Deserialize)]
struct JobCollection {
    #[serde(rename = "Members@odata.count")]
    count: usize,
    #[serde(rename = "Members", default)]
    members: Vec<OdataRef>,
}

#[derive(Debug, Deserialize)]
struct OdataRef {
    #[serde(rename = "@odata.id")]
    id: String,
}

#[derive(Debug, Serialize)]
struct JobRequest {
    #[serde(rename = "TargetSettingsURI")]
    target_settings_uri: String,
}

/// Job ID from the trailing path segment of a self-referencing identifier
pub fn job_id_from_ref(odata_id: &str) -> Option<&str> {
    odata_id
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
}

/// BIOS settings handler bound to one device transport and session
pub struct RedfishBios<'a, T: Transport> {
    transport: &'a T,
    session: Option<&'a Session>,
    system_path: &'a str,
    manager_path: &'a str,
}

impl<'a, T: Transport> RedfishBios<'a, T> {
    pub fn new(transport: &'a T, session: Option<&'a Session>) -> Self {
        Self {
            transport,
            session,
            system_path: SYSTEM_PATH,
            manager_path: MANAGER_PATH,
        }
    }

    fn headers(&self) -> Vec<(&'static str, &str)> {
        self.session.map(Session::auth_headers).unwrap_or_default()
    }

    fn bios_path(&self) -> String {
        format!("{}/Bios", self.system_path)
    }

    fn settings_path(&self) -> String {
        format!("{}/Bios/Settings", self.system_path)
    }

    fn jobs_path(&self) -> String {
        format!("{}/Jobs", self.manager_path)
    }

    /// Current BIOS attribute snapshot
    pub async fn current(&self) -> Result<BiosSettings> {
        let headers = self.headers();
        let response = self
            .transport
            .get(&self.bios_path(), &headers)
            .await?
            .require_success("GET bios attributes")?;
        let envelope: AttributesEnvelope = response.json("bios attributes")?;
        Ok(envelope.attributes)
    }

    /// PATCH only the changed attributes to the pending-settings resource
    pub async fn patch_settings(&self, delta: &BiosSettings) -> Result<()> {
        let body = serde_json::to_vec(&AttributesEnvelope {
            attributes: delta.clone(),
        })
        .map_err(|err| BmcError::UnmarshalFailed {
            context: "bios settings delta".to_string(),
            reason: err.to_string(),
        })?;

        let headers = self.headers();
        self.transport
            .patch(&self.settings_path(), body, &headers)
            .await?
            .require_success("PATCH bios settings")?;
        Ok(())
    }

    /// Enqueue the configuration job that makes a patched delta take effect.
    ///
    /// If this fails the PATCH has already landed but will never apply; the
    /// caller sees the error rather than a silent retry.
    pub async fn enqueue_job(&self) -> Result<String> {
        let body = serde_json::to_vec(&JobRequest {
            target_settings_uri: self.settings_path(),
        })
        .map_err(|err| BmcError::UnmarshalFailed {
            context: "job request".to_string(),
            reason: err.to_string(),
        })?;

        let headers = self.headers();
        let response = self
            .transport
            .post(&self.jobs_path(), body, &headers)
            .await?
            .require_success("POST job queue")?;

        match response.header("Location").and_then(job_id_from_ref) {
            Some(id) => Ok(id.to_string()),
            None => Err(BmcError::UnmarshalFailed {
                context: "job queue response".to_string(),
                reason: "no job location returned".to_string(),
            }),
        }
    }

    /// Diff, patch, and enqueue in one pass.
    ///
    /// Returns the queued job ID, or `None` when the device already matches
    /// and nothing was sent.
    pub async fn submit(&self, desired: &BiosSettings) -> Result<Option<String>> {
        let current = self.current().await?;
        let delta = BiosSettings::diff(desired, &current);
        if delta.is_empty() {
            return Ok(None);
        }

        self.patch_settings(&delta).await?;
        let job_id = self.enqueue_job().await?;
        tracing::debug!(job_id = %job_id, "queued bios configuration job");
        Ok(Some(job_id))
    }

    /// IDs of every job in the queue
    pub async fn list_jobs(&self) -> Result<Vec<String>> {
        let headers = self.headers();
        let response = self
            .transport
            .get(&self.jobs_path(), &headers)
            .await?
            .require_success("GET job queue")?;
        let collection: JobCollection = response.json("job queue")?;

        let ids: Vec<String> = collection
            .members
            .iter()
            .filter_map(|member| job_id_from_ref(&member.id))
            .map(str::to_string)
            .collect();

        if ids.len() != collection.count {
            tracing::warn!(
                count = collection.count,
                parsed = ids.len(),
                "job queue count does not match member list"
            );
        }
        Ok(ids)
    }

    /// Poll one job by ID
    pub async fn job(&self, job_id: &str) -> Result<Job> {
        let headers = self.headers();
        let response = self
            .transport
            .get(&format!("{}/{}", self.jobs_path(), job_id), &headers)
            .await?
            .require_success("GET job")?;
        response.json("job")
    }

    /// Delete a job, but only while it is still `Scheduled` and of the
    /// expected type. Anything else is an error: a running job must not be
    /// yanked out from under the device.
    pub async fn purge_job(&self, job_id: &str, expected_type: &str) -> Result<()> {
        let job = self.job(job_id).await?;
        if job.job_type != expected_type || job.job_state != JobState::Scheduled {
            return Err(BmcError::JobNotPurgeable {
                job_id: job.job_id,
                job_type: job.job_type,
                job_state: job.job_state.to_string(),
            });
        }

        let headers = self.headers();
        self.transport
            .delete(&format!("{}/{}", self.jobs_path(), job_id), &headers)
            .await?
            .require_success("DELETE job")?;
        Ok(())
    }
}
