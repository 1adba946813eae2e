//! End-to-end scenario against a scripted transport: one login, a user
//! reconciliation pass, a BIOS settings change through the job queue, and
//! the purge guard.

use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};

use osprey_bmc::error::Result;
use osprey_bmc::transport::{Headers, Response, Transport};
use osprey_bmc::{BiosSettings, BmcError, DesiredUser, IdracClient, JobState, Role};
use osprey_common::Credentials;

struct ScriptedTransport {
    routes: Vec<(Method, String, u16, Vec<(String, String)>, String)>,
    log: Mutex<Vec<(Method, String, Option<Vec<u8>>)>>,
}

impl ScriptedTransport {
    fn new() -> Self {
        Self {
            routes: Vec::new(),
            log: Mutex::new(Vec::new()),
        }
    }

    fn route(mut self, method: Method, endpoint: &str, status: u16, body: &str) -> Self {
        self.routes
            .push((method, endpoint.to_string(), status, Vec::new(), body.to_string()));
        self
    }

    fn route_with_header(
        mut self,
        method: Method,
        endpoint: &str,
        status: u16,
        header: (&str, &str),
        body: &str,
    ) -> Self {
        self.routes.push((
            method,
            endpoint.to_string(),
            status,
            vec![(header.0.to_string(), header.1.to_string())],
            body.to_string(),
        ));
        self
    }

    fn requests_to(&self, endpoint: &str) -> Vec<(Method, String, Option<Vec<u8>>)> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, logged, _)| logged == endpoint)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Vec<u8>>,
        _headers: Headers<'_>,
    ) -> Result<Response> {
        self.log
            .lock()
            .unwrap()
            .push((method.clone(), endpoint.to_string(), body));

        for (route_method, route_endpoint, status, headers, route_body) in &self.routes {
            if *route_method == method && route_endpoint == endpoint {
                return Ok(Response {
                    status: StatusCode::from_u16(*status).unwrap(),
                    headers: headers.clone(),
                    body: route_body.clone().into_bytes(),
                });
            }
        }

        Ok(Response {
            status: StatusCode::NOT_FOUND,
            headers: Vec::new(),
            body: Vec::new(),
        })
    }
}

const SYSTEM_PATH: &str = "/redfish/v1/Systems/System.Embedded.1";
const JOBS_PATH: &str = "/redfish/v1/Managers/iDRAC.Embedded.1/Jobs";

fn users_body() -> String {
    let mut map = serde_json::Map::new();
    for id in 1..=16u8 {
        let (name, enable) = match id {
            2 => ("root", "Enabled"),
            3 => ("monitor", "Enabled"),
            _ => ("", "Disabled"),
        };
        map.insert(
            format!("iDRAC.Users.{id}"),
            serde_json::json!({"UserName": name, "Enable": enable, "Privilege": "511"}),
        );
    }
    serde_json::Value::Object(map).to_string()
}

fn scripted_device() -> ScriptedTransport {
    ScriptedTransport::new()
        .route_with_header(
            Method::POST,
            "/data/login",
            200,
            ("XSRF-TOKEN", "tok-scenario"),
            "<root><authResult>0</authResult></root>",
        )
        .route(
            Method::GET,
            SYSTEM_PATH,
            200,
            r#"{"SerialNumber": "CN1", "Model": "PowerEdge R640", "PowerState": "On"}"#,
        )
        .route(Method::GET, "/sysmgmt/2017/server/configgroup/iDRAC.Users", 200, &users_body())
        .route(
            Method::PUT,
            "/sysmgmt/2017/server/configgroup/iDRAC.Users.4",
            200,
            "",
        )
        .route(
            Method::GET,
            &format!("{SYSTEM_PATH}/Bios"),
            200,
            r#"{"Attributes": {"BootMode": "Bios", "SysProfile": "PerfOptimized"}}"#,
        )
        .route(
            Method::PATCH,
            &format!("{SYSTEM_PATH}/Bios/Settings"),
            200,
            "",
        )
        .route_with_header(
            Method::POST,
            JOBS_PATH,
            200,
            ("Location", &format!("{JOBS_PATH}/JID_471269252011")),
            "",
        )
        .route(
            Method::GET,
            &format!("{JOBS_PATH}/JID_471269252011"),
            200,
            r#"{"Id": "JID_471269252011", "JobType": "BIOSConfiguration", "JobState": "Running"}"#,
        )
}

#[tokio::test]
async fn test_full_reconciliation_scenario() {
    let mut client = IdracClient::with_transport(
        scripted_device(),
        Credentials::new("root", "calvin"),
    );

    // Reconcile one new admin account; slots 2 and 3 are taken, slot 1 is
    // reserved, so alice lands in slot 4.
    let report = client
        .apply_users(&[DesiredUser {
            name: "alice".to_string(),
            password: "hunter2".to_string(),
            role: Role::Admin,
            enable: true,
        }])
        .await
        .unwrap();
    assert!(report.is_clean());
    assert_eq!(report.written, vec![("alice".to_string(), 4)]);

    // A BIOS change flows through PATCH then the job queue.
    let desired = BiosSettings {
        boot_mode: Some("Uefi".to_string()),
        sys_profile: Some("PerfOptimized".to_string()),
        ..BiosSettings::default()
    };
    let job_id = client.apply_bios_settings(&desired).await.unwrap();
    assert_eq!(job_id.as_deref(), Some("JID_471269252011"));

    // Only the changed attribute is in the PATCH body.
    let settings_path = format!("{SYSTEM_PATH}/Bios/Settings");
    let patches = client.transport().requests_to(&settings_path);
    assert_eq!(patches.len(), 1);
    assert_eq!(
        String::from_utf8(patches[0].2.clone().unwrap()).unwrap(),
        r#"{"Attributes":{"BootMode":"Uefi"}}"#
    );

    // The queued job is running, so the purge guard refuses to delete it.
    let job = client.bios_job("JID_471269252011").await.unwrap();
    assert_eq!(job.job_state, JobState::Running);
    match client.purge_bios_job("JID_471269252011").await.unwrap_err() {
        BmcError::JobNotPurgeable { job_state, .. } => assert_eq!(job_state, "Running"),
        other => panic!("unexpected error: {other}"),
    }

    // The whole scenario rode on a single login.
    assert_eq!(client.transport().requests_to("/data/login").len(), 1);
}
