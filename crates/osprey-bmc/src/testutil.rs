//! Scripted transport for unit tests

use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};

use crate::error::Result;
use crate::transport::{Headers, Response, Transport};

/// A recorded request: method, endpoint, body
pub type LoggedRequest = (Method, String, Option<Vec<u8>>);

/// Transport answering from a fixed route table and logging every request
#[derive(Default)]
pub struct MockTransport {
    routes: Vec<(Method, String, Response)>,
    log: Mutex<Vec<LoggedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, method: Method, endpoint: &str, status: u16, body: &str) -> Self {
        self.routes.push((
            method,
            endpoint.to_string(),
            Response {
                status: StatusCode::from_u16(status).unwrap(),
                headers: Vec::new(),
                body: body.as_bytes().to_vec(),
            },
        ));
        self
    }

    pub fn route_with_headers(
        mut self,
        method: Method,
        endpoint: &str,
        status: u16,
        headers: &[(&str, &str)],
        body: &str,
    ) -> Self {
        self.routes.push((
            method,
            endpoint.to_string(),
            Response {
                status: StatusCode::from_u16(status).unwrap(),
                headers: headers
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect(),
                body: body.as_bytes().to_vec(),
            },
        ));
        self
    }

    pub fn requests(&self) -> Vec<LoggedRequest> {
        self.log.lock().unwrap().clone()
    }

    /// Requests issued against one endpoint
    pub fn requests_to(&self, endpoint: &str) -> Vec<LoggedRequest> {
        self.requests()
            .into_iter()
            .filter(|(_, logged, _)| logged == endpoint)
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
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

        for (route_method, route_endpoint, response) in &self.routes {
            if *route_method == method && route_endpoint == endpoint {
                return Ok(response.clone());
            }
        }

        Ok(Response {
            status: StatusCode::NOT_FOUND,
            headers: Vec::new(),
            body: format!("no route for {method} {endpoint}").into_bytes(),
        })
    }
}
