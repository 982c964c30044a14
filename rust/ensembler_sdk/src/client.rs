//! Blocking HTTP client for the control-plane API.

use std::time::Duration;

use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::SdkError;
use crate::models::{
    BuildImageRequest, Ensembler, EnsemblerImage, EnsemblingJob, ListOptions, Page, Router,
    RouterConfig, RouterVersion,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ClientBuilder {
    base_url: String,
    timeout: Duration,
    user_agent: String,
}

impl ClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("ensembler-sdk/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> Result<ControlPlaneClient, SdkError> {
        let base = Url::parse(&self.base_url).map_err(|err| SdkError::InvalidUrl {
            url: self.base_url.clone(),
            details: err.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(SdkError::InvalidUrl {
                url: self.base_url,
                details: "not a base URL".to_string(),
            });
        }
        let http = HttpClient::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .build()?;
        Ok(ControlPlaneClient {
            http,
            base: self.base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Client for routers, router versions, ensemblers, ensembling jobs and
/// ensembler images of one control-plane deployment.
#[derive(Debug, Clone)]
pub struct ControlPlaneClient {
    http: HttpClient,
    base: String,
}

impl ControlPlaneClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SdkError> {
        ClientBuilder::new(base_url).build()
    }

    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!(%method, path, "Control-plane request");
        self.http.request(method, format!("{}{path}", self.base))
    }

    fn send<T: DeserializeOwned>(&self, path: &str, request: RequestBuilder) -> Result<T, SdkError> {
        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(SdkError::Api {
                status: status.as_u16(),
                body,
            });
        }
        // Some endpoints answer with an empty body.
        let body = if body.trim().is_empty() { "null" } else { body.as_str() };
        serde_json::from_str(body).map_err(|source| SdkError::Decode {
            path: path.to_string(),
            source,
        })
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, SdkError> {
        self.send(path, self.request(Method::GET, path))
    }

    fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        options: &ListOptions,
    ) -> Result<Page<T>, SdkError> {
        self.send(path, self.request(Method::GET, path).query(options))
    }

    fn with_body<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, SdkError> {
        self.send(path, self.request(method, path).json(body))
    }

    fn empty<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T, SdkError> {
        self.send(path, self.request(method, path))
    }

    // Routers

    pub fn list_routers(&self, project_id: i64) -> Result<Vec<Router>, SdkError> {
        self.get(&routers_path(project_id))
    }

    pub fn get_router(&self, project_id: i64, router_id: i64) -> Result<Router, SdkError> {
        self.get(&router_path(project_id, router_id))
    }

    pub fn create_router(&self, project_id: i64, config: &RouterConfig) -> Result<Router, SdkError> {
        self.with_body(Method::POST, &routers_path(project_id), config)
    }

    pub fn update_router(
        &self,
        project_id: i64,
        router_id: i64,
        config: &RouterConfig,
    ) -> Result<Router, SdkError> {
        self.with_body(Method::PUT, &router_path(project_id, router_id), config)
    }

    pub fn delete_router(&self, project_id: i64, router_id: i64) -> Result<(), SdkError> {
        self.empty::<serde_json::Value>(Method::DELETE, &router_path(project_id, router_id))
            .map(drop)
    }

    pub fn deploy_router(&self, project_id: i64, router_id: i64) -> Result<(), SdkError> {
        let path = format!("{}/deploy", router_path(project_id, router_id));
        self.empty::<serde_json::Value>(Method::POST, &path).map(drop)
    }

    pub fn undeploy_router(&self, project_id: i64, router_id: i64) -> Result<(), SdkError> {
        let path = format!("{}/undeploy", router_path(project_id, router_id));
        self.empty::<serde_json::Value>(Method::POST, &path).map(drop)
    }

    // Router versions

    pub fn list_router_versions(
        &self,
        project_id: i64,
        router_id: i64,
    ) -> Result<Vec<RouterVersion>, SdkError> {
        self.get(&versions_path(project_id, router_id))
    }

    pub fn get_router_version(
        &self,
        project_id: i64,
        router_id: i64,
        version: i64,
    ) -> Result<RouterVersion, SdkError> {
        self.get(&version_path(project_id, router_id, version))
    }

    /// Create a version without deploying it.
    pub fn create_router_version(
        &self,
        project_id: i64,
        router_id: i64,
        config: &RouterConfig,
    ) -> Result<RouterVersion, SdkError> {
        self.with_body(Method::POST, &versions_path(project_id, router_id), config)
    }

    pub fn delete_router_version(
        &self,
        project_id: i64,
        router_id: i64,
        version: i64,
    ) -> Result<(), SdkError> {
        self.empty::<serde_json::Value>(Method::DELETE, &version_path(project_id, router_id, version))
            .map(drop)
    }

    pub fn deploy_router_version(
        &self,
        project_id: i64,
        router_id: i64,
        version: i64,
    ) -> Result<(), SdkError> {
        let path = format!("{}/deploy", version_path(project_id, router_id, version));
        self.empty::<serde_json::Value>(Method::POST, &path).map(drop)
    }

    // Ensemblers

    pub fn list_ensemblers(
        &self,
        project_id: i64,
        options: &ListOptions,
    ) -> Result<Page<Ensembler>, SdkError> {
        self.get_page(&ensemblers_path(project_id), options)
    }

    pub fn get_ensembler(&self, project_id: i64, ensembler_id: i64) -> Result<Ensembler, SdkError> {
        self.get(&ensembler_path(project_id, ensembler_id))
    }

    pub fn create_ensembler(
        &self,
        project_id: i64,
        ensembler: &Ensembler,
    ) -> Result<Ensembler, SdkError> {
        self.with_body(Method::POST, &ensemblers_path(project_id), ensembler)
    }

    pub fn update_ensembler(
        &self,
        project_id: i64,
        ensembler_id: i64,
        ensembler: &Ensembler,
    ) -> Result<Ensembler, SdkError> {
        self.with_body(Method::PUT, &ensembler_path(project_id, ensembler_id), ensembler)
    }

    pub fn delete_ensembler(&self, project_id: i64, ensembler_id: i64) -> Result<(), SdkError> {
        self.empty::<serde_json::Value>(Method::DELETE, &ensembler_path(project_id, ensembler_id))
            .map(drop)
    }

    // Ensembler images

    pub fn list_ensembler_images(
        &self,
        project_id: i64,
        ensembler_id: i64,
    ) -> Result<Vec<EnsemblerImage>, SdkError> {
        self.get(&images_path(project_id, ensembler_id))
    }

    pub fn build_ensembler_image(
        &self,
        project_id: i64,
        ensembler_id: i64,
        request: &BuildImageRequest,
    ) -> Result<(), SdkError> {
        self.with_body::<_, serde_json::Value>(
            Method::PUT,
            &images_path(project_id, ensembler_id),
            request,
        )
        .map(drop)
    }

    // Ensembling jobs

    pub fn list_jobs(
        &self,
        project_id: i64,
        options: &ListOptions,
    ) -> Result<Page<EnsemblingJob>, SdkError> {
        self.get_page(&jobs_path(project_id), options)
    }

    pub fn get_job(&self, project_id: i64, job_id: i64) -> Result<EnsemblingJob, SdkError> {
        self.get(&job_path(project_id, job_id))
    }

    pub fn submit_job(
        &self,
        project_id: i64,
        job: &EnsemblingJob,
    ) -> Result<EnsemblingJob, SdkError> {
        self.with_body(Method::POST, &jobs_path(project_id), job)
    }

    /// Ask the control plane to stop a running job.
    pub fn terminate_job(&self, project_id: i64, job_id: i64) -> Result<(), SdkError> {
        self.empty::<serde_json::Value>(Method::DELETE, &job_path(project_id, job_id))
            .map(drop)
    }
}

fn routers_path(project_id: i64) -> String {
    format!("/projects/{project_id}/routers")
}

fn router_path(project_id: i64, router_id: i64) -> String {
    format!("{}/{router_id}", routers_path(project_id))
}

fn versions_path(project_id: i64, router_id: i64) -> String {
    format!("{}/versions", router_path(project_id, router_id))
}

fn version_path(project_id: i64, router_id: i64, version: i64) -> String {
    format!("{}/{version}", versions_path(project_id, router_id))
}

fn ensemblers_path(project_id: i64) -> String {
    format!("/projects/{project_id}/ensemblers")
}

fn ensembler_path(project_id: i64, ensembler_id: i64) -> String {
    format!("{}/{ensembler_id}", ensemblers_path(project_id))
}

fn images_path(project_id: i64, ensembler_id: i64) -> String {
    format!("{}/images", ensembler_path(project_id, ensembler_id))
}

fn jobs_path(project_id: i64) -> String {
    format!("/projects/{project_id}/jobs")
}

fn job_path(project_id: i64, job_id: i64) -> String {
    format!("{}/{job_id}", jobs_path(project_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(version_path(1, 2, 3), "/projects/1/routers/2/versions/3");
        assert_eq!(images_path(1, 9), "/projects/1/ensemblers/9/images");
        assert_eq!(job_path(4, 5), "/projects/4/jobs/5");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            ControlPlaneClient::new("not a url"),
            Err(SdkError::InvalidUrl { .. })
        ));
        assert!(matches!(
            ControlPlaneClient::new("mailto:ops@example.com"),
            Err(SdkError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = ControlPlaneClient::new("http://localhost:8080/v1/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/v1");
    }
}
