//! HTTP ingestion service adapter
//!
//! Protocol:
//!
//! 1. `POST {server}/api/cameras/discovered` registers each camera under a
//!    local camera id (hex digest of its name)
//! 2. `PUT {server}/api/jobs` creates a job split into shards
//! 3. each file is `POST`ed to the `post_url` template
//! 4. each touched shard gets a `PUT` of its hash map to its upload URL
//!
//! Settings come from hook data: `server`, `post_url`, `auth_token`,
//! `device_id` and `user_id`.

pub mod endpoints;
pub mod types;

use crate::adapter::{
    hook_string, AdapterSettings, CameraConfig, HookData, JobAssignment, RemoteAdapter,
    ShardManifest, ShardSpec, UploadRequest,
};
use crate::error::{CliError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use types::{DiscoveredCamera, FinalizeRequest, JobRequest, JobResponse};
use vimport_common::checksum::compute_content_key_bytes;

/// Upload URL template used when `post_url` is not configured
pub const DEFAULT_POST_URL: &str = "http://127.0.0.1:8888/upload/{filename}";

/// Connection settings of the ingestion service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub server: String,
    pub post_url: String,
    pub auth_token: Option<String>,
    pub device_id: Option<String>,
    pub user_id: Option<String>,
}

impl HttpSettings {
    /// Defaults for a service at `host:port`
    pub fn for_host(host: &str, port: u16) -> Self {
        Self {
            server: format!("http://{}:{}", host, port),
            post_url: DEFAULT_POST_URL.to_string(),
            auth_token: None,
            device_id: None,
            user_id: None,
        }
    }

    /// Overlay the keys present in `data`
    pub fn apply(&mut self, data: &HookData) -> Result<()> {
        if let Some(server) = hook_string(data, "server")? {
            self.server = server;
        }
        if let Some(post_url) = hook_string(data, "post_url")? {
            self.post_url = post_url;
        }
        if let Some(token) = hook_string(data, "auth_token")? {
            self.auth_token = Some(token);
        }
        if let Some(device_id) = hook_string(data, "device_id")? {
            self.device_id = Some(device_id);
        }
        if let Some(user_id) = hook_string(data, "user_id")? {
            self.user_id = Some(user_id);
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.server)
            .map_err(|e| CliError::config(format!("invalid server URL '{}': {}", self.server, e)))?;
        Url::parse(&endpoints::upload_url(&self.post_url, "probe"))
            .map_err(|e| CliError::config(format!("invalid post_url '{}': {}", self.post_url, e)))?;
        Ok(())
    }
}

pub struct HttpAdapter {
    client: Client,
    settings: HttpSettings,
}

impl HttpAdapter {
    pub fn new(settings: HttpSettings, timeout: Duration) -> Result<Self> {
        settings.validate()?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, settings })
    }

    pub fn from_settings(settings: &AdapterSettings) -> Result<Self> {
        let mut http = HttpSettings::for_host(&settings.host, settings.port);
        http.apply(&settings.hook_data)?;
        Self::new(http, settings.timeout)
    }

    pub fn settings(&self) -> &HttpSettings {
        &self.settings
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.settings.auth_token {
            Some(token) => request.header(reqwest::header::AUTHORIZATION, format!("token {}", token)),
            None => request,
        }
    }
}

/// Local camera id: hex digest of the camera name
pub fn local_camera_id(camera_name: &str) -> String {
    compute_content_key_bytes(camera_name.as_bytes())
}

#[async_trait]
impl RemoteAdapter for HttpAdapter {
    fn name(&self) -> &str {
        "http"
    }

    fn set_hook_data(&mut self, data: &HookData) -> Result<()> {
        self.settings.apply(data)
    }

    async fn register_camera(&self, camera_name: &str, host: &str, port: u16) -> Result<CameraConfig> {
        let local_id = local_camera_id(camera_name);
        let url = endpoints::cameras_discovered_url(&self.settings.server);
        debug!(camera = camera_name, host, port, url = %url, "Registering camera");

        let mut payload = BTreeMap::new();
        payload.insert(
            local_id.clone(),
            DiscoveredCamera::batch(
                camera_name,
                &local_id,
                self.settings.device_id.as_deref(),
                self.settings.user_id.as_deref(),
            ),
        );

        let response = self
            .authorized(self.client.post(&url))
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        let body: serde_json::Value = response.json().await?;

        match body.get(&local_id) {
            Some(entry) => {
                let mut config = CameraConfig::new(local_id.as_str());
                if let Some(fields) = entry.as_object() {
                    config.extra = fields.clone();
                }
                info!(camera = camera_name, local_camera_id = %local_id, "Registered camera");
                Ok(config)
            },
            None => Err(CliError::registration(
                camera_name,
                format!("response does not contain local camera id {}", local_id),
            )),
        }
    }

    async fn assign_job(&self, item_count: usize, avg_size_bytes: u64) -> Result<Option<JobAssignment>> {
        let url = endpoints::jobs_url(&self.settings.server);
        let request = JobRequest {
            device_id: self.settings.device_id.clone(),
            item_count,
            item_average_size_bytes: avg_size_bytes,
        };

        let response = self
            .authorized(self.client.put(&url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let job: JobResponse = response
            .json()
            .await
            .map_err(|e| CliError::adapter(format!("unexpected job response: {}", e)))?;

        let shards = job
            .shard_map
            .into_iter()
            .map(|(shard_id, shard)| ShardSpec {
                shard_id,
                item_count: shard.item_count,
                upload_url: shard.upload_url,
            })
            .collect();

        Ok(Some(JobAssignment {
            job_id: job.job_id,
            shards,
        }))
    }

    async fn upload_video(&self, request: &UploadRequest<'_>) -> Result<bool> {
        let url = endpoints::upload_url(&self.settings.post_url, request.given_name);

        let mut query: Vec<(&str, String)> = vec![
            ("camera_id", request.camera_id.unwrap_or_default().to_string()),
            ("timestamp", request.timestamp.to_string()),
            ("hash", request.key.to_string()),
        ];
        if let Some(token) = &self.settings.auth_token {
            query.push(("access_token", token.clone()));
        }
        if let Some(location) = request.location.to_json() {
            query.push(("location", location.to_string()));
        }

        let file = tokio::fs::File::open(request.path).await?;
        let length = file.metadata().await?.len();

        debug!(path = %request.path.display(), url = %url, "Posting video");
        let response = self
            .authorized(self.client.post(&url))
            .query(&query)
            .header(reqwest::header::CONTENT_LENGTH, length)
            .body(file)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(path = %request.path.display(), status = %status, "Upload rejected");
        }
        Ok(status.is_success())
    }

    async fn finalize_job(&self, manifest: &ShardManifest) -> Result<()> {
        let request = FinalizeRequest {
            job_id: manifest.job_id.clone(),
            shard_id: manifest.shard_id.clone(),
            item_count: manifest.item_count(),
            hash_map: manifest.hash_map.clone(),
        };

        self.client
            .put(&manifest.upload_url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        info!(
            job_id = %manifest.job_id,
            shard_id = %manifest.shard_id,
            items = manifest.item_count(),
            "Finalized shard"
        );
        Ok(())
    }
}
