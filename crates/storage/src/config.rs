// Storage Configuration
//
// Selects the board backend and describes the remote project it talks to,
// loaded from environment variables.

use anyhow::{bail, Context};
use std::env;

const DEFAULT_REGION: &str = "us-central1";
const DEFAULT_COLLECTION: &str = "default_collection";
const DEFAULT_ASSISTANT: &str = "default_assistant";

/// Which backend serves the board contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Process-local maps (dev mode)
    InMemory,
    /// One remote agent flow per board
    AgentFlows,
    /// Append-only integration versions
    IntegrationVersions,
}

impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "memory" | "in_memory" | "inmemory" => Ok(Self::InMemory),
            "agent_flows" | "agentflows" => Ok(Self::AgentFlows),
            "integration_versions" | "integrations" => Ok(Self::IntegrationVersions),
            other => bail!("unknown storage backend: {other}"),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InMemory => write!(f, "memory"),
            Self::AgentFlows => write!(f, "agent_flows"),
            Self::IntegrationVersions => write!(f, "integration_versions"),
        }
    }
}

/// Remote project coordinates shared by both remote backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// API origin, e.g. https://integrations.googleapis.com
    pub endpoint: String,

    /// Project number, also sent as the quota project header
    pub project_number: String,

    pub region: String,
    pub collection: String,
    pub engine: String,
    pub assistant: String,
}

impl RemoteConfig {
    pub fn new(
        endpoint: impl Into<String>,
        project_number: impl Into<String>,
        engine: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            project_number: project_number.into(),
            region: DEFAULT_REGION.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            engine: engine.into(),
            assistant: DEFAULT_ASSISTANT.to_string(),
        }
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `BOARD_SERVER_ENDPOINT`: API origin (required)
    /// - `BOARD_SERVER_PROJECT_NUMBER`: project number (required)
    /// - `BOARD_SERVER_ENGINE`: engine id (required)
    /// - `BOARD_SERVER_REGION`: region (default: us-central1)
    /// - `BOARD_SERVER_COLLECTION`: collection id (default: default_collection)
    /// - `BOARD_SERVER_ASSISTANT`: assistant id (default: default_assistant)
    pub fn from_env() -> anyhow::Result<Self> {
        let endpoint = required("BOARD_SERVER_ENDPOINT")?;
        let project_number = required("BOARD_SERVER_PROJECT_NUMBER")?;
        let engine = required("BOARD_SERVER_ENGINE")?;

        let mut config = Self::new(endpoint, project_number, engine);
        if let Ok(region) = env::var("BOARD_SERVER_REGION") {
            config.region = region;
        }
        if let Ok(collection) = env::var("BOARD_SERVER_COLLECTION") {
            config.collection = collection;
        }
        if let Ok(assistant) = env::var("BOARD_SERVER_ASSISTANT") {
            config.assistant = assistant;
        }
        Ok(config)
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_assistant(mut self, assistant: impl Into<String>) -> Self {
        self.assistant = assistant.into();
        self
    }

    /// `projects/{project}/locations/{region}`
    pub fn location_path(&self) -> String {
        format!("projects/{}/locations/{}", self.project_number, self.region)
    }

    /// Parent resource of the agent flows owned by the configured assistant
    pub fn assistant_path(&self) -> String {
        self.engine_path(&self.collection, &self.engine) + "/assistants/" + &self.assistant
    }

    /// Engine path in the configured project and region
    pub fn engine_path(&self, collection: &str, engine: &str) -> String {
        format!(
            "{}/collections/{}/engines/{}",
            self.location_path(),
            collection,
            engine
        )
    }

    /// Absolute URL of a `v1` resource
    pub fn url(&self, resource: &str) -> String {
        format!("{}/v1/{}", self.endpoint, resource)
    }
}

/// Top-level storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: BackendKind,

    /// Required by the remote backends
    pub remote: Option<RemoteConfig>,

    /// Fixed bearer token; the metadata server is used when absent
    pub access_token: Option<String>,
}

impl StorageConfig {
    pub fn in_memory() -> Self {
        Self {
            backend: BackendKind::InMemory,
            remote: None,
            access_token: None,
        }
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `BOARD_SERVER_STORAGE`: memory | agent_flows | integration_versions (default: memory)
    /// - `BOARD_SERVER_ACCESS_TOKEN`: static bearer token (optional)
    /// - plus the `RemoteConfig` variables for the remote backends
    pub fn from_env() -> anyhow::Result<Self> {
        let backend: BackendKind = env::var("BOARD_SERVER_STORAGE")
            .unwrap_or_default()
            .parse()?;

        let remote = match backend {
            BackendKind::InMemory => None,
            _ => Some(
                RemoteConfig::from_env()
                    .with_context(|| format!("{backend} storage needs remote configuration"))?,
            ),
        };

        let access_token = env::var("BOARD_SERVER_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        Ok(Self {
            backend,
            remote,
            access_token,
        })
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => bail!("{name} environment variable not set"),
    }
}
