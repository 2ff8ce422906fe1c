//! Configuration management for finagent.
//!
//! Configuration is merged from several sources, lowest precedence first:
//! - Built-in defaults
//! - The workspace `.env` file
//! - The config file (`.finagent/config.yaml`)
//! - Process environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with local state stored in `.finagent/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Environment variables that must be set for the Azure OpenAI provider.
pub const REQUIRED_AZURE_VARS: [&str; 3] = [
    "AZURE_OPENAI_ENDPOINT",
    "AZURE_OPENAI_API_KEY",
    "AZURE_OPENAI_DEPLOYMENT",
];

const KNOWN_PROVIDERS: [&str; 2] = ["azure-openai", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .finagent/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Chat provider ("azure-openai" or "ollama")
    pub provider: String,

    /// Explicit chat model override (otherwise the provider default is used)
    pub model: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    pub azure: AzureOpenAiConfig,

    pub ollama: OllamaConfig,

    pub search: SearchConfig,

    pub ingestion: IngestionConfig,

    pub telemetry: TelemetryConfig,
}

/// Azure OpenAI connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureOpenAiConfig {
    pub endpoint: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_version: String,
    /// Chat completions deployment
    pub deployment: String,
    /// Deployment used for image analysis (defaults to `deployment`)
    pub vision_deployment: Option<String>,
    pub embedding_deployment: String,
    pub embedding_dimensions: usize,
}

impl Default for AzureOpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            api_version: "2024-02-15-preview".to_string(),
            deployment: "gpt-4".to_string(),
            vision_deployment: None,
            embedding_deployment: "text-embedding-3-large".to_string(),
            embedding_dimensions: 1536,
        }
    }
}

impl AzureOpenAiConfig {
    /// Whether endpoint and key are both present.
    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some() && self.api_key.is_some()
    }
}

/// Local Ollama runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub endpoint: String,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
        }
    }
}

/// Which search index implementation serves retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchBackend {
    /// Azure AI Search service
    Azure,
    /// SQLite index under `.finagent/index/`
    Local,
}

impl SearchBackend {
    /// Parse a backend name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "azure" | "azure-search" => Some(Self::Azure),
            "local" | "sqlite" => Some(Self::Local),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Azure => "azure",
            Self::Local => "local",
        }
    }
}

/// Search index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Explicit backend; resolved automatically when unset
    pub backend: Option<SearchBackend>,
    pub endpoint: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub index_name: String,
    pub top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: None,
            endpoint: None,
            api_key: None,
            index_name: "financial-docs".to_string(),
            top_k: 5,
        }
    }
}

/// Document ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Explicit embedding provider; resolved automatically when unset
    pub embedding_provider: Option<String>,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            embedding_provider: None,
        }
    }
}

/// OpenTelemetry export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub otlp_enabled: bool,
    pub otlp_endpoint: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "financial-agent".to_string(),
            otlp_enabled: false,
            otlp_endpoint: "http://localhost:4317".to_string(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    workspace: Option<WorkspaceSection>,
    logging: Option<LoggingSection>,
    llm: Option<LlmSection>,
    #[serde(rename = "azureOpenAI")]
    azure_open_ai: Option<AzureSection>,
    ollama: Option<OllamaSection>,
    search: Option<SearchSection>,
    ingestion: Option<IngestionSection>,
    telemetry: Option<TelemetrySection>,
}

#[derive(Debug, Clone, Deserialize)]
struct WorkspaceSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
struct LlmSection {
    provider: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzureSection {
    endpoint: Option<String>,
    api_key_env: Option<String>,
    api_version: Option<String>,
    deployment: Option<String>,
    vision_deployment: Option<String>,
    embedding_deployment: Option<String>,
    embedding_dimensions: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaSection {
    endpoint: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchSection {
    backend: Option<String>,
    endpoint: Option<String>,
    api_key_env: Option<String>,
    index: Option<String>,
    top_k: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestionSection {
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    embedding_provider: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TelemetrySection {
    service_name: Option<String>,
    otlp_enabled: Option<bool>,
    otlp_endpoint: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "azure-openai".to_string(),
            model: None,
            log_level: None,
            verbose: false,
            no_color: false,
            azure: AzureOpenAiConfig::default(),
            ollama: OllamaConfig::default(),
            search: SearchConfig::default(),
            ingestion: IngestionConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `.env`, the config file and the process environment.
    ///
    /// Recognised environment variables include `AZURE_OPENAI_ENDPOINT`,
    /// `AZURE_OPENAI_API_KEY`, `AZURE_OPENAI_DEPLOYMENT`, `AZURE_SEARCH_ENDPOINT`,
    /// `AZURE_SEARCH_API_KEY`, `AZURE_SEARCH_INDEX`, `TOP_K_RESULTS`, `CHUNK_SIZE`,
    /// `CHUNK_OVERLAP`, `OTEL_SERVICE_NAME`, `JAEGER_ENABLED`,
    /// `OTEL_EXPORTER_OTLP_ENDPOINT`, the `FINAGENT_*` overrides, `RUST_LOG`,
    /// `LOG_LEVEL` and `NO_COLOR`.
    ///
    /// # Example
    /// ```no_run
    /// use finagent_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Load configuration for the workspace and config file given on the
    /// command line. Either path, when present, replaces `FINAGENT_WORKSPACE`
    /// or `FINAGENT_CONFIG`, so its `.env` and YAML are the ones merged.
    pub fn load_from(workspace: Option<&Path>, config_file: Option<&Path>) -> AppResult<Self> {
        let process_env: HashMap<String, String> = std::env::vars().collect();
        Self::load_with_env_and_paths(&process_env, workspace, config_file)
    }

    /// Load configuration using an explicit environment map instead of the
    /// process environment.
    pub fn load_with_env(env: &HashMap<String, String>) -> AppResult<Self> {
        Self::load_with_env_and_paths(env, None, None)
    }

    pub fn load_with_env_and_paths(
        env: &HashMap<String, String>,
        workspace: Option<&Path>,
        config_file: Option<&Path>,
    ) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace
            .map(Path::to_path_buf)
            .or_else(|| env.get("FINAGENT_WORKSPACE").map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        config.config_file = config_file
            .map(Path::to_path_buf)
            .or_else(|| env.get("FINAGENT_CONFIG").map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        // .env entries sit below everything else; the process environment wins
        let dotenv = read_dotenv(&config.workspace.join(".env"))?;
        let mut merged_env = dotenv.clone();
        merged_env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));

        config.apply_env(&dotenv)?;

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.workspace.join(".finagent/config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path, &merged_env)?;
        }

        config.apply_env(env)?;

        Ok(config)
    }

    /// Apply recognised variables from an environment map.
    fn apply_env(&mut self, env: &HashMap<String, String>) -> AppResult<()> {
        let get = |key: &str| env.get(key).filter(|v| !v.trim().is_empty()).cloned();

        if let Some(provider) = get("FINAGENT_PROVIDER") {
            self.provider = provider;
        }
        if let Some(model) = get("FINAGENT_MODEL") {
            self.model = Some(model);
        }

        if let Some(endpoint) = get("AZURE_OPENAI_ENDPOINT") {
            self.azure.endpoint = Some(endpoint);
        }
        if let Some(key) = get("AZURE_OPENAI_API_KEY") {
            self.azure.api_key = Some(key);
        }
        if let Some(version) = get("AZURE_OPENAI_API_VERSION") {
            self.azure.api_version = version;
        }
        if let Some(deployment) = get("AZURE_OPENAI_DEPLOYMENT") {
            self.azure.deployment = deployment;
        }
        if let Some(deployment) = get("AZURE_OPENAI_VISION_DEPLOYMENT") {
            self.azure.vision_deployment = Some(deployment);
        }
        if let Some(deployment) = get("AZURE_OPENAI_EMBEDDING_DEPLOYMENT") {
            self.azure.embedding_deployment = deployment;
        }
        if let Some(dims) = get("EMBEDDING_DIMENSIONS") {
            self.azure.embedding_dimensions = parse_number("EMBEDDING_DIMENSIONS", &dims)?;
        }

        if let Some(url) = get("OLLAMA_URL") {
            self.ollama.endpoint = url;
        }

        if let Some(backend) = get("FINAGENT_SEARCH_BACKEND") {
            self.search.backend = Some(parse_backend(&backend)?);
        }
        if let Some(endpoint) = get("AZURE_SEARCH_ENDPOINT") {
            self.search.endpoint = Some(endpoint);
        }
        if let Some(key) = get("AZURE_SEARCH_API_KEY") {
            self.search.api_key = Some(key);
        }
        if let Some(index) = get("AZURE_SEARCH_INDEX") {
            self.search.index_name = index;
        }
        if let Some(top_k) = get("TOP_K_RESULTS") {
            self.search.top_k = parse_number("TOP_K_RESULTS", &top_k)?;
        }

        if let Some(size) = get("CHUNK_SIZE") {
            self.ingestion.chunk_size = parse_number("CHUNK_SIZE", &size)?;
        }
        if let Some(overlap) = get("CHUNK_OVERLAP") {
            self.ingestion.chunk_overlap = parse_number("CHUNK_OVERLAP", &overlap)?;
        }
        if let Some(provider) = get("FINAGENT_EMBEDDING_PROVIDER") {
            self.ingestion.embedding_provider = Some(provider);
        }

        if let Some(name) = get("OTEL_SERVICE_NAME") {
            self.telemetry.service_name = name;
        }
        if let Some(enabled) = get("JAEGER_ENABLED") {
            self.telemetry.otlp_enabled = parse_flag(&enabled);
        }
        if let Some(endpoint) = get("OTEL_EXPORTER_OTLP_ENDPOINT") {
            self.telemetry.otlp_endpoint = endpoint;
        }

        if let Some(level) = get("LOG_LEVEL").or_else(|| get("RUST_LOG")) {
            self.log_level = Some(level);
        }

        if env.contains_key("NO_COLOR") {
            self.no_color = true;
        }

        Ok(())
    }

    /// Merge YAML configuration file into this config.
    ///
    /// Secrets are never stored in the file; sections name the environment
    /// variable that holds them via `apiKeyEnv`.
    fn merge_yaml(&self, path: &Path, env: &HashMap<String, String>) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(llm) = config_file.llm {
            if let Some(provider) = llm.provider {
                result.provider = provider;
            }
            if let Some(model) = llm.model {
                result.model = Some(model);
            }
        }

        if let Some(azure) = config_file.azure_open_ai {
            if let Some(endpoint) = azure.endpoint {
                result.azure.endpoint = Some(endpoint);
            }
            if let Some(key_env) = azure.api_key_env {
                if let Some(key) = env.get(&key_env) {
                    result.azure.api_key = Some(key.clone());
                }
            }
            if let Some(version) = azure.api_version {
                result.azure.api_version = version;
            }
            if let Some(deployment) = azure.deployment {
                result.azure.deployment = deployment;
            }
            if let Some(deployment) = azure.vision_deployment {
                result.azure.vision_deployment = Some(deployment);
            }
            if let Some(deployment) = azure.embedding_deployment {
                result.azure.embedding_deployment = deployment;
            }
            if let Some(dims) = azure.embedding_dimensions {
                result.azure.embedding_dimensions = dims;
            }
        }

        if let Some(ollama) = config_file.ollama {
            if let Some(endpoint) = ollama.endpoint {
                result.ollama.endpoint = endpoint;
            }
            if let Some(model) = ollama.model {
                result.ollama.model = model;
            }
        }

        if let Some(search) = config_file.search {
            if let Some(backend) = search.backend {
                result.search.backend = Some(parse_backend(&backend)?);
            }
            if let Some(endpoint) = search.endpoint {
                result.search.endpoint = Some(endpoint);
            }
            if let Some(key_env) = search.api_key_env {
                if let Some(key) = env.get(&key_env) {
                    result.search.api_key = Some(key.clone());
                }
            }
            if let Some(index) = search.index {
                result.search.index_name = index;
            }
            if let Some(top_k) = search.top_k {
                result.search.top_k = top_k;
            }
        }

        if let Some(ingestion) = config_file.ingestion {
            if let Some(size) = ingestion.chunk_size {
                result.ingestion.chunk_size = size;
            }
            if let Some(overlap) = ingestion.chunk_overlap {
                result.ingestion.chunk_overlap = overlap;
            }
            if let Some(provider) = ingestion.embedding_provider {
                result.ingestion.embedding_provider = Some(provider);
            }
        }

        if let Some(telemetry) = config_file.telemetry {
            if let Some(name) = telemetry.service_name {
                result.telemetry.service_name = name;
            }
            if let Some(enabled) = telemetry.otlp_enabled {
                result.telemetry.otlp_enabled = enabled;
            }
            if let Some(endpoint) = telemetry.otlp_endpoint {
                result.telemetry.otlp_endpoint = endpoint;
            }
        }

        Ok(result)
    }

    /// Apply scalar CLI overrides to a loaded configuration.
    ///
    /// Command-line flags take precedence over every other source. The
    /// workspace and config file flags are resolved earlier, by `load_from`.
    pub fn with_overrides(
        mut self,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = Some(model);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .finagent directory.
    pub fn finagent_dir(&self) -> PathBuf {
        self.workspace.join(".finagent")
    }

    /// Ensure the .finagent directory exists.
    pub fn ensure_finagent_dir(&self) -> AppResult<()> {
        let dir = self.finagent_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .finagent directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Path of the local SQLite search index.
    pub fn local_index_path(&self) -> PathBuf {
        self.finagent_dir()
            .join("index")
            .join(format!("{}.sqlite", self.search.index_name))
    }

    /// Directory holding golden sets and evaluation results.
    pub fn eval_dir(&self) -> PathBuf {
        self.finagent_dir().join("eval")
    }

    /// Chat model or deployment for the active provider.
    pub fn chat_model(&self) -> String {
        if let Some(ref model) = self.model {
            return model.clone();
        }
        match self.provider.as_str() {
            "ollama" => self.ollama.model.clone(),
            _ => self.azure.deployment.clone(),
        }
    }

    /// Model or deployment used for image analysis.
    pub fn vision_model(&self) -> String {
        match self.provider.as_str() {
            "ollama" => self.chat_model(),
            _ => self
                .azure
                .vision_deployment
                .clone()
                .unwrap_or_else(|| self.chat_model()),
        }
    }

    /// Resolve the search backend: explicit setting, else Azure when the
    /// service is configured, else the local index.
    pub fn search_backend(&self) -> SearchBackend {
        if let Some(backend) = self.search.backend {
            return backend;
        }
        if self.search.endpoint.is_some() && self.search.api_key.is_some() {
            SearchBackend::Azure
        } else {
            SearchBackend::Local
        }
    }

    /// Resolve the embedding provider name.
    pub fn embedding_provider(&self) -> String {
        if let Some(ref provider) = self.ingestion.embedding_provider {
            return provider.clone();
        }
        if self.azure.is_configured() {
            "azure-openai".to_string()
        } else {
            "hash".to_string()
        }
    }

    /// Required Azure OpenAI variables that are not set.
    pub fn missing_required_vars(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.azure.endpoint.is_none() {
            missing.push(REQUIRED_AZURE_VARS[0]);
        }
        if self.azure.api_key.is_none() {
            missing.push(REQUIRED_AZURE_VARS[1]);
        }
        if self.azure.deployment.trim().is_empty() {
            missing.push(REQUIRED_AZURE_VARS[2]);
        }
        missing
    }

    /// Validate configuration for the active provider and search backend.
    pub fn validate(&self) -> AppResult<()> {
        let provider = &self.provider;

        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if provider == "azure-openai" {
            let missing = self.missing_required_vars();
            if !missing.is_empty() {
                return Err(AppError::Config(format!(
                    "Azure OpenAI provider requires: {}",
                    missing.join(", ")
                )));
            }
        }

        if self.search_backend() == SearchBackend::Azure
            && (self.search.endpoint.is_none() || self.search.api_key.is_none())
        {
            return Err(AppError::Config(
                "Azure search backend requires AZURE_SEARCH_ENDPOINT and AZURE_SEARCH_API_KEY"
                    .to_string(),
            ));
        }

        if self.ingestion.chunk_size == 0 {
            return Err(AppError::Config("CHUNK_SIZE must be positive".to_string()));
        }

        if self.search.top_k == 0 {
            return Err(AppError::Config("TOP_K_RESULTS must be positive".to_string()));
        }

        Ok(())
    }
}

/// Read a `.env` file into a map. A missing file yields an empty map.
fn read_dotenv(path: &Path) -> AppResult<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let iter = dotenvy::from_path_iter(path)
        .map_err(|e| AppError::Config(format!("Failed to read {:?}: {}", path, e)))?;

    let mut values = HashMap::new();
    for item in iter {
        let (key, value) =
            item.map_err(|e| AppError::Config(format!("Invalid entry in {:?}: {}", path, e)))?;
        values.insert(key, value);
    }

    tracing::debug!("Loaded {} entries from {:?}", values.len(), path);
    Ok(values)
}

fn parse_number(name: &str, value: &str) -> AppResult<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{} must be a positive integer, got '{}'", name, value)))
}

fn parse_backend(value: &str) -> AppResult<SearchBackend> {
    SearchBackend::parse(value).ok_or_else(|| {
        AppError::Config(format!(
            "Unknown search backend: {}. Supported: azure, local",
            value
        ))
    })
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
