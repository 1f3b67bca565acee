//! Process bootstrap (spec §1 "out of scope: process bootstrap"; SPEC_FULL
//! §4.18): reads `FUSION_*` environment variables once into a typed
//! `RuntimeFlags`, the same read-env-once-into-a-struct approach
//! `sa_gateway::cli::load_config` used for its own config path/precedence
//! resolution, and assembles the concrete `Gateway` the CLI subcommands
//! drive.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fusion_auth::{AuthManager, AuthStrategyRegistry};
use fusion_cache::{Cache, FileCache, NoopCache};
use fusion_commands::CommandHandler;
use fusion_domain::config::Config;
use fusion_domain::error::Result;
use fusion_http::HttpHandler;
use fusion_knowledge::KnowledgeHandler;

use crate::auth_setup::AuthSetupHandler;
use crate::registrar::{self, ToolDefinition};
use crate::stores::{FileApiTokenStore, FileAuthCodeStore, FileKnowledgeStore, FileTokenStore};

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name).ok().map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes")).unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// `FUSION_*` behavior flags (spec §6), resolved once at process start.
#[derive(Debug, Clone)]
pub struct RuntimeFlags {
    pub log_level: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub cache_enabled: bool,
    pub metrics_enabled: bool,
    pub circuit_breaker_enabled: bool,
    pub token_encryption: bool,
    pub tls_verify: bool,
    /// `MCP_FUSION_EXTERNAL_URL` — embedded verbatim in auth-setup blobs.
    pub external_url: Option<String>,
    /// Directory the file-backed stores and cache persist under.
    pub state_dir: PathBuf,
}

impl RuntimeFlags {
    pub fn from_env() -> Self {
        Self {
            log_level: std::env::var("FUSION_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            timeout_secs: env_u64("FUSION_TIMEOUT", 30),
            max_retries: env_u64("FUSION_MAX_RETRIES", 3) as u32,
            cache_enabled: env_bool("FUSION_CACHE_ENABLED", true),
            metrics_enabled: env_bool("FUSION_METRICS_ENABLED", true),
            circuit_breaker_enabled: env_bool("FUSION_CIRCUIT_BREAKER_ENABLED", false),
            token_encryption: env_bool("FUSION_TOKEN_ENCRYPTION", false),
            tls_verify: env_bool("FUSION_TLS_VERIFY", true),
            external_url: std::env::var("MCP_FUSION_EXTERNAL_URL").ok(),
            state_dir: std::env::var("FUSION_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| dirs::home_dir().unwrap_or_else(std::env::temp_dir).join(".fusion-gateway")),
        }
    }
}

/// Installs a JSON-formatted `tracing_subscriber::fmt` subscriber filtered
/// by `flags.log_level` (falling back to `RUST_LOG`), mirroring
/// `sa_gateway::main::init_tracing`.
pub fn init_tracing(flags: &RuntimeFlags) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&flags.log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().json().with_env_filter(filter).init();
}

/// Every collaborator a tool invocation needs, assembled once at startup.
pub struct Gateway {
    pub config: Config,
    pub http_handler: HttpHandler,
    pub command_handler: CommandHandler,
    pub knowledge_handler: KnowledgeHandler,
    pub auth_setup_handler: AuthSetupHandler,
    /// Shared with `http_handler` — also driven directly by the
    /// `fusion-gateway auth complete` CLI subcommand to finish an
    /// `oauth2_external`/`user_credentials` setup flow (spec §4.15).
    pub auth_manager: Arc<AuthManager>,
    pub tools: std::collections::HashMap<String, ToolDefinition>,
}

impl Gateway {
    pub fn build(config: Config, flags: &RuntimeFlags) -> Result<Self> {
        std::fs::create_dir_all(&flags.state_dir)?;

        let http_client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!flags.tls_verify)
            .timeout(Duration::from_secs(flags.timeout_secs))
            .build()
            .map_err(|e| fusion_domain::error::Error::config("http_client", "", format!("failed to build HTTP client: {e}")))?;

        let token_store = Arc::new(FileTokenStore::open(flags.state_dir.join("tokens.json"))?);
        let api_token_store = Arc::new(FileApiTokenStore::open(flags.state_dir.join("api_tokens.json"))?);
        let auth_code_store = Arc::new(FileAuthCodeStore::open(flags.state_dir.join("auth_codes.json"))?);
        let knowledge_store = Arc::new(FileKnowledgeStore::open(flags.state_dir.join("knowledge.json"))?);

        let auth_cache: Arc<dyn Cache> = Arc::new(fusion_cache::DbBackedCache::new(token_store.clone()));
        let registry = AuthStrategyRegistry::new(http_client.clone(), token_store.clone());
        let auth_manager = Arc::new(AuthManager::new(registry, auth_cache, token_store, api_token_store, auth_code_store.clone()));

        let response_cache: Arc<dyn Cache> = if flags.cache_enabled {
            let file_cache = Arc::new(FileCache::at(flags.state_dir.join("response_cache"))?);
            file_cache.spawn_sweeper();
            file_cache
        } else {
            Arc::new(NoopCache)
        };

        let metrics = Arc::new(fusion_http::MetricsCollector::new(flags.metrics_enabled));

        let http_handler = HttpHandler::new(http_client, auth_manager.clone(), response_cache, metrics)
            .with_request_timeout(Duration::from_secs(flags.timeout_secs));

        let tools = registrar::build_tool_map(&config);

        Ok(Self {
            config,
            http_handler,
            command_handler: CommandHandler::new(),
            knowledge_handler: KnowledgeHandler::new(knowledge_store),
            auth_setup_handler: AuthSetupHandler::new(auth_code_store, flags.external_url.clone()),
            auth_manager,
            tools,
        })
    }
}
