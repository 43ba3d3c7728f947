//! Typed environment configuration, loaded once at startup. Mirrors the
//! reference stack's `Config::from_env`: every variable is read explicitly,
//! required ones fail fast with a named error, optional ones fall back to a
//! documented default.

use anyhow::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhatsappProvider {
    Dummy,
    MetaCloud,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub app_name: String,
    pub env: String,
    pub port: u16,
    pub log_filter: String,

    pub altegio_webhook_secret: String,
    pub altegio_api_base_url: Option<String>,
    pub altegio_api_accept: Option<String>,
    pub altegio_partner_token: Option<String>,
    pub altegio_user_token: Option<String>,

    pub whatsapp_provider: WhatsappProvider,
    pub allow_real_send: bool,
    pub stop_worker_on_token_expired: bool,
    pub whatsapp_access_token: Option<String>,
    pub whatsapp_webhook_verify_token: Option<String>,
    pub whatsapp_graph_url: String,
    pub whatsapp_api_version: String,

    pub outbox_batch_size: i64,
    pub outbox_poll_interval_ms: u64,
    pub reconciler_batch_size: i64,
    pub reconciler_poll_interval_ms: u64,
}

fn env_var(key: &str) -> anyhow::Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var {key}"))
}

fn env_var_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_var_or(key: &str, default: &str) -> String {
    env_var_opt(key).unwrap_or_else(|| default.to_owned())
}

fn env_var_bool(key: &str, default: bool) -> anyhow::Result<bool> {
    match env_var_opt(key) {
        None => Ok(default),
        Some(v) => v
            .parse()
            .with_context(|| format!("env var {key} must be true or false, got {v:?}")),
    }
}

fn env_var_parsed<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env_var_opt(key) {
        None => Ok(default),
        Some(v) => v.parse().with_context(|| format!("invalid {key}: {v:?}")),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let whatsapp_provider = match env_var_or("WHATSAPP_PROVIDER", "dummy").as_str() {
            "dummy" => WhatsappProvider::Dummy,
            "meta_cloud" => WhatsappProvider::MetaCloud,
            other => anyhow::bail!("unknown WHATSAPP_PROVIDER: {other}"),
        };

        Ok(Self {
            database_url: env_var("DATABASE_URL")?,
            app_name: env_var_or("APP_NAME", "altegio-bot"),
            env: env_var_or("APP_ENV", "development"),
            port: env_var_parsed("PORT", 8080u16)?,
            log_filter: env_var_or("LOG_FILTER", "info,altegio_bot=debug,sqlx=warn"),

            altegio_webhook_secret: env_var("ALTEGIO_WEBHOOK_SECRET")?,
            altegio_api_base_url: env_var_opt("ALTEGIO_API_BASE_URL"),
            altegio_api_accept: env_var_opt("ALTEGIO_API_ACCEPT"),
            altegio_partner_token: env_var_opt("ALTEGIO_PARTNER_TOKEN"),
            altegio_user_token: env_var_opt("ALTEGIO_USER_TOKEN"),

            whatsapp_provider,
            allow_real_send: env_var_bool("ALLOW_REAL_SEND", false)?,
            stop_worker_on_token_expired: env_var_bool("STOP_WORKER_ON_TOKEN_EXPIRED", false)?,
            whatsapp_access_token: env_var_opt("WHATSAPP_ACCESS_TOKEN"),
            whatsapp_webhook_verify_token: env_var_opt("WHATSAPP_WEBHOOK_VERIFY_TOKEN"),
            whatsapp_graph_url: env_var_or("WHATSAPP_GRAPH_URL", "https://graph.facebook.com"),
            whatsapp_api_version: env_var_or("WHATSAPP_API_VERSION", "v20.0"),

            outbox_batch_size: env_var_parsed("OUTBOX_BATCH_SIZE", 50i64)?,
            outbox_poll_interval_ms: env_var_parsed("OUTBOX_POLL_INTERVAL_MS", 1000u64)?,
            reconciler_batch_size: env_var_parsed("RECONCILER_BATCH_SIZE", 50i64)?,
            reconciler_poll_interval_ms: env_var_parsed("RECONCILER_POLL_INTERVAL_MS", 1000u64)?,
        })
    }
}
