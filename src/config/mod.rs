use std::env;
use std::time::Duration;

use crate::jobs::JobSettings;

pub const DEFAULT_LLM_BASE_URL: &str = "https://integrate.api.nvidia.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "qwen/qwen3-coder-480b-a35b-instruct";
pub const DEFAULT_REGION: &str = "Vale do Capão, BA, Brazil";

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub bcrypt_cost: u32,
    pub admin_emails: Vec<String>,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub llm_base_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub region: String,
    pub job_interval_secs: u64,
    pub confidence_threshold: f64,
    pub max_check_in_radius: f64,
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    optional(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        // 支持 "24h" 写法
        let jwt_expiration = optional("JWT_EXPIRATION")
            .and_then(|v| v.trim_end_matches('h').parse::<u64>().ok())
            .unwrap_or(24);

        Ok(Config {
            database_url: optional("DATABASE_URL"),
            redis_url: optional("REDIS_URL"),
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiration_secs: jwt_expiration * 3600,
            bcrypt_cost: parsed("BCRYPT_COST", bcrypt::DEFAULT_COST),
            admin_emails: optional("ADMIN_EMAILS")
                .map(|v| {
                    v.split(',')
                        .map(|e| e.trim().to_lowercase())
                        .filter(|e| !e.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            rate_limit_window_secs: parsed("RATE_LIMIT_WINDOW", 60),
            rate_limit_requests: parsed("RATE_LIMIT_REQUESTS", 100),
            server_host: optional("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            server_port: parsed("SERVER_PORT", 3000),
            api_base_uri: optional("API_BASE_URI").unwrap_or_else(|| "/api".into()),
            llm_base_url: optional("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_LLM_BASE_URL.into()),
            llm_api_key: optional("LLM_API_KEY"),
            llm_model: optional("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.into()),
            region: optional("REGION").unwrap_or_else(|| DEFAULT_REGION.into()),
            job_interval_secs: parsed("JOB_INTERVAL_SECS", 30),
            confidence_threshold: parsed("CONFIDENCE_THRESHOLD", 0.8),
            max_check_in_radius: parsed("MAX_CHECK_IN_RADIUS", 5000.0),
        })
    }

    /// 本地运行和测试用的配置：内存存储，不连 Redis，没有模型密钥
    pub fn local(jwt_secret: impl Into<String>) -> Self {
        Config {
            database_url: None,
            redis_url: None,
            jwt_secret: jwt_secret.into(),
            jwt_expiration_secs: 24 * 3600,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            admin_emails: Vec::new(),
            rate_limit_window_secs: 60,
            rate_limit_requests: 100,
            server_host: "127.0.0.1".into(),
            server_port: 3000,
            api_base_uri: "/api".into(),
            llm_base_url: DEFAULT_LLM_BASE_URL.into(),
            llm_api_key: None,
            llm_model: DEFAULT_LLM_MODEL.into(),
            region: DEFAULT_REGION.into(),
            job_interval_secs: 30,
            confidence_threshold: 0.8,
            max_check_in_radius: 5000.0,
        }
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn is_admin(&self, email: &str) -> bool {
        let email = email.to_lowercase();
        self.admin_emails.iter().any(|admin| *admin == email)
    }

    pub fn job_settings(&self) -> JobSettings {
        JobSettings {
            interval: Duration::from_secs(self.job_interval_secs.max(1)),
            confidence_threshold: self.confidence_threshold,
            ..JobSettings::default()
        }
    }
}
