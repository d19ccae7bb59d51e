use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub llm_api_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    pub sandbox_api_url: String,
    pub sandbox_api_key: Option<String>,
    pub allowed_origins: Vec<String>,
    pub port: u16,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let config_builder = config::Config::builder()
            // Load base config from TOML file
            .add_source(
                config::File::with_name(&format!("config/{}", env)).required(false), // Allow missing config file, fallback to ENV
            )
            // Override with environment variables (prefix: APP_)
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let settings = config_builder.build()?;

        // Extract values with fallbacks to ENV or defaults
        let llm_api_url = settings
            .get_string("llm.api_url")
            .or_else(|_| env::var("OPENAI_API_URL"))
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        let llm_api_key = settings
            .get_string("llm.api_key")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .unwrap_or_else(|_| {
                if env == "prod" {
                    panic!("FATAL: OPENAI_API_KEY must be set in production!");
                }
                eprintln!("WARNING: Using empty OPENAI_API_KEY (dev mode only!)");
                String::new()
            });

        let llm_model = settings
            .get_string("llm.model")
            .or_else(|_| env::var("OPENAI_MODEL"))
            .unwrap_or_else(|_| "gpt-3.5-turbo".to_string());

        let sandbox_api_url = settings
            .get_string("sandbox.api_url")
            .or_else(|_| env::var("JUDGE0_API_URL"))
            .unwrap_or_else(|_| "https://judge0-ce.p.rapidapi.com".to_string());

        let sandbox_api_key = settings
            .get_string("sandbox.api_key")
            .or_else(|_| env::var("JUDGE0_API_KEY"))
            .ok()
            .filter(|key| !key.is_empty());

        if sandbox_api_key.is_none() && env == "prod" {
            panic!("FATAL: JUDGE0_API_KEY must be set in production!");
        }

        let allowed_origins = settings
            .get_string("server.allowed_origins")
            .or_else(|_| env::var("ALLOWED_ORIGINS"))
            .map(|raw| {
                raw.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ]
            });

        let port = settings
            .get_string("server.port")
            .or_else(|_| env::var("PORT"))
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8080);

        Ok(Config {
            llm_api_url,
            llm_api_key,
            llm_model,
            sandbox_api_url,
            sandbox_api_key,
            allowed_origins,
            port,
        })
    }
}
