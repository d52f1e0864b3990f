use std::env;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub max_session_steps: u32,
    pub tool_timeout_secs: u64,
    pub data_dir: String,
    pub qwen_api_key: Option<String>,
    pub qwen_endpoint: Option<String>,
    pub qwen_model: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("PORT must be a valid number"),
            max_session_steps: env::var("MAX_SESSION_STEPS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .expect("MAX_SESSION_STEPS must be a valid number"),
            tool_timeout_secs: env::var("TOOL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("TOOL_TIMEOUT_SECS must be a valid number"),
            data_dir: env::var("RENO_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            qwen_api_key: env::var("QWEN_API_KEY").ok(),
            qwen_endpoint: env::var("QWEN_ENDPOINT").ok(),
            qwen_model: env::var("QWEN_MODEL").ok(),
        }
    }
}
