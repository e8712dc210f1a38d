use std::env;
use std::path::PathBuf;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MODEL_PATH: &str = "model.onnx";
const DEFAULT_TOKENIZER_PATH: &str = "tokenizer.json";
const DEFAULT_MODEL_CONFIG_PATH: &str = "config.json";
const DEFAULT_MAX_SEQ_LEN: usize = 128;

/// Process configuration, resolved once at startup and immutable afterwards.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
    pub model_config_path: PathBuf,
    pub max_seq_len: usize,
    /// Exact origins allowed by CORS; empty means any origin.
    pub allowed_origins: Vec<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Settings {
            bind_addr: env_or("TRUTHSEEK_BIND_ADDR", DEFAULT_BIND_ADDR),
            model_path: env_or("TRUTHSEEK_MODEL_PATH", DEFAULT_MODEL_PATH).into(),
            tokenizer_path: env_or("TRUTHSEEK_TOKENIZER_PATH", DEFAULT_TOKENIZER_PATH).into(),
            model_config_path: env_or("TRUTHSEEK_MODEL_CONFIG", DEFAULT_MODEL_CONFIG_PATH).into(),
            max_seq_len: max_seq_len_from_env(),
            allowed_origins: env::var("TRUTHSEEK_ALLOWED_ORIGINS")
                .map(|raw| parse_origins(&raw))
                .unwrap_or_default(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn max_seq_len_from_env() -> usize {
    match env::var("TRUTHSEEK_MAX_SEQ_LEN") {
        Err(_) => DEFAULT_MAX_SEQ_LEN,
        Ok(raw) => match raw.parse::<usize>() {
            Ok(len) if len > 0 => len,
            _ => {
                log::warn!("Ignoring invalid TRUTHSEEK_MAX_SEQ_LEN: {:?}", raw);
                DEFAULT_MAX_SEQ_LEN
            }
        },
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_owned)
        .collect()
}
