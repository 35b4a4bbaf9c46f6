const AGENT_CONFIG: &str = "AGENT_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "./config.json";

pub fn get_default_config_path() -> String {
    DEFAULT_CONFIG_PATH.to_string()
}

/// Config file path from the environment, falling back to `./config.json`
pub fn get_config_path() -> String {
    let path_from_env = std::env::var(AGENT_CONFIG);
    path_from_env.unwrap_or_else(|_| get_default_config_path())
}

const AGENT_SECRET: &str = "AGENT_SECRET";

pub fn get_secret() -> Option<String> {
    let secret_from_env = std::env::var(AGENT_SECRET);
    secret_from_env.ok().filter(|secret| !secret.is_empty())
}
