use crate::config::model::Config;

pub fn load_config_from_path(config_path: &str) -> Result<Config, anyhow::Error> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", config_path, e))?;
    let config = load_config_from_str(&config_str)?;
    tracing::debug!(
        "Loaded {} services from {}",
        config.services.len(),
        config_path
    );
    Ok(config)
}

pub fn load_config_from_str(config_str: &str) -> Result<Config, anyhow::Error> {
    let config: Config = toml::from_str(config_str)?;
    config.validate()?;
    Ok(config)
}
