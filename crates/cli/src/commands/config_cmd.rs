//! `forager config` — Configuration management commands.

use forager_config::AppConfig;

/// Warnings for settings that load but will not behave well.
pub fn warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();

    if config.api_key.is_none() && config.default_provider != "ollama" {
        warnings.push("No API key set (set OPENROUTER_API_KEY or OPENAI_API_KEY env var)");
    }

    if config.tools.search_instances.is_empty() {
        if config.agent.realtime_auto_search {
            warnings.push("realtime_auto_search is on but no search instances are configured");
        } else {
            warnings.push("No search instances configured; web search is disabled");
        }
    }

    if config.agent.max_retries_per_action == 0 {
        warnings.push("max_retries_per_action = 0 disables self-correction");
    }

    warnings
}

/// The effective config as TOML with every API key masked.
pub fn redacted_toml(config: &AppConfig) -> Result<String, toml::ser::Error> {
    let mut config = config.clone();
    if config.api_key.is_some() {
        config.api_key = Some("[REDACTED]".into());
    }
    for provider in config.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some("[REDACTED]".into());
        }
    }
    toml::to_string_pretty(&config)
}

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   ✅ Config parsed successfully");

    let warnings = warnings(&config);
    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    println!();
    println!("   Provider:    {}", config.default_provider);
    println!("   Model:       {}", config.default_model);
    println!("   Iterations:  {}", config.agent.max_iterations);
    println!("   Wall clock:  {}s", config.agent.wall_clock_secs);
    println!("   Memory:      {}", config.memory.backend);
    println!("   Tools:       {:?}", forager_tools::registry_from_config(&config).intents());

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", redacted_toml(&config)?);
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use forager_config::ProviderConfig;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn show_masks_every_key() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-secret-1".into());
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("sk-secret-2".into()),
                api_url: None,
                default_model: None,
            },
        );
        let out = redacted_toml(&config).unwrap();
        assert!(!out.contains("sk-secret"));
        assert_eq!(out.matches("[REDACTED]").count(), 2);
    }

    #[test]
    fn default_config_warns_about_missing_key_and_search() {
        let warnings = warnings(&AppConfig::default());
        assert!(warnings.iter().any(|w| w.contains("API key")));
        assert!(warnings.iter().any(|w| w.contains("search")));
    }
}
