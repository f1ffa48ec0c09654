//! `forager onboard` — First-time setup.

use std::path::Path;

use forager_config::AppConfig;

/// Create the config and memory directories and a default config file.
/// Returns true when a new config file was written.
pub fn init_at(config_dir: &Path) -> std::io::Result<bool> {
    std::fs::create_dir_all(config_dir.join("memory"))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        return Ok(false);
    }
    std::fs::write(&config_path, AppConfig::default_toml())?;
    Ok(true)
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("Forager — First-Time Setup");
    println!("==========================\n");

    if init_at(&config_dir)? {
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Edit {} and add your API key", config_path.display());
        println!("   2. Add search instances under [tools] to enable web search");
        println!("   3. Run: forager ask \"what's the price of silver today?\"\n");
    } else {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_parseable_default_config_once() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(".forager");
        assert!(init_at(&dir).unwrap());
        assert!(dir.join("memory").is_dir());

        let loaded = AppConfig::load_from(&dir.join("config.toml")).unwrap();
        assert_eq!(loaded.agent.max_iterations, AppConfig::default().agent.max_iterations);

        assert!(!init_at(&dir).unwrap());
    }
}
