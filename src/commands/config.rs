//! Config and version command handlers.

use image_keeper::catalog::OpenStackSettings;
use image_keeper::config::KeeperConfig;

/// Config command.
///
/// The OpenStack password is never printed.
pub fn cmd_config(config: &KeeperConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Current Configuration");
    println!("=====================");
    println!();

    for (key, value) in config.entries() {
        println!("{key}: {value}");
    }
    println!();

    println!("OpenStack:");
    match OpenStackSettings::from_env() {
        Ok(settings) => {
            println!("  Auth URL: {}", settings.auth_url);
            println!("  Username: {}", settings.username);
            println!("  Password: ********");
            println!(
                "  Project: {}",
                settings
                    .project_id
                    .as_deref()
                    .or(settings.project_name.as_deref())
                    .unwrap_or("(none)")
            );
            println!("  User Domain: {}", settings.user_domain_name);
            println!("  Project Domain: {}", settings.project_domain_name);
            println!(
                "  Region: {}",
                settings.region.as_deref().unwrap_or("(any)")
            );
        },
        Err(e) => println!("  (not configured: {e})"),
    }

    Ok(())
}

/// Version command.
pub fn cmd_version() -> Result<(), Box<dyn std::error::Error>> {
    println!("image-keeper {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
