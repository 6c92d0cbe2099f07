use common::PillarSettings;
use log::info;
use std::error::Error;
use std::path::Path;

/// Validate pillar settings and log what the pillar is going to serve
///
/// Checks:
/// - non-empty pillar id and at least one collection
/// - the allowed file id pattern compiles
/// - the default checksum spec names an algorithm
/// - VERIFIED trust mode has a credential and permissions
pub fn initialize(settings: PillarSettings) -> Result<PillarSettings, Box<dyn Error>> {
    settings.validate()?;

    info!("Initializing pillar '{}'", settings.pillar_id);
    info!("  Collections: {:?}", settings.collections);
    info!("  Storage dir: {}", settings.storage_dir.display());
    info!("  Default checksum: {}", settings.default_checksum_spec);
    info!("  Trust mode: {:?}", settings.security.mode);
    info!("  Listen address: {}", settings.listen_addr);

    Ok(settings)
}

/// Load pillar settings from a JSON file
pub fn load_settings(path: impl AsRef<Path>) -> Result<PillarSettings, Box<dyn Error>> {
    let content = std::fs::read_to_string(path)?;
    let settings: PillarSettings = serde_json::from_str(&content)?;
    Ok(settings)
}

/// Save pillar settings to a JSON file
pub fn save_settings(settings: &PillarSettings, path: impl AsRef<Path>) -> Result<(), Box<dyn Error>> {
    let content = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, content)?;
    Ok(())
}
