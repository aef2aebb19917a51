//! TOML configuration files.

use std::path::Path;

use parcel_morph_morphology_models::config::MorphologyConfig;

use crate::IoError;

/// Parses a configuration document. Missing keys take their defaults.
///
/// # Errors
///
/// Returns [`IoError::TomlParse`] on malformed TOML or unknown keys.
pub fn parse_config(text: &str) -> Result<MorphologyConfig, IoError> {
    Ok(toml::from_str(text)?)
}

/// Reads the configuration at `path`, or the defaults when `path` is `None`.
///
/// The result is not validated; callers apply overrides first.
///
/// # Errors
///
/// * If the file cannot be read
/// * If the file is not a valid configuration document
pub fn load_config(path: Option<&Path>) -> Result<MorphologyConfig, IoError> {
    let Some(path) = path else {
        return Ok(MorphologyConfig::default());
    };

    let text = std::fs::read_to_string(path).map_err(|e| IoError::io(path, e))?;
    let config = parse_config(&text)?;
    log::info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Renders `config` as a TOML document.
///
/// # Errors
///
/// Returns [`IoError::TomlRender`] if serialization fails.
pub fn render_config(config: &MorphologyConfig) -> Result<String, IoError> {
    Ok(toml::to_string(config)?)
}

#[cfg(test)]
mod tests {
    use parcel_morph_morphology_models::Feature;

    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(parse_config("").unwrap(), MorphologyConfig::default());
    }

    #[test]
    fn partial_document_overrides_named_keys() {
        let config = parse_config(
            r#"
cluster_count = 6
features = ["compactness_idx", "orientation_angle"]

[density]
cell_size_m = 25.0
"#,
        )
        .unwrap();

        assert_eq!(config.cluster_count, 6);
        assert_eq!(config.seed, 42);
        assert_eq!(
            config.features,
            vec![Feature::CompactnessIdx, Feature::OrientationAngle]
        );
        assert!((config.density.cell_size_m - 25.0).abs() < f64::EPSILON);
        assert!((config.density.buffer_m - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            parse_config("clusters = 3"),
            Err(IoError::TomlParse(_))
        ));
    }

    #[test]
    fn rendered_config_parses_back() {
        let config = MorphologyConfig {
            seed: 7,
            ..MorphologyConfig::default()
        };
        let text = render_config(&config).unwrap();
        assert!(text.contains("seed = 7"));
        assert_eq!(parse_config(&text).unwrap(), config);
    }

    #[test]
    fn missing_path_yields_defaults() {
        assert_eq!(load_config(None).unwrap(), MorphologyConfig::default());
    }
}
