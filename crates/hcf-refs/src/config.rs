use hcf_types::{AddressWidth, FormatBounds, MAX_TOKEN_SIZE};
use serde::{Deserialize, Serialize};

use crate::error::{RefError, Result};

/// Configuration of a container's reference-relevant layout.
///
/// Loadable from TOML or JSON; missing fields take their defaults:
///
/// ```toml
/// name = "experiment.hcf"
/// address_width = 8
/// token_width = 8
///
/// [format_bounds]
/// low = "earliest"
/// high = "latest"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Name embedded in external references that point into this container.
    pub name: String,
    /// Width of file addresses in bytes (2, 4 or 8).
    pub address_width: AddressWidth,
    /// Width of object tokens; defaults to the address width.
    pub token_width: Option<u8>,
    /// Format versions the container may write.
    pub format_bounds: FormatBounds,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            name: "untitled.hcf".into(),
            address_width: AddressWidth::default(),
            token_width: None,
            format_bounds: FormatBounds::default(),
        }
    }
}

impl ContainerConfig {
    /// A default configuration with the given container name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| RefError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(s).map_err(|e| RefError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Effective token width.
    pub fn token_width(&self) -> u8 {
        self.token_width.unwrap_or(self.address_width.get())
    }

    /// Check that native tokens can hold an address and fit the maximum size.
    pub fn validate(&self) -> Result<()> {
        let token = self.token_width() as usize;
        if token < self.address_width.bytes() || token > MAX_TOKEN_SIZE {
            return Err(RefError::Config(format!(
                "token width {token} must be between address width {} and {MAX_TOKEN_SIZE}",
                self.address_width.get()
            )));
        }
        if self.format_bounds.low > self.format_bounds.high {
            return Err(RefError::Config(
                "format lower bound exceeds upper bound".into(),
            ));
        }
        if self.name.is_empty() {
            return Err(RefError::Config("container name is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hcf_types::FormatVersion;

    #[test]
    fn default_config() {
        let c = ContainerConfig::default();
        assert_eq!(c.address_width, AddressWidth::W8);
        assert_eq!(c.token_width(), 8);
        assert_eq!(c.format_bounds, FormatBounds::default());
        c.validate().unwrap();
    }

    #[test]
    fn toml_with_defaults() {
        let c = ContainerConfig::from_toml_str(
            r#"
            name = "a.hcf"
            address_width = 4
            "#,
        )
        .unwrap();
        assert_eq!(c.name, "a.hcf");
        assert_eq!(c.address_width.get(), 4);
        assert_eq!(c.token_width(), 4);
    }

    #[test]
    fn toml_full() {
        let c = ContainerConfig::from_toml_str(
            r#"
            name = "b.hcf"
            address_width = 8
            token_width = 16

            [format_bounds]
            low = "latest"
            high = "latest"
            "#,
        )
        .unwrap();
        assert_eq!(c.token_width(), 16);
        assert_eq!(c.format_bounds.low, FormatVersion::Latest);
    }

    #[test]
    fn json_config() {
        let c = ContainerConfig::from_json_str(r#"{"name": "c.hcf", "address_width": 2}"#).unwrap();
        assert_eq!(c.address_width.get(), 2);
    }

    #[test]
    fn invalid_address_width_is_rejected() {
        let err = ContainerConfig::from_toml_str("address_width = 3").unwrap_err();
        assert!(matches!(err, RefError::Config(_)));
    }

    #[test]
    fn token_narrower_than_address_is_rejected() {
        let c = ContainerConfig {
            token_width: Some(4),
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(RefError::Config(_))));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let c = ContainerConfig {
            format_bounds: FormatBounds {
                low: FormatVersion::Latest,
                high: FormatVersion::Earliest,
            },
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }
}
