use crate::config::defaults;
use crate::error::ConfigError;
use crate::frontmatter::Frontmatter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "3:4")]
    StandardPortrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Square => "1:1",
            AspectRatio::Standard => "4:3",
            AspectRatio::StandardPortrait => "3:4",
        }
    }
}

impl FromStr for AspectRatio {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "16:9" => Ok(AspectRatio::Landscape),
            "9:16" => Ok(AspectRatio::Portrait),
            "1:1" => Ok(AspectRatio::Square),
            "4:3" => Ok(AspectRatio::Standard),
            "3:4" => Ok(AspectRatio::StandardPortrait),
            other => Err(ConfigError::InvalidAspectRatio {
                value: other.to_string(),
                allowed: defaults::VALID_ASPECT_RATIOS.join(", "),
            }),
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "1K")]
    OneK,
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::OneK => "1K",
            Resolution::TwoK => "2K",
            Resolution::FourK => "4K",
        }
    }
}

impl FromStr for Resolution {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1K" => Ok(Resolution::OneK),
            "2K" => Ok(Resolution::TwoK),
            "4K" => Ok(Resolution::FourK),
            other => Err(ConfigError::InvalidResolution {
                value: other.to_string(),
                allowed: defaults::VALID_RESOLUTIONS.join(", "),
            }),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generation settings exactly as written in a prompt file's frontmatter.
///
/// Values stay in their textual form until [`GenerationConfig::validate`]
/// accepts them; this is also the shape recorded in session metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub title: String,
    pub aspect_ratio: String,
    pub resolution: String,
    pub temperature: f64,
    pub batch: i64,
    pub instructions: Option<String>,
    pub references: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            title: defaults::DEFAULT_TITLE.to_string(),
            aspect_ratio: defaults::DEFAULT_ASPECT_RATIO.to_string(),
            resolution: defaults::DEFAULT_RESOLUTION.to_string(),
            temperature: defaults::DEFAULT_TEMPERATURE,
            batch: defaults::DEFAULT_BATCH_SIZE as i64,
            instructions: None,
            references: Vec::new(),
        }
    }
}

impl GenerationConfig {
    pub fn from_frontmatter(frontmatter: &Frontmatter) -> Result<Self, ConfigError> {
        let mut config = GenerationConfig::default();

        if let Some(title) = frontmatter.text("title") {
            config.title = title.to_string();
        }
        if let Some(aspect_ratio) = frontmatter.text("aspect_ratio") {
            config.aspect_ratio = aspect_ratio.to_string();
        }
        if let Some(resolution) = frontmatter.text("resolution") {
            config.resolution = resolution.to_string();
        }
        if let Some(raw) = frontmatter.text("temperature") {
            config.temperature =
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidTemperature {
                        value: raw.to_string(),
                        min: defaults::MIN_TEMPERATURE,
                        max: defaults::MAX_TEMPERATURE,
                    })?;
        }
        if let Some(raw) = frontmatter.text("batch") {
            config.batch = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidBatchSize {
                    value: raw.to_string(),
                    min: defaults::MIN_BATCH_SIZE,
                    max: defaults::MAX_BATCH_SIZE,
                })?;
        }
        config.instructions = frontmatter
            .text("instructions")
            .filter(|path| !path.is_empty())
            .map(String::from);
        if let Some(references) = frontmatter.list("references") {
            config.references = references.to_vec();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.aspect_ratio.parse::<AspectRatio>()?;
        self.resolution.parse::<Resolution>()?;

        if !(defaults::MIN_TEMPERATURE..=defaults::MAX_TEMPERATURE).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature {
                value: self.temperature.to_string(),
                min: defaults::MIN_TEMPERATURE,
                max: defaults::MAX_TEMPERATURE,
            });
        }

        self.batch_size()?;

        if self.references.len() > defaults::MAX_REFERENCE_IMAGES {
            return Err(ConfigError::TooManyReferences {
                count: self.references.len(),
                max: defaults::MAX_REFERENCE_IMAGES,
            });
        }

        log::debug!("Configuration validated: {:?}", self);
        Ok(())
    }

    fn batch_size(&self) -> Result<u32, ConfigError> {
        let min = defaults::MIN_BATCH_SIZE as i64;
        let max = defaults::MAX_BATCH_SIZE as i64;
        if (min..=max).contains(&self.batch) {
            Ok(self.batch as u32)
        } else {
            Err(ConfigError::InvalidBatchSize {
                value: self.batch.to_string(),
                min: defaults::MIN_BATCH_SIZE,
                max: defaults::MAX_BATCH_SIZE,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceImage {
    pub path: PathBuf,
    pub data: Vec<u8>,
    pub mime_type: String,
}

/// A fully validated, immutable description of one generation invocation.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    title: String,
    prompt_text: String,
    system_instructions: Option<String>,
    reference_images: Vec<ReferenceImage>,
    aspect_ratio: AspectRatio,
    resolution: Resolution,
    temperature: f64,
    batch_size: u32,
}

impl GenerationRequest {
    pub fn new(
        config: &GenerationConfig,
        prompt_text: impl Into<String>,
        system_instructions: Option<String>,
        reference_images: Vec<ReferenceImage>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        if reference_images.len() > defaults::MAX_REFERENCE_IMAGES {
            return Err(ConfigError::TooManyReferences {
                count: reference_images.len(),
                max: defaults::MAX_REFERENCE_IMAGES,
            });
        }

        Ok(Self {
            title: config.title.clone(),
            prompt_text: prompt_text.into(),
            system_instructions,
            reference_images,
            aspect_ratio: config.aspect_ratio.parse()?,
            resolution: config.resolution.parse()?,
            temperature: config.temperature,
            batch_size: config.batch_size()?,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn prompt_text(&self) -> &str {
        &self.prompt_text
    }

    pub fn system_instructions(&self) -> Option<&str> {
        self.system_instructions.as_deref()
    }

    pub fn reference_images(&self) -> &[ReferenceImage] {
        &self.reference_images
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::parse_frontmatter;

    fn valid() -> GenerationConfig {
        GenerationConfig {
            title: "castle".into(),
            aspect_ratio: "16:9".into(),
            resolution: "2K".into(),
            temperature: 0.5,
            batch: 2,
            instructions: None,
            references: vec!["a.png".into()],
        }
    }

    #[test]
    fn accepts_every_allowed_combination() {
        for aspect_ratio in defaults::VALID_ASPECT_RATIOS {
            for resolution in defaults::VALID_RESOLUTIONS {
                for batch in 1..=4 {
                    for temperature in [0.0, 0.35, 1.0] {
                        let config = GenerationConfig {
                            aspect_ratio: aspect_ratio.into(),
                            resolution: resolution.into(),
                            temperature,
                            batch,
                            references: vec!["r.jpg".to_string(); 14],
                            ..valid()
                        };
                        assert!(config.validate().is_ok(), "{:?}", config);
                    }
                }
            }
        }
    }

    #[test]
    fn rejects_each_field_independently() {
        let cases = [
            (
                GenerationConfig {
                    aspect_ratio: "21:9".into(),
                    ..valid()
                },
                "aspect_ratio",
            ),
            (
                GenerationConfig {
                    resolution: "8K".into(),
                    ..valid()
                },
                "resolution",
            ),
            (
                GenerationConfig {
                    temperature: 1.5,
                    ..valid()
                },
                "temperature",
            ),
            (
                GenerationConfig {
                    temperature: -0.1,
                    ..valid()
                },
                "temperature",
            ),
            (GenerationConfig { batch: 0, ..valid() }, "batch"),
            (GenerationConfig { batch: 5, ..valid() }, "batch"),
            (
                GenerationConfig {
                    references: vec!["r.jpg".to_string(); 15],
                    ..valid()
                },
                "references",
            ),
        ];

        for (config, field) in cases {
            let err = config.validate().unwrap_err();
            assert_eq!(err.field(), field, "{:?}", config);
        }
    }

    #[test]
    fn nan_temperature_is_rejected() {
        let config = GenerationConfig {
            temperature: f64::NAN,
            ..valid()
        };
        assert_eq!(config.validate().unwrap_err().field(), "temperature");
    }

    #[test]
    fn from_frontmatter_applies_defaults() {
        let (frontmatter, _) = parse_frontmatter("no header here");
        let config = GenerationConfig::from_frontmatter(&frontmatter).unwrap();
        assert_eq!(config, GenerationConfig::default());
    }

    #[test]
    fn from_frontmatter_reads_all_fields() {
        let doc = "---\ntitle: fantasy_scene\naspect_ratio: 16:9\nresolution: 1K\ntemperature: 0.8\nbatch: 2\ninstructions: system.md\nreferences: [assets/castle_ref.jpg, assets/style_ref.png]\n---\nA fantasy castle";
        let (frontmatter, _) = parse_frontmatter(doc);
        let config = GenerationConfig::from_frontmatter(&frontmatter).unwrap();

        assert_eq!(config.title, "fantasy_scene");
        assert_eq!(config.aspect_ratio, "16:9");
        assert_eq!(config.temperature, 0.8);
        assert_eq!(config.batch, 2);
        assert_eq!(config.instructions.as_deref(), Some("system.md"));
        assert_eq!(
            config.references,
            vec!["assets/castle_ref.jpg", "assets/style_ref.png"]
        );
    }

    #[test]
    fn unparsable_numbers_are_config_errors() {
        let (frontmatter, _) = parse_frontmatter("---\nbatch: many\n---\nx");
        let err = GenerationConfig::from_frontmatter(&frontmatter).unwrap_err();
        assert_eq!(err.field(), "batch");

        let (frontmatter, _) = parse_frontmatter("---\ntemperature: hot\n---\nx");
        let err = GenerationConfig::from_frontmatter(&frontmatter).unwrap_err();
        assert_eq!(err.field(), "temperature");
    }

    #[test]
    fn request_carries_typed_values() {
        let request = GenerationRequest::new(&valid(), "prompt", None, Vec::new()).unwrap();
        assert_eq!(request.aspect_ratio(), AspectRatio::Landscape);
        assert_eq!(request.resolution(), Resolution::TwoK);
        assert_eq!(request.batch_size(), 2);
        assert_eq!(request.title(), "castle");
    }

    #[test]
    fn request_rejects_invalid_config() {
        let config = GenerationConfig { batch: 7, ..valid() };
        assert!(GenerationRequest::new(&config, "prompt", None, Vec::new()).is_err());
    }
}
