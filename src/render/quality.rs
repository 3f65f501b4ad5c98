//! Quality presets and their engine profiles

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Named render profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
    Ultra,
}

/// Fixed engine settings behind a preset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityProfile {
    /// Engine command-line flag
    pub flag: &'static str,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Nominal output bitrate in kbit/s
    pub bitrate_kbps: u32,
}

impl QualityProfile {
    /// Directory name the engine renders into, e.g. `720p30`
    pub fn dir_name(&self) -> String {
        format!("{}p{}", self.height, self.fps)
    }

    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl QualityPreset {
    pub const ALL: [QualityPreset; 4] = [
        QualityPreset::Low,
        QualityPreset::Medium,
        QualityPreset::High,
        QualityPreset::Ultra,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "low",
            QualityPreset::Medium => "medium",
            QualityPreset::High => "high",
            QualityPreset::Ultra => "ultra",
        }
    }

    pub fn profile(&self) -> QualityProfile {
        match self {
            QualityPreset::Low => QualityProfile {
                flag: "-ql",
                width: 854,
                height: 480,
                fps: 15,
                bitrate_kbps: 1_000,
            },
            QualityPreset::Medium => QualityProfile {
                flag: "-qm",
                width: 1280,
                height: 720,
                fps: 30,
                bitrate_kbps: 5_000,
            },
            QualityPreset::High => QualityProfile {
                flag: "-qh",
                width: 1920,
                height: 1080,
                fps: 60,
                bitrate_kbps: 12_000,
            },
            QualityPreset::Ultra => QualityProfile {
                flag: "-qk",
                width: 3840,
                height: 2160,
                fps: 60,
                bitrate_kbps: 45_000,
            },
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(QualityPreset::Low),
            "medium" => Ok(QualityPreset::Medium),
            "high" => Ok(QualityPreset::High),
            "ultra" => Ok(QualityPreset::Ultra),
            other => Err(format!("unknown quality '{}': choose from low, medium, high, ultra", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles() {
        assert_eq!(QualityPreset::Low.profile().flag, "-ql");
        assert_eq!(QualityPreset::Low.profile().dir_name(), "480p15");
        assert_eq!(QualityPreset::Medium.profile().dir_name(), "720p30");
        assert_eq!(QualityPreset::High.profile().resolution(), "1920x1080");
        assert_eq!(QualityPreset::Ultra.profile().flag, "-qk");
        assert_eq!(QualityPreset::Ultra.profile().dir_name(), "2160p60");
    }

    #[test]
    fn test_bitrate_grows_with_quality() {
        let rates: Vec<u32> = QualityPreset::ALL.iter().map(|q| q.profile().bitrate_kbps).collect();
        assert!(rates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_parse() {
        for quality in QualityPreset::ALL {
            assert_eq!(quality.to_string().parse::<QualityPreset>().unwrap(), quality);
        }
        assert_eq!("HIGH".parse::<QualityPreset>().unwrap(), QualityPreset::High);
        assert!("4k".parse::<QualityPreset>().is_err());
    }

    #[test]
    fn test_default_is_medium() {
        assert_eq!(QualityPreset::default(), QualityPreset::Medium);
    }
}
