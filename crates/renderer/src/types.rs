use std::fmt;
use std::str::FromStr;

use preview::DEFAULT_TIME_STEP;

/// Flat colour drawn while a surface has never bound a program.
pub const DEFAULT_FALLBACK_COLOR: [f32; 3] = [1.0, 0.0, 0.0];

/// Output color handling for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpaceMode {
    /// Gamma-encoded swapchain, which is what browser-style shaders expect.
    #[default]
    Auto,
    /// Treat shader outputs as gamma-encoded; use non-sRGB surfaces.
    Gamma,
    /// Treat shader outputs as linear and use sRGB swapchains for conversion.
    Linear,
}

impl FromStr for ColorSpaceMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "gamma" => Ok(Self::Gamma),
            "linear" => Ok(Self::Linear),
            "" => Err("color space must not be empty".to_string()),
            other => Err(format!(
                "unknown color space '{other}' (expected auto, gamma, or linear)"
            )),
        }
    }
}

/// Anti-aliasing policy for the render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Antialiasing {
    /// Pick the highest sample count supported by the surface format.
    #[default]
    Auto,
    /// Disable MSAA and render directly into the swapchain.
    Off,
    /// Request a specific MSAA sample count (clamped to what the device supports).
    Samples(u32),
}

impl FromStr for Antialiasing {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("anti-alias mode must not be empty".to_string());
        }

        let normalized = trimmed.to_ascii_lowercase();
        match normalized.as_str() {
            "auto" | "max" | "default" => Ok(Antialiasing::Auto),
            "off" | "none" | "disable" | "disabled" | "0" => Ok(Antialiasing::Off),
            _ => {
                let samples: u32 = normalized.parse().map_err(|_| {
                    format!("invalid anti-alias sample count '{trimmed}'; use auto/off or 2/4/8/16")
                })?;

                if samples <= 1 {
                    return Ok(Antialiasing::Off);
                }

                if !matches!(samples, 2 | 4 | 8 | 16) {
                    return Err(format!(
                        "unsupported sample count {samples}; supported values are 2, 4, 8, or 16"
                    ));
                }

                Ok(Antialiasing::Samples(samples))
            }
        }
    }
}

impl fmt::Display for Antialiasing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Antialiasing::Auto => f.write_str("auto"),
            Antialiasing::Off => f.write_str("off"),
            Antialiasing::Samples(count) => write!(f, "{count}"),
        }
    }
}

/// Settings shared by every preview window of one editing session.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Initial size of the inline preview window in physical pixels.
    pub inline_size: (u32, u32),
    /// Initial size of the pop-out preview window in physical pixels.
    pub secondary_size: (u32, u32),
    /// Anti-aliasing mode requested by the caller.
    pub antialiasing: Antialiasing,
    /// Desired color handling for the swapchain.
    pub color_space: ColorSpaceMode,
    /// Linear RGB used by the fallback visual.
    pub fallback_color: [f32; 3],
    /// Seconds added to each surface clock per frame.
    pub time_step: f64,
    /// Open the pop-out window immediately after the inline one.
    pub open_secondary: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            inline_size: (640, 360),
            secondary_size: (800, 600),
            antialiasing: Antialiasing::default(),
            color_space: ColorSpaceMode::default(),
            fallback_color: DEFAULT_FALLBACK_COLOR,
            time_step: DEFAULT_TIME_STEP,
            open_secondary: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_antialias_modes() {
        assert_eq!("auto".parse::<Antialiasing>(), Ok(Antialiasing::Auto));
        assert_eq!(" OFF ".parse::<Antialiasing>(), Ok(Antialiasing::Off));
        assert_eq!("1".parse::<Antialiasing>(), Ok(Antialiasing::Off));
        assert_eq!("4".parse::<Antialiasing>(), Ok(Antialiasing::Samples(4)));
        assert!("3".parse::<Antialiasing>().is_err());
        assert!("many".parse::<Antialiasing>().is_err());
    }

    #[test]
    fn antialias_display_parses_back() {
        for mode in [Antialiasing::Auto, Antialiasing::Off, Antialiasing::Samples(8)] {
            assert_eq!(mode.to_string().parse::<Antialiasing>(), Ok(mode));
        }
    }

    #[test]
    fn parses_color_space() {
        assert_eq!("Linear".parse::<ColorSpaceMode>(), Ok(ColorSpaceMode::Linear));
        assert!("".parse::<ColorSpaceMode>().is_err());
        assert!("hdr".parse::<ColorSpaceMode>().is_err());
    }

    #[test]
    fn default_secondary_window_matches_popup_size() {
        let config = RendererConfig::default();
        assert_eq!(config.secondary_size, (800, 600));
        assert_eq!(config.fallback_color, [1.0, 0.0, 0.0]);
    }
}
