//! Edge blending for projector overlap
//!
//! Each enabled edge fades the output towards black over a band of its
//! width, shaped by a gamma curve and lifted by a black level.

use serde::{Deserialize, Serialize};

/// Edge blending configuration for all four edges
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeBlendConfig {
    pub left: EdgeBlendRegion,
    pub right: EdgeBlendRegion,
    pub top: EdgeBlendRegion,
    pub bottom: EdgeBlendRegion,
}

impl EdgeBlendConfig {
    /// Check if any edge blending is enabled
    pub fn is_any_enabled(&self) -> bool {
        self.left.enabled || self.right.enabled || self.top.enabled || self.bottom.enabled
    }

    /// Enable blending on left and right edges
    pub fn horizontal(width: f32, gamma: f32) -> Self {
        Self {
            left: EdgeBlendRegion::new(width, gamma),
            right: EdgeBlendRegion::new(width, gamma),
            ..Self::default()
        }
    }

    pub fn disable_all(&mut self) {
        self.left.enabled = false;
        self.right.enabled = false;
        self.top.enabled = false;
        self.bottom.enabled = false;
    }

    /// Clamp every region into its valid ranges
    pub fn sanitize(&mut self) {
        for region in [&mut self.left, &mut self.right, &mut self.top, &mut self.bottom] {
            region.set_width(region.width);
            region.set_gamma(region.gamma);
            region.set_black_level(region.black_level);
        }
    }

    /// Brightness multiplier at normalized output position `u, v`
    ///
    /// Matches the warp shader: the product of the four edge ramps.
    pub fn factor(&self, u: f32, v: f32) -> f32 {
        self.left.ramp(u)
            * self.right.ramp(1.0 - u)
            * self.top.ramp(v)
            * self.bottom.ramp(1.0 - v)
    }

    /// Shader-ready parameters: per edge `[width, gamma, black_level, enabled]`
    pub fn to_uniform(&self) -> [[f32; 4]; 4] {
        [
            self.left.to_uniform(),
            self.right.to_uniform(),
            self.top.to_uniform(),
            self.bottom.to_uniform(),
        ]
    }
}

/// Configuration for a single edge blend region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeBlendRegion {
    pub enabled: bool,

    /// Blend band width (0.0-0.5 of the output)
    pub width: f32,

    /// Gamma curve for the falloff
    pub gamma: f32,

    /// Floor of the ramp, hides the overlap halo
    #[serde(rename = "blackLevel")]
    pub black_level: f32,
}

impl Default for EdgeBlendRegion {
    fn default() -> Self {
        Self {
            enabled: false,
            width: 0.15,
            gamma: 2.2,
            black_level: 0.0,
        }
    }
}

impl EdgeBlendRegion {
    /// Create an enabled blend region with specified width and gamma
    pub fn new(width: f32, gamma: f32) -> Self {
        Self {
            enabled: true,
            width: width.clamp(0.0, 0.5),
            gamma: gamma.clamp(0.1, 4.0),
            black_level: 0.0,
        }
    }

    pub fn set_width(&mut self, width: f32) {
        self.width = width.clamp(0.0, 0.5);
    }

    pub fn set_gamma(&mut self, gamma: f32) {
        self.gamma = gamma.clamp(0.1, 4.0);
    }

    pub fn set_black_level(&mut self, level: f32) {
        self.black_level = level.clamp(0.0, 0.5);
    }

    /// Ramp value at `distance` from this edge
    pub fn ramp(&self, distance: f32) -> f32 {
        if !self.enabled || self.width <= 0.0 {
            return 1.0;
        }
        let t = (distance / self.width).clamp(0.0, 1.0);
        let curve = t.powf(self.gamma);
        self.black_level + (1.0 - self.black_level) * curve
    }

    fn to_uniform(&self) -> [f32; 4] {
        [
            self.width,
            self.gamma,
            self.black_level,
            if self.enabled { 1.0 } else { 0.0 },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EdgeBlendConfig::default();
        assert!(!config.is_any_enabled());
        assert_eq!(config.factor(0.0, 0.0), 1.0);
        assert_eq!(config.factor(0.5, 0.5), 1.0);
    }

    #[test]
    fn test_horizontal_blend() {
        let config = EdgeBlendConfig::horizontal(0.2, 1.0);
        assert!(config.left.enabled);
        assert!(config.right.enabled);
        assert!(!config.top.enabled);

        assert_eq!(config.factor(0.0, 0.5), 0.0);
        assert!((config.factor(0.1, 0.5) - 0.5).abs() < 1e-5);
        assert_eq!(config.factor(0.5, 0.5), 1.0);
        assert!((config.factor(0.9, 0.0) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_black_level_lifts_floor() {
        let mut region = EdgeBlendRegion::new(0.2, 2.2);
        region.set_black_level(0.1);
        assert!((region.ramp(0.0) - 0.1).abs() < 1e-6);
        assert_eq!(region.ramp(0.3), 1.0);
    }

    #[test]
    fn test_region_clamping() {
        let mut region = EdgeBlendRegion::default();
        region.set_width(1.0);
        assert_eq!(region.width, 0.5);

        region.set_gamma(0.0);
        assert_eq!(region.gamma, 0.1);

        region.set_gamma(10.0);
        assert_eq!(region.gamma, 4.0);
    }

    #[test]
    fn test_sanitize() {
        let mut config = EdgeBlendConfig::default();
        config.top.width = 3.0;
        config.bottom.black_level = -1.0;
        config.sanitize();
        assert_eq!(config.top.width, 0.5);
        assert_eq!(config.bottom.black_level, 0.0);
    }
}
