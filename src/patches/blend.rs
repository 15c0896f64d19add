//! Blend modes for compositing patch inputs
//!
//! Pixels are straight-alpha RGBA in 0..1. Each mode combines a source pixel,
//! scaled by the input's opacity, onto the accumulated canvas.

use serde::{Deserialize, Serialize};

/// How an input is combined with the inputs composited before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlendMode {
    /// Source-over alpha blending
    #[default]
    Normal,
    /// Linear dodge, clamped at white
    Additive,
    /// Darkens, `dst * src`
    Multiply,
    /// Lightens, `1 - (1 - dst) * (1 - src)`
    Screen,
}

impl BlendMode {
    /// Blend `src` onto `dst` with the given opacity
    pub fn blend(self, dst: [f32; 4], src: [f32; 4], opacity: f32) -> [f32; 4] {
        let sa = src[3] * opacity.clamp(0.0, 1.0);
        if sa <= 0.0 {
            return dst;
        }
        let da = dst[3];

        match self {
            BlendMode::Normal => {
                let out_a = sa + da * (1.0 - sa);
                if out_a <= 0.0 {
                    return [0.0; 4];
                }
                let mut out = [0.0, 0.0, 0.0, out_a];
                for c in 0..3 {
                    out[c] = (src[c] * sa + dst[c] * da * (1.0 - sa)) / out_a;
                }
                out
            }
            BlendMode::Additive => {
                let mut out = [0.0, 0.0, 0.0, da.max(sa)];
                for c in 0..3 {
                    out[c] = (dst[c] + src[c] * sa).min(1.0);
                }
                out
            }
            BlendMode::Multiply => mix_onto(dst, sa, |d, s| d * s, src),
            BlendMode::Screen => mix_onto(dst, sa, |d, s| 1.0 - (1.0 - d) * (1.0 - s), src),
        }
    }

    /// Get a human-readable name for the blend mode
    pub fn name(&self) -> &'static str {
        match self {
            BlendMode::Normal => "Normal",
            BlendMode::Additive => "Additive",
            BlendMode::Multiply => "Multiply",
            BlendMode::Screen => "Screen",
        }
    }

    /// Get all available blend modes
    pub fn all() -> &'static [BlendMode] {
        &[
            BlendMode::Normal,
            BlendMode::Additive,
            BlendMode::Multiply,
            BlendMode::Screen,
        ]
    }
}

fn mix_onto(dst: [f32; 4], sa: f32, op: impl Fn(f32, f32) -> f32, src: [f32; 4]) -> [f32; 4] {
    let mut out = [0.0, 0.0, 0.0, dst[3].max(sa)];
    for c in 0..3 {
        out[c] = dst[c] + (op(dst[c], src[c]) - dst[c]) * sa;
    }
    out
}

impl std::fmt::Display for BlendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAR: [f32; 4] = [0.0; 4];

    #[test]
    fn test_blend_mode_default() {
        assert_eq!(BlendMode::default(), BlendMode::Normal);
    }

    #[test]
    fn test_blend_mode_all() {
        let all = BlendMode::all();
        assert_eq!(all.len(), 4);
        assert_eq!(format!("{}", BlendMode::Additive), "Additive");
    }

    #[test]
    fn test_normal_onto_clear_copies_source() {
        let src = [0.2, 0.4, 0.6, 1.0];
        assert_eq!(BlendMode::Normal.blend(CLEAR, src, 1.0), src);
    }

    #[test]
    fn test_transparent_source_keeps_destination() {
        let dst = [0.5, 0.5, 0.5, 1.0];
        for mode in BlendMode::all() {
            assert_eq!(mode.blend(dst, [1.0, 1.0, 1.0, 0.0], 1.0), dst);
            assert_eq!(mode.blend(dst, [1.0, 1.0, 1.0, 1.0], 0.0), dst);
        }
    }

    #[test]
    fn test_half_opacity_normal() {
        let out = BlendMode::Normal.blend([0.0, 0.0, 0.0, 1.0], [1.0, 1.0, 1.0, 1.0], 0.5);
        assert!((out[0] - 0.5).abs() < 1e-5);
        assert!((out[3] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_additive_clamps() {
        let out = BlendMode::Additive.blend([0.8, 0.8, 0.8, 1.0], [0.5, 0.5, 0.5, 1.0], 1.0);
        assert_eq!(out, [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_multiply_and_screen() {
        let dst = [0.5, 0.5, 0.5, 1.0];
        let src = [0.5, 0.5, 0.5, 1.0];
        let m = BlendMode::Multiply.blend(dst, src, 1.0);
        let s = BlendMode::Screen.blend(dst, src, 1.0);
        assert!((m[0] - 0.25).abs() < 1e-5);
        assert!((s[0] - 0.75).abs() < 1e-5);
    }
}
