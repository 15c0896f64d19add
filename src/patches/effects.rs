//! CPU effect chain
//!
//! Every effect reads an RGBA8 frame and writes one of the same size. Each
//! has two normalized parameters, `amount` and `level`, whose meaning depends
//! on the effect.

use serde::{Deserialize, Serialize};

/// Parameters handed to an effect each tick, both in 0..1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectParams {
    pub amount: f32,
    pub level: f32,
}

/// Runtime for a CPU effect
pub trait PatchEffect: Send {
    /// Process a frame through the effect
    ///
    /// `input` and `output` are RGBA8 buffers of `width * height * 4` bytes.
    fn process(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        width: u32,
        height: u32,
        params: &EffectParams,
    );

    /// The kind this runtime implements
    fn kind(&self) -> EffectKind;
}

/// Available effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    Invert,
    Threshold,
    Levels,
    Blur,
    Trails,
}

impl EffectKind {
    pub fn all() -> &'static [EffectKind] {
        &[
            EffectKind::Invert,
            EffectKind::Threshold,
            EffectKind::Levels,
            EffectKind::Blur,
            EffectKind::Trails,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::Invert => "Invert",
            EffectKind::Threshold => "Threshold",
            EffectKind::Levels => "Levels",
            EffectKind::Blur => "Blur",
            EffectKind::Trails => "Trails",
        }
    }

    /// Labels for the `amount` and `level` parameters
    pub fn parameter_labels(&self) -> (&'static str, &'static str) {
        match self {
            EffectKind::Invert => ("Amount", "Invert Alpha"),
            EffectKind::Threshold => ("Softness", "Cutoff"),
            EffectKind::Levels => ("Black Point", "White Point"),
            EffectKind::Blur => ("Radius", "Mix"),
            EffectKind::Trails => ("Feedback", "Gain"),
        }
    }

    /// Parameter values that leave a frame unchanged or close to it
    pub fn default_params(&self) -> EffectParams {
        let (amount, level) = match self {
            EffectKind::Invert => (1.0, 0.0),
            EffectKind::Threshold => (0.0, 0.5),
            EffectKind::Levels => (0.0, 1.0),
            EffectKind::Blur => (0.1, 1.0),
            EffectKind::Trails => (0.8, 1.0),
        };
        EffectParams { amount, level }
    }

    pub fn create_runtime(&self) -> Box<dyn PatchEffect> {
        match self {
            EffectKind::Invert => Box::new(Invert),
            EffectKind::Threshold => Box::new(Threshold),
            EffectKind::Levels => Box::new(Levels),
            EffectKind::Blur => Box::new(Blur::default()),
            EffectKind::Trails => Box::new(Trails::default()),
        }
    }
}

impl std::fmt::Display for EffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Rec. 601 luma of an RGB pixel in 0..1
fn luma(px: &[u8]) -> f32 {
    (0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32) / 255.0
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

struct Invert;

impl PatchEffect for Invert {
    fn process(&mut self, input: &[u8], output: &mut [u8], _w: u32, _h: u32, params: &EffectParams) {
        let amount = params.amount.clamp(0.0, 1.0);
        let invert_alpha = params.level > 0.5;

        for (src, dst) in input.chunks_exact(4).zip(output.chunks_exact_mut(4)) {
            for c in 0..3 {
                let v = src[c] as f32;
                dst[c] = (v + ((255.0 - v) - v) * amount).round() as u8;
            }
            dst[3] = if invert_alpha { 255 - src[3] } else { src[3] };
        }
    }

    fn kind(&self) -> EffectKind {
        EffectKind::Invert
    }
}

struct Threshold;

impl PatchEffect for Threshold {
    fn process(&mut self, input: &[u8], output: &mut [u8], _w: u32, _h: u32, params: &EffectParams) {
        let cutoff = params.level.clamp(0.0, 1.0);
        let half_soft = params.amount.clamp(0.0, 1.0) / 2.0;

        for (src, dst) in input.chunks_exact(4).zip(output.chunks_exact_mut(4)) {
            let l = luma(src);
            let v = if half_soft <= f32::EPSILON {
                if l >= cutoff {
                    1.0
                } else {
                    0.0
                }
            } else {
                let t = ((l - (cutoff - half_soft)) / (2.0 * half_soft)).clamp(0.0, 1.0);
                t * t * (3.0 - 2.0 * t)
            };
            let out = to_u8(v);
            dst[0] = out;
            dst[1] = out;
            dst[2] = out;
            dst[3] = src[3];
        }
    }

    fn kind(&self) -> EffectKind {
        EffectKind::Threshold
    }
}

struct Levels;

impl PatchEffect for Levels {
    fn process(&mut self, input: &[u8], output: &mut [u8], _w: u32, _h: u32, params: &EffectParams) {
        let low = params.amount.clamp(0.0, 1.0);
        let high = params.level.clamp(0.0, 1.0).max(low + 1.0 / 255.0);
        let range = high - low;

        for (src, dst) in input.chunks_exact(4).zip(output.chunks_exact_mut(4)) {
            for c in 0..3 {
                dst[c] = to_u8((src[c] as f32 / 255.0 - low) / range);
            }
            dst[3] = src[3];
        }
    }

    fn kind(&self) -> EffectKind {
        EffectKind::Levels
    }
}

/// Largest blur radius in pixels
const MAX_BLUR_RADIUS: f32 = 16.0;

/// Separable box blur
#[derive(Default)]
struct Blur {
    scratch: Vec<u8>,
}

impl Blur {
    fn pass(src: &[u8], dst: &mut [u8], width: usize, height: usize, radius: usize, horizontal: bool) {
        let (outer, inner) = if horizontal { (height, width) } else { (width, height) };
        let index = |o: usize, i: usize| {
            if horizontal {
                (o * width + i) * 4
            } else {
                (i * width + o) * 4
            }
        };

        for o in 0..outer {
            for i in 0..inner {
                let start = i.saturating_sub(radius);
                let end = (i + radius).min(inner - 1);
                let mut sum = [0u32; 4];
                for k in start..=end {
                    let p = index(o, k);
                    for c in 0..4 {
                        sum[c] += src[p + c] as u32;
                    }
                }
                let count = (end - start + 1) as u32;
                let p = index(o, i);
                for c in 0..4 {
                    dst[p + c] = ((sum[c] + count / 2) / count) as u8;
                }
            }
        }
    }
}

impl PatchEffect for Blur {
    fn process(&mut self, input: &[u8], output: &mut [u8], width: u32, height: u32, params: &EffectParams) {
        let radius = (params.amount.clamp(0.0, 1.0) * MAX_BLUR_RADIUS).round() as usize;
        let mix = params.level.clamp(0.0, 1.0);
        if radius == 0 || width == 0 || height == 0 {
            output.copy_from_slice(input);
            return;
        }

        let (w, h) = (width as usize, height as usize);
        self.scratch.resize(input.len(), 0);
        Self::pass(input, &mut self.scratch, w, h, radius, true);
        Self::pass(&self.scratch, output, w, h, radius, false);

        if mix < 1.0 {
            for (src, dst) in input.iter().zip(output.iter_mut()) {
                let s = *src as f32;
                *dst = (s + (*dst as f32 - s) * mix).round() as u8;
            }
        }
    }

    fn kind(&self) -> EffectKind {
        EffectKind::Blur
    }
}

/// Feedback trails, the only effect that carries state between ticks
#[derive(Default)]
struct Trails {
    history: Vec<f32>,
}

impl PatchEffect for Trails {
    fn process(&mut self, input: &[u8], output: &mut [u8], _w: u32, _h: u32, params: &EffectParams) {
        let feedback = params.amount.clamp(0.0, 0.99);
        let gain = params.level.clamp(0.0, 1.0);

        if self.history.len() != input.len() {
            self.history = input.iter().map(|&v| v as f32).collect();
        }

        for ((src, prev), dst) in input.iter().zip(self.history.iter_mut()).zip(output.iter_mut()) {
            let fresh = *src as f32 * gain;
            let v = (fresh * (1.0 - feedback) + *prev * feedback).max(fresh);
            *prev = v;
            *dst = v.round().clamp(0.0, 255.0) as u8;
        }
    }

    fn kind(&self) -> EffectKind {
        EffectKind::Trails
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(kind: EffectKind, input: &[u8], w: u32, h: u32, amount: f32, level: f32) -> Vec<u8> {
        let mut runtime = kind.create_runtime();
        let mut output = vec![0u8; input.len()];
        runtime.process(input, &mut output, w, h, &EffectParams { amount, level });
        output
    }

    #[test]
    fn test_runtime_kinds() {
        for kind in EffectKind::all() {
            assert_eq!(kind.create_runtime().kind(), *kind);
        }
    }

    #[test]
    fn test_invert() {
        let out = run(EffectKind::Invert, &[0, 100, 255, 200], 1, 1, 1.0, 0.0);
        assert_eq!(out, vec![255, 155, 0, 200]);

        let out = run(EffectKind::Invert, &[0, 100, 255, 200], 1, 1, 0.0, 1.0);
        assert_eq!(out, vec![0, 100, 255, 55]);
    }

    #[test]
    fn test_threshold_hard() {
        let input = [10, 10, 10, 255, 240, 240, 240, 255];
        let out = run(EffectKind::Threshold, &input, 2, 1, 0.0, 0.5);
        assert_eq!(out, vec![0, 0, 0, 255, 255, 255, 255, 255]);
    }

    #[test]
    fn test_levels_identity_and_stretch() {
        let input = [0, 64, 128, 255, 255, 255, 255, 10];
        assert_eq!(run(EffectKind::Levels, &input, 2, 1, 0.0, 1.0), input.to_vec());

        let out = run(EffectKind::Levels, &[128, 128, 128, 255], 1, 1, 0.0, 0.5);
        assert_eq!(out[0], 255);
    }

    #[test]
    fn test_blur_uniform_image_unchanged() {
        let input = vec![77u8; 8 * 8 * 4];
        let out = run(EffectKind::Blur, &input, 8, 8, 0.25, 1.0);
        assert_eq!(out, input);
    }

    #[test]
    fn test_blur_spreads_a_point() {
        let mut input = vec![0u8; 5 * 1 * 4];
        input[2 * 4] = 255;
        let out = run(EffectKind::Blur, &input, 5, 1, 1.0 / MAX_BLUR_RADIUS, 1.0);
        // radius 1: the bright pixel leaks into both neighbours
        assert!(out[4] > 0);
        assert!(out[3 * 4] > 0);
        assert!(out[2 * 4] < 255);
    }

    #[test]
    fn test_trails_keep_state() {
        let mut runtime = EffectKind::Trails.create_runtime();
        let params = EffectParams {
            amount: 0.5,
            level: 1.0,
        };
        let mut output = vec![0u8; 4];

        runtime.process(&[200, 200, 200, 255], &mut output, 1, 1, &params);
        assert_eq!(output[0], 200);

        // Input goes dark, the previous frame fades instead of vanishing
        runtime.process(&[0, 0, 0, 255], &mut output, 1, 1, &params);
        assert_eq!(output[0], 100);
        runtime.process(&[0, 0, 0, 255], &mut output, 1, 1, &params);
        assert_eq!(output[0], 50);
    }
}
