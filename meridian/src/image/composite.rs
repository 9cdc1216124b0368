//! Pixel compositing operators.
//!
//! All operators work on premultiplied colors with channels in `0..=1`. Porter-Duff operators
//! follow their classic definitions. Blend modes use the separable formula
//! `Dca' = B(Sc, Dc) * Sa * Da + Sca * (1 - Da) + Dca * (1 - Sa)` with
//! `Da' = Sa + Da - Sa * Da`, where `B` is the blend function of the mode applied to
//! non-premultiplied channels.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MapError;

/// Named operator combining a source pixel with a destination pixel.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeOp {
    /// Both color and alpha are cleared.
    Clear,
    /// Source replaces destination.
    Src,
    /// Destination is left untouched.
    Dst,
    /// Source is placed over the destination.
    #[default]
    SrcOver,
    /// Destination is placed over the source.
    DstOver,
    /// Part of the source inside the destination.
    SrcIn,
    /// Part of the destination inside the source.
    DstIn,
    /// Part of the source outside the destination.
    SrcOut,
    /// Part of the destination outside the source.
    DstOut,
    /// Source inside the destination, over the destination.
    SrcAtop,
    /// Destination inside the source, over the source.
    DstAtop,
    /// Non-overlapping parts of source and destination.
    Xor,
    /// Sum of source and destination, clamped.
    Plus,
    /// Destination minus source, clamped.
    Minus,
    /// Product of channels.
    Multiply,
    /// Inverse product of inverted channels.
    Screen,
    /// Multiply or screen depending on the destination.
    Overlay,
    /// Minimum of channels.
    Darken,
    /// Maximum of channels.
    Lighten,
    /// Brightens the destination to reflect the source.
    ColorDodge,
    /// Darkens the destination to reflect the source.
    ColorBurn,
    /// Multiply or screen depending on the source.
    HardLight,
    /// Softer version of hard light.
    SoftLight,
    /// Absolute difference of channels.
    Difference,
    /// Lower-contrast difference.
    Exclusion,
    /// Scales destination contrast around mid-gray; source `0.5` is neutral, `0` flattens and
    /// `1` doubles the contrast.
    Contrast,
    /// Inverts the destination where the source is opaque.
    Invert,
    /// `D + S - 0.5`, clamped.
    GrainMerge,
    /// `D - S + 0.5`, clamped.
    GrainExtract,
    /// Hue of the source with saturation and value of the destination.
    Hue,
    /// Saturation of the source with hue and value of the destination.
    Saturation,
    /// Hue and saturation of the source with value of the destination.
    Color,
    /// Value of the source with hue and saturation of the destination.
    Value,
}

const NAMES: [(CompositeOp, &str); 33] = [
    (CompositeOp::Clear, "clear"),
    (CompositeOp::Src, "src"),
    (CompositeOp::Dst, "dst"),
    (CompositeOp::SrcOver, "src_over"),
    (CompositeOp::DstOver, "dst_over"),
    (CompositeOp::SrcIn, "src_in"),
    (CompositeOp::DstIn, "dst_in"),
    (CompositeOp::SrcOut, "src_out"),
    (CompositeOp::DstOut, "dst_out"),
    (CompositeOp::SrcAtop, "src_atop"),
    (CompositeOp::DstAtop, "dst_atop"),
    (CompositeOp::Xor, "xor"),
    (CompositeOp::Plus, "plus"),
    (CompositeOp::Minus, "minus"),
    (CompositeOp::Multiply, "multiply"),
    (CompositeOp::Screen, "screen"),
    (CompositeOp::Overlay, "overlay"),
    (CompositeOp::Darken, "darken"),
    (CompositeOp::Lighten, "lighten"),
    (CompositeOp::ColorDodge, "color_dodge"),
    (CompositeOp::ColorBurn, "color_burn"),
    (CompositeOp::HardLight, "hard_light"),
    (CompositeOp::SoftLight, "soft_light"),
    (CompositeOp::Difference, "difference"),
    (CompositeOp::Exclusion, "exclusion"),
    (CompositeOp::Contrast, "contrast"),
    (CompositeOp::Invert, "invert"),
    (CompositeOp::GrainMerge, "grain_merge"),
    (CompositeOp::GrainExtract, "grain_extract"),
    (CompositeOp::Hue, "hue"),
    (CompositeOp::Saturation, "saturation"),
    (CompositeOp::Color, "color"),
    (CompositeOp::Value, "value"),
];

impl CompositeOp {
    /// All operators in their canonical order.
    pub fn all() -> impl Iterator<Item = CompositeOp> {
        NAMES.iter().map(|(op, _)| *op)
    }

    /// Canonical name of the operator.
    pub fn name(&self) -> &'static str {
        NAMES
            .iter()
            .find(|(op, _)| op == self)
            .map(|(_, name)| *name)
            .unwrap_or("src_over")
    }

    /// Returns true if a fully transparent source pixel leaves the destination pixel unchanged.
    pub(crate) fn keeps_dst_under_transparent_src(&self) -> bool {
        !matches!(
            self,
            CompositeOp::Clear
                | CompositeOp::Src
                | CompositeOp::SrcIn
                | CompositeOp::DstIn
                | CompositeOp::SrcOut
                | CompositeOp::DstAtop
        )
    }

    /// Combines premultiplied source and destination pixels.
    pub(crate) fn apply(&self, src: [f32; 4], dst: [f32; 4]) -> [f32; 4] {
        let [sr, sg, sb, sa] = src;
        let [dr, dg, db, da] = dst;
        let porter_duff = |fs: f32, fd: f32| -> [f32; 4] {
            [
                sr * fs + dr * fd,
                sg * fs + dg * fd,
                sb * fs + db * fd,
                sa * fs + da * fd,
            ]
        };

        match self {
            CompositeOp::Clear => [0.0; 4],
            CompositeOp::Src => src,
            CompositeOp::Dst => dst,
            CompositeOp::SrcOver => porter_duff(1.0, 1.0 - sa),
            CompositeOp::DstOver => porter_duff(1.0 - da, 1.0),
            CompositeOp::SrcIn => porter_duff(da, 0.0),
            CompositeOp::DstIn => porter_duff(0.0, sa),
            CompositeOp::SrcOut => porter_duff(1.0 - da, 0.0),
            CompositeOp::DstOut => porter_duff(0.0, 1.0 - sa),
            CompositeOp::SrcAtop => porter_duff(da, 1.0 - sa),
            CompositeOp::DstAtop => porter_duff(1.0 - da, sa),
            CompositeOp::Xor => porter_duff(1.0 - da, 1.0 - sa),
            CompositeOp::Plus => [
                (sr + dr).min(1.0),
                (sg + dg).min(1.0),
                (sb + db).min(1.0),
                (sa + da).min(1.0),
            ],
            CompositeOp::Minus => [
                (dr - sr).max(0.0),
                (dg - sg).max(0.0),
                (db - sb).max(0.0),
                sa + da - sa * da,
            ],
            CompositeOp::Hue | CompositeOp::Saturation | CompositeOp::Color | CompositeOp::Value => {
                let s = unpremultiply(src);
                let d = unpremultiply(dst);
                let blended = self.blend_hsv(s, d);
                mix(src, dst, blended)
            }
            separable => {
                let s = unpremultiply(src);
                let d = unpremultiply(dst);
                let blended = [
                    separable.blend_channel(s[0], d[0]),
                    separable.blend_channel(s[1], d[1]),
                    separable.blend_channel(s[2], d[2]),
                ];
                mix(src, dst, blended)
            }
        }
    }

    fn blend_channel(&self, s: f32, d: f32) -> f32 {
        match self {
            CompositeOp::Multiply => s * d,
            CompositeOp::Screen => s + d - s * d,
            CompositeOp::Overlay => hard_light(d, s),
            CompositeOp::Darken => s.min(d),
            CompositeOp::Lighten => s.max(d),
            CompositeOp::ColorDodge => {
                if d <= 0.0 {
                    0.0
                } else if s >= 1.0 {
                    1.0
                } else {
                    (d / (1.0 - s)).min(1.0)
                }
            }
            CompositeOp::ColorBurn => {
                if d >= 1.0 {
                    1.0
                } else if s <= 0.0 {
                    0.0
                } else {
                    1.0 - ((1.0 - d) / s).min(1.0)
                }
            }
            CompositeOp::HardLight => hard_light(s, d),
            CompositeOp::SoftLight => {
                if s <= 0.5 {
                    d - (1.0 - 2.0 * s) * d * (1.0 - d)
                } else {
                    let g = if d <= 0.25 {
                        ((16.0 * d - 12.0) * d + 4.0) * d
                    } else {
                        d.sqrt()
                    };
                    d + (2.0 * s - 1.0) * (g - d)
                }
            }
            CompositeOp::Difference => (s - d).abs(),
            CompositeOp::Exclusion => s + d - 2.0 * s * d,
            CompositeOp::Contrast => ((d - 0.5) * 2.0 * s + 0.5).clamp(0.0, 1.0),
            CompositeOp::Invert => 1.0 - d,
            CompositeOp::GrainMerge => (s + d - 0.5).clamp(0.0, 1.0),
            CompositeOp::GrainExtract => (d - s + 0.5).clamp(0.0, 1.0),
            _ => s,
        }
    }

    fn blend_hsv(&self, s: [f32; 4], d: [f32; 4]) -> [f32; 3] {
        let (sh, ss, sv) = rgb_to_hsv(s[0], s[1], s[2]);
        let (dh, ds, dv) = rgb_to_hsv(d[0], d[1], d[2]);
        let (h, sat, v) = match self {
            CompositeOp::Hue => (sh, ds, dv),
            CompositeOp::Saturation => (dh, ss, dv),
            CompositeOp::Color => (sh, ss, dv),
            _ => (dh, ds, sv),
        };

        hsv_to_rgb(h, sat, v)
    }
}

fn hard_light(s: f32, d: f32) -> f32 {
    if s <= 0.5 {
        d * 2.0 * s
    } else {
        let s = 2.0 * s - 1.0;
        s + d - s * d
    }
}

fn unpremultiply(color: [f32; 4]) -> [f32; 4] {
    let a = color[3];
    if a <= 0.0 {
        return [0.0; 4];
    }

    [
        (color[0] / a).min(1.0),
        (color[1] / a).min(1.0),
        (color[2] / a).min(1.0),
        a,
    ]
}

fn mix(src: [f32; 4], dst: [f32; 4], blended: [f32; 3]) -> [f32; 4] {
    let (sa, da) = (src[3], dst[3]);
    let channel = |i: usize| blended[i] * sa * da + src[i] * (1.0 - da) + dst[i] * (1.0 - sa);
    [channel(0), channel(1), channel(2), sa + da - sa * da]
}

fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let s = if max > 0.0 { delta / max } else { 0.0 };
    let h = if delta <= 0.0 {
        0.0
    } else if max == r {
        ((g - b) / delta).rem_euclid(6.0) / 6.0
    } else if max == g {
        ((b - r) / delta + 2.0) / 6.0
    } else {
        ((r - g) / delta + 4.0) / 6.0
    };

    (h, s, max)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [f32; 3] {
    if s <= 0.0 {
        return [v, v, v];
    }

    let sector = (h * 6.0).rem_euclid(6.0);
    let i = sector.floor();
    let f = sector - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    match i as u8 {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

impl FromStr for CompositeOp {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NAMES
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(op, _)| *op)
            .ok_or_else(|| MapError::UnsupportedOperator(s.to_string()))
    }
}

impl Display for CompositeOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters of [`Image::composite`](super::Image::composite).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeOptions {
    /// Operator, `src_over` by default.
    pub comp_op: CompositeOp,
    /// Source opacity multiplier in `0..=1`, `1.0` by default.
    pub opacity: f32,
    /// Horizontal offset of the source in the destination.
    pub dx: i32,
    /// Vertical offset of the source in the destination.
    pub dy: i32,
}

impl Default for CompositeOptions {
    fn default() -> Self {
        Self {
            comp_op: CompositeOp::SrcOver,
            opacity: 1.0,
            dx: 0,
            dy: 0,
        }
    }
}

impl CompositeOptions {
    /// Options with the given operator and defaults for the rest.
    pub fn with_op(comp_op: CompositeOp) -> Self {
        Self {
            comp_op,
            ..Default::default()
        }
    }
}
