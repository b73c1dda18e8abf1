use crate::foundation::core::Rgba8;

/// Blend mode used when painting a layer over the accumulated composite.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BlendMode {
    /// Standard source-over compositing.
    #[default]
    Normal,
    /// Channel-wise multiplication.
    Multiply,
    /// Inverted multiplication of inverses.
    Screen,
    /// Multiply or screen depending on the base channel.
    Overlay,
    /// Overlay with base and top swapped.
    HardLight,
    /// W3C soft-light.
    SoftLight,
    /// Channel-wise maximum.
    Lighten,
    /// Channel-wise minimum.
    Darken,
    /// Darkens the base toward the top.
    ColorBurn,
    /// Brightens the base toward the top.
    ColorDodge,
    /// Clamped channel addition.
    Additive,
    /// Clamped channel subtraction.
    Subtract,
    /// Absolute channel difference.
    Difference,
    /// Difference with lower contrast.
    Exclusion,
}

impl BlendMode {
    /// All modes, in presentation order.
    pub fn all() -> [BlendMode; 14] {
        [
            BlendMode::Normal,
            BlendMode::Multiply,
            BlendMode::Screen,
            BlendMode::Overlay,
            BlendMode::HardLight,
            BlendMode::SoftLight,
            BlendMode::Lighten,
            BlendMode::Darken,
            BlendMode::ColorBurn,
            BlendMode::ColorDodge,
            BlendMode::Additive,
            BlendMode::Subtract,
            BlendMode::Difference,
            BlendMode::Exclusion,
        ]
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            BlendMode::Normal => "Normal",
            BlendMode::Multiply => "Multiply",
            BlendMode::Screen => "Screen",
            BlendMode::Overlay => "Overlay",
            BlendMode::HardLight => "Hard Light",
            BlendMode::SoftLight => "Soft Light",
            BlendMode::Lighten => "Lighten",
            BlendMode::Darken => "Darken",
            BlendMode::ColorBurn => "Color Burn",
            BlendMode::ColorDodge => "Color Dodge",
            BlendMode::Additive => "Additive",
            BlendMode::Subtract => "Subtract",
            BlendMode::Difference => "Difference",
            BlendMode::Exclusion => "Exclusion",
        }
    }
}

/// Blend `top` over `base` at the given layer opacity. Straight-alpha
/// math, channels normalized to f32.
pub fn blend_pixel(base: Rgba8, top: Rgba8, mode: BlendMode, opacity: f32) -> Rgba8 {
    if top.a == 0 {
        return base;
    }
    if mode == BlendMode::Normal && opacity >= 1.0 && top.a == 255 {
        return top;
    }

    let opacity = opacity.clamp(0.0, 1.0);

    let base_r = f32::from(base.r) / 255.0;
    let base_g = f32::from(base.g) / 255.0;
    let base_b = f32::from(base.b) / 255.0;
    let base_a = f32::from(base.a) / 255.0;

    let top_r = f32::from(top.r) / 255.0;
    let top_g = f32::from(top.g) / 255.0;
    let top_b = f32::from(top.b) / 255.0;
    let top_a = (f32::from(top.a) / 255.0) * opacity;

    let (r, g, b) = match mode {
        BlendMode::Normal => (top_r, top_g, top_b),
        BlendMode::Multiply => (base_r * top_r, base_g * top_g, base_b * top_b),
        BlendMode::Screen => (
            1.0 - (1.0 - base_r) * (1.0 - top_r),
            1.0 - (1.0 - base_g) * (1.0 - top_g),
            1.0 - (1.0 - base_b) * (1.0 - top_b),
        ),
        BlendMode::Overlay => (
            overlay_channel(base_r, top_r),
            overlay_channel(base_g, top_g),
            overlay_channel(base_b, top_b),
        ),
        BlendMode::HardLight => (
            overlay_channel(top_r, base_r),
            overlay_channel(top_g, base_g),
            overlay_channel(top_b, base_b),
        ),
        BlendMode::SoftLight => (
            soft_light_channel(base_r, top_r),
            soft_light_channel(base_g, top_g),
            soft_light_channel(base_b, top_b),
        ),
        BlendMode::Lighten => (base_r.max(top_r), base_g.max(top_g), base_b.max(top_b)),
        BlendMode::Darken => (base_r.min(top_r), base_g.min(top_g), base_b.min(top_b)),
        BlendMode::ColorBurn => (
            color_burn_channel(base_r, top_r),
            color_burn_channel(base_g, top_g),
            color_burn_channel(base_b, top_b),
        ),
        BlendMode::ColorDodge => (
            color_dodge_channel(base_r, top_r),
            color_dodge_channel(base_g, top_g),
            color_dodge_channel(base_b, top_b),
        ),
        BlendMode::Additive => (
            (base_r + top_r).min(1.0),
            (base_g + top_g).min(1.0),
            (base_b + top_b).min(1.0),
        ),
        BlendMode::Subtract => (
            (base_r - top_r).max(0.0),
            (base_g - top_g).max(0.0),
            (base_b - top_b).max(0.0),
        ),
        BlendMode::Difference => (
            (base_r - top_r).abs(),
            (base_g - top_g).abs(),
            (base_b - top_b).abs(),
        ),
        BlendMode::Exclusion => (
            base_r + top_r - 2.0 * base_r * top_r,
            base_g + top_g - 2.0 * base_g * top_g,
            base_b + top_b - 2.0 * base_b * top_b,
        ),
    };

    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a == 0.0 {
        return Rgba8::TRANSPARENT;
    }

    let out_r = (r * top_a + base_r * base_a * (1.0 - top_a)) / out_a;
    let out_g = (g * top_a + base_g * base_a * (1.0 - top_a)) / out_a;
    let out_b = (b * top_a + base_b * base_a * (1.0 - top_a)) / out_a;

    Rgba8 {
        r: (out_r * 255.0).clamp(0.0, 255.0) as u8,
        g: (out_g * 255.0).clamp(0.0, 255.0) as u8,
        b: (out_b * 255.0).clamp(0.0, 255.0) as u8,
        a: (out_a * 255.0).clamp(0.0, 255.0) as u8,
    }
}

fn overlay_channel(base: f32, top: f32) -> f32 {
    if base < 0.5 {
        2.0 * base * top
    } else {
        1.0 - 2.0 * (1.0 - base) * (1.0 - top)
    }
}

fn color_burn_channel(base: f32, top: f32) -> f32 {
    if top == 0.0 {
        0.0
    } else {
        (1.0 - (1.0 - base) / top).max(0.0)
    }
}

fn color_dodge_channel(base: f32, top: f32) -> f32 {
    if top >= 1.0 {
        1.0
    } else {
        (base / (1.0 - top)).min(1.0)
    }
}

/// W3C soft-light formula.
fn soft_light_channel(base: f32, top: f32) -> f32 {
    if top <= 0.5 {
        base - (1.0 - 2.0 * top) * base * (1.0 - base)
    } else {
        let d = if base <= 0.25 {
            ((16.0 * base - 12.0) * base + 4.0) * base
        } else {
            base.sqrt()
        };
        base + (2.0 * top - 1.0) * (d - base)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/blend.rs"]
mod tests;
