//! Temperature-driven color ramp and status classification.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb8 {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// CSS functional notation, e.g. `rgb(40,63,67)`.
    pub fn to_css(self) -> String {
        format!("rgb({},{},{})", self.r, self.g, self.b)
    }

    pub fn with_alpha(self, a: u8) -> [u8; 4] {
        [self.r, self.g, self.b, a]
    }
}

/// Endpoint colors for one semantic slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Palette {
    pub min: Rgb8,
    pub max: Rgb8,
}

impl Palette {
    pub const fn new(min: Rgb8, max: Rgb8) -> Self {
        Self { min, max }
    }

    pub fn at(&self, factor: f64) -> Rgb8 {
        interpolate(self.min, self.max, factor)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ThemePalettes {
    pub text: Palette,
    pub stroke: Palette,
    pub background: Palette,
}

impl Default for ThemePalettes {
    fn default() -> Self {
        Self {
            text: Palette::new(Rgb8::new(40, 63, 67), Rgb8::new(70, 39, 19)),
            stroke: Palette::new(Rgb8::new(162, 198, 204), Rgb8::new(253, 221, 193)),
            background: Palette::new(Rgb8::new(239, 249, 250), Rgb8::new(249, 243, 238)),
        }
    }
}

/// Half-open thresholds used both for classification and for the ramp factor.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TemperatureRange {
    pub low: f64,
    pub high: f64,
}

impl Default for TemperatureRange {
    fn default() -> Self {
        Self {
            low: 80.0,
            high: 135.0,
        }
    }
}

impl TemperatureRange {
    pub fn clamp(&self, temperature: f64) -> f64 {
        temperature.max(self.low).min(self.high)
    }

    /// Position of the clamped temperature inside the range, in `[0, 1]`.
    pub fn factor(&self, temperature: f64) -> f64 {
        (self.clamp(temperature) - self.low) / (self.high - self.low)
    }
}

/// Linear per-channel blend of `min` toward `max`, rounded to the nearest integer.
///
/// `factor` must already be in `[0, 1]`; callers clamp the driving temperature
/// first. Out-of-range factors saturate at the channel bounds.
pub fn interpolate(min: Rgb8, max: Rgb8, factor: f64) -> Rgb8 {
    let mix = |a: u8, b: u8| -> u8 {
        let a = f64::from(a);
        let b = f64::from(b);
        (a + factor * (b - a)).round() as u8
    };
    Rgb8 {
        r: mix(min.r, max.r),
        g: mix(min.g, max.g),
        b: mix(min.b, max.b),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Nope,
    GettingThere,
    Ready,
}

impl Status {
    /// Label of the top tier; the only status that turns the shimmer on.
    pub const TOP_TIER_LABEL: &'static str = "Yes!";

    pub fn label(self) -> &'static str {
        match self {
            Self::Nope => "Nope",
            Self::GettingThere => "Getting There",
            Self::Ready => Self::TOP_TIER_LABEL,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

pub fn classify(temperature: f64, range: &TemperatureRange) -> Status {
    if temperature < range.low {
        Status::Nope
    } else if temperature < range.high {
        Status::GettingThere
    } else {
        Status::Ready
    }
}

/// Colors derived from the latest temperature. Recomputed wholesale on every update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThemeState {
    pub text: Rgb8,
    pub stroke: Rgb8,
    pub background: Rgb8,
}

impl ThemeState {
    pub fn at_factor(palettes: &ThemePalettes, factor: f64) -> Self {
        Self {
            text: palettes.text.at(factor),
            stroke: palettes.stroke.at(factor),
            background: palettes.background.at(factor),
        }
    }

    pub fn css_variables(&self) -> [(&'static str, String); 3] {
        [
            ("--text-color", self.text.to_css()),
            ("--stroke-color", self.stroke.to_css()),
            ("--background-color", self.background.to_css()),
        ]
    }
}

impl Default for ThemeState {
    fn default() -> Self {
        Self::at_factor(&ThemePalettes::default(), 0.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ColorRamp {
    pub palettes: ThemePalettes,
    pub range: TemperatureRange,
}

impl ColorRamp {
    pub fn theme_for(&self, temperature: f64) -> ThemeState {
        ThemeState::at_factor(&self.palettes, self.range.factor(temperature))
    }

    pub fn classify(&self, temperature: f64) -> Status {
        classify(temperature, &self.range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolate_endpoints_are_exact() {
        let p = ThemePalettes::default();
        for slot in [p.text, p.stroke, p.background] {
            assert_eq!(interpolate(slot.min, slot.max, 0.0), slot.min);
            assert_eq!(interpolate(slot.min, slot.max, 1.0), slot.max);
        }
    }

    #[test]
    fn interpolate_rounds_each_channel() {
        let min = Rgb8::new(40, 63, 67);
        let max = Rgb8::new(70, 39, 19);
        for step in 0..=20 {
            let f = f64::from(step) / 20.0;
            let out = interpolate(min, max, f);
            let expect = |a: u8, b: u8| (f64::from(a) + f * (f64::from(b) - f64::from(a))).round();
            assert_eq!(f64::from(out.r), expect(min.r, max.r));
            assert_eq!(f64::from(out.g), expect(min.g, max.g));
            assert_eq!(f64::from(out.b), expect(min.b, max.b));
        }
        assert_eq!(interpolate(min, max, 0.5), Rgb8::new(55, 51, 43));
    }

    #[test]
    fn classify_uses_half_open_thresholds() {
        let r = TemperatureRange::default();
        assert_eq!(classify(79.9, &r).label(), "Nope");
        assert_eq!(classify(80.0, &r).label(), "Getting There");
        assert_eq!(classify(134.9, &r).label(), "Getting There");
        assert_eq!(classify(135.0, &r).label(), "Yes!");
        assert_eq!(classify(-40.0, &r), Status::Nope);
        assert_eq!(classify(400.0, &r), Status::Ready);
    }

    #[test]
    fn ramp_clamps_before_interpolating() {
        let ramp = ColorRamp::default();
        assert_eq!(ramp.theme_for(20.0), ramp.theme_for(80.0));
        assert_eq!(ramp.theme_for(500.0).text, Rgb8::new(70, 39, 19));
        assert_eq!(ramp.range.factor(107.5), 0.5);
    }

    #[test]
    fn css_variables_use_rgb_notation() {
        let vars = ThemeState::default().css_variables();
        assert_eq!(vars[0], ("--text-color", "rgb(40,63,67)".to_string()));
        assert_eq!(vars[1].0, "--stroke-color");
        assert_eq!(vars[2], ("--background-color", "rgb(239,249,250)".to_string()));
    }
}
