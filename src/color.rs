//! Color parsing and light/dark classification

use std::fmt;

/// An sRGB color with alpha
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Light,
    Dark,
}

const NAMED_COLORS: &[(&str, (u8, u8, u8))] = &[
    ("black", (0, 0, 0)),
    ("white", (255, 255, 255)),
    ("red", (255, 0, 0)),
    ("green", (0, 128, 0)),
    ("blue", (0, 0, 255)),
    ("navy", (0, 0, 128)),
    ("gray", (128, 128, 128)),
    ("grey", (128, 128, 128)),
    ("silver", (192, 192, 192)),
    ("lightgray", (211, 211, 211)),
    ("lightgrey", (211, 211, 211)),
    ("gainsboro", (220, 220, 220)),
    ("whitesmoke", (245, 245, 245)),
    ("snow", (255, 250, 250)),
    ("ivory", (255, 255, 240)),
    ("beige", (245, 245, 220)),
    ("linen", (250, 240, 230)),
    ("aliceblue", (240, 248, 255)),
    ("ghostwhite", (248, 248, 255)),
    ("yellow", (255, 255, 0)),
    ("orange", (255, 165, 0)),
    ("purple", (128, 0, 128)),
    ("maroon", (128, 0, 0)),
    ("teal", (0, 128, 128)),
    ("olive", (128, 128, 0)),
    ("darkgray", (169, 169, 169)),
    ("darkgrey", (169, 169, 169)),
    ("dimgray", (105, 105, 105)),
    ("dimgrey", (105, 105, 105)),
];

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Parse a CSS color value: hex, `rgb()`/`rgba()`, a named color or `transparent`
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        if value == "transparent" {
            return Some(Self { r: 0, g: 0, b: 0, a: 0.0 });
        }
        if let Some(hex) = value.strip_prefix('#') {
            return Self::parse_hex(hex);
        }
        if let Some(args) = value
            .strip_prefix("rgba(")
            .or_else(|| value.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return Self::parse_functional(args);
        }
        // Legacy `bgcolor="ffffff"` attributes omit the hash
        if value.len() == 6 && value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Self::parse_hex(&value);
        }
        NAMED_COLORS
            .iter()
            .find(|(name, _)| *name == value)
            .map(|(_, (r, g, b))| Self::rgb(*r, *g, *b))
    }

    fn parse_hex(hex: &str) -> Option<Self> {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let expand = |c: &str| u8::from_str_radix(&c.repeat(2), 16).ok();
        let pair = |c: &str| u8::from_str_radix(c, 16).ok();
        match hex.len() {
            3 | 4 => Some(Self {
                r: expand(&hex[0..1])?,
                g: expand(&hex[1..2])?,
                b: expand(&hex[2..3])?,
                a: if hex.len() == 4 {
                    expand(&hex[3..4])? as f32 / 255.0
                } else {
                    1.0
                },
            }),
            6 | 8 => Some(Self {
                r: pair(&hex[0..2])?,
                g: pair(&hex[2..4])?,
                b: pair(&hex[4..6])?,
                a: if hex.len() == 8 {
                    pair(&hex[6..8])? as f32 / 255.0
                } else {
                    1.0
                },
            }),
            _ => None,
        }
    }

    fn parse_functional(args: &str) -> Option<Self> {
        let normalized = args.replace('/', " ").replace(',', " ");
        let parts: Vec<&str> = normalized.split_whitespace().collect();
        if parts.len() != 3 && parts.len() != 4 {
            return None;
        }
        let channel = |part: &str| -> Option<u8> {
            let value = match part.strip_suffix('%') {
                Some(percent) => percent.parse::<f32>().ok()? * 2.55,
                None => part.parse::<f32>().ok()?,
            };
            Some(value.round().clamp(0.0, 255.0) as u8)
        };
        let alpha = match parts.get(3) {
            Some(part) => match part.strip_suffix('%') {
                Some(percent) => percent.parse::<f32>().ok()? / 100.0,
                None => part.parse::<f32>().ok()?,
            },
            None => 1.0,
        };
        Some(Self {
            r: channel(parts[0])?,
            g: channel(parts[1])?,
            b: channel(parts[2])?,
            a: alpha.clamp(0.0, 1.0),
        })
    }

    /// Perceived brightness in [0, 1] (ITU-R BT.601 weights)
    pub fn brightness(&self) -> f32 {
        (0.299 * self.r as f32 + 0.587 * self.g as f32 + 0.114 * self.b as f32) / 255.0
    }

    pub fn is_opaque(&self) -> bool {
        self.a >= 1.0
    }

    /// CSS text; opaque colors as `#rrggbb`
    pub fn to_css(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_opaque() {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
        }
    }
}

/// Decides whether a color reads as light or dark and produces its
/// dark-mode counterpart.
#[derive(Debug, Clone, Copy)]
pub struct ColorClassifier {
    threshold: f32,
    /// Brightness that pure white maps to when darkened
    floor: f32,
}

impl ColorClassifier {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
            floor: Rgba::rgb(0x12, 0x12, 0x12).brightness(),
        }
    }

    /// Map pure white onto the given dark surface instead of black
    pub fn with_dark_surface(mut self, surface: Rgba) -> Self {
        self.floor = surface.brightness().min(self.threshold * 0.9);
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn classify(&self, color: &Rgba) -> Tone {
        if color.brightness() > self.threshold {
            Tone::Light
        } else {
            Tone::Dark
        }
    }

    pub fn is_light(&self, color: &Rgba) -> bool {
        self.classify(color) == Tone::Light
    }

    /// Mirror a light color's brightness into the dark range, keeping its hue.
    ///
    /// The result always classifies as [`Tone::Dark`].
    pub fn darken(&self, color: &Rgba) -> Rgba {
        let brightness = color.brightness();
        if brightness <= 0.0 {
            return *color;
        }
        let ceiling = self.threshold * 0.9;
        let target = (1.0 - brightness)
            .max(self.floor)
            .min(ceiling)
            .max(0.0);
        let factor = target / brightness;
        let scale = |channel: u8| (channel as f32 * factor).floor().clamp(0.0, 255.0) as u8;
        Rgba {
            r: scale(color.r),
            g: scale(color.g),
            b: scale(color.b),
            a: color.a,
        }
    }

    /// Blend a dark color toward white until it mirrors into the light range.
    ///
    /// The result always classifies as [`Tone::Light`] unless the threshold is 1.
    pub fn lighten(&self, color: &Rgba) -> Rgba {
        let brightness = color.brightness();
        if brightness >= 1.0 {
            return *color;
        }
        let floor = (self.threshold + (1.0 - self.threshold) * 0.1).min(1.0);
        let target = (1.0 - brightness).max(floor).min(1.0);
        let t = ((target - brightness) / (1.0 - brightness)).clamp(0.0, 1.0);
        let blend = |channel: u8| {
            (channel as f32 + (255.0 - channel as f32) * t)
                .ceil()
                .clamp(0.0, 255.0) as u8
        };
        Rgba {
            r: blend(color.r),
            g: blend(color.g),
            b: blend(color.b),
            a: color.a,
        }
    }
}

impl Default for ColorClassifier {
    fn default() -> Self {
        Self::new(0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_formats() {
        assert_eq!(Rgba::parse("#fff"), Some(Rgba::rgb(255, 255, 255)));
        assert_eq!(Rgba::parse("#1A2b3C"), Some(Rgba::rgb(0x1a, 0x2b, 0x3c)));
        assert_eq!(Rgba::parse("rgb(10, 20, 30)"), Some(Rgba::rgb(10, 20, 30)));
        assert_eq!(Rgba::parse("rgb(100% 0% 0%)"), Some(Rgba::rgb(255, 0, 0)));
        assert_eq!(Rgba::parse("White"), Some(Rgba::rgb(255, 255, 255)));
        assert_eq!(Rgba::parse("ffffff"), Some(Rgba::rgb(255, 255, 255)));
        assert!(!Rgba::parse("rgba(0,0,0,0.5)").unwrap().is_opaque());
        assert!(!Rgba::parse("transparent").unwrap().is_opaque());
        assert!(!Rgba::parse("#ffffff80").unwrap().is_opaque());
        assert_eq!(Rgba::parse("inherit"), None);
        assert_eq!(Rgba::parse("#ggg"), None);
    }

    #[test]
    fn test_classification() {
        let classifier = ColorClassifier::default();
        assert_eq!(classifier.classify(&Rgba::rgb(255, 255, 255)), Tone::Light);
        assert_eq!(classifier.classify(&Rgba::rgb(250, 250, 240)), Tone::Light);
        assert_eq!(classifier.classify(&Rgba::rgb(0, 0, 0)), Tone::Dark);
        assert_eq!(classifier.classify(&Rgba::rgb(0x33, 0x33, 0x33)), Tone::Dark);
    }

    #[test]
    fn test_white_maps_to_dark_surface() {
        let classifier = ColorClassifier::default();
        assert_eq!(classifier.darken(&Rgba::rgb(255, 255, 255)).to_css(), "#121212");
    }

    #[test]
    fn test_darken_always_crosses_threshold() {
        for threshold in [0.3_f32, 0.5, 0.7] {
            let classifier = ColorClassifier::new(threshold);
            for r in (0..=255).step_by(15) {
                for g in (0..=255).step_by(15) {
                    for b in (0..=255).step_by(51) {
                        let color = Rgba::rgb(r as u8, g as u8, b as u8);
                        if classifier.is_light(&color) {
                            let darkened = classifier.darken(&color);
                            assert!(
                                !classifier.is_light(&darkened),
                                "{} -> {} at threshold {}",
                                color,
                                darkened,
                                threshold
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_lighten_black_text() {
        let classifier = ColorClassifier::default();
        let lightened = classifier.lighten(&Rgba::rgb(0, 0, 0));
        assert_eq!(lightened.to_css(), "#ffffff");
        let lightened = classifier.lighten(&Rgba::rgb(0x33, 0x33, 0x33));
        assert!(classifier.is_light(&lightened));
    }
}
