//! Colour palettes and colour interpolation.
//!
//! Colours are emitted as `rgba(r,g,b,a)` strings, which plotly.js accepts
//! everywhere a colour is expected.

use crate::data::format_number;
use anyhow::{anyhow, bail, Result};
use serde_json::Value;
use std::collections::HashMap;

const VIRIDIS: [&str; 10] = [
    "#440154", "#482878", "#3E4A89", "#31688E", "#26828E",
    "#1F9E89", "#35B779", "#6DCD59", "#B4DE2C", "#FDE725",
];
const SET1: [&str; 9] = [
    "#E41A1C", "#377EB8", "#4DAF4A", "#984EA3", "#FF7F00",
    "#FFFF33", "#A65628", "#F781BF", "#999999",
];
const SET2: [&str; 8] = [
    "#66C2A5", "#FC8D62", "#8DA0CB", "#E78AC3",
    "#A6D854", "#FFD92F", "#E5C494", "#B3B3B3",
];
const DARK2: [&str; 8] = [
    "#1B9E77", "#D95F02", "#7570B3", "#E7298A",
    "#66A61E", "#E6AB02", "#A6761D", "#666666",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgb {
    /// Parse `#rgb`, `#rrggbb`, `rgb(...)`, `rgba(...)` or a basic CSS name
    pub fn parse(input: &str) -> Result<Self> {
        let s = input.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| anyhow!("Invalid hex colour '{}'", input));
        }
        if let Some(body) = s
            .strip_prefix("rgba(")
            .or_else(|| s.strip_prefix("rgb("))
            .and_then(|b| b.strip_suffix(')'))
        {
            let parts: Vec<&str> = body.split(',').map(str::trim).collect();
            let channel = |i: usize| -> Result<u8> {
                parts
                    .get(i)
                    .and_then(|p| p.parse::<f64>().ok())
                    .map(|v| v.clamp(0.0, 255.0).round() as u8)
                    .ok_or_else(|| anyhow!("Invalid colour '{}'", input))
            };
            let a = match parts.get(3) {
                Some(p) => p.parse::<f64>().map_err(|_| anyhow!("Invalid alpha in '{}'", input))?,
                None => 1.0,
            };
            return Ok(Rgb { r: channel(0)?, g: channel(1)?, b: channel(2)?, a });
        }
        named_color(s).ok_or_else(|| anyhow!("Unknown colour '{}'", input))
    }

    pub fn to_rgba(&self) -> String {
        format!("rgba({},{},{},{})", self.r, self.g, self.b, format_number(self.a))
    }

    fn lerp(&self, other: &Rgb, t: f64) -> Rgb {
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: self.a + (other.a - self.a) * t,
        }
    }
}

fn parse_hex(hex: &str) -> Option<Rgb> {
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 | 8 => hex.to_string(),
        _ => return None,
    };
    let byte = |i: usize| u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok();
    let a = if expanded.len() == 8 { byte(6)? as f64 / 255.0 } else { 1.0 };
    Some(Rgb { r: byte(0)?, g: byte(2)?, b: byte(4)?, a })
}

fn named_color(name: &str) -> Option<Rgb> {
    let hex = match name.to_ascii_lowercase().as_str() {
        "black" => "000000",
        "white" => "FFFFFF",
        "red" => "FF0000",
        "green" => "008000",
        "blue" => "0000FF",
        "yellow" => "FFFF00",
        "orange" => "FFA500",
        "purple" => "800080",
        "brown" => "A52A2A",
        "pink" => "FFC0CB",
        "cyan" => "00FFFF",
        "magenta" => "FF00FF",
        "gray" | "grey" => "808080",
        "steelblue" => "4682B4",
        "transparent" => return Some(Rgb { r: 0, g: 0, b: 0, a: 0.0 }),
        _ => return None,
    };
    parse_hex(hex)
}

/// An ordered list of colours, optionally keyed by level name
#[derive(Debug, Clone, PartialEq)]
pub struct ColorPalette {
    pub colors: Vec<Rgb>,
    /// Level names when the palette was given as a `{level: colour}` map
    pub names: Option<Vec<String>>,
}

impl ColorPalette {
    fn from_hex(hex: &[&str]) -> Self {
        Self {
            colors: hex.iter().filter_map(|h| parse_hex(&h[1..])).collect(),
            names: None,
        }
    }

    pub fn viridis() -> Self {
        Self::from_hex(&VIRIDIS)
    }

    pub fn set2() -> Self {
        Self::from_hex(&SET2)
    }

    pub fn named(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "viridis" => Some(Self::from_hex(&VIRIDIS)),
            "set1" => Some(Self::from_hex(&SET1)),
            "set2" => Some(Self::from_hex(&SET2)),
            "dark2" => Some(Self::from_hex(&DARK2)),
            _ => None,
        }
    }

    /// Read a palette parameter: a palette name, a single colour, a list of
    /// colours, or a map from level to colour.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => match Self::named(s) {
                Some(p) => Ok(p),
                None => Ok(Self { colors: vec![Rgb::parse(s)?], names: None }),
            },
            Value::Array(items) => {
                let colors = items
                    .iter()
                    .map(|v| match v {
                        Value::String(s) => Rgb::parse(s),
                        other => bail!("Palette entries must be colour strings, got {}", other),
                    })
                    .collect::<Result<Vec<_>>>()?;
                if colors.is_empty() {
                    bail!("Colour palette is empty");
                }
                Ok(Self { colors, names: None })
            }
            Value::Object(map) => {
                let mut names = Vec::new();
                let mut colors = Vec::new();
                for (level, color) in map {
                    let color = color
                        .as_str()
                        .ok_or_else(|| anyhow!("Colour for level '{}' must be a string", level))?;
                    names.push(level.clone());
                    colors.push(Rgb::parse(color)?);
                }
                Ok(Self { colors, names: Some(names) })
            }
            other => bail!("Unsupported colour palette {}", other),
        }
    }

    /// Colour at position `t` in [0, 1], linearly interpolated between stops
    pub fn interpolate(&self, t: f64) -> Rgb {
        match self.colors.len() {
            0 => Rgb { r: 0, g: 0, b: 0, a: 0.0 },
            1 => self.colors[0],
            n => {
                let pos = t.clamp(0.0, 1.0) * (n - 1) as f64;
                let i = (pos.floor() as usize).min(n - 2);
                self.colors[i].lerp(&self.colors[i + 1], pos - i as f64)
            }
        }
    }

    /// `n` colours evenly spread over the palette
    pub fn ramp(&self, n: usize) -> Vec<Rgb> {
        match n {
            0 => Vec::new(),
            1 => vec![self.interpolate(0.0)],
            n => (0..n)
                .map(|i| self.interpolate(i as f64 / (n - 1) as f64))
                .collect(),
        }
    }

    /// Assign a colour to each level. Named palettes match by name; otherwise
    /// colours are taken in order, interpolated when there are more levels
    /// than colours.
    pub fn assign_colors(&self, levels: &[String]) -> HashMap<String, String> {
        if let Some(names) = &self.names {
            return names
                .iter()
                .zip(&self.colors)
                .map(|(n, c)| (n.clone(), c.to_rgba()))
                .collect();
        }
        let colors = if levels.len() <= self.colors.len() {
            self.colors[..levels.len()].to_vec()
        } else {
            self.ramp(levels.len())
        };
        levels
            .iter()
            .cloned()
            .zip(colors.iter().map(Rgb::to_rgba))
            .collect()
    }
}

/// A continuous colour scale over a numeric domain
#[derive(Debug, Clone)]
pub struct ContinuousScale {
    pub palette: ColorPalette,
    pub min: f64,
    pub max: f64,
}

impl ContinuousScale {
    pub fn new(palette: ColorPalette, min: f64, max: f64) -> Self {
        Self { palette, min, max }
    }

    pub fn rescale(&self, v: f64) -> f64 {
        if self.max > self.min {
            (v - self.min) / (self.max - self.min)
        } else {
            0.0
        }
    }

    pub fn map(&self, v: f64) -> Rgb {
        self.palette.interpolate(self.rescale(v))
    }

    /// plotly.js colorscale: `stops` pairs of [position, colour]
    pub fn colorscale(&self, stops: usize) -> Value {
        let values: Vec<f64> = if self.max > self.min {
            (0..stops)
                .map(|i| self.min + (self.max - self.min) * i as f64 / (stops - 1) as f64)
                .collect()
        } else {
            vec![self.min, self.min]
        };
        let n = values.len();
        Value::Array(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let pos = i as f64 / (n - 1) as f64;
                    serde_json::json!([pos, self.map(*v).to_rgba()])
                })
                .collect(),
        )
    }
}
