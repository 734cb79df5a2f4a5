//! Inline `style` attribute handling

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

/// Ordered declarations of one `style` attribute
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InlineStyle {
    declarations: Vec<Declaration>,
}

impl InlineStyle {
    pub fn parse(source: &str) -> Self {
        let mut declarations = Vec::new();
        for chunk in split_declarations(source) {
            let Some((name, value)) = chunk.split_once(':') else {
                continue;
            };
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() {
                continue;
            }
            let mut value = value.trim().to_string();
            let important = strip_important(&mut value);
            // Later declarations win, as in a browser
            declarations.retain(|d: &Declaration| d.name != name);
            declarations.push(Declaration {
                name,
                value,
                important,
            });
        }
        Self { declarations }
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.declarations
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .map(|d| d.value.as_str())
    }

    pub fn is_important(&self, name: &str) -> bool {
        self.declarations
            .iter()
            .any(|d| d.name.eq_ignore_ascii_case(name) && d.important)
    }

    /// Set a property, keeping its position and `!important` flag if present
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .declarations
            .iter_mut()
            .find(|d| d.name.eq_ignore_ascii_case(name))
        {
            Some(existing) => existing.value = value,
            None => self.declarations.push(Declaration {
                name: name.to_ascii_lowercase(),
                value,
                important: false,
            }),
        }
    }

    pub fn set_important(&mut self, name: &str, value: impl Into<String>) {
        self.set(name, value);
        if let Some(existing) = self
            .declarations
            .iter_mut()
            .find(|d| d.name.eq_ignore_ascii_case(name))
        {
            existing.important = true;
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self
            .declarations
            .iter()
            .position(|d| d.name.eq_ignore_ascii_case(name))?;
        Some(self.declarations.remove(index).value)
    }
}

impl fmt::Display for InlineStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, declaration) in self.declarations.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}: {}", declaration.name, declaration.value)?;
            if declaration.important {
                f.write_str(" !important")?;
            }
            f.write_str(";")?;
        }
        Ok(())
    }
}

fn strip_important(value: &mut String) -> bool {
    let lower = value.to_ascii_lowercase();
    if let Some(index) = lower.rfind("!important") {
        if lower[index + "!important".len()..].trim().is_empty() {
            value.truncate(index);
            let trimmed = value.trim_end().len();
            value.truncate(trimmed);
            return true;
        }
    }
    false
}

/// Split on `;` outside of parentheses and quotes (`url(data:...;base64,...)`)
fn split_declarations(source: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (index, ch) in source.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                parts.push(&source[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&source[start..]);
    parts
}

/// A CSS length resolved to pixels.
///
/// `em`/`rem` resolve against `font_size`; percentages and keywords are not lengths.
pub fn parse_length_px(value: &str, font_size: f32) -> Option<f32> {
    let value = value.trim().to_ascii_lowercase();
    if value == "0" {
        return Some(0.0);
    }
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number: f32 = number.parse().ok()?;
    if !number.is_finite() {
        return None;
    }
    match unit.trim() {
        "" | "px" => Some(number),
        "pt" => Some(number * 4.0 / 3.0),
        "em" | "rem" => Some(number * font_size),
        "in" => Some(number * 96.0),
        "cm" => Some(number * 96.0 / 2.54),
        "mm" => Some(number * 96.0 / 25.4),
        _ => None,
    }
}

/// Format a pixel value without trailing zero noise
pub fn format_px(value: f32) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{}px", rounded as i64)
    } else {
        format!("{}px", rounded)
    }
}
