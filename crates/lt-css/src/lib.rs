//! Inline style declarations and CSS length values.

use core::fmt;

/// Ordered set of `property: value` pairs backing an element's `style` attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleDeclarations {
    entries: Vec<(String, String)>,
}

impl StyleDeclarations {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Parses the contents of a `style="..."` attribute. Declarations without a
    /// colon or with an empty name/value are dropped; later duplicates win.
    pub fn parse(input: &str) -> Self {
        let sanitized = strip_comments_preserve_strings(input);
        let mut declarations = Self::empty();

        for declaration in split_top_level(&sanitized, ';') {
            let trimmed = declaration.trim();
            if trimmed.is_empty() {
                continue;
            }

            let Some(colon_idx) = find_top_level_colon(trimmed) else {
                continue;
            };

            let name = normalize_property_name(&trimmed[..colon_idx]);
            let value = normalize_value(trimmed[colon_idx + 1..].trim());
            if name.is_empty() || value.is_empty() {
                continue;
            }

            declarations.set(&name, &value);
        }

        declarations
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let name = normalize_property_name(name);
        self.entries
            .iter()
            .find(|(prop, _)| *prop == name)
            .map(|(_, value)| value.as_str())
    }

    /// Sets a property in place, keeping its original position. An empty value
    /// removes the property, matching `element.style[name] = ""`.
    pub fn set(&mut self, name: &str, value: &str) {
        let name = normalize_property_name(name);
        if name.is_empty() {
            return;
        }

        let value = normalize_value(value);
        if value.is_empty() {
            self.remove(&name);
            return;
        }
        // like CSSOM, an unparsable assignment leaves the old value alone
        if !is_single_value(&value) {
            return;
        }

        if let Some(entry) = self.entries.iter_mut().find(|(prop, _)| *prop == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let name = normalize_property_name(name);
        let pos = self.entries.iter().position(|(prop, _)| *prop == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl fmt::Display for StyleDeclarations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (name, value)) in self.entries.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{name}: {value};")?;
        }
        Ok(())
    }
}

/// A CSS length as used by `width`, `height` and friends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    Px(f32),
    Percent(f32),
    Em(f32),
    Rem(f32),
    Auto,
}

impl Length {
    /// Parses a length. Bare numbers are read as pixels.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }

        let lower = trimmed.to_ascii_lowercase();
        if lower == "auto" {
            return Some(Self::Auto);
        }

        let (number, build): (&str, fn(f32) -> Self) = if let Some(rest) = lower.strip_suffix("px")
        {
            (rest, Self::Px)
        } else if let Some(rest) = lower.strip_suffix('%') {
            (rest, Self::Percent)
        } else if let Some(rest) = lower.strip_suffix("rem") {
            (rest, Self::Rem)
        } else if let Some(rest) = lower.strip_suffix("em") {
            (rest, Self::Em)
        } else {
            (lower.as_str(), Self::Px)
        };

        let value = number.trim_end().parse::<f32>().ok()?;
        value.is_finite().then(|| build(value))
    }

    /// Resolves to pixels. Percentages need a definite reference size.
    pub fn to_px(self, reference: Option<f32>, font_size: f32) -> Option<f32> {
        match self {
            Self::Px(value) => Some(value),
            Self::Percent(value) => reference.map(|base| base * value / 100.0),
            Self::Em(value) | Self::Rem(value) => Some(value * font_size),
            Self::Auto => None,
        }
    }
}

/// Normalizes a user-supplied size specification. Bare numbers gain a `px`
/// suffix; anything else is trimmed and passed through for the style system.
pub fn normalize_length_spec(input: &str) -> String {
    let trimmed = input.trim();
    let is_bare_number = !trimmed.is_empty()
        && trimmed.parse::<f64>().is_ok_and(f64::is_finite)
        && trimmed
            .bytes()
            .all(|byte| byte.is_ascii_digit() || matches!(byte, b'.' | b'-' | b'+'));

    if is_bare_number {
        format!("{trimmed}px")
    } else {
        trimmed.to_owned()
    }
}

/// True when `value` is one self-contained declaration value: no top-level
/// `;`, no unterminated string and balanced brackets.
pub fn is_single_value(value: &str) -> bool {
    let mut scanner = TopLevelScanner::default();
    for byte in value.bytes() {
        if scanner.advance(byte) && byte == b';' {
            return false;
        }
    }
    scanner.quote.is_none() && scanner.paren_depth == 0 && scanner.bracket_depth == 0
}

fn normalize_property_name(input: &str) -> String {
    input.trim().to_ascii_lowercase()
}

fn strip_comments_preserve_strings(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut idx = 0_usize;
    let mut out = Vec::with_capacity(input.len());
    let mut quote: Option<u8> = None;
    let mut in_comment = false;
    let mut escape = false;

    while idx < bytes.len() {
        let byte = bytes[idx];
        let next = bytes.get(idx.saturating_add(1)).copied();

        if in_comment {
            if byte == b'*' && next == Some(b'/') {
                in_comment = false;
                idx = idx.saturating_add(2);
                continue;
            }
            idx = idx.saturating_add(1);
            continue;
        }

        if let Some(open) = quote {
            out.push(byte);
            if !escape && byte == b'\\' {
                escape = true;
            } else if !escape && byte == open {
                quote = None;
            } else {
                escape = false;
            }
            idx = idx.saturating_add(1);
            continue;
        }

        if byte == b'/' && next == Some(b'*') {
            in_comment = true;
            idx = idx.saturating_add(2);
            continue;
        }

        if byte == b'\'' || byte == b'"' {
            quote = Some(byte);
        }

        out.push(byte);
        idx = idx.saturating_add(1);
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Quote- and bracket-aware scanner shared by the splitting helpers.
#[derive(Debug, Default)]
struct TopLevelScanner {
    quote: Option<u8>,
    escape: bool,
    paren_depth: u32,
    bracket_depth: u32,
}

impl TopLevelScanner {
    /// Feeds one byte; returns true when the byte sits at nesting level zero
    /// outside any string.
    fn advance(&mut self, byte: u8) -> bool {
        if let Some(open) = self.quote {
            if !self.escape && byte == b'\\' {
                self.escape = true;
            } else if !self.escape && byte == open {
                self.quote = None;
            } else {
                self.escape = false;
            }
            return false;
        }

        match byte {
            b'\'' | b'"' => {
                self.quote = Some(byte);
                false
            }
            b'(' => {
                self.paren_depth = self.paren_depth.saturating_add(1);
                false
            }
            b')' => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
                false
            }
            b'[' => {
                self.bracket_depth = self.bracket_depth.saturating_add(1);
                false
            }
            b']' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                false
            }
            _ => self.paren_depth == 0 && self.bracket_depth == 0,
        }
    }
}

fn split_top_level(input: &str, delimiter: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0_usize;
    let mut scanner = TopLevelScanner::default();

    for (idx, byte) in input.bytes().enumerate() {
        if scanner.advance(byte) && byte == delimiter as u8 {
            parts.push(&input[start..idx]);
            start = idx.saturating_add(1);
        }
    }

    if start <= input.len() {
        parts.push(&input[start..]);
    }

    parts
}

fn find_top_level_colon(input: &str) -> Option<usize> {
    let mut scanner = TopLevelScanner::default();
    input
        .bytes()
        .enumerate()
        .find(|(_, byte)| scanner.advance(*byte) && *byte == b':')
        .map(|(idx, _)| idx)
}

fn normalize_value(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut quote: Option<char> = None;
    let mut last_was_space = false;
    let mut escape = false;

    for ch in input.trim().chars() {
        if let Some(open) = quote {
            out.push(ch);
            if !escape && ch == '\\' {
                escape = true;
            } else if !escape && ch == open {
                quote = None;
            } else {
                escape = false;
            }
            continue;
        }

        if ch == '\'' || ch == '"' {
            quote = Some(ch);
            last_was_space = false;
            out.push(ch);
            continue;
        }

        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
            continue;
        }

        last_was_space = false;
        out.push(ch);
    }

    out.trim().to_owned()
}
