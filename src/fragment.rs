//! URL fragment grammar: `#key1=value1&key2=value2`.
//!
//! Values are codec entries, which may contain the grammar's own delimiters
//! (and JSON punctuation that reads badly in an address bar). Every such
//! character is replaced by a private `@TOKEN@` escape before it reaches the
//! fragment. The escape introducer `@` is itself escaped, which keeps
//! [`unescape`] an exact single-pass inverse of [`escape`].

use std::borrow::Cow;
use std::fmt;

const ESCAPES: &[(char, &str)] = &[
    ('@', "AT"),
    ('&', "A"),
    ('=', "E"),
    ('{', "LS"),
    ('}', "RS"),
    ('"', "Q"),
    (':', "C"),
    ('#', "H"),
    ('%', "P"),
];

fn token_for(ch: char) -> Option<&'static str> {
    ESCAPES.iter().find(|(c, _)| *c == ch).map(|(_, token)| *token)
}

fn char_for(token: &str) -> Option<char> {
    ESCAPES.iter().find(|(_, t)| *t == token).map(|(c, _)| *c)
}

/// Replace reserved characters with escape tokens.
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|ch| token_for(ch).is_some()) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match token_for(ch) {
            Some(token) => {
                out.push('@');
                out.push_str(token);
                out.push('@');
            }
            None => out.push(ch),
        }
    }
    Cow::Owned(out)
}

/// Reverse [`escape`]. Unknown or unterminated tokens are kept literally.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('@') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        if let Some(end) = after.find('@') {
            if let Some(ch) = char_for(&after[..end]) {
                out.push(ch);
                rest = &after[end + 1..];
                continue;
            }
        }
        out.push('@');
        rest = after;
    }
    out.push_str(rest);
    out
}

/// Parsed fragment: ordered `key → raw entry` pairs, already unescaped but
/// not yet decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    entries: Vec<(String, String)>,
}

impl Fragment {
    /// Parse fragment text (with or without the leading `#`).
    ///
    /// A segment written as `key` or `key=` is a hand-editing mistake; it is
    /// kept with `placeholder` as its value so the key still counts as
    /// present. Segments without a key are dropped.
    pub fn parse(text: &str, placeholder: &str) -> Self {
        let text = text.strip_prefix('#').unwrap_or(text);
        let mut fragment = Self::default();
        for segment in text.split('&').filter(|s| !s.is_empty()) {
            let (key, value) = match segment.split_once('=') {
                Some((key, value)) if !value.is_empty() => (key, Some(value)),
                Some((key, _)) => (key, None),
                None => (segment, None),
            };
            if key.is_empty() {
                tracing::warn!(%segment, "invalid URL hash segment without a key; ignoring it");
                continue;
            }
            let key = unescape(key);
            let value = if let Some(value) = value {
                unescape(value)
            } else {
                tracing::warn!(%key, %placeholder, "invalid URL hash segment; expecting key=value, reverting to placeholder");
                placeholder.to_owned()
            };
            fragment.insert(key, value);
        }
        fragment
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace an entry. Replacing keeps the key's position.
    pub fn insert(&mut self, key: impl Into<String>, raw: impl Into<String>) {
        let key = key.into();
        let raw = raw.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = raw;
        } else {
            self.entries.push((key, raw));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Serializes without the leading `#`.
impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (key, value)) in self.entries.iter().enumerate() {
            if index > 0 {
                f.write_str("&")?;
            }
            write!(f, "{}={}", escape(key), escape(value))?;
        }
        Ok(())
    }
}

/// Split a URL into the part before the fragment and the fragment text.
pub fn split_url(url: &str) -> (&str, &str) {
    match url.split_once('#') {
        Some((base, fragment)) => (base, fragment),
        None => (url, ""),
    }
}

#[cfg(test)]
#[path = "fragment_test.rs"]
mod tests;
