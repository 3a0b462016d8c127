//! Label identity synthesis: `(scope, key)` for an occurrence.
//!
//! Keys come from the visible text. ASCII-foldable text is slugged
//! (`"Enter name"` -> `enter_name`, `"Café"` -> `cafe`); text that cannot
//! be represented that way (CJK, mixed scripts) gets a stable hash key
//! such as `text_5f2c81d3`.

use serde::Serialize;
use thiserror::Error;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::config::Config;
use crate::detect::Occurrence;

/// Maximum key length before truncation at an underscore boundary.
pub const MAX_KEY_LEN: usize = 48;

/// Prefix of hash-derived keys and of keys that would start with a digit.
pub const FALLBACK_PREFIX: &str = "text_";

/// Number of suffixes tried before a key collision is given up on.
pub const MAX_DISAMBIGUATION_ATTEMPTS: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LabelIdentity {
    pub scope: String,
    pub key: String,
}

impl std::fmt::Display for LabelIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.scope, self.key)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// The text has no letters or digits to build a key from.
    #[error("no key can be derived from {0:?}")]
    EmptyKey(String),
}

/// Synthesize the identity for one occurrence.
pub fn synthesize(occ: &Occurrence, config: &Config) -> Result<LabelIdentity, IdentityError> {
    let key = label_key(&occ.value)?;
    Ok(LabelIdentity {
        scope: scope_for(occ.context_name.as_deref(), config),
        key,
    })
}

/// `lowerFirst(context) + suffix`, or the default scope.
pub fn scope_for(context_name: Option<&str>, config: &Config) -> String {
    match context_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => format!("{}{}", lower_first_char(name), config.scope_suffix),
        None => config.default_scope.clone(),
    }
}

fn lower_first_char(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lowercase, fold diacritics, collapse every run of non-`[a-z0-9]` into a
/// single `_` and trim underscores at both ends.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_sep = false;
    for c in text.nfkd().filter(|c| !is_combining_mark(*c)) {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Key for `text`.
///
/// Falls back to a hash key when the slug would lose letters the text
/// actually has (any non-ASCII alphabetic character after folding).
pub fn label_key(text: &str) -> Result<String, IdentityError> {
    let folded: String = text.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    let needs_fallback = folded
        .chars()
        .any(|c| c.is_alphabetic() && !c.is_ascii_alphabetic());

    let slug = normalize(text);
    if needs_fallback || (slug.is_empty() && text.chars().any(char::is_alphanumeric)) {
        return Ok(format!("{}{:08x}", FALLBACK_PREFIX, text_hash(text.trim())));
    }
    if slug.is_empty() {
        return Err(IdentityError::EmptyKey(text.to_string()));
    }

    let slug = if slug.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{}{}", FALLBACK_PREFIX, slug)
    } else {
        slug
    };
    Ok(truncate_key(&slug))
}

fn truncate_key(key: &str) -> String {
    if key.len() <= MAX_KEY_LEN {
        return key.to_string();
    }
    let head = &key[..MAX_KEY_LEN];
    match head.rfind('_') {
        Some(pos) if pos > 0 => head[..pos].to_string(),
        _ => head.to_string(),
    }
}

/// 32-bit FNV-1a of the UTF-8 bytes.
pub fn text_hash(text: &str) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    text.bytes().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ byte as u32).wrapping_mul(PRIME)
    })
}

/// Candidate key for the `attempt`-th collision of `key` with `text`.
///
/// Attempt 0 returns `key` unchanged; later attempts append a six-digit
/// hex suffix derived from the text, so the result is deterministic.
pub fn disambiguate(key: &str, text: &str, attempt: u32) -> String {
    if attempt == 0 {
        return key.to_string();
    }
    let mut seed = text_hash(text);
    for _ in 1..attempt {
        seed = text_hash(&format!("{:08x}{}", seed, text));
    }
    format!("{}_{:06x}", key, seed & 0x00ff_ffff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyKind;
    use crate::detect::{Classification, TextSite};

    fn occurrence(value: &str, context: Option<&str>) -> Occurrence {
        Occurrence {
            file_path: "src/App.tsx".to_string(),
            line: 1,
            column: 1,
            byte_span: 0..value.len(),
            raw_text: value.to_string(),
            value: value.to_string(),
            classification: Classification::Cjk,
            site: TextSite::JsxText,
            context_name: context.map(str::to_string),
            strategy: StrategyKind::Ast,
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Enter name"), "enter_name");
        assert_eq!(normalize("  --Save & Exit!! "), "save_exit");
        assert_eq!(normalize("Café au lait"), "cafe_au_lait");
        assert_eq!(normalize("!!!"), "");
    }

    #[test]
    fn test_scope_from_context() {
        let config = Config::default();
        assert_eq!(scope_for(Some("LoginForm"), &config), "loginFormView");
        assert_eq!(scope_for(None, &config), "common");
        assert_eq!(scope_for(Some("  "), &config), "common");
    }

    #[test]
    fn test_cjk_text_gets_hash_key() {
        let key = label_key("确认").unwrap();
        assert!(key.starts_with("text_"));
        assert_eq!(key.len(), "text_".len() + 8);
        assert_eq!(key, label_key("确认").unwrap());
        assert_ne!(key, label_key("取消").unwrap());
    }

    #[test]
    fn test_mixed_script_uses_hash_key() {
        let key = label_key("OK 确认").unwrap();
        assert!(key.starts_with("text_"));
    }

    #[test]
    fn test_symbolic_text_is_rejected() {
        assert_eq!(
            label_key("-- ** --"),
            Err(IdentityError::EmptyKey("-- ** --".to_string()))
        );
    }

    #[test]
    fn test_digit_prefix_and_truncation() {
        assert_eq!(label_key("404 not found").unwrap(), "text_404_not_found");
        let long = "this is a very long sentence that keeps going well past the limit";
        let key = label_key(long).unwrap();
        assert!(key.len() <= MAX_KEY_LEN);
        assert!(!key.ends_with('_'));
        assert!(long.replace(' ', "_").starts_with(&key));
    }

    #[test]
    fn test_synthesize_is_deterministic() {
        let config = Config::default();
        let occ = occurrence("Enter name", Some("SearchBox"));
        let first = synthesize(&occ, &config).unwrap();
        assert_eq!(first, synthesize(&occ, &config).unwrap());
        assert_eq!(first.scope, "searchBoxView");
        assert_eq!(first.key, "enter_name");
    }

    #[test]
    fn test_disambiguate() {
        assert_eq!(disambiguate("save", "Save!", 0), "save");
        let first = disambiguate("save", "Save!", 1);
        assert!(first.starts_with("save_"));
        assert_eq!(first.len(), "save_".len() + 6);
        assert_eq!(first, disambiguate("save", "Save!", 1));
        assert_ne!(first, disambiguate("save", "Save!", 2));
    }
}
