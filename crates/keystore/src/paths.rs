//! Path helpers

use std::path::PathBuf;

/// Expand a leading `~` and any `$VAR` / `${VAR}` references.
///
/// Unknown variables expand to the empty string.
pub fn expand_path(path: &str) -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_default();
    let path = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => format!("{}{}", home, rest),
        _ => path.to_string(),
    };
    PathBuf::from(expand_vars(&path))
}

fn expand_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }

        let mut name = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if braced && chars.peek() == Some(&'}') {
            chars.next();
        }

        if name.is_empty() {
            out.push('$');
            if braced {
                out.push('{');
            }
        } else {
            out.push_str(&std::env::var(&name).unwrap_or_default());
        }
    }

    out
}

/// `~/.flightguard`
pub fn default_config_dir() -> PathBuf {
    expand_path("~/.flightguard")
}

/// `~/.flightguard/keys`
pub fn default_keystore_dir() -> PathBuf {
    default_config_dir().join("keys")
}
