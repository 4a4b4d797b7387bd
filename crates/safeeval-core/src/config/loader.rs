//! Environment variable loading with primary-key / alias fallback chains.

use std::env;
use std::path::Path;

/// Load `.env` from the current directory into the process environment
/// (existing variables are never overridden). Runs once per process.
pub fn load_dotenv() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let dir = env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
        load_dotenv_from_dir(&dir);
    });
}

/// Load `<dir>/.env` into the process environment without overriding
/// variables that are already set. Missing files are ignored.
pub fn load_dotenv_from_dir(dir: &Path) {
    let Ok(content) = std::fs::read_to_string(dir.join(".env")) else {
        return;
    };
    for (key, value) in parse_dotenv(&content) {
        if env::var(&key).is_err() {
            env::set_var(key, value);
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some(eq_pos) = line.find('=') else {
            continue;
        };
        let key = line[..eq_pos].trim();
        let mut value = line[eq_pos + 1..].trim();
        // Strip inline comment (# not inside quotes)
        if let Some(hash_pos) = value.find('#') {
            let before_hash = value[..hash_pos].trim_end();
            if !before_hash.contains('"') && !before_hash.contains('\'') {
                value = before_hash;
            }
        }
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = &value[1..value.len() - 1];
        }
        if !key.is_empty() {
            pairs.push((key.to_string(), value.to_string()));
        }
    }
    pairs
}

/// Read the primary variable or the first set alias, falling back to `default`.
/// Empty values count as unset.
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    env_optional(primary, aliases).unwrap_or_else(default)
}

/// Read the primary variable or the first set alias. Empty values are `None`.
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .and_then(|s| {
            let s = s.trim().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        })
}

/// Boolean variable: 0/false/no/off are false, any other value is true.
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    match env_optional(primary, aliases).as_deref() {
        Some(s) => !matches!(
            s.to_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        None => default,
    }
}

/// Parse a variable into `T`. Unparseable values are logged and treated as unset.
pub fn env_parse<T: std::str::FromStr>(primary: &str, aliases: &[&str]) -> Option<T> {
    let raw = env_optional(primary, aliases)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key = primary, value = %raw, "Ignoring unparseable environment value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotenv_quotes_and_comments() {
        let pairs = parse_dotenv(
            "# comment\nA=1\nexport B=\"two words\"\nC='x' \nD=plain # trailing\n\nbroken\n",
        );
        assert_eq!(
            pairs,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "two words".to_string()),
                ("C".to_string(), "x".to_string()),
                ("D".to_string(), "plain".to_string()),
            ]
        );
    }

    #[test]
    fn test_env_optional_alias_and_empty() {
        env::set_var("SAFEEVAL_TEST_LOADER_ALIAS", "from-alias");
        env::set_var("SAFEEVAL_TEST_LOADER_EMPTY", "  ");
        assert_eq!(
            env_optional("SAFEEVAL_TEST_LOADER_MISSING", &["SAFEEVAL_TEST_LOADER_ALIAS"]),
            Some("from-alias".to_string())
        );
        assert_eq!(env_optional("SAFEEVAL_TEST_LOADER_EMPTY", &[]), None);
        assert_eq!(
            env_or("SAFEEVAL_TEST_LOADER_EMPTY", &[], || "dflt".to_string()),
            "dflt"
        );
    }

    #[test]
    fn test_env_bool_and_parse() {
        env::set_var("SAFEEVAL_TEST_LOADER_BOOL_OFF", "off");
        env::set_var("SAFEEVAL_TEST_LOADER_BOOL_ON", "yes");
        env::set_var("SAFEEVAL_TEST_LOADER_NUM", "42");
        env::set_var("SAFEEVAL_TEST_LOADER_BAD_NUM", "forty");
        assert!(!env_bool("SAFEEVAL_TEST_LOADER_BOOL_OFF", &[], true));
        assert!(env_bool("SAFEEVAL_TEST_LOADER_BOOL_ON", &[], false));
        assert!(env_bool("SAFEEVAL_TEST_LOADER_BOOL_UNSET", &[], true));
        assert_eq!(env_parse::<u64>("SAFEEVAL_TEST_LOADER_NUM", &[]), Some(42));
        assert_eq!(env_parse::<u64>("SAFEEVAL_TEST_LOADER_BAD_NUM", &[]), None);
    }

    #[test]
    fn test_load_dotenv_from_dir_does_not_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".env"),
            "SAFEEVAL_TEST_DOTENV_NEW=fresh\nSAFEEVAL_TEST_DOTENV_SET=overridden\n",
        )
        .unwrap();
        env::set_var("SAFEEVAL_TEST_DOTENV_SET", "original");
        load_dotenv_from_dir(dir.path());
        assert_eq!(env::var("SAFEEVAL_TEST_DOTENV_NEW").unwrap(), "fresh");
        assert_eq!(env::var("SAFEEVAL_TEST_DOTENV_SET").unwrap(), "original");
    }
}
