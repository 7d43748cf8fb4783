//! Lookups over an environment snapshot.
//!
//! The snapshot is a plain `&[(String, String)]`, e.g.
//! `std::env::vars().collect::<Vec<_>>()`, so configuration code stays
//! testable without touching the process environment.
//!
//! ```ignore
//! let env: Vec<(String, String)> = std::env::vars().collect();
//! let dialect = entsql::env::get_or(&env, "ENTSQL_DIALECT", "sql_server");
//! ```

/// Value of `name`, if set.
#[must_use]
pub fn get(env: &[(String, String)], name: &str) -> Option<String> {
    env.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
}

/// Value of `name`, or `default` when unset.
#[must_use]
pub fn get_or(env: &[(String, String)], name: &str, default: &str) -> String {
    get(env, name).unwrap_or_else(|| default.to_string())
}

/// Boolean value of `name`.
///
/// `true`, `1` and `yes` (any case) are true; any other value is false.
/// Unset variables yield `default`.
#[must_use]
pub fn bool(env: &[(String, String)], name: &str, default: bool) -> bool {
    get(env, name).map_or(default, |v| {
        let v_lower = v.trim().to_lowercase();
        v_lower == "true" || v_lower == "1" || v_lower == "yes"
    })
}

/// Unsigned integer value of `name`.
///
/// `None` when unset, `Some(Err(raw))` when set but not a number.
#[must_use]
pub fn usize(env: &[(String, String)], name: &str) -> Option<Result<usize, String>> {
    get(env, name).map(|raw| raw.trim().parse::<usize>().map_err(|_| raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_env() -> Vec<(String, String)> {
        vec![
            ("ENTSQL_DIALECT".to_string(), "postgres".to_string()),
            ("ENTSQL_BATCH_SIZE".to_string(), "25".to_string()),
            ("ENTSQL_MAX_PARAMETERS".to_string(), "many".to_string()),
            ("ENTSQL_UPSERT".to_string(), "YES".to_string()),
            ("ENTSQL_MULTI_STATEMENT".to_string(), "off".to_string()),
        ]
    }

    #[test]
    fn test_get() {
        let env = mock_env();
        assert_eq!(get(&env, "ENTSQL_DIALECT"), Some("postgres".to_string()));
        assert_eq!(get(&env, "ENTSQL_NONEXISTENT"), None);
    }

    #[test]
    fn test_get_or() {
        let env = mock_env();
        assert_eq!(get_or(&env, "ENTSQL_DIALECT", "sqlite"), "postgres");
        assert_eq!(get_or(&env, "ENTSQL_NONEXISTENT", "sqlite"), "sqlite");
    }

    #[test]
    fn test_bool() {
        let env = mock_env();
        assert!(bool(&env, "ENTSQL_UPSERT", false));
        assert!(!bool(&env, "ENTSQL_MULTI_STATEMENT", true));
        assert!(bool(&env, "ENTSQL_NONEXISTENT", true));
    }

    #[test]
    fn test_usize() {
        let env = mock_env();
        assert_eq!(usize(&env, "ENTSQL_BATCH_SIZE"), Some(Ok(25)));
        assert_eq!(usize(&env, "ENTSQL_MAX_PARAMETERS"), Some(Err("many".to_string())));
        assert_eq!(usize(&env, "ENTSQL_NONEXISTENT"), None);
    }
}
