use regex::Regex;
use std::env;
use std::sync::OnceLock;

static ENV_REGEX: OnceLock<Regex> = OnceLock::new();

fn env_regex() -> &'static Regex {
    ENV_REGEX.get_or_init(|| {
        Regex::new(r"\$\{env:([^:}]+)(?::([^}]*))?\}").expect("Failed to compile env regex")
    })
}

/// Interpolate environment variables in config text.
/// Supports `${env:VAR_NAME}` and `${env:VAR_NAME:default_value}`; a variable
/// that is unset and has no default is left as written.
pub fn interpolate_env_vars(input: &str) -> String {
    env_regex()
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            match (env::var(var_name), caps.get(2)) {
                (Ok(value), _) => value,
                (Err(_), Some(default)) => default.as_str().to_string(),
                (Err(_), None) => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Names of `${env:...}` placeholders still present after interpolation
pub fn unresolved_env_vars(input: &str) -> Vec<String> {
    env_regex()
        .captures_iter(input)
        .map(|caps| caps[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_env_var_exists() {
        env::set_var("ACTIONWEB_GREETING", "hello");
        let result = interpolate_env_vars("Value: ${env:ACTIONWEB_GREETING}");
        assert_eq!(result, "Value: hello");
        env::remove_var("ACTIONWEB_GREETING");
    }

    #[test]
    fn test_interpolate_env_var_with_default() {
        env::remove_var("ACTIONWEB_MISSING_A");
        let result = interpolate_env_vars("layout: ${env:ACTIONWEB_MISSING_A:/layouts/plain}");
        assert_eq!(result, "layout: /layouts/plain");
    }

    #[test]
    fn test_unresolved_placeholders_are_kept_and_reported() {
        env::remove_var("ACTIONWEB_MISSING_B");
        let result = interpolate_env_vars("dir: ${env:ACTIONWEB_MISSING_B}");
        assert_eq!(result, "dir: ${env:ACTIONWEB_MISSING_B}");
        assert_eq!(unresolved_env_vars(&result), vec!["ACTIONWEB_MISSING_B".to_string()]);
    }

    #[test]
    fn test_interpolate_multiple_vars() {
        env::set_var("ACTIONWEB_HOST", "127.0.0.1");
        env::set_var("ACTIONWEB_PORT", "9000");
        let result = interpolate_env_vars("${env:ACTIONWEB_HOST}:${env:ACTIONWEB_PORT}");
        assert_eq!(result, "127.0.0.1:9000");
        assert!(unresolved_env_vars(&result).is_empty());
        env::remove_var("ACTIONWEB_HOST");
        env::remove_var("ACTIONWEB_PORT");
    }
}
