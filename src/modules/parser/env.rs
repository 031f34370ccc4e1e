//! Environment variable substitution

use arangolink_core::ConnectorError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeSet;

/// Regex pattern for environment variable placeholders: {{ env.VAR_NAME }}
static ENV_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*env\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid env pattern")
});

/// Replaces `{{ env.NAME }}` placeholders in configuration text
pub struct EnvSubstitutor {
    /// Whether to fail on missing environment variables
    strict: bool,
    /// Whether to load a `.env` file before substituting
    load_dotenv: bool,
}

impl EnvSubstitutor {
    /// Strict substitutor: missing variables are an error
    pub fn new() -> Self {
        Self {
            strict: true,
            load_dotenv: true,
        }
    }

    /// Lenient substitutor: placeholders for missing variables are left as-is
    pub fn lenient() -> Self {
        Self {
            strict: false,
            load_dotenv: true,
        }
    }

    /// Skip loading `.env`; only the process environment is consulted
    pub fn without_dotenv(mut self) -> Self {
        self.load_dotenv = false;
        self
    }

    /// Substitute environment variables in the given content
    pub fn substitute(&self, content: &str) -> Result<String, ConnectorError> {
        let mut value = content.to_string();
        self.substitute_each([&mut value])?;
        Ok(value)
    }

    /// Substitute environment variables in every value, in place.
    ///
    /// Each value is replaced as a whole string, so substituted text is never
    /// re-interpreted by the format it came from. Missing variables across
    /// all values are reported together.
    pub fn substitute_each<'a, I>(&self, values: I) -> Result<(), ConnectorError>
    where
        I: IntoIterator<Item = &'a mut String>,
    {
        if self.load_dotenv {
            // A missing .env file is the common case
            let _ = dotenvy::dotenv();
        }

        let mut missing = BTreeSet::new();
        for value in values {
            if !Self::has_placeholders(value) {
                continue;
            }
            let replaced = ENV_PATTERN.replace_all(value.as_str(), |cap: &Captures<'_>| {
                let var_name = &cap[1];
                match std::env::var(var_name) {
                    Ok(resolved) => resolved,
                    Err(_) => {
                        missing.insert(var_name.to_string());
                        cap[0].to_string()
                    }
                }
            });
            *value = replaced.into_owned();
        }

        if self.strict && !missing.is_empty() {
            let names: Vec<String> = missing.into_iter().collect();
            return Err(ConnectorError::EnvVarNotFound(names.join(", ")));
        }

        Ok(())
    }

    /// Check if a string contains environment variable placeholders
    pub fn has_placeholders(content: &str) -> bool {
        ENV_PATTERN.is_match(content)
    }
}

impl Default for EnvSubstitutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_placeholders() {
        assert!(EnvSubstitutor::has_placeholders("{{ env.ARANGO_PASSWORD }}"));
        assert!(EnvSubstitutor::has_placeholders("{{env.VAR}}"));
        assert!(!EnvSubstitutor::has_placeholders("password: secret"));
        assert!(!EnvSubstitutor::has_placeholders("{{ vars.password }}"));
    }

    #[test]
    fn test_substitute_with_env_var() {
        std::env::set_var("ARANGOLINK_TEST_SUBSTITUTE", "s3cret");
        let substitutor = EnvSubstitutor::new().without_dotenv();
        let result = substitutor
            .substitute("password: {{ env.ARANGOLINK_TEST_SUBSTITUTE }}")
            .unwrap();
        assert_eq!(result, "password: s3cret");
        std::env::remove_var("ARANGOLINK_TEST_SUBSTITUTE");
    }

    #[test]
    fn test_substitute_missing_var_strict() {
        let substitutor = EnvSubstitutor::new().without_dotenv();
        let err = substitutor
            .substitute("{{ env.ARANGOLINK_MISSING_B }} {{ env.ARANGOLINK_MISSING_A }}")
            .unwrap_err();
        match err {
            ConnectorError::EnvVarNotFound(names) => {
                assert_eq!(names, "ARANGOLINK_MISSING_A, ARANGOLINK_MISSING_B")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_substitute_missing_var_lenient() {
        let substitutor = EnvSubstitutor::lenient().without_dotenv();
        let result = substitutor
            .substitute("{{ env.ARANGOLINK_MISSING_C }}")
            .unwrap();
        assert_eq!(result, "{{ env.ARANGOLINK_MISSING_C }}");
    }

    #[test]
    fn test_substitute_each_reports_all_missing() {
        std::env::set_var("ARANGOLINK_TEST_EACH_USER", "root");
        let mut user = "{{ env.ARANGOLINK_TEST_EACH_USER }}".to_string();
        let mut password = "{{ env.ARANGOLINK_MISSING_E }}".to_string();
        let mut database = "{{ env.ARANGOLINK_MISSING_D }}".to_string();

        let err = EnvSubstitutor::new()
            .without_dotenv()
            .substitute_each([&mut user, &mut password, &mut database])
            .unwrap_err();
        match err {
            ConnectorError::EnvVarNotFound(names) => {
                assert_eq!(names, "ARANGOLINK_MISSING_D, ARANGOLINK_MISSING_E")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(user, "root");
        std::env::remove_var("ARANGOLINK_TEST_EACH_USER");
    }

    #[test]
    fn test_substituted_value_is_kept_verbatim() {
        std::env::set_var("ARANGOLINK_TEST_VERBATIM", "a\"b #c: d");
        let mut value = "x-{{ env.ARANGOLINK_TEST_VERBATIM }}".to_string();
        EnvSubstitutor::new()
            .without_dotenv()
            .substitute_each([&mut value])
            .unwrap();
        assert_eq!(value, "x-a\"b #c: d");
        std::env::remove_var("ARANGOLINK_TEST_VERBATIM");
    }
}
