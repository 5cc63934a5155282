//! `${VAR}` expansion for configuration strings.

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` references in `value`.
///
/// Strings without `${` are returned untouched, so URLs containing a bare `$`
/// survive. An unset variable without a default is an error naming `field`.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    shellexpand::env_with_context(value, |var| -> Result<Option<String>, LookupError> {
        match std::env::var(var) {
            Ok(val) => Ok(Some(val)),
            Err(_) => Err(LookupError {
                var_name: var.to_owned(),
            }),
        }
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{0}}} not set", e.cause.var_name),
    })
}

struct LookupError {
    var_name: String,
}
