//! The specification substitution language.
//!
//! Two prefixes exist: `env:NAME` (anywhere a substitutable string value is
//! allowed) resolves to the host environment variable `NAME`, empty when
//! unset; `user:NAME` (in the `user` field only) resolves to
//! `"<uid>:<gid>"` from the host user database and fails when the user is
//! unknown. All substitution logic lives here; the execution engine never
//! inspects prefixes itself.

use stagehand_types::SpecError;

use crate::host::{HostEnv, HostUsers};

/// Prefix marking a value as an environment variable reference.
pub const ENV_PREFIX: &str = "env:";

/// Prefix marking a user field as a user-database reference.
pub const USER_PREFIX: &str = "user:";

/// Materialize one substitutable string value.
///
/// `env:NAME` becomes the value of `NAME` (empty string when unset); any
/// other value passes through unchanged.
#[must_use]
pub fn materialize_value(raw: &str, env: &dyn HostEnv) -> String {
    match raw.strip_prefix(ENV_PREFIX) {
        Some(name) => env.var(name).unwrap_or_default(),
        None => raw.to_string(),
    }
}

/// Materialize a container `user` field.
///
/// Handles `user:NAME` via the host user database, `env:NAME` via the
/// environment, and passes anything else (including the empty string,
/// meaning the container default) through unchanged.
///
/// # Errors
///
/// Returns [`SpecError::InvalidUser`] when a `user:NAME` lookup fails.
pub fn materialize_user(
    raw: &str,
    env: &dyn HostEnv,
    users: &dyn HostUsers,
) -> Result<String, SpecError> {
    if let Some(name) = raw.strip_prefix(USER_PREFIX) {
        let (uid, gid) = users
            .uid_gid(name)
            .ok_or_else(|| SpecError::InvalidUser(format!("no such user '{name}'")))?;
        return Ok(format!("{uid}:{gid}"));
    }
    Ok(materialize_value(raw, env))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MapEnv, MapUsers};

    #[test]
    fn plain_values_pass_through() {
        let env = MapEnv::default();
        assert_eq!(materialize_value("literal", &env), "literal");
        assert_eq!(materialize_value("", &env), "");
    }

    #[test]
    fn env_prefix_resolves_from_host() {
        let env = MapEnv::with([("DATA_DIR", "/srv/data")]);
        assert_eq!(materialize_value("env:DATA_DIR", &env), "/srv/data");
    }

    #[test]
    fn unset_env_var_becomes_empty_string() {
        let env = MapEnv::default();
        assert_eq!(materialize_value("env:MISSING", &env), "");
    }

    #[test]
    fn prefix_must_be_exact() {
        let env = MapEnv::with([("X", "v")]);
        // No substitution mid-string; the prefix is positional.
        assert_eq!(materialize_value("prefix env:X", &env), "prefix env:X");
    }

    #[test]
    fn user_prefix_resolves_uid_gid() {
        let env = MapEnv::default();
        let users = MapUsers::with([("svc", (1001, 1002))]);
        assert_eq!(
            materialize_user("user:svc", &env, &users).unwrap(),
            "1001:1002"
        );
    }

    #[test]
    fn unknown_user_is_invalid() {
        let env = MapEnv::default();
        let users = MapUsers::default();
        assert!(matches!(
            materialize_user("user:ghost", &env, &users),
            Err(SpecError::InvalidUser(_))
        ));
    }

    #[test]
    fn user_field_accepts_env_prefix_and_literals() {
        let env = MapEnv::with([("RUN_AS", "1000:1000")]);
        let users = MapUsers::default();
        assert_eq!(
            materialize_user("env:RUN_AS", &env, &users).unwrap(),
            "1000:1000"
        );
        assert_eq!(materialize_user("0:0", &env, &users).unwrap(), "0:0");
        assert_eq!(materialize_user("", &env, &users).unwrap(), "");
    }
}
