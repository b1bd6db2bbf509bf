//! Host capability interfaces.
//!
//! Everything the engine needs from the surrounding process (wall-clock
//! time, fresh execution ids, environment variables, the user database)
//! sits behind a small trait so tests can substitute deterministic
//! implementations without touching the real host.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use stagehand_types::id::ExecutionId;

/// Wall-clock time in whole seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_unix(&self) -> i64;
}

/// Source of fresh execution identifiers.
pub trait ExecutionIds: Send + Sync {
    fn next(&self) -> ExecutionId;
}

/// Read access to the host process environment.
pub trait HostEnv: Send + Sync {
    /// The value of `name`, or `None` when unset.
    fn var(&self, name: &str) -> Option<String>;
}

/// Read access to the host user database.
pub trait HostUsers: Send + Sync {
    /// `(uid, gid)` for the named user, or `None` when the user does not
    /// exist or cannot be looked up.
    fn uid_gid(&self, name: &str) -> Option<(u32, u32)>;
}

/// The real system clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX),
            Err(_) => 0,
        }
    }
}

/// Random 128-bit execution ids, rendered canonically.
pub struct UuidExecutionIds;

impl ExecutionIds for UuidExecutionIds {
    fn next(&self) -> ExecutionId {
        ExecutionId::new(uuid::Uuid::new_v4().to_string())
    }
}

/// The real process environment.
pub struct SystemEnv;

impl HostEnv for SystemEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// The real host user database.
pub struct SystemUsers;

#[cfg(unix)]
impl HostUsers for SystemUsers {
    fn uid_gid(&self, name: &str) -> Option<(u32, u32)> {
        nix::unistd::User::from_name(name)
            .ok()
            .flatten()
            .map(|user| (user.uid.as_raw(), user.gid.as_raw()))
    }
}

#[cfg(not(unix))]
impl HostUsers for SystemUsers {
    fn uid_gid(&self, _name: &str) -> Option<(u32, u32)> {
        None
    }
}

/// Bundle of host capabilities handed to the engine at construction.
#[derive(Clone)]
pub struct Host {
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn ExecutionIds>,
    pub env: Arc<dyn HostEnv>,
    pub users: Arc<dyn HostUsers>,
}

impl Host {
    /// The real host: system clock, random ids, process environment, user
    /// database.
    #[must_use]
    pub fn system() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidExecutionIds),
            env: Arc::new(SystemEnv),
            users: Arc::new(SystemUsers),
        }
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_past_2020() {
        assert!(SystemClock.now_unix() > 1_577_836_800);
    }

    #[test]
    fn uuid_ids_are_fresh_and_canonical() {
        let ids = UuidExecutionIds;
        let a = ids.next();
        let b = ids.next();
        assert_ne!(a, b);
        // canonical hyphenated rendering: 8-4-4-4-12
        assert_eq!(a.as_str().len(), 36);
        assert_eq!(a.as_str().matches('-').count(), 4);
    }

    #[test]
    fn system_env_reads_process_environment() {
        std::env::set_var("STAGEHAND_HOST_TEST", "value");
        assert_eq!(
            SystemEnv.var("STAGEHAND_HOST_TEST").as_deref(),
            Some("value")
        );
        std::env::remove_var("STAGEHAND_HOST_TEST");
        assert_eq!(SystemEnv.var("STAGEHAND_HOST_TEST"), None);
    }
}
