//! Deterministic host and driver fakes for unit tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use stagehand_types::id::ExecutionId;

use crate::driver::{
    ContainerConfig, ContainerDriver, ContainerMount, ContainerState, DriverResult,
    ImageBuildOptions,
};
use crate::host::{Clock, ExecutionIds, Host, HostEnv, HostUsers};

/// A clock that starts at a fixed instant and ticks one second per call.
pub struct TickingClock(AtomicI64);

impl TickingClock {
    pub fn starting_at(start: i64) -> Self {
        Self(AtomicI64::new(start))
    }
}

impl Clock for TickingClock {
    fn now_unix(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

/// Sequential execution ids: `exec-1`, `exec-2`, ...
#[derive(Default)]
pub struct SeqIds(AtomicU64);

impl ExecutionIds for SeqIds {
    fn next(&self) -> ExecutionId {
        let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        ExecutionId::new(format!("exec-{n}"))
    }
}

/// Map-backed environment.
#[derive(Default)]
pub struct MapEnv(BTreeMap<String, String>);

impl MapEnv {
    pub fn with<const N: usize>(pairs: [(&str, &str); N]) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl HostEnv for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned()
    }
}

/// Map-backed user database.
#[derive(Default)]
pub struct MapUsers(BTreeMap<String, (u32, u32)>);

impl MapUsers {
    pub fn with<const N: usize>(pairs: [(&str, (u32, u32)); N]) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(name, ids)| (name.to_string(), ids))
                .collect(),
        )
    }
}

impl HostUsers for MapUsers {
    fn uid_gid(&self, name: &str) -> Option<(u32, u32)> {
        self.0.get(name).copied()
    }
}

/// A deterministic [`Host`] for engine tests.
pub fn fixed_host(env: MapEnv, users: MapUsers) -> Host {
    Host {
        clock: Arc::new(TickingClock::starting_at(1_700_000_000)),
        ids: Arc::new(SeqIds::default()),
        env: Arc::new(env),
        users: Arc::new(users),
    }
}

/// What the fake driver should do for a given container.
#[derive(Debug, Clone)]
pub struct ScriptedContainer {
    pub exit_code: i64,
    pub fail_create: bool,
    pub fail_start: bool,
    pub fail_wait: bool,
}

impl Default for ScriptedContainer {
    fn default() -> Self {
        Self {
            exit_code: 0,
            fail_create: false,
            fail_start: false,
            fail_wait: false,
        }
    }
}

/// A recorded `create_container` call.
#[derive(Debug, Clone)]
pub struct CreatedContainer {
    pub name: String,
    pub config: ContainerConfig,
    pub mounts: Vec<ContainerMount>,
    pub started: bool,
}

/// In-memory container driver. Behavior is scripted per image tag;
/// records every call.
#[derive(Default)]
pub struct FakeDriver {
    /// Behavior per image tag; missing entries succeed with exit code 0.
    pub scripts: Mutex<BTreeMap<String, ScriptedContainer>>,
    pub containers: Mutex<Vec<CreatedContainer>>,
    pub build_requests: Mutex<Vec<ImageBuildOptions>>,
    pub build_output: Vec<u8>,
}

impl FakeDriver {
    pub fn script_image(&self, image: &str, script: ScriptedContainer) {
        self.scripts
            .lock()
            .unwrap()
            .insert(image.to_string(), script);
    }

    fn script_for(&self, image: &str) -> ScriptedContainer {
        self.scripts
            .lock()
            .unwrap()
            .get(image)
            .cloned()
            .unwrap_or_default()
    }

    fn image_of(&self, container_id: &str) -> Option<String> {
        self.containers
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.name == container_id)
            .map(|c| c.config.image.clone())
    }

    pub fn container(&self, name: &str) -> Option<CreatedContainer> {
        self.containers
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.name == name)
            .cloned()
    }
}

#[async_trait]
impl ContainerDriver for FakeDriver {
    async fn negotiate_api_version(&self, _cancel: &CancellationToken) -> DriverResult<()> {
        Ok(())
    }

    async fn build_image(
        &self,
        _cancel: &CancellationToken,
        _archive: Vec<u8>,
        options: &ImageBuildOptions,
    ) -> DriverResult<Vec<u8>> {
        self.build_requests.lock().unwrap().push(options.clone());
        Ok(self.build_output.clone())
    }

    async fn create_container(
        &self,
        _cancel: &CancellationToken,
        config: &ContainerConfig,
        mounts: &[ContainerMount],
        name: &str,
    ) -> DriverResult<String> {
        if self.script_for(&config.image).fail_create {
            anyhow::bail!("scripted create failure for image '{}'", config.image);
        }
        self.containers.lock().unwrap().push(CreatedContainer {
            name: name.to_string(),
            config: config.clone(),
            mounts: mounts.to_vec(),
            started: false,
        });
        Ok(name.to_string())
    }

    async fn start_container(&self, _cancel: &CancellationToken, id: &str) -> DriverResult<()> {
        let image = self
            .image_of(id)
            .ok_or_else(|| anyhow::anyhow!("no such container '{id}'"))?;
        if self.script_for(&image).fail_start {
            anyhow::bail!("scripted start failure for image '{image}'");
        }
        let mut containers = self.containers.lock().unwrap();
        let container = containers
            .iter_mut()
            .find(|c| c.name == id)
            .ok_or_else(|| anyhow::anyhow!("no such container '{id}'"))?;
        container.started = true;
        Ok(())
    }

    async fn inspect_container(
        &self,
        _cancel: &CancellationToken,
        id: &str,
    ) -> DriverResult<ContainerState> {
        let image = self
            .image_of(id)
            .ok_or_else(|| anyhow::anyhow!("no such container '{id}'"))?;
        Ok(ContainerState {
            running: false,
            exit_code: self.script_for(&image).exit_code,
        })
    }

    async fn wait_container(&self, _cancel: &CancellationToken, id: &str) -> DriverResult<i64> {
        let image = self
            .image_of(id)
            .ok_or_else(|| anyhow::anyhow!("no such container '{id}'"))?;
        let script = self.script_for(&image);
        if script.fail_wait {
            anyhow::bail!("scripted wait failure for image '{image}'");
        }
        Ok(script.exit_code)
    }

    async fn remove_container(&self, _cancel: &CancellationToken, id: &str) -> DriverResult<()> {
        let mut containers = self.containers.lock().unwrap();
        containers.retain(|c| c.name != id);
        Ok(())
    }
}
