//! Container driver backed by the local `docker` command-line client.
//!
//! The orchestration core only knows the [`ContainerDriver`] trait; this
//! implementation drives the engine through the docker CLI so stagehand
//! works against whatever daemon the user's `docker` binary is configured
//! for. Cancellation kills the in-flight CLI call; containers already
//! started stay running.

use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use stagehand_engine::{
    ContainerConfig, ContainerDriver, ContainerMount, ContainerState, ImageBuildOptions,
};
use stagehand_types::spec::MountMethod;

/// Driver invoking the `docker` CLI.
pub struct DockerCli;

impl DockerCli {
    async fn run(
        &self,
        cancel: &CancellationToken,
        args: &[String],
        stdin: Option<Vec<u8>>,
    ) -> anyhow::Result<Vec<u8>> {
        tracing::debug!(args = ?args, "docker");
        let mut command = Command::new("docker");
        command
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().context("spawning docker")?;
        if let Some(bytes) = stdin {
            let mut pipe = child
                .stdin
                .take()
                .context("docker stdin unavailable")?;
            pipe.write_all(&bytes).await.context("writing docker stdin")?;
            drop(pipe);
        }

        let output = tokio::select! {
            output = child.wait_with_output() => output.context("waiting for docker")?,
            () = cancel.cancelled() => anyhow::bail!("docker call cancelled"),
        };

        if !output.status.success() {
            anyhow::bail!(
                "docker {} failed: {}",
                args.first().map(String::as_str).unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(output.stdout)
    }
}

fn mount_argument(mount: &ContainerMount) -> String {
    let mut parts = vec![format!("type={}", mount.method)];
    if mount.method != MountMethod::Tmpfs {
        parts.push(format!("source={}", mount.source));
    }
    parts.push(format!("target={}", mount.target));
    if mount.read_only {
        parts.push("readonly".to_string());
    }
    parts.join(",")
}

#[async_trait]
impl ContainerDriver for DockerCli {
    async fn negotiate_api_version(&self, cancel: &CancellationToken) -> anyhow::Result<()> {
        self.run(
            cancel,
            &[
                "version".to_string(),
                "--format".to_string(),
                "{{.Server.APIVersion}}".to_string(),
            ],
            None,
        )
        .await
        .map(|_| ())
    }

    async fn build_image(
        &self,
        cancel: &CancellationToken,
        archive: Vec<u8>,
        options: &ImageBuildOptions,
    ) -> anyhow::Result<Vec<u8>> {
        let mut args = vec!["build".to_string()];
        for tag in &options.tags {
            args.push("--tag".to_string());
            args.push(tag.clone());
        }
        if !options.dockerfile.is_empty() {
            args.push("--file".to_string());
            args.push(options.dockerfile.clone());
        }
        if options.remove_intermediate {
            args.push("--rm".to_string());
        }
        // Context arrives on stdin as a tar stream.
        args.push("-".to_string());
        self.run(cancel, &args, Some(archive)).await
    }

    async fn create_container(
        &self,
        cancel: &CancellationToken,
        config: &ContainerConfig,
        mounts: &[ContainerMount],
        name: &str,
    ) -> anyhow::Result<String> {
        let mut args = vec![
            "create".to_string(),
            "--name".to_string(),
            name.to_string(),
        ];
        if !config.user.is_empty() {
            args.push("--user".to_string());
            args.push(config.user.clone());
        }
        for (key, value) in &config.env {
            args.push("--env".to_string());
            args.push(format!("{key}={value}"));
        }
        for mount in mounts {
            args.push("--mount".to_string());
            args.push(mount_argument(mount));
        }
        // The CLI accepts a single --entrypoint value; remaining entrypoint
        // words travel in front of the command.
        let mut trailing = Vec::new();
        if let Some((head, rest)) = config.entrypoint.split_first() {
            args.push("--entrypoint".to_string());
            args.push(head.clone());
            trailing.extend(rest.iter().cloned());
        }
        args.push(config.image.clone());
        trailing.extend(config.cmd.iter().cloned());
        args.extend(trailing);

        let stdout = self.run(cancel, &args, None).await?;
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }

    async fn start_container(&self, cancel: &CancellationToken, id: &str) -> anyhow::Result<()> {
        self.run(cancel, &["start".to_string(), id.to_string()], None)
            .await
            .map(|_| ())
    }

    async fn inspect_container(
        &self,
        cancel: &CancellationToken,
        id: &str,
    ) -> anyhow::Result<ContainerState> {
        let stdout = self
            .run(
                cancel,
                &[
                    "inspect".to_string(),
                    "--format".to_string(),
                    "{{.State.Running}} {{.State.ExitCode}}".to_string(),
                    id.to_string(),
                ],
                None,
            )
            .await?;
        let text = String::from_utf8_lossy(&stdout);
        let mut fields = text.split_whitespace();
        let running = fields.next() == Some("true");
        let exit_code = fields
            .next()
            .and_then(|code| code.parse().ok())
            .context("parsing container exit code")?;
        Ok(ContainerState { running, exit_code })
    }

    async fn wait_container(&self, cancel: &CancellationToken, id: &str) -> anyhow::Result<i64> {
        let stdout = self
            .run(cancel, &["wait".to_string(), id.to_string()], None)
            .await?;
        String::from_utf8_lossy(&stdout)
            .trim()
            .parse()
            .context("parsing docker wait output")
    }

    async fn remove_container(&self, cancel: &CancellationToken, id: &str) -> anyhow::Result<()> {
        self.run(cancel, &["rm".to_string(), id.to_string()], None)
            .await
            .map(|_| ())
    }
}
