//! Container orchestration on top of the `docker` command line.

pub mod options;

pub use options::{PortBinding, RunOptions};

use crate::core::error::Error;
use crate::primitives::traits::ContainerRuntime;
use std::process::Output;
use tokio::process::Command;

/// A started container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    /// Name without docker's leading `/`, usable as a hostname on the shared network
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

/// [`ContainerRuntime`] backed by the `docker` binary found on `PATH` (or an explicit path).
#[derive(Debug, Clone)]
pub struct DockerCli {
    pub command_path: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self {
            command_path: "docker".to_string(),
        }
    }
}

impl DockerCli {
    pub fn new(command_path: impl Into<String>) -> Self {
        Self {
            command_path: command_path.into(),
        }
    }

    async fn docker(&self, args: &[String]) -> Result<ExecOutput, Error> {
        log::debug!(target: "gaia-e2e", "Executing {} {}", self.command_path, args.join(" "));
        let output = Command::new(&self.command_path)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                Error::from(format!(
                    "failed to spawn {}: {}",
                    self.command_path, e
                ))
            })?;
        into_exec_output(&self.command_path, args, output)
    }
}

fn into_exec_output(program: &str, args: &[String], output: Output) -> Result<ExecOutput, Error> {
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    if !output.status.success() {
        return Err(Error::Exec {
            command: format!("{} {}", program, args.join(" ")),
            code: output.status.code(),
            stderr,
        });
    }
    log::trace!(target: "gaia-e2e", "command succeeded with stdout: {}, stderr: {}", stdout, stderr);
    Ok(ExecOutput { stdout, stderr })
}

fn args<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[async_trait::async_trait]
impl ContainerRuntime for DockerCli {
    async fn create_network(&self, name: &str) -> Result<String, Error> {
        let output = self.docker(&args(["network", "create", name])).await?;
        Ok(output.stdout.trim().to_string())
    }

    async fn remove_network(&self, name: &str) -> Result<(), Error> {
        self.docker(&args(["network", "rm", name])).await?;
        Ok(())
    }

    async fn run(&self, options: &RunOptions) -> Result<Container, Error> {
        let mut run_args = vec!["run".to_string()];
        run_args.extend(options.to_args(true));
        let output = self.docker(&run_args).await?;
        let id = output.stdout.trim().to_string();

        let inspected = self
            .docker(&args(["inspect", "--format", "{{.Name}}", id.as_str()]))
            .await?;
        let name = inspected.stdout.trim().trim_start_matches('/').to_string();
        Ok(Container { id, name })
    }

    async fn run_once(&self, options: &RunOptions) -> Result<ExecOutput, Error> {
        let mut run_args = vec!["run".to_string()];
        run_args.extend(options.to_args(false));
        self.docker(&run_args).await
    }

    async fn exec(
        &self,
        container: &Container,
        user: Option<&str>,
        cmd: &[String],
    ) -> Result<ExecOutput, Error> {
        let mut exec_args = vec!["exec".to_string()];
        if let Some(user) = user {
            exec_args.push("--user".to_string());
            exec_args.push(user.to_string());
        }
        exec_args.push(container.id.clone());
        exec_args.extend(cmd.iter().cloned());
        self.docker(&exec_args).await
    }

    async fn host_port(&self, container: &Container, port: &str) -> Result<String, Error> {
        let output = self.docker(&args(["port", container.id.as_str(), port])).await?;
        parse_host_port(&output.stdout)
            .ok_or_else(|| Error::from(format!("port {} of {} is not published", port, container.name)))
    }

    async fn purge(&self, container: &Container) -> Result<(), Error> {
        self.docker(&args(["rm", "-f", "-v", container.id.as_str()])).await?;
        Ok(())
    }
}

/// `docker port` prints one binding per line, IPv4 first: `0.0.0.0:3031`, `[::]:3031`.
/// Wildcard hosts are rewritten to `localhost` so the result can be dialed.
fn parse_host_port(output: &str) -> Option<String> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let (host, port) = line.rsplit_once(':')?;
    let host = match host {
        "0.0.0.0" | "[::]" | "" => "localhost",
        other => other,
    };
    Some(format!("{}:{}", host, port))
}
