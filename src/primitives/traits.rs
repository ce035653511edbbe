use crate::core::error::Error;
use crate::docker::{Container, ExecOutput, RunOptions};

/// The container runtime the harness drives. Validators, one-shot node commands and the relayer
/// all go through this interface, so the orchestration does not depend on a particular engine.
#[async_trait::async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create a bridge network and return its id.
    async fn create_network(&self, name: &str) -> Result<String, Error>;

    /// Remove a network previously created with [`ContainerRuntime::create_network`].
    async fn remove_network(&self, name: &str) -> Result<(), Error>;

    /// Start a detached container.
    async fn run(&self, options: &RunOptions) -> Result<Container, Error>;

    /// Run a container to completion and collect its output. The container is removed afterwards.
    async fn run_once(&self, options: &RunOptions) -> Result<ExecOutput, Error>;

    /// Execute a command inside a running container.
    async fn exec(
        &self,
        container: &Container,
        user: Option<&str>,
        cmd: &[String],
    ) -> Result<ExecOutput, Error>;

    /// Resolve the host address (`host:port`) bound to a container port such as `3031/tcp`.
    async fn host_port(&self, container: &Container, port: &str) -> Result<String, Error>;

    /// Force-remove a container together with its anonymous volumes.
    async fn purge(&self, container: &Container) -> Result<(), Error>;
}
