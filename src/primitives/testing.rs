//! Fakes for unit tests that exercise the orchestration without a container engine.

use super::traits::ContainerRuntime;
use crate::core::error::Error;
use crate::docker::{Container, ExecOutput, RunOptions};
use std::sync::Mutex;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

/// Logs every runtime call as `<method> <subject>` and succeeds, unless told to fail one-shot
/// runs.
#[derive(Default)]
pub struct RecordingRuntime {
    calls: Mutex<Vec<String>>,
    /// Answer of `host_port`
    pub host_port: String,
    pub fail_run_once: bool,
}

impl RecordingRuntime {
    pub fn new(host_port: &str) -> Self {
        Self {
            host_port: host_port.to_string(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl ContainerRuntime for RecordingRuntime {
    async fn create_network(&self, name: &str) -> Result<String, Error> {
        self.record(format!("create_network {}", name));
        Ok(name.to_string())
    }

    async fn remove_network(&self, name: &str) -> Result<(), Error> {
        self.record(format!("remove_network {}", name));
        Ok(())
    }

    async fn run(&self, options: &RunOptions) -> Result<Container, Error> {
        let name = options.name.clone().unwrap_or_default();
        self.record(format!("run {}", name));
        Ok(Container { id: name.clone(), name })
    }

    async fn run_once(&self, options: &RunOptions) -> Result<ExecOutput, Error> {
        self.record(format!("run_once {}", options.image()));
        if self.fail_run_once {
            return Err(Error::from(format!("no such image {}", options.image())));
        }
        Ok(ExecOutput::default())
    }

    async fn exec(
        &self,
        container: &Container,
        _user: Option<&str>,
        cmd: &[String],
    ) -> Result<ExecOutput, Error> {
        self.record(format!("exec {} {}", container.name, cmd.join(" ")));
        Ok(ExecOutput::default())
    }

    async fn host_port(&self, container: &Container, port: &str) -> Result<String, Error> {
        self.record(format!("host_port {} {}", container.name, port));
        Ok(self.host_port.clone())
    }

    async fn purge(&self, container: &Container) -> Result<(), Error> {
        self.record(format!("purge {}", container.name));
        Ok(())
    }
}

/// Answers every HTTP request on a local port with `body` as JSON. Returns `host:port`.
pub async fn serve_json(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    address
}
