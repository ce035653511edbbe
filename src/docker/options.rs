use std::collections::BTreeMap;

/// Host side of a published port. An empty `host_ip` binds on every interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    pub host_ip: String,
    pub host_port: String,
}

impl PortBinding {
    pub fn new(host_port: u16) -> Self {
        Self {
            host_ip: String::new(),
            host_port: host_port.to_string(),
        }
    }
}

/// Options for starting a container, mirroring what `docker run` accepts.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub name: Option<String>,
    pub repository: String,
    pub tag: Option<String>,
    /// Network id or name to attach to
    pub network: Option<String>,
    /// `host:container` bind mounts
    pub mounts: Vec<String>,
    /// Container port (eg. `1317/tcp`) to host bindings
    pub port_bindings: BTreeMap<String, Vec<PortBinding>>,
    /// `KEY=value` pairs
    pub env: Vec<String>,
    pub entrypoint: Vec<String>,
    pub cmd: Vec<String>,
    pub user: Option<String>,
}

impl RunOptions {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            ..Default::default()
        }
    }

    pub fn image(&self) -> String {
        match &self.tag {
            Some(tag) => format!("{}:{}", self.repository, tag),
            None => self.repository.clone(),
        }
    }

    /// Arguments following `docker run`. `detach` selects `-d` versus `--rm`.
    pub fn to_args(&self, detach: bool) -> Vec<String> {
        let mut args = Vec::new();
        if detach {
            args.push("-d".to_string());
        } else {
            args.push("--rm".to_string());
        }
        if let Some(name) = &self.name {
            args.push("--name".to_string());
            args.push(name.clone());
        }
        if let Some(network) = &self.network {
            args.push("--network".to_string());
            args.push(network.clone());
        }
        // a crashed node stays down
        if detach {
            args.push("--restart".to_string());
            args.push("no".to_string());
        }
        if let Some(user) = &self.user {
            args.push("--user".to_string());
            args.push(user.clone());
        }
        for mount in &self.mounts {
            args.push("-v".to_string());
            args.push(mount.clone());
        }
        for (container_port, bindings) in &self.port_bindings {
            for binding in bindings {
                let host = if binding.host_ip.is_empty() {
                    binding.host_port.clone()
                } else {
                    format!("{}:{}", binding.host_ip, binding.host_port)
                };
                args.push("-p".to_string());
                args.push(format!("{}:{}", host, container_port));
            }
        }
        for env in &self.env {
            args.push("-e".to_string());
            args.push(env.clone());
        }
        // docker only takes the executable as --entrypoint, the rest goes before the cmd
        let mut trailing = Vec::new();
        if let Some((program, rest)) = self.entrypoint.split_first() {
            args.push("--entrypoint".to_string());
            args.push(program.clone());
            trailing.extend(rest.iter().cloned());
        }
        args.push(self.image());
        args.extend(trailing);
        args.extend(self.cmd.iter().cloned());
        args
    }
}
