//! Production [`ContainerRuntime`] adapter over the Docker Engine API via
//! `bollard`.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::{Config, CreateContainerOptions, RemoveContainerOptions, StopContainerOptions};
use bollard::models::HostConfig;
use bollard::network::CreateNetworkOptions;
use bollard::Docker;
use meta_core_domain::entities::ResourceLimits;
use meta_core_domain::services::{ContainerRuntime, SpawnSpec};
use meta_core_domain::value_objects::PluginInstanceId;
use meta_core_domain::CoreError;

pub struct BollardRuntime {
    docker: Docker,
}

impl BollardRuntime {
    pub fn connect() -> Result<Self, CoreError> {
        let docker =
            Docker::connect_with_local_defaults().map_err(|e| CoreError::container_error(format!("docker connect: {e}")))?;
        Ok(Self { docker })
    }
}

fn host_config(resources: &ResourceLimits, network: &str, cache_mount: &Option<(String, String)>, extra: &[(String, String)]) -> HostConfig {
    let mut binds = Vec::new();
    if let Some((host, container)) = cache_mount {
        binds.push(format!("{host}:{container}"));
    }
    for (host, container) in extra {
        binds.push(format!("{host}:{container}"));
    }
    HostConfig {
        memory: Some(resources.memory_bytes as i64),
        nano_cpus: Some(resources.cpu_millis as i64 * 1_000_000),
        network_mode: Some(network.to_string()),
        binds: if binds.is_empty() { None } else { Some(binds) },
        ..Default::default()
    }
}

#[async_trait]
impl ContainerRuntime for BollardRuntime {
    async fn ensure_network(&self, name: &str) -> Result<(), CoreError> {
        let existing = self
            .docker
            .list_networks::<String>(None)
            .await
            .map_err(|e| CoreError::container_error(e.to_string()))?;
        if existing.iter().any(|n| n.name.as_deref() == Some(name)) {
            return Ok(());
        }
        self.docker
            .create_network(CreateNetworkOptions {
                name: name.to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| CoreError::container_error(e.to_string()))?;
        Ok(())
    }

    async fn remove_if_exists(&self, container_name: &str) -> Result<(), CoreError> {
        match self
            .docker
            .remove_container(
                container_name,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(()),
            Err(e) => Err(CoreError::container_error(e.to_string())),
        }
    }

    async fn remove_labelled(&self, label_key: &str, label_value: &str) -> Result<(), CoreError> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![format!("{label_key}={label_value}")]);
        let containers = self
            .docker
            .list_containers(Some(bollard::container::ListContainersOptions {
                all: true,
                filters,
                ..Default::default()
            }))
            .await
            .map_err(|e| CoreError::container_error(e.to_string()))?;
        for container in containers {
            if let Some(id) = container.id {
                let _ = self
                    .docker
                    .remove_container(&id, Some(RemoveContainerOptions { force: true, ..Default::default() }))
                    .await;
            }
        }
        Ok(())
    }

    async fn spawn(&self, spec: &SpawnSpec) -> Result<PluginInstanceId, CoreError> {
        let config = Config {
            image: Some(spec.image.clone()),
            labels: Some(spec.labels.clone()),
            env: Some(spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect()),
            host_config: Some(host_config(&spec.resources, &spec.network, &spec.cache_mount, &spec.extra_mounts)),
            exposed_ports: Some(HashMap::from([("8080/tcp".to_string(), HashMap::new())])),
            ..Default::default()
        };
        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: spec.container_name.clone(),
                    platform: None,
                }),
                config,
            )
            .await
            .map_err(|e| CoreError::container_error(e.to_string()))?;
        self.docker
            .start_container::<String>(&created.id, None)
            .await
            .map_err(|e| CoreError::container_error(e.to_string()))?;
        PluginInstanceId::new(created.id)
    }

    async fn stop_and_remove(&self, container_id: &PluginInstanceId, grace_period_secs: u32) -> Result<(), CoreError> {
        let id = container_id.as_str();
        match self
            .docker
            .stop_container(id, Some(StopContainerOptions { t: grace_period_secs as i64 }))
            .await
        {
            Ok(()) | Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => {}
            Err(e) => return Err(CoreError::container_error(e.to_string())),
        }
        match self
            .docker
            .remove_container(id, Some(RemoveContainerOptions { force: true, ..Default::default() }))
            .await
        {
            Ok(()) | Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(()),
            Err(e) => Err(CoreError::container_error(e.to_string())),
        }
    }
}
