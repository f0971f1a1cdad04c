//! One running container of a plugin, as tracked by the container lifecycle
//! manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::value_objects::PluginInstanceId;

/// `starting -> healthy <-> unhealthy -> stopped`. `starting` is the only
/// entry point; `stopped` is terminal.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstanceStatus {
    Starting,
    Healthy,
    Unhealthy,
    Stopped,
}

impl InstanceStatus {
    fn can_transition_to(self, target: InstanceStatus) -> bool {
        use InstanceStatus::*;
        matches!(
            (self, target),
            (Starting, Healthy)
                | (Starting, Unhealthy)
                | (Starting, Stopped)
                | (Healthy, Unhealthy)
                | (Healthy, Stopped)
                | (Unhealthy, Healthy)
                | (Unhealthy, Stopped)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInstance {
    pub container_id: PluginInstanceId,
    pub container_name: String,
    pub base_url: String,
    pub instance_index: u32,
    pub status: InstanceStatus,
    pub last_health_check: Option<DateTime<Utc>>,
    pub tasks_processed: u64,
    pub tasks_failed: u64,
}

impl PluginInstance {
    pub fn starting(container_id: PluginInstanceId, container_name: String, base_url: String, instance_index: u32) -> Self {
        Self {
            container_id,
            container_name,
            base_url,
            instance_index,
            status: InstanceStatus::Starting,
            last_health_check: None,
            tasks_processed: 0,
            tasks_failed: 0,
        }
    }

    pub fn transition(&mut self, target: InstanceStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(target) {
            return Err(CoreError::invalid_transition(format!(
                "instance {} cannot move from {:?} to {:?}",
                self.container_name, self.status, target
            )));
        }
        self.status = target;
        if matches!(target, InstanceStatus::Healthy | InstanceStatus::Unhealthy) {
            self.last_health_check = Some(Utc::now());
        }
        Ok(())
    }

    pub fn is_eligible_for_dispatch(&self) -> bool {
        self.status == InstanceStatus::Healthy
    }

    pub fn record_task_result(&mut self, succeeded: bool) {
        self.tasks_processed += 1;
        if !succeeded {
            self.tasks_failed += 1;
        }
    }
}

pub fn container_name(plugin_id: &str, index: u32) -> String {
    format!("meta-plugin-{plugin_id}-{index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PluginInstance {
        PluginInstance::starting(
            PluginInstanceId::new("c1").unwrap(),
            container_name("tagger", 0),
            "http://c1:8080".into(),
            0,
        )
    }

    #[test]
    fn container_name_format() {
        assert_eq!(container_name("tagger", 2), "meta-plugin-tagger-2");
    }

    #[test]
    fn healthy_unhealthy_oscillation_allowed() {
        let mut inst = sample();
        inst.transition(InstanceStatus::Healthy).unwrap();
        inst.transition(InstanceStatus::Unhealthy).unwrap();
        inst.transition(InstanceStatus::Healthy).unwrap();
        assert!(inst.is_eligible_for_dispatch());
    }

    #[test]
    fn stopped_is_terminal() {
        let mut inst = sample();
        inst.transition(InstanceStatus::Stopped).unwrap();
        assert!(inst.transition(InstanceStatus::Healthy).is_err());
    }
}
