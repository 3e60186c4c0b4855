use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::logfiles::LogFileSet;

/// Opaque identity handle issued by the registry; stable for the lifetime of
/// a replay and used to key every tracked object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u64);

/// A registered host, as the live monitoring core knows it.
#[derive(Debug, Clone)]
pub struct HostObject {
    pub id: ObjectId,
    pub name: String,
    pub alias: String,
    pub address: String,
    pub notification_period: String,
    pub service_period: String,
}

impl HostObject {
    /// Column projection used by the filter gate (`current_host_*`).
    pub fn column(&self, name: &str) -> Option<String> {
        match name {
            "name" => Some(self.name.clone()),
            "alias" => Some(self.alias.clone()),
            "address" => Some(self.address.clone()),
            "notification_period" => Some(self.notification_period.clone()),
            "service_period" => Some(self.service_period.clone()),
            _ => None,
        }
    }
}

/// A registered service.
#[derive(Debug, Clone)]
pub struct ServiceObject {
    pub id: ObjectId,
    pub host_name: String,
    pub description: String,
    pub display_name: String,
    pub notification_period: String,
    pub service_period: String,
}

impl ServiceObject {
    /// Column projection used by the filter gate (`current_service_*`).
    pub fn column(&self, name: &str) -> Option<String> {
        match name {
            "host_name" => Some(self.host_name.clone()),
            "description" => Some(self.description.clone()),
            "display_name" => Some(self.display_name.clone()),
            "notification_period" => Some(self.notification_period.clone()),
            "service_period" => Some(self.service_period.clone()),
            _ => None,
        }
    }
}

/// Read-only view of the monitored-object registry consumed by the replay.
pub trait ObjectRegistry {
    fn find_host(&self, name: &str) -> Option<&HostObject>;
    fn find_service(&self, host_name: &str, description: &str) -> Option<&ServiceObject>;
}

/// In-memory registry, loadable from a YAML objects file or built by
/// pre-scanning the log archive.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    hosts: HashMap<String, HostObject>,
    services: HashMap<(String, String), ServiceObject>,
    next_id: u64,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue_id(&mut self) -> ObjectId {
        self.next_id += 1;
        ObjectId(self.next_id)
    }

    /// Register a host; an existing host with the same name keeps its id.
    pub fn add_host(
        &mut self,
        name: &str,
        notification_period: &str,
        service_period: &str,
    ) -> ObjectId {
        if let Some(host) = self.hosts.get(name) {
            return host.id;
        }
        let id = self.issue_id();
        self.hosts.insert(
            name.to_string(),
            HostObject {
                id,
                name: name.to_string(),
                alias: name.to_string(),
                address: String::new(),
                notification_period: notification_period.to_string(),
                service_period: service_period.to_string(),
            },
        );
        id
    }

    /// Register a service; an existing one keeps its id.
    pub fn add_service(
        &mut self,
        host_name: &str,
        description: &str,
        notification_period: &str,
        service_period: &str,
    ) -> ObjectId {
        let key = (host_name.to_string(), description.to_string());
        if let Some(service) = self.services.get(&key) {
            return service.id;
        }
        let id = self.issue_id();
        self.services.insert(
            key,
            ServiceObject {
                id,
                host_name: host_name.to_string(),
                description: description.to_string(),
                display_name: description.to_string(),
                notification_period: notification_period.to_string(),
                service_period: service_period.to_string(),
            },
        );
        id
    }

    /// Load the registry from a YAML objects file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read objects file {}", path.display()))?;
        let spec: ObjectsFile = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse objects file {}", path.display()))?;

        let mut registry = Self::new();
        for host in &spec.hosts {
            registry.add_host(&host.name, &host.notification_period, &host.service_period);
            let stored = registry
                .hosts
                .get_mut(&host.name)
                .expect("host was just inserted");
            if let Some(alias) = &host.alias {
                stored.alias = alias.clone();
            }
            stored.address = host.address.clone();
        }
        for service in &spec.services {
            registry.add_service(
                &service.host_name,
                &service.description,
                &service.notification_period,
                &service.service_period,
            );
        }
        info!(
            hosts = registry.hosts.len(),
            services = registry.services.len(),
            path = %path.display(),
            "loaded object registry"
        );
        Ok(registry)
    }

    /// Fallback when no objects file is configured: register every name seen
    /// in the logs. Period names stay empty, so period membership defaults to
    /// active and timeperiod transitions match nothing.
    pub fn from_log_files(files: &LogFileSet, max_lines_per_file: usize) -> Self {
        let mut registry = Self::new();
        for file in files.files() {
            let Ok(entries) = file.read_entries(max_lines_per_file) else {
                continue;
            };
            for entry in entries {
                if entry.host_name.is_empty() {
                    continue;
                }
                registry.add_host(&entry.host_name, "", "");
                if !entry.service_description.is_empty() {
                    registry.add_service(&entry.host_name, &entry.service_description, "", "");
                }
            }
        }
        registry
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }
}

impl ObjectRegistry for InMemoryRegistry {
    fn find_host(&self, name: &str) -> Option<&HostObject> {
        self.hosts.get(name)
    }

    fn find_service(&self, host_name: &str, description: &str) -> Option<&ServiceObject> {
        self.services
            .get(&(host_name.to_string(), description.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ObjectsFile {
    #[serde(default)]
    hosts: Vec<HostEntry>,
    #[serde(default)]
    services: Vec<ServiceEntry>,
}

fn default_period() -> String {
    "24X7".to_string()
}

#[derive(Debug, Deserialize)]
struct HostEntry {
    name: String,
    #[serde(default)]
    alias: Option<String>,
    #[serde(default)]
    address: String,
    #[serde(default = "default_period")]
    notification_period: String,
    #[serde(default = "default_period")]
    service_period: String,
}

#[derive(Debug, Deserialize)]
struct ServiceEntry {
    host_name: String,
    description: String,
    #[serde(default = "default_period")]
    notification_period: String,
    #[serde(default = "default_period")]
    service_period: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn ids_are_stable_per_name() {
        let mut registry = InMemoryRegistry::new();
        let first = registry.add_host("web01", "24X7", "24X7");
        let again = registry.add_host("web01", "workhours", "24X7");
        assert_eq!(first, again, "re-registration keeps the id");

        let service = registry.add_service("web01", "https", "24X7", "24X7");
        assert_ne!(first, service);
        assert_eq!(
            registry.find_service("web01", "https").map(|s| s.id),
            Some(service)
        );
        assert!(registry.find_service("web01", "ssh").is_none());
    }

    #[test]
    fn loads_objects_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            concat!(
                "hosts:\n",
                "  - name: web01\n",
                "    alias: Frontend\n",
                "    address: 10.0.0.1\n",
                "    notification_period: workhours\n",
                "services:\n",
                "  - host_name: web01\n",
                "    description: https\n",
            )
        )
        .expect("write yaml");

        let registry = InMemoryRegistry::load(file.path()).expect("load");
        let host = registry.find_host("web01").expect("host");
        assert_eq!(host.alias, "Frontend");
        assert_eq!(host.address, "10.0.0.1");
        assert_eq!(host.notification_period, "workhours");
        assert_eq!(host.service_period, "24X7");
        let service = registry.find_service("web01", "https").expect("service");
        assert_eq!(service.notification_period, "24X7");
    }
}
