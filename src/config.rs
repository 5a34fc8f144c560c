//! Cluster Configuration
//!
//! Every node loads the same JSON description of the cluster: one entry per
//! SoC with its identity, CPU class, memory contribution and RPC endpoint.
//! The loaded value is passed explicitly into every constructor that needs
//! it; there is no process-wide configuration global.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Whether a SoC belongs to the big (CPU-class) or little side of the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuClass {
    Big,
    Little,
}

/// One participating SoC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocConfig {
    /// Unique node identity, e.g. "opiz2w".
    pub name: String,
    pub cpu_class: CpuClass,
    /// Contribution to the global address space, in megabytes.
    pub memory_mb: u64,
    /// RPC endpoint, e.g. "192.168.1.101:8080".
    pub address: String,
    /// Port of the persistent interpreter on the big SoC, if any.
    #[serde(default)]
    pub python_port: Option<u16>,
}

impl SocConfig {
    pub fn memory_bytes(&self) -> u64 {
        self.memory_mb * 1024 * 1024
    }
}

/// The full cluster as described by the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub socs: Vec<SocConfig>,
}

impl ClusterConfig {
    /// Loads the cluster configuration from `path`, unless the `CONFIG_PATH`
    /// environment variable overrides it.
    pub fn load(path: &str) -> Result<Self> {
        let path = match std::env::var("CONFIG_PATH") {
            Ok(env_path) => {
                tracing::info!("Using CONFIG_PATH from environment: {}", env_path);
                env_path
            }
            Err(_) => path.to_string(),
        };

        let data = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path))?;
        let cfg: ClusterConfig =
            serde_json::from_str(&data).context("failed to parse config JSON")?;

        if cfg.socs.is_empty() {
            anyhow::bail!("config lists no SoCs");
        }
        for soc in &cfg.socs {
            if soc.memory_mb == 0 {
                anyhow::bail!("SoC {} contributes zero memory", soc.name);
            }
        }

        Ok(cfg)
    }

    pub fn find(&self, name: &str) -> Option<&SocConfig> {
        self.socs.iter().find(|soc| soc.name == name)
    }

    /// The big SoC that hosts the persistent interpreter, if configured.
    pub fn big_soc(&self) -> Option<&SocConfig> {
        self.socs
            .iter()
            .find(|soc| soc.cpu_class == CpuClass::Big && soc.python_port.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_cluster() {
        let json = r#"{
            "socs": [
                {"name": "big1", "cpu_class": "big", "memory_mb": 2048,
                 "address": "10.0.0.1:8080", "python_port": 9000},
                {"name": "little1", "cpu_class": "little", "memory_mb": 512,
                 "address": "10.0.0.2:8080"}
            ]
        }"#;

        let cfg: ClusterConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.socs.len(), 2);
        assert_eq!(cfg.socs[0].cpu_class, CpuClass::Big);
        assert_eq!(cfg.socs[0].python_port, Some(9000));
        assert_eq!(cfg.socs[1].python_port, None);
        assert_eq!(cfg.socs[1].memory_bytes(), 512 * 1024 * 1024);
    }

    #[test]
    fn test_reject_malformed_json() {
        let bad = r#"{"socs": [{"name": "soc1","#;
        assert!(serde_json::from_str::<ClusterConfig>(bad).is_err());
    }

    #[test]
    fn test_big_soc_requires_python_port() {
        let json = r#"{
            "socs": [
                {"name": "big-noport", "cpu_class": "big", "memory_mb": 64,
                 "address": "a:1"},
                {"name": "big-port", "cpu_class": "big", "memory_mb": 64,
                 "address": "b:1", "python_port": 9000}
            ]
        }"#;

        let cfg: ClusterConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.big_soc().map(|s| s.name.as_str()), Some("big-port"));
    }

    #[test]
    fn test_find_by_name() {
        let json = r#"{
            "socs": [
                {"name": "soc1", "cpu_class": "little", "memory_mb": 64, "address": "a:1"}
            ]
        }"#;

        let cfg: ClusterConfig = serde_json::from_str(json).unwrap();
        assert!(cfg.find("soc1").is_some());
        assert!(cfg.find("soc2").is_none());
    }
}
