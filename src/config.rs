//! Control-plane configuration and defaulting.
//!
//! A `ControlPlaneConfig` is built once by the caller, has its empty fields
//! filled by [`ControlPlaneConfig::apply_defaults`], and is immutable from
//! then on; once a role has launched, its argument list is frozen.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::args::Arg;
use crate::error::{Error, Result};

/// Default address the API server binds and advertises.
pub const DEFAULT_ADVERTISE_ADDRESS: &str = "0.0.0.0";
/// Default API server secure port.
pub const DEFAULT_BIND_PORT: u16 = 6443;
/// Default cluster name.
pub const DEFAULT_CLUSTER_NAME: &str = "kubernetes";
/// Default cluster DNS domain.
pub const DEFAULT_DNS_DOMAIN: &str = "cluster.local";
/// Default store data directory.
pub const DEFAULT_ETCD_DATA_DIR: &str = "/var/lib/etcd";
/// Default store client socket path.
pub const DEFAULT_ETCD_SOCKET_PATH: &str = "/tmp/etcd.sock";
/// Default directory holding generated kubeconfigs.
pub const DEFAULT_KUBERNETES_DIR: &str = "/etc/kubernetes";
/// Default pod network CIDR.
pub const DEFAULT_POD_SUBNET: &str = "172.21.0.0/18";
/// Default service network CIDR.
pub const DEFAULT_SERVICE_SUBNET: &str = "172.18.0.0/21";

/// Secure port the controller manager serves its health endpoint on.
pub const CONTROLLER_MANAGER_SECURE_PORT: u16 = 10257;

/// Configuration for a single-node scratch control plane.
///
/// All fields are optional in serialized form; empty fields are filled by
/// [`apply_defaults`](ControlPlaneConfig::apply_defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ControlPlaneConfig {
    /// IP or hostname the API server binds and advertises.
    pub advertise_address: String,
    /// API server secure port.
    pub bind_port: u16,
    /// Cluster name.
    pub cluster_name: String,
    /// Cluster DNS domain.
    pub dns_domain: String,
    /// Filesystem path of the embedded store's data directory.
    pub etcd_data_dir: PathBuf,
    /// Local socket path the store listens on.
    pub etcd_socket_path: PathBuf,
    /// Directory holding cluster certificates.
    pub certificates_dir: PathBuf,
    /// Directory holding generated kubeconfigs.
    pub kubernetes_dir: PathBuf,
    /// Pod network CIDR; empty disables node CIDR allocation.
    pub pod_subnet: String,
    /// Service network CIDR.
    pub service_subnet: String,

    /// Override arguments for the API server, applied on top of defaults.
    pub api_server_extra_args: Vec<Arg>,
    /// Override arguments for the controller manager.
    pub controller_manager_extra_args: Vec<Arg>,
    /// Override arguments for the scheduler.
    pub scheduler_extra_args: Vec<Arg>,
}

impl ControlPlaneConfig {
    /// Fills empty fields with their defaults. Fields already set by the
    /// caller are left untouched.
    pub fn apply_defaults(&mut self) {
        if self.advertise_address.is_empty() {
            self.advertise_address = DEFAULT_ADVERTISE_ADDRESS.to_string();
        }
        if self.bind_port == 0 {
            self.bind_port = DEFAULT_BIND_PORT;
        }
        if self.cluster_name.is_empty() {
            self.cluster_name = DEFAULT_CLUSTER_NAME.to_string();
        }
        if self.dns_domain.is_empty() {
            self.dns_domain = DEFAULT_DNS_DOMAIN.to_string();
        }
        if self.etcd_data_dir.as_os_str().is_empty() {
            self.etcd_data_dir = PathBuf::from(DEFAULT_ETCD_DATA_DIR);
        }
        if self.kubernetes_dir.as_os_str().is_empty() {
            self.kubernetes_dir = PathBuf::from(DEFAULT_KUBERNETES_DIR);
        }
        if self.certificates_dir.as_os_str().is_empty() {
            self.certificates_dir = self.kubernetes_dir.join("pki");
        }
        if self.pod_subnet.is_empty() {
            self.pod_subnet = DEFAULT_POD_SUBNET.to_string();
        }
        if self.service_subnet.is_empty() {
            self.service_subnet = DEFAULT_SERVICE_SUBNET.to_string();
        }
        if self.etcd_socket_path.as_os_str().is_empty() {
            self.etcd_socket_path = PathBuf::from(DEFAULT_ETCD_SOCKET_PATH);
        }
    }

    /// Loads a configuration from a YAML file. Missing fields stay empty
    /// and are filled later by `apply_defaults`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&raw)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    /// Store client URL for the configured socket path.
    pub fn etcd_client_url(&self) -> String {
        format!("unix://{}", self.etcd_socket_path.display())
    }
}
