//! Role argument construction.
//!
//! Each server role gets a computed list of default arguments derived from
//! the control-plane configuration; caller-supplied overrides are merged on
//! top. The merge is pure and deterministic: defaults keep their declared
//! order, an override replaces a default with the same name (last value
//! wins), and override names with no default are appended in the order
//! given.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::authz::resolve_authz_modes;
use crate::config::ControlPlaneConfig;
use crate::engine::Role;

/// Certificate and key file names under the certificates directory, as laid
/// out by kubeadm.
pub const CA_CERT_NAME: &str = "ca.crt";
pub const CA_KEY_NAME: &str = "ca.key";
pub const API_SERVER_CERT_NAME: &str = "apiserver.crt";
pub const API_SERVER_KEY_NAME: &str = "apiserver.key";
pub const SERVICE_ACCOUNT_PUBLIC_KEY_NAME: &str = "sa.pub";
pub const SERVICE_ACCOUNT_PRIVATE_KEY_NAME: &str = "sa.key";
pub const FRONT_PROXY_CA_CERT_NAME: &str = "front-proxy-ca.crt";
pub const FRONT_PROXY_CLIENT_CERT_NAME: &str = "front-proxy-client.crt";
pub const FRONT_PROXY_CLIENT_KEY_NAME: &str = "front-proxy-client.key";

/// Kubeconfig file names under the kubernetes directory.
pub const CONTROLLER_MANAGER_KUBECONFIG_NAME: &str = "controller-manager.conf";
pub const SCHEDULER_KUBECONFIG_NAME: &str = "scheduler.conf";

/// A single named command-line argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arg {
    pub name: String,
    pub value: String,
}

impl Arg {
    /// Creates a new argument pair.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Builds the full argument list for one server role: role defaults with
/// the config's override list merged on top.
pub fn build_args(role: Role, config: &ControlPlaneConfig) -> Vec<Arg> {
    match role {
        Role::Store => store_args(&config.etcd_data_dir, &config.etcd_socket_path),
        Role::ApiServer => api_server_args(config),
        Role::ControllerManager => {
            merge(
                controller_manager_defaults(config),
                &config.controller_manager_extra_args,
            )
        }
        Role::Scheduler => merge(scheduler_defaults(config), &config.scheduler_extra_args),
    }
}

/// Renders an argument list as `--name=value` command-line tokens.
pub fn to_command_line(args: &[Arg]) -> Vec<String> {
    args.iter()
        .map(|arg| format!("--{}={}", arg.name, arg.value))
        .collect()
}

/// Merges overrides on top of a defaults list. Overrides win on name
/// collision; new names are appended.
fn merge(defaults: Vec<Arg>, overrides: &[Arg]) -> Vec<Arg> {
    let mut out = defaults;
    for arg in overrides {
        set_value(&mut out, &arg.name, &arg.value);
    }
    out
}

/// Replaces the value of `name` in place, or appends it if absent.
fn set_value(args: &mut Vec<Arg>, name: &str, value: &str) {
    match args.iter_mut().find(|a| a.name == name) {
        Some(existing) => existing.value = value.to_string(),
        None => args.push(Arg::new(name, value)),
    }
}

fn value_of<'a>(args: &'a [Arg], name: &str) -> Option<&'a str> {
    args.iter()
        .rev()
        .find(|a| a.name == name)
        .map(|a| a.value.as_str())
}

fn join(dir: &Path, file: &str) -> String {
    dir.join(file).display().to_string()
}

/// Default argument list for the store role.
pub fn store_args(data_dir: &Path, socket_path: &Path) -> Vec<Arg> {
    let client_url = crate::store::socket_url(socket_path);
    vec![
        Arg::new("data-dir", data_dir.display().to_string()),
        Arg::new("listen-client-urls", client_url.clone()),
        Arg::new("advertise-client-urls", client_url),
    ]
}

fn api_server_args(config: &ControlPlaneConfig) -> Vec<Arg> {
    let certs = &config.certificates_dir;
    let mut defaults = vec![
        Arg::new("advertise-address", config.advertise_address.clone()),
        Arg::new("cert-dir", certs.display().to_string()),
        Arg::new("enable-admission-plugins", "NodeRestriction"),
        Arg::new("service-cluster-ip-range", config.service_subnet.clone()),
        Arg::new(
            "service-account-key-file",
            join(certs, SERVICE_ACCOUNT_PUBLIC_KEY_NAME),
        ),
        Arg::new(
            "service-account-signing-key-file",
            join(certs, SERVICE_ACCOUNT_PRIVATE_KEY_NAME),
        ),
        Arg::new(
            "service-account-issuer",
            format!("https://kubernetes.default.svc.{}", config.dns_domain),
        ),
        Arg::new("client-ca-file", join(certs, CA_CERT_NAME)),
        Arg::new("tls-cert-file", join(certs, API_SERVER_CERT_NAME)),
        Arg::new("tls-private-key-file", join(certs, API_SERVER_KEY_NAME)),
        Arg::new("secure-port", config.bind_port.to_string()),
        Arg::new("allow-privileged", "true"),
        Arg::new("requestheader-username-headers", "X-Remote-User"),
        Arg::new("requestheader-group-headers", "X-Remote-Group"),
        Arg::new("requestheader-extra-headers-prefix", "X-Remote-Extra-"),
        Arg::new(
            "requestheader-client-ca-file",
            join(certs, FRONT_PROXY_CA_CERT_NAME),
        ),
        Arg::new("requestheader-allowed-names", "front-proxy-client"),
        Arg::new(
            "proxy-client-cert-file",
            join(certs, FRONT_PROXY_CLIENT_CERT_NAME),
        ),
        Arg::new(
            "proxy-client-key-file",
            join(certs, FRONT_PROXY_CLIENT_KEY_NAME),
        ),
    ];

    set_value(&mut defaults, "etcd-servers", &config.etcd_client_url());

    // Structured authorization configuration supersedes mode-list
    // computation entirely.
    let overrides = &config.api_server_extra_args;
    let has_structured_authz = overrides.iter().any(|a| a.name == "authorization-config");
    if has_structured_authz {
        return merge(defaults, overrides);
    }

    // The authorization-mode override is consumed here: the validated mode
    // list lands in the defaults, and the raw token is excluded from the
    // merge so an invalid value cannot win by override precedence.
    let requested = value_of(overrides, "authorization-mode").unwrap_or("");
    set_value(
        &mut defaults,
        "authorization-mode",
        &resolve_authz_modes(requested),
    );
    let remaining: Vec<Arg> = overrides
        .iter()
        .filter(|a| a.name != "authorization-mode")
        .cloned()
        .collect();
    merge(defaults, &remaining)
}

fn controller_manager_defaults(config: &ControlPlaneConfig) -> Vec<Arg> {
    let certs = &config.certificates_dir;
    let kubeconfig = join(&config.kubernetes_dir, CONTROLLER_MANAGER_KUBECONFIG_NAME);
    let ca_file = join(certs, CA_CERT_NAME);

    let mut defaults = vec![
        Arg::new("bind-address", "127.0.0.1"),
        Arg::new("cert-dir", certs.display().to_string()),
        Arg::new("leader-elect", "false"),
        Arg::new("kubeconfig", kubeconfig.clone()),
        Arg::new("authentication-kubeconfig", kubeconfig.clone()),
        Arg::new("authorization-kubeconfig", kubeconfig),
        Arg::new("client-ca-file", ca_file.clone()),
        Arg::new(
            "requestheader-client-ca-file",
            join(certs, FRONT_PROXY_CA_CERT_NAME),
        ),
        Arg::new("root-ca-file", ca_file.clone()),
        Arg::new(
            "service-account-private-key-file",
            join(certs, SERVICE_ACCOUNT_PRIVATE_KEY_NAME),
        ),
        Arg::new("cluster-signing-cert-file", ca_file),
        Arg::new("cluster-signing-key-file", join(certs, CA_KEY_NAME)),
        Arg::new("use-service-account-credentials", "true"),
        Arg::new("controllers", "*,bootstrapsigner,tokencleaner"),
    ];

    // Let the controller manager allocate node CIDRs out of the pod subnet.
    if !config.pod_subnet.is_empty() {
        set_value(&mut defaults, "allocate-node-cidrs", "true");
        set_value(&mut defaults, "cluster-cidr", &config.pod_subnet);
        if !config.service_subnet.is_empty() {
            set_value(
                &mut defaults,
                "service-cluster-ip-range",
                &config.service_subnet,
            );
        }
    }

    if !config.cluster_name.is_empty() {
        set_value(&mut defaults, "cluster-name", &config.cluster_name);
    }

    defaults
}

fn scheduler_defaults(config: &ControlPlaneConfig) -> Vec<Arg> {
    let kubeconfig = join(&config.kubernetes_dir, SCHEDULER_KUBECONFIG_NAME);
    vec![
        Arg::new("bind-address", "127.0.0.1"),
        Arg::new("cert-dir", config.certificates_dir.display().to_string()),
        Arg::new("leader-elect", "false"),
        Arg::new("kubeconfig", kubeconfig.clone()),
        Arg::new("authentication-kubeconfig", kubeconfig.clone()),
        Arg::new("authorization-kubeconfig", kubeconfig),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ControlPlaneConfig {
        let mut config = ControlPlaneConfig {
            kubernetes_dir: "/tmp/kd".into(),
            etcd_data_dir: "/tmp/ed".into(),
            etcd_socket_path: "/tmp/ed/etcd.sock".into(),
            ..Default::default()
        };
        config.apply_defaults();
        config
    }

    fn value<'a>(args: &'a [Arg], name: &str) -> Option<&'a str> {
        value_of(args, name)
    }

    fn count(args: &[Arg], name: &str) -> usize {
        args.iter().filter(|a| a.name == name).count()
    }

    #[test]
    fn build_args_is_deterministic() {
        let mut config = test_config();
        config.api_server_extra_args = vec![
            Arg::new("v", "4"),
            Arg::new("secure-port", "7443"),
        ];

        let first = build_args(Role::ApiServer, &config);
        let second = build_args(Role::ApiServer, &config);

        assert_eq!(first, second);
    }

    #[test]
    fn overrides_replace_defaults_exactly_once() {
        let mut config = test_config();
        config.scheduler_extra_args = vec![Arg::new("leader-elect", "true")];

        let args = build_args(Role::Scheduler, &config);

        assert_eq!(value(&args, "leader-elect"), Some("true"));
        assert_eq!(count(&args, "leader-elect"), 1);
    }

    #[test]
    fn unknown_overrides_append_after_defaults() {
        let mut config = test_config();
        config.scheduler_extra_args = vec![
            Arg::new("v", "2"),
            Arg::new("profiling", "false"),
        ];

        let args = build_args(Role::Scheduler, &config);
        let names: Vec<&str> = args.iter().map(|a| a.name.as_str()).collect();

        assert_eq!(&names[names.len() - 2..], &["v", "profiling"]);
    }

    #[test]
    fn repeated_override_last_value_wins() {
        let mut config = test_config();
        config.scheduler_extra_args = vec![Arg::new("v", "2"), Arg::new("v", "4")];

        let args = build_args(Role::Scheduler, &config);

        assert_eq!(value(&args, "v"), Some("4"));
        assert_eq!(count(&args, "v"), 1);
    }

    #[test]
    fn api_server_binds_store_endpoint_and_issuer() {
        let args = build_args(Role::ApiServer, &test_config());

        assert_eq!(
            value(&args, "etcd-servers"),
            Some("unix:///tmp/ed/etcd.sock")
        );
        assert_eq!(
            value(&args, "service-account-issuer"),
            Some("https://kubernetes.default.svc.cluster.local")
        );
        assert_eq!(value(&args, "secure-port"), Some("6443"));
        assert_eq!(value(&args, "allow-privileged"), Some("true"));
        assert_eq!(value(&args, "tls-cert-file"), Some("/tmp/kd/pki/apiserver.crt"));
    }

    #[test]
    fn api_server_defaults_authz_modes() {
        let args = build_args(Role::ApiServer, &test_config());

        assert_eq!(value(&args, "authorization-mode"), Some("Node,RBAC"));
    }

    #[test]
    fn api_server_keeps_valid_requested_authz_modes() {
        let mut config = test_config();
        config.api_server_extra_args = vec![Arg::new("authorization-mode", "Webhook,RBAC")];

        let args = build_args(Role::ApiServer, &config);

        assert_eq!(value(&args, "authorization-mode"), Some("Webhook,RBAC"));
        assert_eq!(count(&args, "authorization-mode"), 1);
    }

    #[test]
    fn api_server_invalid_authz_override_falls_back() {
        let mut config = test_config();
        config.api_server_extra_args = vec![Arg::new("authorization-mode", "bogus,garbage")];

        let args = build_args(Role::ApiServer, &config);

        assert_eq!(value(&args, "authorization-mode"), Some("Node,RBAC"));
    }

    #[test]
    fn structured_authz_config_skips_mode_computation() {
        let mut config = test_config();
        config.api_server_extra_args =
            vec![Arg::new("authorization-config", "/tmp/kd/authz.yaml")];

        let args = build_args(Role::ApiServer, &config);

        assert_eq!(count(&args, "authorization-mode"), 0);
        assert_eq!(
            value(&args, "authorization-config"),
            Some("/tmp/kd/authz.yaml")
        );
    }

    #[test]
    fn controller_manager_allocates_cidrs_when_subnets_set() {
        let args = build_args(Role::ControllerManager, &test_config());

        assert_eq!(value(&args, "allocate-node-cidrs"), Some("true"));
        assert_eq!(value(&args, "cluster-cidr"), Some("172.21.0.0/18"));
        assert_eq!(
            value(&args, "service-cluster-ip-range"),
            Some("172.18.0.0/21")
        );
        assert_eq!(value(&args, "cluster-name"), Some("kubernetes"));
        assert_eq!(
            value(&args, "controllers"),
            Some("*,bootstrapsigner,tokencleaner")
        );
        assert_eq!(value(&args, "leader-elect"), Some("false"));
    }

    #[test]
    fn controller_manager_skips_cidrs_without_pod_subnet() {
        let mut config = test_config();
        config.pod_subnet = String::new();

        let args = build_args(Role::ControllerManager, &config);

        assert_eq!(count(&args, "allocate-node-cidrs"), 0);
        assert_eq!(count(&args, "cluster-cidr"), 0);
    }

    #[test]
    fn scheduler_binds_local_kubeconfigs() {
        let args = build_args(Role::Scheduler, &test_config());

        assert_eq!(value(&args, "bind-address"), Some("127.0.0.1"));
        assert_eq!(
            value(&args, "kubeconfig"),
            Some("/tmp/kd/scheduler.conf")
        );
        assert_eq!(
            value(&args, "authentication-kubeconfig"),
            Some("/tmp/kd/scheduler.conf")
        );
    }

    #[test]
    fn store_args_derive_from_socket_and_data_dir() {
        let args = build_args(Role::Store, &test_config());

        assert_eq!(value(&args, "data-dir"), Some("/tmp/ed"));
        assert_eq!(
            value(&args, "listen-client-urls"),
            Some("unix:///tmp/ed/etcd.sock")
        );
    }

    #[test]
    fn command_line_renders_name_value_tokens() {
        let args = vec![Arg::new("leader-elect", "false"), Arg::new("v", "2")];

        assert_eq!(to_command_line(&args), vec!["--leader-elect=false", "--v=2"]);
    }
}
