//! Option records accepted by facade constructors.
//!
//! Every `create_*` operation takes an optional plain-object argument; the
//! object is converted into one of these typed records before it reaches
//! the engine. Unknown keys are ignored, missing keys take the documented
//! defaults, and a value of the wrong type rejects the whole call with an
//! invalid-arguments error before any native work starts.

use crate::error::{BridgeError, Result};
use crate::translate::script_to_record;
use crate::value::ScriptValue;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Default receive buffer size for datagram sockets (64 KB)
pub const DEFAULT_RECEIVE_BUFFER_BYTES: u32 = 64 * 1024;

/// Default accept backlog for servers
pub const DEFAULT_ACCEPT_BACKLOG: u32 = 1024;

/// Default idle timeout for pooled client connections, in seconds
pub const DEFAULT_IDLE_TIMEOUT_SECS: u32 = 0;

/// Default maximum pooled connections per client
pub const DEFAULT_MAX_POOL_SIZE: u32 = 5;

/// Default number of deployed instances per unit
pub const DEFAULT_INSTANCES: u32 = 1;

fn default_receive_buffer() -> u32 {
    DEFAULT_RECEIVE_BUFFER_BYTES
}

fn default_accept_backlog() -> u32 {
    DEFAULT_ACCEPT_BACKLOG
}

fn default_max_pool_size() -> u32 {
    DEFAULT_MAX_POOL_SIZE
}

fn default_instances() -> u32 {
    DEFAULT_INSTANCES
}

fn default_true() -> bool {
    true
}

/// Parse a caller-supplied option object into a typed record.
///
/// `ScriptValue::Null` yields the defaults. Unknown keys are dropped
/// silently; a key with a value of the wrong type is reported as invalid
/// arguments for `operation`.
pub(crate) fn options_from_script<T>(operation: &'static str, value: &ScriptValue) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match value {
        ScriptValue::Null => Ok(T::default()),
        ScriptValue::Object(_) => {
            let record = script_to_record(value);
            serde_json::from_value(record).map_err(|e| BridgeError::InvalidArguments {
                operation,
                shapes: format!("bad option value: {e}"),
            })
        }
        other => Err(BridgeError::InvalidArguments {
            operation,
            shapes: format!("options must be an object, got {}", other.kind_name()),
        }),
    }
}

/// Options for datagram sockets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatagramOptions {
    /// Receive buffer size in bytes
    #[serde(default = "default_receive_buffer")]
    pub receive_buffer_bytes: u32,

    /// Allow binding to an address already in use (default: false)
    #[serde(default)]
    pub reuse_address: bool,

    /// Enable broadcast sends (default: false)
    #[serde(default)]
    pub broadcast: bool,

    /// Use IPv6 rather than IPv4 (default: false)
    #[serde(default)]
    pub ipv6: bool,
}

impl Default for DatagramOptions {
    fn default() -> Self {
        Self {
            receive_buffer_bytes: DEFAULT_RECEIVE_BUFFER_BYTES,
            reuse_address: false,
            broadcast: false,
            ipv6: false,
        }
    }
}

impl DatagramOptions {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the receive buffer size
    pub fn with_receive_buffer(mut self, bytes: u32) -> Self {
        self.receive_buffer_bytes = bytes;
        self
    }

    /// Enable or disable broadcast sends
    pub fn with_broadcast(mut self, enable: bool) -> Self {
        self.broadcast = enable;
        self
    }
}

/// Options for stream servers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetServerOptions {
    /// Accept backlog
    #[serde(default = "default_accept_backlog")]
    pub accept_backlog: u32,

    /// Allow binding to an address already in use (default: false)
    #[serde(default)]
    pub reuse_address: bool,

    /// Enable TCP_NODELAY on accepted connections (default: true)
    #[serde(default = "default_true")]
    pub tcp_no_delay: bool,

    /// Enable TLS (default: false)
    #[serde(default)]
    pub ssl: bool,
}

impl Default for NetServerOptions {
    fn default() -> Self {
        Self {
            accept_backlog: DEFAULT_ACCEPT_BACKLOG,
            reuse_address: false,
            tcp_no_delay: true,
            ssl: false,
        }
    }
}

impl NetServerOptions {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the accept backlog
    pub fn with_accept_backlog(mut self, backlog: u32) -> Self {
        self.accept_backlog = backlog;
        self
    }
}

/// Options for HTTP clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpClientOptions {
    /// Default host when a request does not name one
    #[serde(default)]
    pub default_host: Option<String>,

    /// Default port when a request does not name one
    #[serde(default)]
    pub default_port: Option<u16>,

    /// Maximum pooled connections
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,

    /// Keep idle pooled connections alive for this many seconds; 0 closes
    /// them immediately
    #[serde(default)]
    pub idle_timeout_secs: u32,

    /// Send keep-alive on pooled connections (default: true)
    #[serde(default = "default_true")]
    pub keep_alive: bool,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            default_host: None,
            default_port: None,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            keep_alive: true,
        }
    }
}

impl HttpClientOptions {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default host
    pub fn with_default_host(mut self, host: impl Into<String>) -> Self {
        self.default_host = Some(host.into());
        self
    }

    /// Set the default port
    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = Some(port);
        self
    }
}

/// Options for deploying a unit of work
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOptions {
    /// Number of instances to deploy
    #[serde(default = "default_instances")]
    pub instances: u32,

    /// Run on a worker context rather than an event loop (default: false)
    #[serde(default)]
    pub worker: bool,

    /// Arbitrary configuration handed to the deployed unit
    #[serde(default)]
    pub config: Option<serde_json::Value>,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            instances: DEFAULT_INSTANCES,
            worker: false,
            config: None,
        }
    }
}

impl DeployOptions {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the instance count
    pub fn with_instances(mut self, instances: u32) -> Self {
        self.instances = instances;
        self
    }

    /// Mark the unit as a worker deployment
    pub fn with_worker(mut self, worker: bool) -> Self {
        self.worker = worker;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn object(entries: &[(&str, ScriptValue)]) -> ScriptValue {
        let map: HashMap<String, ScriptValue> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        ScriptValue::Object(map)
    }

    #[test]
    fn test_null_yields_defaults() {
        let opts: DatagramOptions =
            options_from_script("createDatagramSocket", &ScriptValue::Null).unwrap();
        assert_eq!(opts.receive_buffer_bytes, DEFAULT_RECEIVE_BUFFER_BYTES);
        assert!(!opts.broadcast);
    }

    #[test]
    fn test_known_keys_applied_unknown_keys_ignored() {
        let value = object(&[
            ("broadcast", ScriptValue::Bool(true)),
            ("receiveBufferBytes", ScriptValue::Number(2048.0)),
            ("someFutureKnob", ScriptValue::String("ignored".into())),
        ]);
        let opts: DatagramOptions = options_from_script("createDatagramSocket", &value).unwrap();
        assert!(opts.broadcast);
        assert_eq!(opts.receive_buffer_bytes, 2048);
    }

    #[test]
    fn test_integer_fields_accept_script_numbers() {
        // Script-side numbers are all f64; whole values must still land in
        // integer-typed fields instead of failing deserialization.
        let value = object(&[("instances", ScriptValue::Number(2.0))]);
        let opts: DeployOptions = options_from_script("deployUnit", &value).unwrap();
        assert_eq!(opts.instances, 2);

        let value = object(&[("defaultPort", ScriptValue::Number(8080.0))]);
        let opts: HttpClientOptions = options_from_script("createHttpClient", &value).unwrap();
        assert_eq!(opts.default_port, Some(8080));

        // A fractional count is still a type error.
        let value = object(&[("instances", ScriptValue::Number(1.5))]);
        assert!(options_from_script::<DeployOptions>("deployUnit", &value).is_err());
    }

    #[test]
    fn test_wrong_value_type_rejects_call() {
        let value = object(&[("acceptBacklog", ScriptValue::String("many".into()))]);
        let err = options_from_script::<NetServerOptions>("createNetServer", &value).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::InvalidArguments {
                operation: "createNetServer",
                ..
            }
        ));
    }

    #[test]
    fn test_non_object_rejected() {
        let err =
            options_from_script::<HttpClientOptions>("createHttpClient", &ScriptValue::Number(8.0))
                .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArguments { .. }));
    }

    #[test]
    fn test_deploy_options_builder() {
        let opts = DeployOptions::new().with_instances(4).with_worker(true);
        assert_eq!(opts.instances, 4);
        assert!(opts.worker);
    }

    #[test]
    fn test_serde_camel_case_round_trip() {
        let json = serde_json::json!({
            "defaultHost": "example.test",
            "defaultPort": 8080,
            "maxPoolSize": 2
        });
        let opts: HttpClientOptions = serde_json::from_value(json).unwrap();
        assert_eq!(opts.default_host.as_deref(), Some("example.test"));
        assert_eq!(opts.default_port, Some(8080));
        assert_eq!(opts.max_pool_size, 2);
        assert!(opts.keep_alive);
    }
}
