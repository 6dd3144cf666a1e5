use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display, Formatter};
use thiserror::Error;

use crate::driver::{AuthMode, DriverError, InitConfig};
use crate::types::constants::{log_tags, receivers};

/// Credentials of the network to join.
///
/// Consumed by [`WifiClient::init`](crate::WifiClient::init), which copies
/// both fields into the driver's own configuration. The SSID may be at most
/// 32 bytes and the password at most 64 bytes.
///
/// # Examples
///
/// ```rust
/// use wifi_sta::Config;
///
/// let config = Config::new("HomeWiFi", "my_secure_password");
/// assert_eq!(config.ssid, "HomeWiFi");
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Network name.
    pub ssid: String,
    /// Pre-shared key.
    pub password: String,
}

impl Config {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection transition delivered to every registered event receiver.
///
/// Events are edge-triggered: one `Connected` per transition from offline to
/// online, one `Disconnected` per transition back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Event {
    /// The station acquired an address.
    Connected,
    /// The station lost its link after having been connected.
    Disconnected,
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Lifecycle of a [`WifiClient`](crate::WifiClient).
///
/// Orthogonal to the connection state: a `Started` client may or may not
/// currently hold an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// `init` has not completed.
    Uninitialized,
    /// The driver is configured but not running.
    Initialized,
    /// The driver is running and the event handler is registered.
    Started,
}

impl Display for LifecycleState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initialized => write!(f, "initialized"),
            Self::Started => write!(f, "started"),
        }
    }
}

/// Reason code carried by a station-disconnected driver event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisconnectReason {
    Unspecified,
    AuthExpire,
    AuthLeave,
    AssocExpire,
    AssocTooMany,
    NotAuthed,
    NotAssoced,
    AssocLeave,
    FourWayHandshakeTimeout,
    GroupKeyUpdateTimeout,
    Ieee8021xAuthFailed,
    BeaconTimeout,
    NoApFound,
    AuthFail,
    AssocFail,
    HandshakeTimeout,
    ConnectionFail,
    /// A code without a named variant.
    Other(u16),
}

impl DisconnectReason {
    /// Returns whether the access point rejected the credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::AuthFail
                | Self::FourWayHandshakeTimeout
                | Self::HandshakeTimeout
                | Self::Ieee8021xAuthFailed
        )
    }
}

impl From<u16> for DisconnectReason {
    fn from(code: u16) -> Self {
        match code {
            1 => Self::Unspecified,
            2 => Self::AuthExpire,
            3 => Self::AuthLeave,
            4 => Self::AssocExpire,
            5 => Self::AssocTooMany,
            6 => Self::NotAuthed,
            7 => Self::NotAssoced,
            8 => Self::AssocLeave,
            15 => Self::FourWayHandshakeTimeout,
            16 => Self::GroupKeyUpdateTimeout,
            23 => Self::Ieee8021xAuthFailed,
            200 => Self::BeaconTimeout,
            201 => Self::NoApFound,
            202 => Self::AuthFail,
            203 => Self::AssocFail,
            204 => Self::HandshakeTimeout,
            205 => Self::ConnectionFail,
            v => Self::Other(v),
        }
    }
}

impl Display for DisconnectReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspecified => write!(f, "unspecified"),
            Self::AuthExpire => write!(f, "authentication expired"),
            Self::AuthLeave => write!(f, "deauthenticated by access point"),
            Self::AssocExpire => write!(f, "association expired"),
            Self::AssocTooMany => write!(f, "access point has too many stations"),
            Self::NotAuthed => write!(f, "not authenticated"),
            Self::NotAssoced => write!(f, "not associated"),
            Self::AssocLeave => write!(f, "disassociated"),
            Self::FourWayHandshakeTimeout => write!(f, "4-way handshake timeout"),
            Self::GroupKeyUpdateTimeout => write!(f, "group key update timeout"),
            Self::Ieee8021xAuthFailed => write!(f, "802.1X authentication failed"),
            Self::BeaconTimeout => write!(f, "beacon timeout"),
            Self::NoApFound => write!(f, "no access point found"),
            Self::AuthFail => write!(f, "authentication failed"),
            Self::AssocFail => write!(f, "association failed"),
            Self::HandshakeTimeout => write!(f, "handshake timeout"),
            Self::ConnectionFail => write!(f, "connection failed"),
            Self::Other(v) => write!(f, "unknown reason ({v})"),
        }
    }
}

/// Options for a [`WifiClient`](crate::WifiClient).
///
/// All fields have defaults matching a typical unattended device, so
/// hosts usually only override what they need.
///
/// # Examples
///
/// ```rust
/// use log::LevelFilter;
/// use wifi_sta::ClientOptions;
///
/// let opts = ClientOptions::default()
///     .with_log_level(LevelFilter::Warn)
///     .with_max_receivers(4);
/// assert_eq!(opts.max_receivers, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Verbosity applied to the driver components on `init`.
    pub log_level: LevelFilter,
    /// Driver components whose verbosity `init` configures.
    pub driver_log_tags: Vec<String>,
    /// Weakest access point security the station will join.
    pub min_auth_mode: AuthMode,
    /// Upper bound on live event receivers. Unlimited by default.
    pub max_receivers: usize,
    /// Upper bound on a single receiver's queue capacity.
    pub max_queue_capacity: usize,
    /// Driver tuning parameters.
    pub init: InitConfig,
}

impl Default for ClientOptions {
    /// Defaults:
    /// - `log_level`: `Error`
    /// - `driver_log_tags`: `wifi`, `wifi_init`, `phy_init`, `esp_netif_handlers`
    /// - `min_auth_mode`: WPA2-PSK
    /// - `max_receivers`: unlimited
    /// - `max_queue_capacity`: 255
    fn default() -> Self {
        Self {
            log_level: LevelFilter::Error,
            driver_log_tags: log_tags::DRIVER.iter().map(|t| t.to_string()).collect(),
            min_auth_mode: AuthMode::default(),
            max_receivers: receivers::MAX_RECEIVERS,
            max_queue_capacity: receivers::MAX_QUEUE_CAPACITY,
            init: InitConfig::default(),
        }
    }
}

impl ClientOptions {
    #[must_use]
    pub fn with_log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = level;
        self
    }

    #[must_use]
    pub fn with_driver_log_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.driver_log_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_min_auth_mode(mut self, mode: AuthMode) -> Self {
        self.min_auth_mode = mode;
        self
    }

    #[must_use]
    pub fn with_max_receivers(mut self, n: usize) -> Self {
        self.max_receivers = n;
        self
    }

    #[must_use]
    pub fn with_max_queue_capacity(mut self, n: usize) -> Self {
        self.max_queue_capacity = n;
        self
    }

    #[must_use]
    pub fn with_init_config(mut self, init: InitConfig) -> Self {
        self.init = init;
        self
    }
}

/// Errors returned by [`WifiClient`](crate::WifiClient) operations.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use wifi_sta::{Config, WifiClient, WifiError};
/// use wifi_sta::driver::sim::{SimulatedDriver, SimulatedEventLoop};
///
/// let client = WifiClient::new(
///     Arc::new(SimulatedDriver::new()),
///     Arc::new(SimulatedEventLoop::new()),
/// );
///
/// match client.connect() {
///     Err(WifiError::IllegalState(msg)) => eprintln!("call init first: {msg}"),
///     Err(WifiError::DriverFailure { step, source }) => {
///         eprintln!("{step} failed: {source}");
///     }
///     Err(e) => eprintln!("Error: {e}"),
///     Ok(()) => {}
/// }
/// ```
#[derive(Debug, Error)]
pub enum WifiError {
    /// The caller passed a structurally invalid parameter.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A queue or similar resource could not be allocated.
    #[error("resource exhausted: {0}")]
    ResourceExhaustion(String),

    /// The operation is not allowed in the client's current lifecycle state.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// A driver or network stack call returned a non-success code.
    #[error("{step} failed: {source}")]
    DriverFailure {
        /// The driver call that failed.
        step: &'static str,
        #[source]
        source: DriverError,
    },
}

impl WifiError {
    pub(crate) fn driver(step: &'static str) -> impl FnOnce(DriverError) -> Self {
        move |source| Self::DriverFailure { step, source }
    }

    /// Returns the native driver code, if this is a driver failure.
    pub fn driver_code(&self) -> Option<i32> {
        match self {
            Self::DriverFailure { source, .. } => Some(source.code()),
            _ => None,
        }
    }
}
