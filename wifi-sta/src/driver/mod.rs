//! Seams to the radio driver, network stack and driver event loop.
//!
//! The client never talks to hardware directly. Everything it needs from the
//! platform goes through the traits in this module:
//!
//! - [`WifiDriver`]: network stack bring-up and the station-mode radio driver
//! - [`EventLoop`]: the driver's event dispatch facility
//! - [`EventSink`]: the receiving end of raw driver events
//!
//! A host-side implementation of all three lives in [`sim`].

pub mod sim;

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Display, Formatter};
use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::api::models::{Config, DisconnectReason, WifiError};
use crate::types::constants::{err_code, limits, tuning};
use crate::util::utils::copy_bounded;

/// Result type of raw driver calls.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// A non-success status code returned by the driver or network stack.
///
/// Wraps the native integer code and knows the symbolic name of the
/// common ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DriverError(i32);

impl DriverError {
    pub const FAIL: Self = Self(err_code::FAIL);
    pub const NO_MEM: Self = Self(err_code::NO_MEM);
    pub const INVALID_ARG: Self = Self(err_code::INVALID_ARG);
    pub const INVALID_STATE: Self = Self(err_code::INVALID_STATE);
    pub const NOT_FOUND: Self = Self(err_code::NOT_FOUND);
    pub const WIFI_NOT_INIT: Self = Self(err_code::WIFI_NOT_INIT);
    pub const WIFI_NOT_STARTED: Self = Self(err_code::WIFI_NOT_STARTED);
    pub const WIFI_CONN: Self = Self(err_code::WIFI_CONN);

    /// Wraps a native status code.
    pub const fn from_code(code: i32) -> Self {
        Self(code)
    }

    /// Converts a native status into a `Result`, treating `0` as success.
    pub fn check(code: i32) -> DriverResult<()> {
        if code == err_code::OK {
            Ok(())
        } else {
            Err(Self(code))
        }
    }

    /// The native status code.
    pub const fn code(self) -> i32 {
        self.0
    }

    /// Symbolic name of the status code.
    pub fn name(self) -> &'static str {
        match self.0 {
            err_code::OK => "ESP_OK",
            err_code::FAIL => "ESP_FAIL",
            err_code::NO_MEM => "ESP_ERR_NO_MEM",
            err_code::INVALID_ARG => "ESP_ERR_INVALID_ARG",
            err_code::INVALID_STATE => "ESP_ERR_INVALID_STATE",
            err_code::INVALID_SIZE => "ESP_ERR_INVALID_SIZE",
            err_code::NOT_FOUND => "ESP_ERR_NOT_FOUND",
            err_code::NOT_SUPPORTED => "ESP_ERR_NOT_SUPPORTED",
            err_code::TIMEOUT => "ESP_ERR_TIMEOUT",
            err_code::WIFI_NOT_INIT => "ESP_ERR_WIFI_NOT_INIT",
            err_code::WIFI_NOT_STARTED => "ESP_ERR_WIFI_NOT_STARTED",
            err_code::WIFI_NOT_STOPPED => "ESP_ERR_WIFI_NOT_STOPPED",
            err_code::WIFI_IF => "ESP_ERR_WIFI_IF",
            err_code::WIFI_MODE => "ESP_ERR_WIFI_MODE",
            err_code::WIFI_STATE => "ESP_ERR_WIFI_STATE",
            err_code::WIFI_CONN => "ESP_ERR_WIFI_CONN",
            err_code::WIFI_NVS => "ESP_ERR_WIFI_NVS",
            err_code::WIFI_MAC => "ESP_ERR_WIFI_MAC",
            err_code::WIFI_SSID => "ESP_ERR_WIFI_SSID",
            err_code::WIFI_PASSWORD => "ESP_ERR_WIFI_PASSWORD",
            err_code::WIFI_TIMEOUT => "ESP_ERR_WIFI_TIMEOUT",
            _ => "UNKNOWN ERROR",
        }
    }
}

impl Display for DriverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            write!(f, "{} ({})", self.name(), self.0)
        } else {
            write!(f, "{} ({:#x})", self.name(), self.0)
        }
    }
}

impl std::error::Error for DriverError {}

/// Event categories the driver's event loop dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Every radio / interface lifecycle event.
    Wifi,
    /// The station interface acquired an address.
    Ip,
}

impl Display for EventCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wifi => write!(f, "WIFI_EVENT"),
            Self::Ip => write!(f, "IP_EVENT"),
        }
    }
}

/// A raw event as delivered by the driver's event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEvent {
    WifiReady,
    ScanDone,
    /// The station interface started.
    StaStart,
    StaStop,
    /// The link to the access point is up. No address yet.
    StaConnected,
    /// The link to the access point was lost, or a connection attempt failed.
    StaDisconnected { reason: DisconnectReason },
    /// The station interface obtained an address.
    GotIp { ip: Ipv4Addr },
    LostIp,
}

impl RawEvent {
    /// Returns the category this event is dispatched under.
    pub fn category(&self) -> EventCategory {
        match self {
            Self::GotIp { .. } | Self::LostIp => EventCategory::Ip,
            _ => EventCategory::Wifi,
        }
    }

    /// Returns whether a subscription for `category` receives this event.
    ///
    /// The client subscribes to every Wi-Fi event but only to the
    /// address-acquired IP event.
    pub fn matches(&self, category: EventCategory) -> bool {
        match category {
            EventCategory::Wifi => self.category() == EventCategory::Wifi,
            EventCategory::Ip => matches!(self, Self::GotIp { .. }),
        }
    }
}

/// Receives raw events on the driver's event-loop thread.
///
/// Implementations must return quickly and must never block: the event
/// loop is shared by every driver component.
pub trait EventSink: Send + Sync {
    fn handle(&self, event: &RawEvent);
}

impl<F> EventSink for F
where
    F: Fn(&RawEvent) + Send + Sync,
{
    fn handle(&self, event: &RawEvent) {
        self(event)
    }
}

/// Handle to a registration made with an [`EventLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    category: EventCategory,
    id: u64,
}

impl Subscription {
    /// Creates a handle. Called by [`EventLoop`] implementations.
    pub fn new(category: EventCategory, id: u64) -> Self {
        Self { category, id }
    }

    pub fn category(&self) -> EventCategory {
        self.category
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// The driver's event dispatch facility.
pub trait EventLoop: Send + Sync {
    /// Registers `sink` for every event matching `category`.
    fn register(
        &self,
        category: EventCategory,
        sink: Arc<dyn EventSink>,
    ) -> DriverResult<Subscription>;

    /// Removes a registration made with [`register`](Self::register).
    fn unregister(&self, subscription: &Subscription) -> DriverResult<()>;
}

/// Radio operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WifiMode {
    Null,
    Station,
    AccessPoint,
    ApStation,
}

/// Network interface a configuration applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interface {
    Station,
    AccessPoint,
}

/// Weakest authentication scheme the station accepts from an access point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AuthMode {
    Open,
    Wep,
    WpaPsk,
    #[default]
    Wpa2Psk,
    WpaWpa2Psk,
    Wpa3Psk,
    Wpa2Wpa3Psk,
}

/// Driver tuning parameters passed on initialization.
///
/// # Examples
///
/// ```rust
/// use wifi_sta::InitConfig;
///
/// let init = InitConfig::default().with_dynamic_rx_buf_num(16);
/// assert_eq!(init.dynamic_rx_buf_num, 16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitConfig {
    pub static_rx_buf_num: u8,
    pub dynamic_rx_buf_num: u8,
    pub dynamic_tx_buf_num: u8,
    pub rx_ba_win: u8,
    pub ampdu_rx_enable: bool,
    pub ampdu_tx_enable: bool,
    /// Let the driver store its own configuration in flash.
    pub nvs_enable: bool,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            static_rx_buf_num: tuning::STATIC_RX_BUF_NUM,
            dynamic_rx_buf_num: tuning::DYNAMIC_RX_BUF_NUM,
            dynamic_tx_buf_num: tuning::DYNAMIC_TX_BUF_NUM,
            rx_ba_win: tuning::RX_BA_WIN,
            ampdu_rx_enable: tuning::AMPDU_RX_ENABLE,
            ampdu_tx_enable: tuning::AMPDU_TX_ENABLE,
            nvs_enable: tuning::NVS_ENABLE,
        }
    }
}

impl InitConfig {
    #[must_use]
    pub fn with_static_rx_buf_num(mut self, n: u8) -> Self {
        self.static_rx_buf_num = n;
        self
    }

    #[must_use]
    pub fn with_dynamic_rx_buf_num(mut self, n: u8) -> Self {
        self.dynamic_rx_buf_num = n;
        self
    }

    #[must_use]
    pub fn with_dynamic_tx_buf_num(mut self, n: u8) -> Self {
        self.dynamic_tx_buf_num = n;
        self
    }

    #[must_use]
    pub fn with_nvs(mut self, enable: bool) -> Self {
        self.nvs_enable = enable;
        self
    }
}

/// Driver-native station configuration.
///
/// Fixed-size, zero-padded byte fields. Built from a [`Config`] by
/// copying its bytes; no reference to the `Config` is kept.
#[derive(Clone, PartialEq, Eq)]
pub struct StaConfig {
    ssid: [u8; limits::SSID_MAX_LEN],
    password: [u8; limits::PASSWORD_MAX_LEN],
    /// Weakest access point security the driver will join.
    pub threshold_auth: AuthMode,
}

impl StaConfig {
    /// Copies the network name and secret out of `config`.
    ///
    /// # Errors
    ///
    /// Returns `WifiError::InvalidArgument` if either field is longer than
    /// the driver's fixed field size.
    pub fn from_config(config: &Config, threshold_auth: AuthMode) -> Result<Self, WifiError> {
        let ssid = copy_bounded::<{ limits::SSID_MAX_LEN }>(config.ssid.as_bytes())
            .ok_or_else(|| {
                WifiError::InvalidArgument(format!(
                    "SSID is {} bytes, at most {} allowed",
                    config.ssid.len(),
                    limits::SSID_MAX_LEN
                ))
            })?;
        let password = copy_bounded::<{ limits::PASSWORD_MAX_LEN }>(config.password.as_bytes())
            .ok_or_else(|| {
                WifiError::InvalidArgument(format!(
                    "password is {} bytes, at most {} allowed",
                    config.password.len(),
                    limits::PASSWORD_MAX_LEN
                ))
            })?;

        Ok(Self {
            ssid,
            password,
            threshold_auth,
        })
    }

    /// SSID bytes without the zero padding.
    pub fn ssid(&self) -> &[u8] {
        trim_padding(&self.ssid)
    }

    /// Password bytes without the zero padding.
    pub fn password(&self) -> &[u8] {
        trim_padding(&self.password)
    }
}

impl Debug for StaConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaConfig")
            .field("ssid", &String::from_utf8_lossy(self.ssid()))
            .field("password", &"<redacted>")
            .field("threshold_auth", &self.threshold_auth)
            .finish()
    }
}

fn trim_padding(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}

/// Network stack bring-up and the station-mode radio driver.
///
/// Every call returns the driver's native status as a [`DriverError`] on
/// failure.
pub trait WifiDriver: Send + Sync {
    /// Sets the log verbosity of the driver component logging under `tag`.
    fn set_log_level(&self, tag: &str, level: LevelFilter) -> DriverResult<()>;

    /// Initializes the network interface layer.
    fn netif_init(&self) -> DriverResult<()>;

    /// Creates the default system event loop.
    fn event_loop_create_default(&self) -> DriverResult<()>;

    /// Creates the default station network interface.
    fn create_default_sta_netif(&self) -> DriverResult<()>;

    /// Initializes the radio driver.
    fn init(&self, config: &InitConfig) -> DriverResult<()>;

    fn set_mode(&self, mode: WifiMode) -> DriverResult<()>;

    fn set_config(&self, iface: Interface, config: &StaConfig) -> DriverResult<()>;

    /// Starts the radio. The driver posts `StaStart` once it is up.
    fn start(&self) -> DriverResult<()>;

    fn stop(&self) -> DriverResult<()>;

    /// Begins a connection attempt against the configured network.
    ///
    /// Completion is reported asynchronously through the event loop.
    fn connect(&self) -> DriverResult<()>;
}
