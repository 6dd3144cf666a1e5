//! Constants for the station driver's native values.
//!
//! These correspond to the numeric codes and fixed sizes used by the
//! underlying radio driver and network stack.

/// Fixed field sizes of the driver-native station configuration.
pub mod limits {
    /// Maximum SSID length in bytes.
    pub const SSID_MAX_LEN: usize = 32;
    /// Maximum pre-shared key length in bytes.
    pub const PASSWORD_MAX_LEN: usize = 64;
}

/// Defaults for the event receiver registry.
pub mod receivers {
    /// Queue capacity used by [`WifiClient::subscribe`](crate::WifiClient::subscribe).
    pub const DEFAULT_CAPACITY: usize = 1;
    /// Largest queue the registry will allocate. The driver's queue
    /// primitive takes an 8-bit length.
    pub const MAX_QUEUE_CAPACITY: usize = u8::MAX as usize;
    /// Number of live receivers the registry will hold unless the caller
    /// sets a lower limit.
    pub const MAX_RECEIVERS: usize = usize::MAX;
}

/// Log tags of the driver components whose verbosity `init` configures.
pub mod log_tags {
    /// Tag used by this crate's own log lines.
    pub const CLIENT: &str = "wifi_sta";

    pub const WIFI: &str = "wifi";
    pub const WIFI_INIT: &str = "wifi_init";
    pub const PHY_INIT: &str = "phy_init";
    pub const NETIF_HANDLERS: &str = "esp_netif_handlers";

    /// All driver component tags, in the order they are configured.
    pub const DRIVER: [&str; 4] = [WIFI, WIFI_INIT, PHY_INIT, NETIF_HANDLERS];
}

/// Native driver status codes.
pub mod err_code {
    pub const OK: i32 = 0;
    pub const FAIL: i32 = -1;
    pub const NO_MEM: i32 = 0x101;
    pub const INVALID_ARG: i32 = 0x102;
    pub const INVALID_STATE: i32 = 0x103;
    pub const INVALID_SIZE: i32 = 0x104;
    pub const NOT_FOUND: i32 = 0x105;
    pub const NOT_SUPPORTED: i32 = 0x106;
    pub const TIMEOUT: i32 = 0x107;

    pub const WIFI_NOT_INIT: i32 = 0x3001;
    pub const WIFI_NOT_STARTED: i32 = 0x3002;
    pub const WIFI_NOT_STOPPED: i32 = 0x3003;
    pub const WIFI_IF: i32 = 0x3004;
    pub const WIFI_MODE: i32 = 0x3005;
    pub const WIFI_STATE: i32 = 0x3006;
    pub const WIFI_CONN: i32 = 0x3007;
    pub const WIFI_NVS: i32 = 0x3008;
    pub const WIFI_MAC: i32 = 0x3009;
    pub const WIFI_SSID: i32 = 0x300A;
    pub const WIFI_PASSWORD: i32 = 0x300B;
    pub const WIFI_TIMEOUT: i32 = 0x300C;
}

/// Default tuning parameters handed to the driver on `init`.
pub mod tuning {
    pub const STATIC_RX_BUF_NUM: u8 = 10;
    pub const DYNAMIC_RX_BUF_NUM: u8 = 32;
    pub const DYNAMIC_TX_BUF_NUM: u8 = 32;
    pub const RX_BA_WIN: u8 = 6;
    pub const AMPDU_RX_ENABLE: bool = true;
    pub const AMPDU_TX_ENABLE: bool = true;
    pub const NVS_ENABLE: bool = true;
}
