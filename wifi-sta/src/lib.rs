//! Connection lifecycle manager for a station-mode Wi-Fi interface.
//!
//! This crate sits between a radio driver's asynchronous event stream and
//! application code that wants two things:
//!
//! - a synchronous answer to "am I online" ([`WifiClient::is_connected`])
//! - a push notification on every transition ([`WifiClient::register_event_receiver`])
//!
//! The driver itself, the network stack and the driver's event loop are not
//! part of this crate. They are reached through the traits in [`driver`], so
//! the same client runs against real hardware bindings or against the
//! host-side [`driver::sim`] implementation.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wifi_sta::driver::sim::{SimulatedDriver, SimulatedEventLoop};
//! use wifi_sta::{Config, Event, WifiClient};
//!
//! # fn example() -> wifi_sta::Result<()> {
//! let client = Arc::new(WifiClient::new(
//!     Arc::new(SimulatedDriver::new()),
//!     Arc::new(SimulatedEventLoop::new()),
//! ));
//!
//! client.init(&Config::new("MyNetwork", "password123"))?;
//! let mut rx = client.subscribe()?;
//! client.connect()?;
//!
//! // Block until the driver reports an address.
//! while let Some(event) = rx.blocking_recv() {
//!     match event {
//!         Event::Connected => println!("online at {:?}", client.ip_address()),
//!         Event::Disconnected => println!("offline, driver is reconnecting"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Connection Events
//!
//! Events are edge-triggered: exactly one [`Event::Connected`] per transition
//! from offline to online and one [`Event::Disconnected`] per transition
//! back, no matter how often the driver repeats the underlying raw event.
//! Delivery never blocks the driver; a full receiver queue drops the event
//! for that receiver and logs an error.
//!
//! # Reconnection
//!
//! After every lost link the client immediately asks the driver to connect
//! again, with no backoff and no retry limit. An unattended device stays
//! online for as long as the network can be reached.
//!
//! # Error Handling
//!
//! All operations return `Result<T, WifiError>`. Driver failures carry the
//! name of the failing step and the driver's native status code.
//!
//! # Logging
//!
//! This crate uses the [`log`](https://docs.rs/log) facade for logging. To see
//! log output, add a logging implementation like `env_logger`. For example:

//! ```no_run,ignore
//! env_logger::init();
//! // ...
//! ```

// Internal implementation modules
mod core;
mod types;
mod util;

// Public API modules
pub mod api;
pub mod driver;

// Re-exported public API
pub use api::models::{ClientOptions, Config, DisconnectReason, Event, LifecycleState, WifiError};
pub use api::wifi_client::WifiClient;
pub use crate::core::registry::EventReceiver;
pub use driver::{AuthMode, DriverError, InitConfig};

/// A specialized `Result` type for Wi-Fi client operations.
pub type Result<T> = std::result::Result<T, WifiError>;
