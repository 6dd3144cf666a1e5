use log::{debug, info, warn};
use std::fmt::{self, Debug, Formatter};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::Result;
use crate::api::models::{ClientOptions, Config, LifecycleState, WifiError};
use crate::core::handler::StationEventHandler;
use crate::core::registry::{EventReceiver, EventRegistry};
use crate::core::state::ConnectionState;
use crate::driver::{
    EventCategory, EventLoop, EventSink, Interface, StaConfig, Subscription, WifiDriver, WifiMode,
};
use crate::log_err;
use crate::types::constants::{log_tags, receivers};

/// Categories the event handler is registered for, in registration order.
const HANDLER_CATEGORIES: [EventCategory; 2] = [EventCategory::Wifi, EventCategory::Ip];

#[derive(Debug)]
struct Lifecycle {
    state: LifecycleState,
    subscriptions: Vec<Subscription>,
}

/// Connection lifecycle manager for a station-mode Wi-Fi interface.
///
/// Owns the handshake between the radio driver's asynchronous events and
/// application code. Callers get a synchronous answer to "am I online"
/// through [`is_connected`](Self::is_connected) and a push notification on
/// every transition through [`register_event_receiver`](Self::register_event_receiver).
///
/// # Lifecycle
///
/// `Uninitialized` → [`init`](Self::init) → `Initialized` →
/// [`connect`](Self::connect) → `Started`. [`disconnect`](Self::disconnect)
/// returns a started client to `Initialized`. Whether a started client is
/// currently online is tracked separately and follows the driver's events.
///
/// # Example
///
/// ```rust
/// use std::net::Ipv4Addr;
/// use std::sync::Arc;
/// use wifi_sta::driver::RawEvent;
/// use wifi_sta::driver::sim::{SimulatedDriver, SimulatedEventLoop};
/// use wifi_sta::{Config, Event, WifiClient};
///
/// # fn example() -> wifi_sta::Result<()> {
/// let events = Arc::new(SimulatedEventLoop::new());
/// let client = WifiClient::new(Arc::new(SimulatedDriver::new()), events.clone());
///
/// client.init(&Config::new("MyNetwork", "password123"))?;
/// let mut rx = client.subscribe()?;
/// client.connect()?;
///
/// // The driver reports an address on its own thread.
/// events.post(RawEvent::GotIp { ip: Ipv4Addr::new(10, 0, 0, 2) });
///
/// assert!(client.is_connected());
/// assert_eq!(rx.try_recv(), Some(Event::Connected));
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
///
/// # Thread Safety
///
/// `WifiClient` is `Send + Sync`. Wrap it in an `Arc` to share it between
/// the threads that query or control it.
///
/// # Teardown
///
/// Dropping a started client stops the driver and removes the event handler
/// from the event loop. Once the handler is gone from the loop and every
/// sink returned by [`event_sink`](Self::event_sink) has been dropped, each
/// [`EventReceiver`] yields `None` after it is drained. A handler whose
/// removal failed during drop keeps the queues open.
pub struct WifiClient {
    driver: Arc<dyn WifiDriver>,
    event_loop: Arc<dyn EventLoop>,
    options: ClientOptions,
    state: Arc<ConnectionState>,
    registry: Arc<EventRegistry>,
    handler: Arc<StationEventHandler>,
    lifecycle: Mutex<Lifecycle>,
}

impl WifiClient {
    /// Creates a client with default [`ClientOptions`].
    pub fn new(driver: Arc<dyn WifiDriver>, event_loop: Arc<dyn EventLoop>) -> Self {
        Self::with_options(driver, event_loop, ClientOptions::default())
    }

    /// Creates a client with the given options.
    pub fn with_options(
        driver: Arc<dyn WifiDriver>,
        event_loop: Arc<dyn EventLoop>,
        options: ClientOptions,
    ) -> Self {
        let state = Arc::new(ConnectionState::new());
        let registry = Arc::new(EventRegistry::new(
            options.max_receivers,
            options.max_queue_capacity,
        ));
        let handler = Arc::new(StationEventHandler::new(
            driver.clone(),
            state.clone(),
            registry.clone(),
        ));

        Self {
            driver,
            event_loop,
            options,
            state,
            registry,
            handler,
            lifecycle: Mutex::new(Lifecycle {
                state: LifecycleState::Uninitialized,
                subscriptions: Vec::new(),
            }),
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Brings up the network stack and configures the driver for `config`.
    ///
    /// Runs, in order: log level configuration, network interface init,
    /// default event loop creation, default station interface creation,
    /// driver init, station mode selection and configuration. Nothing is
    /// retried.
    ///
    /// # Errors
    ///
    /// - `IllegalState` if the client was already initialized
    /// - `InvalidArgument` if the SSID or password is too long; no driver
    ///   call is made in that case
    /// - `DriverFailure` naming the first step that failed
    pub fn init(&self, config: &Config) -> Result<()> {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state != LifecycleState::Uninitialized {
            return Err(WifiError::IllegalState(format!(
                "init called on a client that is already {}",
                lifecycle.state
            )));
        }

        let sta_config = StaConfig::from_config(config, self.options.min_auth_mode)?;

        self.configure_log_levels()?;

        self.driver
            .netif_init()
            .map_err(WifiError::driver("netif_init"))?;
        self.driver
            .event_loop_create_default()
            .map_err(WifiError::driver("event_loop_create_default"))?;
        self.driver
            .create_default_sta_netif()
            .map_err(WifiError::driver("create_default_sta_netif"))?;
        self.driver
            .init(&self.options.init)
            .map_err(WifiError::driver("wifi_init"))?;
        self.driver
            .set_mode(WifiMode::Station)
            .map_err(WifiError::driver("set_mode"))?;
        self.driver
            .set_config(Interface::Station, &sta_config)
            .map_err(WifiError::driver("set_config"))?;

        lifecycle.state = LifecycleState::Initialized;
        info!("Wi-Fi station initialized for network '{}'", config.ssid);
        Ok(())
    }

    fn configure_log_levels(&self) -> Result<()> {
        let level = self.options.log_level;
        let tags = std::iter::once(log_tags::CLIENT)
            .chain(self.options.driver_log_tags.iter().map(String::as_str));

        for tag in tags {
            self.driver
                .set_log_level(tag, level)
                .map_err(WifiError::driver("set_log_level"))?;
        }
        debug!("Driver log level set to {level}");
        Ok(())
    }

    /// Registers the event handler and starts the driver.
    ///
    /// Returns as soon as the driver is running. The client reports
    /// connected once the driver delivers an address, which happens
    /// asynchronously. Calling `connect` on a started or connected client
    /// does nothing.
    ///
    /// If a registration or the driver start fails, every registration made
    /// by this call is removed again before the error is returned, so the
    /// client stays `Initialized`.
    ///
    /// # Errors
    ///
    /// - `IllegalState` if `init` has not completed
    /// - `DriverFailure` if handler registration or driver start fails
    pub fn connect(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle();
        match lifecycle.state {
            LifecycleState::Uninitialized => {
                return Err(WifiError::IllegalState("client not initialized".into()));
            }
            LifecycleState::Started => {
                debug!("connect: already started");
                return Ok(());
            }
            LifecycleState::Initialized => {}
        }

        if self.state.is_connected() {
            debug!("connect: already connected");
            return Ok(());
        }

        let sink: Arc<dyn EventSink> = self.handler.clone();
        let mut subscriptions = Vec::with_capacity(HANDLER_CATEGORIES.len());

        for category in HANDLER_CATEGORIES {
            match self.event_loop.register(category, sink.clone()) {
                Ok(sub) => subscriptions.push(sub),
                Err(source) => {
                    self.unregister_all(&subscriptions);
                    return Err(WifiError::DriverFailure {
                        step: register_step(category),
                        source,
                    });
                }
            }
        }

        if let Err(source) = self.driver.start() {
            self.unregister_all(&subscriptions);
            return Err(WifiError::DriverFailure {
                step: "start",
                source,
            });
        }

        lifecycle.subscriptions = subscriptions;
        lifecycle.state = LifecycleState::Started;
        info!("Wi-Fi station started");
        Ok(())
    }

    // Best effort; used on paths that already have an error to report.
    fn unregister_all(&self, subscriptions: &[Subscription]) {
        for sub in subscriptions.iter().rev() {
            log_err!(
                self.event_loop.unregister(sub),
                format!("removing {} handler failed", sub.category())
            );
        }
    }

    /// Stops the driver and removes the event handler.
    ///
    /// Does nothing if the station is not connected. No
    /// [`Event::Disconnected`](crate::Event::Disconnected) is fired: the
    /// event reports links lost on their own, not ones the caller closed.
    ///
    /// # Errors
    ///
    /// - `IllegalState` if `init` has not completed
    /// - `DriverFailure` if stopping the driver or removing a handler fails
    pub fn disconnect(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle();
        if lifecycle.state == LifecycleState::Uninitialized {
            return Err(WifiError::IllegalState("client not initialized".into()));
        }

        if !self.state.is_connected() {
            debug!("disconnect: already disconnected");
            return Ok(());
        }

        self.driver.stop().map_err(WifiError::driver("stop"))?;

        while let Some(sub) = lifecycle.subscriptions.first().copied() {
            self.event_loop
                .unregister(&sub)
                .map_err(WifiError::driver(unregister_step(sub.category())))?;
            lifecycle.subscriptions.remove(0);
        }

        self.state.set_connected(false);
        lifecycle.state = LifecycleState::Initialized;
        info!("Wi-Fi station disconnected");
        Ok(())
    }

    /// Returns whether the station currently holds an address.
    ///
    /// Legal in any state; `false` before `init`.
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// The address acquired on the last connect, while still connected.
    pub fn ip_address(&self) -> Option<Ipv4Addr> {
        self.state.ip()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.lifecycle().state
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Registers a new queue of `capacity` events for connection transitions.
    ///
    /// Every registered queue receives every event fired while its
    /// receiver is alive. Events offered to a full queue are dropped for
    /// that receiver only. May be called before or after `connect`.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `capacity` is zero
    /// - `ResourceExhaustion` if the queue would exceed
    ///   [`ClientOptions::max_queue_capacity`] or the client already holds
    ///   [`ClientOptions::max_receivers`] live receivers
    pub fn register_event_receiver(&self, capacity: usize) -> Result<EventReceiver> {
        self.registry.register(capacity)
    }

    /// Registers a single-slot event queue.
    pub fn subscribe(&self) -> Result<EventReceiver> {
        self.register_event_receiver(receivers::DEFAULT_CAPACITY)
    }

    /// Number of event queues currently registered.
    pub fn receiver_count(&self) -> usize {
        self.registry.len()
    }

    /// The handler the client registers with the event loop.
    ///
    /// Hosts whose event dispatch is not an [`EventLoop`] can forward raw
    /// events to it directly.
    pub fn event_sink(&self) -> Arc<dyn EventSink> {
        self.handler.clone()
    }
}

fn register_step(category: EventCategory) -> &'static str {
    match category {
        EventCategory::Wifi => "register_wifi_handler",
        EventCategory::Ip => "register_ip_handler",
    }
}

fn unregister_step(category: EventCategory) -> &'static str {
    match category {
        EventCategory::Wifi => "unregister_wifi_handler",
        EventCategory::Ip => "unregister_ip_handler",
    }
}

impl Debug for WifiClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiClient")
            .field("lifecycle", &*self.lifecycle())
            .field("connected", &self.state.is_connected())
            .field("receivers", &self.registry.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Drop for WifiClient {
    fn drop(&mut self) {
        let lifecycle = self.lifecycle();
        if lifecycle.state != LifecycleState::Started {
            return;
        }

        warn!("Wi-Fi client dropped while started, stopping driver");
        log_err!(self.driver.stop(), "stopping driver on drop failed");
        self.unregister_all(&lifecycle.subscriptions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{DisconnectReason, Event};
    use crate::driver::sim::{DriverCall, SimulatedDriver, SimulatedEventLoop};
    use crate::driver::{AuthMode, DriverError, InitConfig, RawEvent};
    use log::LevelFilter;

    fn setup() -> (Arc<SimulatedDriver>, Arc<SimulatedEventLoop>, WifiClient) {
        let driver = Arc::new(SimulatedDriver::new());
        let events = Arc::new(SimulatedEventLoop::new());
        let client = WifiClient::new(driver.clone(), events.clone());
        (driver, events, client)
    }

    fn config() -> Config {
        Config::new("net", "pw")
    }

    #[test]
    fn new_client_is_uninitialized_and_offline() {
        let (_, _, client) = setup();
        assert_eq!(client.state(), LifecycleState::Uninitialized);
        assert!(!client.is_connected());
        assert_eq!(client.ip_address(), None);
    }

    #[test]
    fn init_runs_steps_in_order() {
        let (driver, _, client) = setup();
        client.init(&config()).unwrap();
        assert_eq!(client.state(), LifecycleState::Initialized);

        let steps: Vec<&str> = driver
            .calls()
            .iter()
            .map(DriverCall::step)
            .filter(|s| *s != "set_log_level")
            .collect();
        assert_eq!(
            steps,
            vec![
                "netif_init",
                "event_loop_create_default",
                "create_default_sta_netif",
                "wifi_init",
                "set_mode",
                "set_config",
            ]
        );
    }

    #[test]
    fn init_configures_log_levels_first() {
        let (driver, _, client) = setup();
        client.init(&config()).unwrap();

        let calls = driver.calls();
        let tags: Vec<String> = calls
            .iter()
            .take_while(|c| matches!(c, DriverCall::SetLogLevel { .. }))
            .map(|c| match c {
                DriverCall::SetLogLevel { tag, level } => {
                    assert_eq!(*level, LevelFilter::Error);
                    tag.clone()
                }
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(
            tags,
            vec!["wifi_sta", "wifi", "wifi_init", "phy_init", "esp_netif_handlers"]
        );
    }

    #[test]
    fn init_applies_options() {
        let driver = Arc::new(SimulatedDriver::new());
        let events = Arc::new(SimulatedEventLoop::new());
        let init = InitConfig::default().with_nvs(false);
        let options = ClientOptions::default()
            .with_min_auth_mode(AuthMode::Wpa3Psk)
            .with_init_config(init.clone())
            .with_driver_log_tags(Vec::<String>::new());
        let client = WifiClient::with_options(driver.clone(), events, options);

        client.init(&config()).unwrap();

        let calls = driver.calls();
        assert!(calls.contains(&DriverCall::Init(init)));
        assert!(calls.contains(&DriverCall::SetMode(WifiMode::Station)));
        let sta = driver.sta_config().unwrap();
        assert_eq!(sta.ssid(), b"net");
        assert_eq!(sta.password(), b"pw");
        assert_eq!(sta.threshold_auth, AuthMode::Wpa3Psk);
    }

    #[test]
    fn init_twice_is_illegal() {
        let (_, _, client) = setup();
        client.init(&config()).unwrap();
        let err = client.init(&config()).unwrap_err();
        assert!(matches!(err, WifiError::IllegalState(_)));
    }

    #[test]
    fn init_reports_failing_step() {
        let (driver, _, client) = setup();
        driver.fail_on("wifi_init", DriverError::NO_MEM);

        match client.init(&config()) {
            Err(WifiError::DriverFailure { step, source }) => {
                assert_eq!(step, "wifi_init");
                assert_eq!(source, DriverError::NO_MEM);
            }
            other => panic!("expected DriverFailure, got {other:?}"),
        }
        assert_eq!(client.state(), LifecycleState::Uninitialized);
        assert!(!driver.calls().iter().any(|c| c.step() == "set_mode"));
    }

    #[test]
    fn init_rejects_long_ssid_before_touching_driver() {
        let (driver, _, client) = setup();
        let err = client.init(&Config::new("x".repeat(40), "pw")).unwrap_err();
        assert!(matches!(err, WifiError::InvalidArgument(_)));
        assert!(driver.calls().is_empty());
    }

    #[test]
    fn connect_before_init_is_illegal() {
        let (driver, events, client) = setup();
        let err = client.connect().unwrap_err();
        assert!(matches!(err, WifiError::IllegalState(_)));
        assert!(events.subscriptions().is_empty());
        assert!(driver.calls().is_empty());
    }

    #[test]
    fn disconnect_before_init_is_illegal() {
        let (_, _, client) = setup();
        let err = client.disconnect().unwrap_err();
        assert!(matches!(err, WifiError::IllegalState(_)));
    }

    #[test]
    fn connect_registers_and_starts() {
        let (driver, events, client) = setup();
        client.init(&config()).unwrap();
        client.connect().unwrap();

        assert_eq!(client.state(), LifecycleState::Started);
        assert!(driver.is_running());
        let categories: Vec<EventCategory> =
            events.subscriptions().iter().map(|s| s.category()).collect();
        assert_eq!(categories, vec![EventCategory::Wifi, EventCategory::Ip]);
        assert!(!client.is_connected());
    }

    #[test]
    fn connect_twice_is_a_no_op() {
        let (driver, events, client) = setup();
        client.init(&config()).unwrap();
        client.connect().unwrap();
        client.connect().unwrap();

        assert_eq!(events.subscriptions().len(), 2);
        let starts = driver
            .calls()
            .iter()
            .filter(|c| **c == DriverCall::Start)
            .count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn connect_rolls_back_partial_registration() {
        let (driver, events, client) = setup();
        client.init(&config()).unwrap();
        events.fail_register(EventCategory::Ip, DriverError::NO_MEM);

        match client.connect() {
            Err(WifiError::DriverFailure { step, source }) => {
                assert_eq!(step, "register_ip_handler");
                assert_eq!(source, DriverError::NO_MEM);
            }
            other => panic!("expected DriverFailure, got {other:?}"),
        }
        assert!(events.subscriptions().is_empty());
        assert!(!driver.is_running());
        assert_eq!(client.state(), LifecycleState::Initialized);

        events.clear_failures();
        client.connect().unwrap();
        assert_eq!(events.subscriptions().len(), 2);
    }

    #[test]
    fn connect_rolls_back_when_start_fails() {
        let (driver, events, client) = setup();
        client.init(&config()).unwrap();
        driver.fail_on("start", DriverError::WIFI_NOT_INIT);

        let err = client.connect().unwrap_err();
        assert_eq!(err.driver_code(), Some(DriverError::WIFI_NOT_INIT.code()));
        assert!(events.subscriptions().is_empty());
        assert_eq!(client.state(), LifecycleState::Initialized);
    }

    #[test]
    fn disconnect_when_offline_is_a_no_op() {
        let (driver, events, client) = setup();
        client.init(&config()).unwrap();
        client.connect().unwrap();

        client.disconnect().unwrap();
        assert_eq!(client.state(), LifecycleState::Started);
        assert_eq!(events.subscriptions().len(), 2);
        assert!(driver.is_running());
    }

    #[test]
    fn disconnect_stops_unregisters_and_fires_nothing() {
        let (driver, events, client) = setup();
        client.init(&config()).unwrap();
        let mut rx = client.register_event_receiver(4).unwrap();
        client.connect().unwrap();
        events.post(RawEvent::GotIp {
            ip: Ipv4Addr::new(192, 168, 0, 10),
        });
        assert_eq!(rx.try_recv(), Some(Event::Connected));

        client.disconnect().unwrap();

        assert!(!client.is_connected());
        assert_eq!(client.ip_address(), None);
        assert_eq!(client.state(), LifecycleState::Initialized);
        assert!(events.subscriptions().is_empty());
        assert!(!driver.is_running());
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn disconnect_reports_unregister_failure() {
        let (_, events, client) = setup();
        client.init(&config()).unwrap();
        client.connect().unwrap();
        events.post(RawEvent::GotIp {
            ip: Ipv4Addr::new(192, 168, 0, 10),
        });
        events.fail_unregister(DriverError::INVALID_STATE);

        match client.disconnect() {
            Err(WifiError::DriverFailure { step, .. }) => {
                assert_eq!(step, "unregister_wifi_handler");
            }
            other => panic!("expected DriverFailure, got {other:?}"),
        }
        assert!(client.is_connected());
    }

    #[test]
    fn reconnect_after_disconnect() {
        let (driver, events, client) = setup();
        client.init(&config()).unwrap();
        client.connect().unwrap();
        events.post(RawEvent::GotIp {
            ip: Ipv4Addr::new(192, 168, 0, 10),
        });
        client.disconnect().unwrap();

        client.connect().unwrap();
        assert_eq!(client.state(), LifecycleState::Started);
        assert!(driver.is_running());
        assert_eq!(events.subscriptions().len(), 2);
    }

    #[test]
    fn zero_capacity_receiver_is_rejected() {
        let (_, _, client) = setup();
        let err = client.register_event_receiver(0).unwrap_err();
        assert!(matches!(err, WifiError::InvalidArgument(_)));
        assert_eq!(client.receiver_count(), 0);
    }

    #[test]
    fn subscribe_uses_single_slot_queue() {
        let (_, _, client) = setup();
        let rx = client.subscribe().unwrap();
        assert_eq!(rx.capacity(), 1);
        assert_eq!(client.receiver_count(), 1);
    }

    #[test]
    fn handler_retries_through_client_driver() {
        let (driver, events, client) = setup();
        client.init(&config()).unwrap();
        client.connect().unwrap();

        events.post(RawEvent::StaStart);
        events.post(RawEvent::StaDisconnected {
            reason: DisconnectReason::NoApFound,
        });
        events.post(RawEvent::StaDisconnected {
            reason: DisconnectReason::NoApFound,
        });
        assert_eq!(driver.connect_attempts(), 3);
    }

    #[test]
    fn drop_while_started_tears_down() {
        let (driver, events, client) = setup();
        client.init(&config()).unwrap();
        client.connect().unwrap();

        drop(client);
        assert!(!driver.is_running());
        assert!(events.subscriptions().is_empty());
    }

    #[test]
    fn client_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WifiClient>();
    }
}
