//! Host-side stand-ins for the radio driver and its event loop.
//!
//! [`SimulatedDriver`] records every call made to it and can be told to
//! fail any step with a native code. [`SimulatedEventLoop`] keeps the
//! registered sinks and dispatches raw events posted to it on the calling
//! thread, so a test (or any host thread) plays the driver's event loop.
//!
//! # Example
//!
//! ```rust
//! use std::net::Ipv4Addr;
//! use std::sync::Arc;
//! use wifi_sta::driver::RawEvent;
//! use wifi_sta::driver::sim::{SimulatedDriver, SimulatedEventLoop};
//! use wifi_sta::{Config, Event, WifiClient};
//!
//! # fn example() -> wifi_sta::Result<()> {
//! let driver = Arc::new(SimulatedDriver::new());
//! let events = Arc::new(SimulatedEventLoop::new());
//! let client = WifiClient::new(driver.clone(), events.clone());
//!
//! let mut rx = client.subscribe()?;
//! client.init(&Config::new("net", "password"))?;
//! client.connect()?;
//!
//! events.post(RawEvent::StaStart);
//! events.post(RawEvent::GotIp { ip: Ipv4Addr::new(192, 168, 1, 50) });
//!
//! assert!(client.is_connected());
//! assert_eq!(rx.try_recv(), Some(Event::Connected));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use log::{LevelFilter, debug};
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    DriverError, DriverResult, EventCategory, EventLoop, EventSink, InitConfig, Interface,
    RawEvent, StaConfig, Subscription, WifiDriver, WifiMode,
};

/// A call recorded by [`SimulatedDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    SetLogLevel { tag: String, level: LevelFilter },
    NetifInit,
    EventLoopCreateDefault,
    CreateDefaultStaNetif,
    Init(InitConfig),
    SetMode(WifiMode),
    SetConfig(Interface, StaConfig),
    Start,
    Stop,
    Connect,
}

impl DriverCall {
    /// Step name used with [`SimulatedDriver::fail_on`].
    pub fn step(&self) -> &'static str {
        match self {
            Self::SetLogLevel { .. } => "set_log_level",
            Self::NetifInit => "netif_init",
            Self::EventLoopCreateDefault => "event_loop_create_default",
            Self::CreateDefaultStaNetif => "create_default_sta_netif",
            Self::Init(_) => "wifi_init",
            Self::SetMode(_) => "set_mode",
            Self::SetConfig(..) => "set_config",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Connect => "connect",
        }
    }
}

#[derive(Debug, Default)]
struct DriverState {
    calls: Vec<DriverCall>,
    failures: HashMap<&'static str, DriverError>,
    running: bool,
}

/// Recording [`WifiDriver`] with injectable failures.
#[derive(Debug, Default)]
pub struct SimulatedDriver {
    inner: Mutex<DriverState>,
}

impl SimulatedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DriverState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes every later call of `step` fail with `err`.
    pub fn fail_on(&self, step: &'static str, err: DriverError) {
        self.lock().failures.insert(step, err);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.lock().calls.clone()
    }

    /// Number of connection attempts, successful or not.
    pub fn connect_attempts(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| matches!(c, DriverCall::Connect))
            .count()
    }

    /// The most recently applied station configuration.
    pub fn sta_config(&self) -> Option<StaConfig> {
        self.lock().calls.iter().rev().find_map(|c| match c {
            DriverCall::SetConfig(Interface::Station, cfg) => Some(cfg.clone()),
            _ => None,
        })
    }

    /// Whether the radio was started and not stopped since.
    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    fn record(&self, call: DriverCall) -> DriverResult<()> {
        let mut state = self.lock();
        let step = call.step();
        debug!("simulated driver: {call:?}");
        state.calls.push(call);
        match state.failures.get(step) {
            Some(err) => Err(*err),
            None => Ok(()),
        }
    }
}

impl WifiDriver for SimulatedDriver {
    fn set_log_level(&self, tag: &str, level: LevelFilter) -> DriverResult<()> {
        self.record(DriverCall::SetLogLevel {
            tag: tag.to_owned(),
            level,
        })
    }

    fn netif_init(&self) -> DriverResult<()> {
        self.record(DriverCall::NetifInit)
    }

    fn event_loop_create_default(&self) -> DriverResult<()> {
        self.record(DriverCall::EventLoopCreateDefault)
    }

    fn create_default_sta_netif(&self) -> DriverResult<()> {
        self.record(DriverCall::CreateDefaultStaNetif)
    }

    fn init(&self, config: &InitConfig) -> DriverResult<()> {
        self.record(DriverCall::Init(config.clone()))
    }

    fn set_mode(&self, mode: WifiMode) -> DriverResult<()> {
        self.record(DriverCall::SetMode(mode))
    }

    fn set_config(&self, iface: Interface, config: &StaConfig) -> DriverResult<()> {
        self.record(DriverCall::SetConfig(iface, config.clone()))
    }

    fn start(&self) -> DriverResult<()> {
        self.record(DriverCall::Start)?;
        self.lock().running = true;
        Ok(())
    }

    fn stop(&self) -> DriverResult<()> {
        self.record(DriverCall::Stop)?;
        self.lock().running = false;
        Ok(())
    }

    fn connect(&self) -> DriverResult<()> {
        self.record(DriverCall::Connect)
    }
}

#[derive(Default)]
struct LoopState {
    next_id: u64,
    sinks: Vec<(Subscription, Arc<dyn EventSink>)>,
    register_failures: HashMap<EventCategory, DriverError>,
    unregister_failure: Option<DriverError>,
}

/// In-process [`EventLoop`] that dispatches on the posting thread.
#[derive(Default)]
pub struct SimulatedEventLoop {
    inner: Mutex<LoopState>,
}

impl Debug for SimulatedEventLoop {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedEventLoop")
            .field("subscriptions", &self.subscriptions())
            .finish()
    }
}

impl SimulatedEventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LoopState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Delivers `event` to every matching sink and returns how many got it.
    ///
    /// Sinks run on the calling thread after the loop's own lock has been
    /// released, so a sink may register or unregister.
    pub fn post(&self, event: RawEvent) -> usize {
        let sinks: Vec<Arc<dyn EventSink>> = self
            .lock()
            .sinks
            .iter()
            .filter(|(sub, _)| event.matches(sub.category()))
            .map(|(_, sink)| sink.clone())
            .collect();

        for sink in &sinks {
            sink.handle(&event);
        }
        sinks.len()
    }

    /// Live registrations, in registration order.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.lock().sinks.iter().map(|(sub, _)| *sub).collect()
    }

    /// Makes every later registration for `category` fail with `err`.
    pub fn fail_register(&self, category: EventCategory, err: DriverError) {
        self.lock().register_failures.insert(category, err);
    }

    /// Makes every later unregistration fail with `err`.
    pub fn fail_unregister(&self, err: DriverError) {
        self.lock().unregister_failure = Some(err);
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.register_failures.clear();
        state.unregister_failure = None;
    }
}

impl EventLoop for SimulatedEventLoop {
    fn register(
        &self,
        category: EventCategory,
        sink: Arc<dyn EventSink>,
    ) -> DriverResult<Subscription> {
        let mut state = self.lock();
        if let Some(err) = state.register_failures.get(&category) {
            return Err(*err);
        }

        state.next_id += 1;
        let sub = Subscription::new(category, state.next_id);
        state.sinks.push((sub, sink));
        Ok(sub)
    }

    fn unregister(&self, subscription: &Subscription) -> DriverResult<()> {
        let mut state = self.lock();
        if let Some(err) = state.unregister_failure {
            return Err(err);
        }

        let before = state.sinks.len();
        state.sinks.retain(|(sub, _)| sub != subscription);
        if state.sinks.len() == before {
            return Err(DriverError::NOT_FOUND);
        }
        Ok(())
    }
}
