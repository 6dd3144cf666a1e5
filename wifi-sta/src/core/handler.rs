//! The connection state machine's transition function.
//!
//! [`StationEventHandler`] is registered with the driver's event loop and
//! runs on the loop's thread. It is the only producer of [`Event`]s and,
//! apart from an explicit `disconnect`, the only writer of the connection
//! state.
//!
//! # Transitions
//!
//! | Raw event          | Effect                                                  |
//! |--------------------|---------------------------------------------------------|
//! | `StaStart`         | start a connection attempt                              |
//! | `StaDisconnected`  | fire `Disconnected` if online, go offline, retry        |
//! | `StaConnected`     | none, the link is up but there is no address yet        |
//! | `GotIp`            | fire `Connected` if offline, go online                  |
//! | `WifiReady`        | none                                                    |
//!
//! The edge check and the fire both happen before the state is written, so
//! subscribers see exactly one event per real transition and repeated raw
//! events are silent.
//!
//! Reconnection is unconditional: every disconnect triggers a new attempt,
//! with no backoff and no retry limit.

use log::{debug, info, warn};
use std::sync::Arc;

use crate::api::models::Event;
use crate::core::registry::EventRegistry;
use crate::core::state::ConnectionState;
use crate::driver::{EventSink, RawEvent, WifiDriver};
use crate::log_err;

pub(crate) struct StationEventHandler {
    driver: Arc<dyn WifiDriver>,
    state: Arc<ConnectionState>,
    registry: Arc<EventRegistry>,
}

impl StationEventHandler {
    pub(crate) fn new(
        driver: Arc<dyn WifiDriver>,
        state: Arc<ConnectionState>,
        registry: Arc<EventRegistry>,
    ) -> Self {
        Self {
            driver,
            state,
            registry,
        }
    }
}

impl EventSink for StationEventHandler {
    fn handle(&self, event: &RawEvent) {
        match *event {
            RawEvent::StaStart => {
                debug!("Received station start event, connecting...");
                log_err!(self.driver.connect(), "connect after station start failed");
            }
            RawEvent::StaDisconnected { reason } => {
                debug!("Received station disconnected event ({reason}), reconnecting...");
                if reason.is_auth_failure() {
                    warn!("Access point rejected the credentials: {reason}");
                }
                if self.state.is_connected() {
                    self.registry.fire(Event::Disconnected);
                }
                self.state.set_connected(false);
                log_err!(self.driver.connect(), "reconnect after disconnect failed");
            }
            RawEvent::StaConnected => {
                debug!("Received station connected event, waiting for address");
            }
            RawEvent::GotIp { ip } => {
                info!("Station connected, IP is {ip}");
                if !self.state.is_connected() {
                    self.registry.fire(Event::Connected);
                }
                self.state.set_online(ip);
            }
            RawEvent::WifiReady => {
                debug!("Received Wi-Fi ready event");
            }
            RawEvent::ScanDone | RawEvent::StaStop | RawEvent::LostIp => {
                debug!("Ignoring driver event {event:?}");
            }
        }
    }
}
