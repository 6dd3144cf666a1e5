//! Mutex-guarded connection state.
//!
//! The event handler is the only writer apart from `disconnect`, which forces
//! the state offline. Any thread may read. Critical sections are a handful of
//! loads and stores, so both sides simply block on the lock.

use std::net::Ipv4Addr;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Link {
    connected: bool,
    ip: Option<Ipv4Addr>,
}

/// Whether the station currently holds an address, and which one.
#[derive(Debug, Default)]
pub(crate) struct ConnectionState {
    link: Mutex<Link>,
}

impl ConnectionState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave `Link` half-written,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        let mut link = self.lock();
        link.connected = connected;
        if !connected {
            link.ip = None;
        }
    }

    /// Marks the station online with the address it acquired.
    pub(crate) fn set_online(&self, ip: Ipv4Addr) {
        let mut link = self.lock();
        link.connected = true;
        link.ip = Some(ip);
    }

    pub(crate) fn ip(&self) -> Option<Ipv4Addr> {
        self.lock().ip
    }

    /// Reads both fields under one lock acquisition.
    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> (bool, Option<Ipv4Addr>) {
        let link = self.lock();
        (link.connected, link.ip)
    }
}
