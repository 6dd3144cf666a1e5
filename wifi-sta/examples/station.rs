/// Example showing a station coming online, losing its link and recovering,
/// driven by the simulated driver.
///
/// A background thread plays the driver's event loop while the main task
/// waits for connection events.
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use wifi_sta::driver::RawEvent;
use wifi_sta::driver::sim::{SimulatedDriver, SimulatedEventLoop};
use wifi_sta::{Config, DisconnectReason, Event, WifiClient};

#[tokio::main]
async fn main() -> wifi_sta::Result<()> {
    let driver = Arc::new(SimulatedDriver::new());
    let events = Arc::new(SimulatedEventLoop::new());
    let client = Arc::new(WifiClient::new(driver.clone(), events.clone()));

    let ssid = std::env::var("WIFI_SSID").unwrap_or_else(|_| "MyNetwork".to_string());
    let password = std::env::var("WIFI_PASSWORD").unwrap_or_else(|_| "password".to_string());

    client.init(&Config::new(ssid, password))?;
    let mut rx = client.register_event_receiver(4)?;
    client.connect()?;
    println!("Client {}", client.state());

    let driver_loop = thread::spawn(move || {
        let script = [
            RawEvent::WifiReady,
            RawEvent::StaStart,
            RawEvent::StaConnected,
            RawEvent::GotIp {
                ip: Ipv4Addr::new(192, 168, 1, 42),
            },
            RawEvent::StaDisconnected {
                reason: DisconnectReason::BeaconTimeout,
            },
            RawEvent::StaConnected,
            RawEvent::GotIp {
                ip: Ipv4Addr::new(192, 168, 1, 43),
            },
        ];
        for event in script {
            thread::sleep(Duration::from_millis(100));
            events.post(event);
        }
    });

    while let Some(event) = rx.recv_timeout(Duration::from_secs(2)).await {
        match event {
            Event::Connected => println!("Online at {:?}", client.ip_address()),
            Event::Disconnected => println!("Link lost, driver is reconnecting"),
        }
    }

    if driver_loop.join().is_err() {
        eprintln!("Driver event thread panicked");
        std::process::exit(1);
    }
    println!(
        "Connected: {} after {} connection attempts",
        client.is_connected(),
        driver.connect_attempts()
    );

    client.disconnect()?;
    println!("Client {}", client.state());
    Ok(())
}
