//! MQTT link to the external parameter store.
//!
//! The distributed store's networking and replication live behind an MQTT
//! broker; retained messages give last-value-wins semantics, which is all
//! the adapter promises. This module owns the client plus the connection
//! driver thread, and feeds every observed publish into
//! [`ParamStore::apply`].

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};

use super::{ParamPublisher, ParamStore, ParamValue};

/// How to reach the broker and which key namespace to mirror.
#[derive(Clone, Debug)]
pub struct MqttLinkConfig {
    /// Broker address, `host:port`.
    pub broker: String,
    /// Client identifier presented to the broker.
    pub client_id: String,
    /// Key namespace to subscribe to (`<namespace>/#`).
    pub namespace: String,
}

/// Live link to the broker. Dropping without `disconnect` leaves the driver
/// thread to notice the closed connection on its own.
pub struct MqttLink {
    client: Client,
    driver: Option<JoinHandle<()>>,
}

impl MqttLink {
    /// Connect, subscribe to the namespace, and start mirroring values into
    /// `store`. Also attaches the outbound publisher so store writes reach
    /// the broker as retained messages.
    pub fn connect(config: MqttLinkConfig, store: Arc<ParamStore>) -> Result<Self> {
        let (host, port) = parse_broker_addr(&config.broker)?;
        let mut options = MqttOptions::new(&config.client_id, host, port);
        options.set_keep_alive(Duration::from_secs(60));
        options.set_clean_session(true);

        let (client, connection) = Client::new(options, 10);
        client
            .subscribe(format!("{}/#", config.namespace), QoS::AtLeastOnce)
            .context("subscribe to parameter namespace")?;

        let driver = spawn_driver(connection, store.clone());
        store.attach_publisher(Box::new(MqttPublisher {
            client: client.clone(),
        }))?;

        log::info!(
            "parameter store link up: broker {}, namespace '{}'",
            config.broker,
            config.namespace
        );
        Ok(Self {
            client,
            driver: Some(driver),
        })
    }

    /// Disconnect and join the driver thread.
    pub fn disconnect(mut self) -> Result<()> {
        self.client.disconnect()?;
        if let Some(driver) = self.driver.take() {
            let _ = driver.join();
        }
        Ok(())
    }
}

fn spawn_driver(mut connection: Connection, store: Arc<ParamStore>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for event in connection.iter() {
            match event {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    match ParamValue::from_payload(&publish.payload) {
                        Ok(value) => store.apply(&publish.topic, value),
                        Err(e) => {
                            log::debug!("ignoring payload on '{}': {}", publish.topic, e);
                        }
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => break,
                Ok(_) => {}
                Err(e) => {
                    log::warn!("parameter store connection error: {}", e);
                    break;
                }
            }
        }
        log::info!("parameter store link closed");
    })
}

fn parse_broker_addr(addr: &str) -> Result<(String, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("broker address '{}' must be host:port", addr))?;
    if host.is_empty() {
        return Err(anyhow!("broker address '{}' has an empty host", addr));
    }
    let port: u16 = port
        .parse()
        .map_err(|_| anyhow!("broker address '{}' has an invalid port", addr))?;
    Ok((host.to_string(), port))
}

struct MqttPublisher {
    client: Client,
}

impl ParamPublisher for MqttPublisher {
    fn publish(&self, key: &str, value: &ParamValue) -> Result<()> {
        // Retained: late subscribers and reconnecting followers see the
        // last value without waiting for the next write.
        self.client
            .publish(key, QoS::AtLeastOnce, true, value.to_payload().into_bytes())
            .with_context(|| format!("publish '{key}'"))?;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
