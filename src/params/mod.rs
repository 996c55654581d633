//! Shared parameter store adapter.
//!
//! A thin reactive accessor over the external distributed key-value store.
//! Two kinds of entries matter to the appliance: the numeric binarization
//! threshold, and per-switched-output routing selectors that are either a
//! camera index or a camera name.
//!
//! Remote values are loosely typed on the wire, so they are decoded once at
//! this boundary into the explicit [`ParamValue`] union; everything
//! downstream consumes the union exhaustively instead of re-probing types.
//!
//! Reads never block: `threshold()` is an atomic snapshot of the most
//! recently observed value. Subscribers receive change events on an
//! unbounded channel and may observe a value one update behind the
//! authority; there is no freshness bound by design.

pub mod mqtt;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Binarization threshold used until the store says otherwise.
pub const DEFAULT_THRESHOLD: f64 = 126.0;

/// Whether this process hosts the authoritative store or follows another
/// one. Fixed at startup; the read/write contract is identical either way,
/// the authority just publishes defaults on connect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreRole {
    Authority,
    Follower,
}

impl FromStr for StoreRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "authority" | "server" => Ok(StoreRole::Authority),
            "follower" | "client" => Ok(StoreRole::Follower),
            other => Err(anyhow!("unknown store role '{}'", other)),
        }
    }
}

/// A store value, decoded once at the adapter boundary.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    /// Decode a raw store payload. Numeric-looking text becomes `Number`,
    /// anything else UTF-8 becomes `Text`. Non-UTF-8 payloads are refused.
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(payload)
            .map_err(|_| anyhow!("store payload is not valid UTF-8"))?
            .trim();
        match text.parse::<f64>() {
            Ok(n) => Ok(ParamValue::Number(n)),
            Err(_) => Ok(ParamValue::Text(text.to_string())),
        }
    }

    /// Wire form of this value.
    pub fn to_payload(&self) -> String {
        match self {
            ParamValue::Number(n) => n.to_string(),
            ParamValue::Text(s) => s.clone(),
        }
    }
}

/// A change notification for one store entry.
#[derive(Clone, Debug)]
pub struct ParamEvent {
    pub key: String,
    pub value: ParamValue,
}

/// Outbound half of the store link. Implemented by the MQTT link; absent in
/// tests, where writes stay local.
pub trait ParamPublisher: Send {
    fn publish(&self, key: &str, value: &ParamValue) -> Result<()>;
}

/// The adapter itself. Owns the last-observed value per key, the threshold
/// snapshot, and the subscriber fan-out.
pub struct ParamStore {
    role: StoreRole,
    threshold_key: String,
    threshold_bits: AtomicU64,
    values: Mutex<HashMap<String, ParamValue>>,
    subscribers: Mutex<HashMap<String, Vec<Sender<ParamEvent>>>>,
    publisher: Mutex<Option<Box<dyn ParamPublisher>>>,
}

impl ParamStore {
    pub fn new(role: StoreRole, namespace: &str) -> Self {
        Self {
            role,
            threshold_key: format!("{namespace}/threshold"),
            threshold_bits: AtomicU64::new(DEFAULT_THRESHOLD.to_bits()),
            values: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
            publisher: Mutex::new(None),
        }
    }

    pub fn role(&self) -> StoreRole {
        self.role
    }

    pub fn threshold_key(&self) -> &str {
        &self.threshold_key
    }

    /// Most recently observed threshold. Non-blocking single-value snapshot.
    pub fn threshold(&self) -> f64 {
        f64::from_bits(self.threshold_bits.load(Ordering::Acquire))
    }

    /// Write the threshold: applied locally first so our own reads see it
    /// immediately, then forwarded to the external store when linked.
    pub fn set_threshold(&self, value: f64) -> Result<()> {
        let clamped = value.clamp(0.0, 255.0);
        let key = self.threshold_key.clone();
        self.apply(&key, ParamValue::Number(clamped));
        self.forward(&key, &ParamValue::Number(clamped))
    }

    /// Subscribe to change events for one key. The current value, if any,
    /// is delivered immediately; creations and updates follow. All three
    /// event classes look identical to the consumer.
    pub fn subscribe(&self, key: &str) -> Result<Receiver<ParamEvent>> {
        let (tx, rx) = unbounded();
        let values = self
            .values
            .lock()
            .map_err(|_| anyhow!("param values lock poisoned"))?;
        if let Some(current) = values.get(key) {
            let _ = tx.send(ParamEvent {
                key: key.to_string(),
                value: current.clone(),
            });
        }
        drop(values);
        self.subscribers
            .lock()
            .map_err(|_| anyhow!("param subscribers lock poisoned"))?
            .entry(key.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }

    /// Ingest one observed value. Entry point for the store link, and for
    /// tests standing in for it.
    pub fn apply(&self, key: &str, value: ParamValue) {
        if key == self.threshold_key {
            if let ParamValue::Number(n) = value {
                self.threshold_bits
                    .store(n.clamp(0.0, 255.0).to_bits(), Ordering::Release);
            }
        }
        match self.values.lock() {
            Ok(mut values) => {
                values.insert(key.to_string(), value.clone());
            }
            Err(_) => {
                log::error!("param values lock poisoned, dropping update for '{}'", key);
                return;
            }
        }

        let Ok(mut subscribers) = self.subscribers.lock() else {
            log::error!(
                "param subscribers lock poisoned, dropping update for '{}'",
                key
            );
            return;
        };
        if let Some(senders) = subscribers.get_mut(key) {
            // Drop senders whose receiver has gone away.
            senders.retain(|tx| {
                tx.send(ParamEvent {
                    key: key.to_string(),
                    value: value.clone(),
                })
                .is_ok()
            });
        }
    }

    /// Attach the outbound link. Called once when the store link connects.
    pub fn attach_publisher(&self, publisher: Box<dyn ParamPublisher>) -> Result<()> {
        *self
            .publisher
            .lock()
            .map_err(|_| anyhow!("param publisher lock poisoned"))? = Some(publisher);
        Ok(())
    }

    /// Publish startup defaults. Only the authority seeds the store; a
    /// follower waits to observe whatever the authority has.
    pub fn publish_defaults(&self) -> Result<()> {
        if self.role != StoreRole::Authority {
            return Ok(());
        }
        log::info!(
            "publishing default threshold {} to '{}'",
            DEFAULT_THRESHOLD,
            self.threshold_key
        );
        self.set_threshold(DEFAULT_THRESHOLD)
    }

    fn forward(&self, key: &str, value: &ParamValue) -> Result<()> {
        let publisher = self
            .publisher
            .lock()
            .map_err(|_| anyhow!("param publisher lock poisoned"))?;
        if let Some(publisher) = publisher.as_ref() {
            publisher.publish(key, value)?;
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
