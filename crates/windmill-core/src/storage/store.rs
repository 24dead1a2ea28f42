//! Reading store implementation.

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sled::{Db, IVec, Tree};

use super::key::ReadingKey;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::reading::Reading;

/// Tree name for readings.
const READINGS_TREE: &str = "readings";

/// Tree name for per-device last-seen times.
const DEVICES_TREE: &str = "devices";

/// A reading as persisted, with its storage id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReading {
    pub id: u64,
    #[serde(flatten)]
    pub event: Event,
}

/// A device that has reported at least one reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSummary {
    pub device_id: String,
    pub last_seen: DateTime<Utc>,
}

/// Append-only store of device readings.
#[derive(Clone)]
pub struct ReadingStore {
    db: Db,
    readings: Tree,
    devices: Tree,
}

impl ReadingStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Open a store that is deleted when dropped.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    /// Use an already opened sled database.
    pub fn from_db(db: Db) -> Result<Self> {
        let readings = db.open_tree(READINGS_TREE)?;
        let devices = db.open_tree(DEVICES_TREE)?;
        Ok(Self {
            db,
            readings,
            devices,
        })
    }

    /// Persist a reading and wait until it is durable.
    pub async fn insert(&self, reading: &Reading) -> Result<StoredReading> {
        let stored = self.write(reading)?;
        self.flush().await?;
        Ok(stored)
    }

    /// Persist several readings with a single flush.
    pub async fn insert_many(&self, readings: &[Reading]) -> Result<Vec<StoredReading>> {
        let stored = readings
            .iter()
            .map(|reading| self.write(reading))
            .collect::<Result<Vec<_>>>()?;
        self.flush().await?;
        Ok(stored)
    }

    fn write(&self, reading: &Reading) -> Result<StoredReading> {
        let id = self.db.generate_id()?;
        let event = reading.to_event();
        let observed_ms = event.observed_millis();

        let key = ReadingKey::new(reading.device_id.as_str(), observed_ms, id);
        let stored = StoredReading { id, event };
        self.readings.insert(key.encode(), serde_json::to_vec(&stored)?)?;
        self.touch_device(&reading.device_id, observed_ms)?;

        Ok(stored)
    }

    /// Record `observed_ms` as the device's last-seen time unless a newer
    /// reading is already known.
    fn touch_device(&self, device_id: &str, observed_ms: i64) -> Result<()> {
        self.devices.fetch_and_update(device_id.as_bytes(), |old| {
            let newer = old
                .and_then(decode_millis)
                .map_or(true, |previous| observed_ms > previous);
            if newer {
                Some(observed_ms.to_be_bytes().to_vec())
            } else {
                old.map(|bytes| bytes.to_vec())
            }
        })?;
        Ok(())
    }

    /// Flush pending writes to disk.
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }

    /// Most recent reading of a device by observation time.
    pub fn latest(&self, device_id: &str) -> Result<Option<StoredReading>> {
        match self.readings.scan_prefix(ReadingKey::prefix(device_id)).next_back() {
            Some(entry) => {
                let (_, value) = entry?;
                Ok(Some(decode_reading(&value)?))
            }
            None => Ok(None),
        }
    }

    /// The newest `limit` readings of a device observed within
    /// `[from_ms, to_ms]`, oldest first. Open bounds are unbounded.
    pub fn history(
        &self,
        device_id: &str,
        from_ms: Option<i64>,
        to_ms: Option<i64>,
        limit: usize,
    ) -> Result<Vec<StoredReading>> {
        let from_ms = from_ms.unwrap_or(i64::MIN);
        let to_ms = to_ms.unwrap_or(i64::MAX);
        if from_ms > to_ms || limit == 0 {
            return Ok(Vec::new());
        }

        let start = ReadingKey::lower_bound(device_id, from_ms);
        let end = ReadingKey::upper_bound(device_id, to_ms);

        let mut rows = Vec::with_capacity(limit.min(1024));
        for entry in self.readings.range(start..=end).rev().take(limit) {
            let (_, value) = entry?;
            rows.push(decode_reading(&value)?);
        }
        rows.reverse();

        Ok(rows)
    }

    /// Every device that has reported, ordered by id.
    pub fn devices(&self) -> Result<Vec<DeviceSummary>> {
        let mut devices = Vec::new();
        for entry in self.devices.iter() {
            let (key, value) = entry?;
            let device_id = String::from_utf8_lossy(&key).into_owned();
            let last_seen = decode_millis(&value)
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .ok_or_else(|| {
                    Error::InvalidReading(format!("corrupt last-seen time for device {}", device_id))
                })?;
            devices.push(DeviceSummary {
                device_id,
                last_seen,
            });
        }
        Ok(devices)
    }

    /// Number of stored readings.
    pub fn count(&self) -> usize {
        self.readings.len()
    }

    /// Delete every reading. Returns how many were removed.
    pub async fn clear(&self) -> Result<usize> {
        let count = self.readings.len();
        self.readings.clear()?;
        self.devices.clear()?;
        self.flush().await?;
        Ok(count)
    }
}

fn decode_reading(value: &IVec) -> Result<StoredReading> {
    Ok(serde_json::from_slice(value)?)
}

fn decode_millis(bytes: &[u8]) -> Option<i64> {
    let bytes: [u8; 8] = bytes.try_into().ok()?;
    Some(i64::from_be_bytes(bytes))
}
