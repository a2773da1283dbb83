//! In-memory overlay and settings records
//!
//! The overlay store is also the pipeline's [`OverlayProvider`]: viewer loops
//! take snapshots under a read lock while the HTTP API edits records under
//! the write lock. Records keep insertion order, which is paint order.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{FramecastError, Result};
use crate::overlay::{OverlayDescriptor, OverlayKind, OverlayProvider};

/// Fields every overlay document must carry
pub const REQUIRED_OVERLAY_FIELDS: [&str; 6] = ["type", "content", "x", "y", "width", "height"];

/// A stored overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayRecord {
    /// Record id
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// The overlay itself
    #[serde(flatten)]
    pub overlay: OverlayDescriptor,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

/// Validate an overlay document and convert it to a descriptor
///
/// Checks required fields in order, then the type, then field types.
pub fn validate_overlay(body: &Value) -> Result<OverlayDescriptor> {
    let Some(fields) = body.as_object() else {
        return Err(FramecastError::validation("Overlay must be a JSON object"));
    };

    for field in REQUIRED_OVERLAY_FIELDS {
        if !fields.contains_key(field) {
            return Err(FramecastError::validation(format!(
                "Missing required field: {}",
                field
            )));
        }
    }

    let kind_ok = fields
        .get("type")
        .and_then(Value::as_str)
        .and_then(OverlayKind::parse)
        .is_some();
    if !kind_ok {
        return Err(FramecastError::validation("Type must be 'text' or 'logo'"));
    }

    serde_json::from_value(body.clone())
        .map_err(|e| FramecastError::validation(format!("Invalid overlay: {}", e)))
}

fn overlay_not_found() -> FramecastError {
    FramecastError::NotFound("Overlay".to_string())
}

/// Parse a record id; malformed ids are simply not found
fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|_| overlay_not_found())
}

/// Overlay records in paint order
#[derive(Debug, Default)]
pub struct OverlayStore {
    records: RwLock<Vec<OverlayRecord>>,
}

impl OverlayStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in paint order
    pub fn list(&self) -> Vec<OverlayRecord> {
        self.records.read().clone()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Get one record
    pub fn get(&self, id: &str) -> Result<OverlayRecord> {
        let id = parse_id(id)?;
        self.records
            .read()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(overlay_not_found)
    }

    /// Validate and append a new overlay
    pub fn create(&self, body: &Value) -> Result<OverlayRecord> {
        let overlay = validate_overlay(body)?;
        let now = Utc::now();
        let record = OverlayRecord {
            id: Uuid::new_v4(),
            overlay,
            created_at: now,
            updated_at: now,
        };

        self.records.write().push(record.clone());
        info!("Created {} overlay {}", record.overlay.kind, record.id);
        Ok(record)
    }

    /// Validate a body and merge it over a stored overlay
    ///
    /// Optional fields the body leaves out (`fontSize`, `color`) keep their
    /// stored values. The id, position in paint order and creation time are
    /// kept too.
    pub fn update(&self, id: &str, body: &Value) -> Result<OverlayRecord> {
        validate_overlay(body)?;
        let id = parse_id(id)?;

        let mut records = self.records.write();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(overlay_not_found)?;

        let mut merged = match serde_json::to_value(&record.overlay) {
            Ok(Value::Object(fields)) => fields,
            _ => Map::new(),
        };
        if let Some(fields) = body.as_object() {
            merged.extend(fields.clone());
        }
        record.overlay = validate_overlay(&Value::Object(merged))?;
        record.updated_at = Utc::now();

        debug!("Updated overlay {}", id);
        Ok(record.clone())
    }

    /// Remove an overlay
    pub fn delete(&self, id: &str) -> Result<()> {
        let id = parse_id(id)?;
        let mut records = self.records.write();
        let index = records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(overlay_not_found)?;
        records.remove(index);

        info!("Deleted overlay {}", id);
        Ok(())
    }
}

impl OverlayProvider for OverlayStore {
    fn snapshot(&self) -> Vec<OverlayDescriptor> {
        self.records.read().iter().map(|r| r.overlay.clone()).collect()
    }
}

/// Settings returned before anything has been saved
pub fn default_settings() -> Map<String, Value> {
    let defaults = json!({
        "rtsp_url": "",
        "default_quality": "high",
        "auto_reconnect": true,
    });
    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Free-form application settings document
#[derive(Debug, Default)]
pub struct SettingsStore {
    stored: RwLock<Option<Map<String, Value>>>,
}

impl SettingsStore {
    /// Create an empty settings store
    pub fn new() -> Self {
        Self::default()
    }

    /// Current settings, with defaults under any saved values
    pub fn get(&self) -> Map<String, Value> {
        let mut settings = default_settings();
        if let Some(stored) = self.stored.read().as_ref() {
            settings.extend(stored.clone());
        }
        settings
    }

    /// Merge fields into the stored settings
    ///
    /// Returns the submitted fields plus the new `updated_at`.
    pub fn upsert(&self, body: &Value) -> Result<Map<String, Value>> {
        let Some(fields) = body.as_object() else {
            return Err(FramecastError::validation("Settings must be a JSON object"));
        };

        let mut update = fields.clone();
        update.insert("updated_at".to_string(), json!(Utc::now()));

        self.stored
            .write()
            .get_or_insert_with(Map::new)
            .extend(update.clone());

        debug!("Updated settings: {:?}", update.keys().collect::<Vec<_>>());
        Ok(update)
    }
}
