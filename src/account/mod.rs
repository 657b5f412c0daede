//! Account data model
//!
//! This module defines the slice of the account record the crawler and its
//! listeners operate on: the stable identifier used as the sweep cursor, the
//! canonical phone number used by the directory queue, and the device set
//! that drives the expiry policy.

mod device;

pub use device::{Device, Platform, PRIMARY_DEVICE_ID};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An account as seen by the crawler
///
/// The crawler treats accounts as opaque except for the identifier (which is
/// orderable and doubles as the cursor), the phone number, and the devices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Stable unique identifier; its string form orders the sweep
    pub uuid: Uuid,

    /// Canonical external identity (E.164) used by the directory queue
    pub number: String,

    /// All devices registered to this account
    pub devices: Vec<Device>,
}

impl Account {
    /// Creates a new account with the given devices
    pub fn new(uuid: Uuid, number: impl Into<String>, devices: Vec<Device>) -> Self {
        Self {
            uuid,
            number: number.into(),
            devices,
        }
    }

    /// Returns the primary device, if present
    ///
    /// The primary device anchors the account's identity. It may be absent
    /// during partial states (mid-registration, interrupted device removal).
    pub fn master_device(&self) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == PRIMARY_DEVICE_ID)
    }

    /// Returns the primary device mutably, if present
    pub fn master_device_mut(&mut self) -> Option<&mut Device> {
        self.devices.iter_mut().find(|d| d.id == PRIMARY_DEVICE_ID)
    }

    /// Returns the most recent activity time across all devices (ms)
    ///
    /// Returns None when the account has no devices at all.
    pub fn last_seen(&self) -> Option<i64> {
        self.devices.iter().map(|d| d.last_seen).max()
    }

    /// Returns true if the account is visible to other users
    ///
    /// An account is enabled iff its primary device exists and is enabled.
    pub fn is_enabled(&self) -> bool {
        self.master_device().map(|d| d.enabled).unwrap_or(false)
    }

    /// Classifies the account's platform from its primary device push channel
    pub fn platform(&self) -> Platform {
        match self.master_device() {
            Some(d) if d.gcm_id.is_some() => Platform::Android,
            Some(d) if d.apn_id.is_some() => Platform::Ios,
            _ => Platform::Other,
        }
    }
}
