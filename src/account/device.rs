use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved identifier of the primary (master) device
pub const PRIMARY_DEVICE_ID: u64 = 1;

/// A single device registered to an account
///
/// Push credentials are stored flat: a device has at most one of a GCM or an
/// APN registration, plus a flag for devices that poll instead of receiving
/// pushes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Device identifier; `PRIMARY_DEVICE_ID` is reserved for the primary
    pub id: u64,

    /// Most recent activity time for this device (epoch ms)
    pub last_seen: i64,

    /// Whether the device is currently enabled
    pub enabled: bool,

    /// GCM/FCM registration id, if the device receives Android pushes
    #[serde(default)]
    pub gcm_id: Option<String>,

    /// APN token, if the device receives Apple pushes
    #[serde(default)]
    pub apn_id: Option<String>,

    /// Whether the device fetches messages by polling rather than push
    #[serde(default)]
    pub fetches_messages: bool,
}

impl Device {
    /// Returns true if this is the primary device
    pub fn is_master(&self) -> bool {
        self.id == PRIMARY_DEVICE_ID
    }

    /// Removes every push delivery path from this device
    ///
    /// After this call no further push delivery occurs: both registration ids
    /// are cleared and the polling flag is dropped. Calling it on an already
    /// cleared device is a no-op.
    pub fn clear_push_credentials(&mut self) {
        self.gcm_id = None;
        self.apn_id = None;
        self.fetches_messages = false;
    }

    /// Returns true if the device has any push delivery path left
    pub fn has_push_channel(&self) -> bool {
        self.gcm_id.is_some() || self.apn_id.is_some() || self.fetches_messages
    }
}

/// Platform of an account, derived from its primary device push channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Android,
    Ios,
    Other,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Android => write!(f, "android"),
            Self::Ios => write!(f, "ios"),
            Self::Other => write!(f, "other"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_device() -> Device {
        Device {
            id: PRIMARY_DEVICE_ID,
            last_seen: 0,
            enabled: true,
            gcm_id: Some("gcm-registration".to_string()),
            apn_id: Some("apn-token".to_string()),
            fetches_messages: true,
        }
    }

    #[test]
    fn test_clear_push_credentials() {
        let mut device = push_device();
        assert!(device.has_push_channel());

        device.clear_push_credentials();

        assert_eq!(device.gcm_id, None);
        assert_eq!(device.apn_id, None);
        assert!(!device.fetches_messages);
        assert!(!device.has_push_channel());
    }

    #[test]
    fn test_clear_push_credentials_idempotent() {
        let mut device = push_device();
        device.clear_push_credentials();
        let cleared = device.clone();

        device.clear_push_credentials();

        assert_eq!(device.gcm_id, cleared.gcm_id);
        assert_eq!(device.apn_id, cleared.apn_id);
        assert_eq!(device.fetches_messages, cleared.fetches_messages);
    }

    #[test]
    fn test_serde_roundtrip_with_missing_optional_fields() {
        // Older records may lack the push fields entirely
        let json = r#"{"id": 1, "last_seen": 42, "enabled": true}"#;
        let device: Device = serde_json::from_str(json).unwrap();

        assert_eq!(device.id, PRIMARY_DEVICE_ID);
        assert_eq!(device.last_seen, 42);
        assert!(device.gcm_id.is_none());
        assert!(!device.fetches_messages);
    }

    #[test]
    fn test_platform_display() {
        assert_eq!(Platform::Android.to_string(), "android");
        assert_eq!(Platform::Ios.to_string(), "ios");
        assert_eq!(Platform::Other.to_string(), "other");
    }
}
