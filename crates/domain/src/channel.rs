//! Sub-channels of the cube service.
//!
//! The cube exposes a single GATT service whose characteristics each map to
//! one functional [`Domain`]. The mapping is a fixed lookup table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// UUID of the cube's GATT service.
pub const SERVICE_UUID: uuid::Uuid = uuid::Uuid::from_u128(0x10b2_0100_5b3b_4571_9508_cf3e_fcd7_bbae);

/// Functional domain served by one sub-channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Domain {
    MotionId,
    Motor,
    Light,
    Sound,
    Sensor,
    Button,
    Battery,
    Configuration,
}

/// Characteristic UUID → domain lookup table.
const CHANNEL_TABLE: [(uuid::Uuid, Domain); 8] = [
    (
        uuid::Uuid::from_u128(0x10b2_0101_5b3b_4571_9508_cf3e_fcd7_bbae),
        Domain::MotionId,
    ),
    (
        uuid::Uuid::from_u128(0x10b2_0102_5b3b_4571_9508_cf3e_fcd7_bbae),
        Domain::Motor,
    ),
    (
        uuid::Uuid::from_u128(0x10b2_0103_5b3b_4571_9508_cf3e_fcd7_bbae),
        Domain::Light,
    ),
    (
        uuid::Uuid::from_u128(0x10b2_0104_5b3b_4571_9508_cf3e_fcd7_bbae),
        Domain::Sound,
    ),
    (
        uuid::Uuid::from_u128(0x10b2_0106_5b3b_4571_9508_cf3e_fcd7_bbae),
        Domain::Sensor,
    ),
    (
        uuid::Uuid::from_u128(0x10b2_0107_5b3b_4571_9508_cf3e_fcd7_bbae),
        Domain::Button,
    ),
    (
        uuid::Uuid::from_u128(0x10b2_0108_5b3b_4571_9508_cf3e_fcd7_bbae),
        Domain::Battery,
    ),
    (
        uuid::Uuid::from_u128(0x10b2_01ff_5b3b_4571_9508_cf3e_fcd7_bbae),
        Domain::Configuration,
    ),
];

impl Domain {
    /// Every domain, in table order.
    pub const ALL: [Self; 8] = [
        Self::MotionId,
        Self::Motor,
        Self::Light,
        Self::Sound,
        Self::Sensor,
        Self::Button,
        Self::Battery,
        Self::Configuration,
    ];

    /// Resolve a characteristic UUID. Returns `None` for UUIDs that do not
    /// belong to the cube service.
    #[must_use]
    pub fn from_uuid(uuid: uuid::Uuid) -> Option<Self> {
        CHANNEL_TABLE
            .iter()
            .find(|(candidate, _)| *candidate == uuid)
            .map(|(_, domain)| *domain)
    }

    /// Characteristic UUID of this domain.
    #[must_use]
    pub fn uuid(self) -> uuid::Uuid {
        CHANNEL_TABLE
            .iter()
            .find(|(_, domain)| *domain == self)
            .map(|(uuid, _)| *uuid)
            .unwrap_or(SERVICE_UUID)
    }

    /// Short kebab-case name used in logs and config.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MotionId => "motion-id",
            Self::Motor => "motor",
            Self::Light => "light",
            Self::Sound => "sound",
            Self::Sensor => "sensor",
            Self::Button => "button",
            Self::Battery => "battery",
            Self::Configuration => "configuration",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_resolve_every_domain_from_its_uuid() {
        for domain in Domain::ALL {
            assert_eq!(Domain::from_uuid(domain.uuid()), Some(domain));
        }
    }

    #[test]
    fn should_ignore_foreign_uuid() {
        let battery_service = uuid::Uuid::from_u128(0x0000_2a19_0000_1000_8000_0080_5f9b_34fb);
        assert_eq!(Domain::from_uuid(battery_service), None);
        assert_eq!(Domain::from_uuid(SERVICE_UUID), None);
    }

    #[test]
    fn should_have_correct_characteristic_uuids() {
        assert!(Domain::Motor.uuid().to_string().starts_with("10b20102"));
        assert!(
            Domain::Configuration
                .uuid()
                .to_string()
                .starts_with("10b201ff")
        );
    }

    #[test]
    fn should_display_kebab_case_name() {
        assert_eq!(Domain::MotionId.to_string(), "motion-id");
        let json = serde_json::to_string(&Domain::MotionId).unwrap();
        assert_eq!(json, "\"motion-id\"");
    }
}
