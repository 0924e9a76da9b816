use serde::{Deserialize, Serialize};

use crate::constants::{FLIPPER_NEUTRAL, MOTOR_NEUTRAL};

/// Telemetry registers the rover answers parameter requests for.
///
/// The discriminant is the identifier byte sent in a request frame and echoed
/// back in the matching response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Param {
    TotalCurrent = 0,
    LeftMotorRpm = 2,
    RightMotorRpm = 4,
    FlipperPositionPot1 = 6,
    FlipperPositionPot2 = 8,
    LeftMotorCurrent = 10,
    RightMotorCurrent = 12,
    LeftEncoderCount = 14,
    RightEncoderCount = 16,
    ChargerState = 18,
    FlipperMotorCurrent = 20,
    BatteryVoltageA = 24,
    BatteryVoltageB = 26,
    LeftEncoderInterval = 28,
    RightEncoderInterval = 30,
    FlipperEncoderInterval = 32,
    BatteryStateOfChargeA = 34,
    BatteryStateOfChargeB = 36,
    BatteryCombinedCurrent = 38,
    FirmwareBuild = 40,
    BatteryCurrentA = 42,
    BatteryCurrentB = 44,
    FlipperAngle = 46,
    LeftMotorTemperature = 48,
    RightMotorTemperature = 50,
    BatteryStatusA = 52,
    BatteryStatusB = 54,
    BatteryModeA = 56,
    BatteryModeB = 58,
    BatteryTemperatureA = 60,
    BatteryTemperatureB = 62,
}

impl Param {
    /// Every parameter in the catalog, in identifier order.
    pub const ALL: [Param; 31] = [
        Param::TotalCurrent,
        Param::LeftMotorRpm,
        Param::RightMotorRpm,
        Param::FlipperPositionPot1,
        Param::FlipperPositionPot2,
        Param::LeftMotorCurrent,
        Param::RightMotorCurrent,
        Param::LeftEncoderCount,
        Param::RightEncoderCount,
        Param::ChargerState,
        Param::FlipperMotorCurrent,
        Param::BatteryVoltageA,
        Param::BatteryVoltageB,
        Param::LeftEncoderInterval,
        Param::RightEncoderInterval,
        Param::FlipperEncoderInterval,
        Param::BatteryStateOfChargeA,
        Param::BatteryStateOfChargeB,
        Param::BatteryCombinedCurrent,
        Param::FirmwareBuild,
        Param::BatteryCurrentA,
        Param::BatteryCurrentB,
        Param::FlipperAngle,
        Param::LeftMotorTemperature,
        Param::RightMotorTemperature,
        Param::BatteryStatusA,
        Param::BatteryStatusB,
        Param::BatteryModeA,
        Param::BatteryModeB,
        Param::BatteryTemperatureA,
        Param::BatteryTemperatureB,
    ];

    /// Identifier byte on the wire
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Human readable register name
    pub fn label(self) -> &'static str {
        match self {
            Param::TotalCurrent => "Total current",
            Param::LeftMotorRpm => "Left motor RPM",
            Param::RightMotorRpm => "Right motor RPM",
            Param::FlipperPositionPot1 => "Flipper position (pot 1)",
            Param::FlipperPositionPot2 => "Flipper position (pot 2)",
            Param::LeftMotorCurrent => "Left motor current",
            Param::RightMotorCurrent => "Right motor current",
            Param::LeftEncoderCount => "Left encoder count",
            Param::RightEncoderCount => "Right encoder count",
            Param::ChargerState => "Charger state",
            Param::FlipperMotorCurrent => "Flipper motor current",
            Param::BatteryVoltageA => "Battery A voltage",
            Param::BatteryVoltageB => "Battery B voltage",
            Param::LeftEncoderInterval => "Left encoder interval",
            Param::RightEncoderInterval => "Right encoder interval",
            Param::FlipperEncoderInterval => "Flipper encoder interval",
            Param::BatteryStateOfChargeA => "Battery A state of charge",
            Param::BatteryStateOfChargeB => "Battery B state of charge",
            Param::BatteryCombinedCurrent => "Battery A+B current",
            Param::FirmwareBuild => "Firmware build number",
            Param::BatteryCurrentA => "Battery A current",
            Param::BatteryCurrentB => "Battery B current",
            Param::FlipperAngle => "Flipper angle",
            Param::LeftMotorTemperature => "Left motor temperature",
            Param::RightMotorTemperature => "Right motor temperature",
            Param::BatteryStatusA => "Battery A status",
            Param::BatteryStatusB => "Battery B status",
            Param::BatteryModeA => "Battery A mode",
            Param::BatteryModeB => "Battery B mode",
            Param::BatteryTemperatureA => "Battery A temperature",
            Param::BatteryTemperatureB => "Battery B temperature",
        }
    }
}

impl TryFrom<u8> for Param {
    type Error = u8;

    /// Returns the unrecognised byte back on failure.
    fn try_from(id: u8) -> std::result::Result<Self, Self::Error> {
        Param::ALL
            .iter()
            .copied()
            .find(|param| param.id() == id)
            .ok_or(id)
    }
}

/// Polling cadence a report was assembled for.
///
/// `Aggregate` is not a cadence: it tags the cumulative last-known-value report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PollingTier {
    Fast,
    Medium,
    Slow,
    Aggregate,
}

const FAST_PARAMS: &[Param] = &[
    Param::LeftEncoderInterval,
    Param::RightEncoderInterval,
    Param::FlipperEncoderInterval,
    Param::LeftMotorCurrent,
    Param::RightMotorCurrent,
];

const MEDIUM_PARAMS: &[Param] = &[
    Param::TotalCurrent,
    Param::BatteryCurrentA,
    Param::BatteryCurrentB,
    Param::LeftMotorTemperature,
    Param::RightMotorTemperature,
    Param::FlipperAngle,
    Param::FlipperMotorCurrent,
];

const SLOW_PARAMS: &[Param] = &[
    Param::BatteryVoltageA,
    Param::BatteryVoltageB,
    Param::BatteryStateOfChargeA,
    Param::BatteryStateOfChargeB,
    Param::BatteryStatusA,
    Param::BatteryStatusB,
    Param::BatteryModeA,
    Param::BatteryModeB,
    Param::BatteryTemperatureA,
    Param::BatteryTemperatureB,
    Param::ChargerState,
    Param::FirmwareBuild,
];

impl PollingTier {
    /// Parameters this tier adds on top of the narrower tiers.
    pub fn own_params(self) -> &'static [Param] {
        match self {
            PollingTier::Fast => FAST_PARAMS,
            PollingTier::Medium => MEDIUM_PARAMS,
            PollingTier::Slow => SLOW_PARAMS,
            PollingTier::Aggregate => &[],
        }
    }

    /// Tiers whose parameters this tier polls, narrowest first, including itself.
    pub fn subsumed(self) -> &'static [PollingTier] {
        match self {
            PollingTier::Fast => &[PollingTier::Fast],
            PollingTier::Medium => &[PollingTier::Fast, PollingTier::Medium],
            PollingTier::Slow => &[PollingTier::Fast, PollingTier::Medium, PollingTier::Slow],
            PollingTier::Aggregate => &[],
        }
    }

    /// Full request list for a report of this tier.
    ///
    /// Concatenates the subsumed tiers' parameters narrowest first; an identifier
    /// listed by more than one tier is kept only at its first position.
    pub fn params(self) -> Vec<Param> {
        let mut params: Vec<Param> = Vec::new();
        for tier in self.subsumed() {
            for &param in tier.own_params() {
                if !params.contains(&param) {
                    params.push(param);
                }
            }
        }
        params
    }
}

/// Decoded inbound response frame.
///
/// `id` is kept as the raw byte so frames for identifiers outside the catalog
/// still reach observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub id: u8,
    pub value: u16,
    /// Unvalidated trailer byte
    pub trailer: u8,
}

impl Frame {
    /// Catalog entry for this frame's identifier, if there is one.
    pub fn param(&self) -> Option<Param> {
        Param::try_from(self.id).ok()
    }
}

/// Motion bytes embedded in every outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorState {
    pub left: u8,
    pub right: u8,
    pub flipper: u8,
}

impl MotorState {
    /// Throttles with the flipper held still
    pub fn new(left: u8, right: u8) -> Self {
        MotorState {
            left,
            right,
            flipper: FLIPPER_NEUTRAL,
        }
    }
}

impl Default for MotorState {
    fn default() -> Self {
        MotorState {
            left: MOTOR_NEUTRAL,
            right: MOTOR_NEUTRAL,
            flipper: FLIPPER_NEUTRAL,
        }
    }
}
