use crate::converter::{ConverterOptions, JointSpace};
use crate::lifecycle::IdChangePolicy;
use crate::pose::Pose;
use derive_more::From;
use glam::{Quat, Vec3};
use log::debug;
use serde::Deserialize;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::Path;

pub const DEFAULT_LEAP_CONTROLLER_OFFSET: [f32; 3] = [0.0, -0.2, 0.2];
pub const DEFAULT_DEVICE_OFFSET_Y_AXIS: f32 = 0.0;
pub const DEFAULT_DEVICE_OFFSET_Z_AXIS: f32 = 0.12;
/// Degrees.
pub const DEFAULT_DEVICE_TILT_X_AXIS: f32 = 5.0;
pub const DEFAULT_MAX_RECONNECTION_ATTEMPTS: u32 = 5;
/// Frames.
pub const DEFAULT_RECONNECTION_INTERVAL: u32 = 180;

pub const DEVICE_OFFSET_RANGE: RangeInclusive<f32> = -0.5..=0.5;
pub const DEVICE_TILT_RANGE: RangeInclusive<f32> = -90.0..=90.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    /// Sensor lying on a desk, pointing upwards.
    #[default]
    Desktop,
    /// Sensor mounted on a headset, pointing forwards.
    HeadsetMounted,
}

/// Only used with [`OperationMode::HeadsetMounted`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOffsetMode {
    #[default]
    Default,
    Manual,
}

/// Lets the update and physics passes share one sampled frame instead of sampling twice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameOptimizationMode {
    #[default]
    None,
    ReuseUpdateForPhysics,
    ReusePhysicsForUpdate,
}

/// Mount position of the sensor, resolved from the profile's mode switches.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DeviceOffset {
    /// Translation from the camera, so desk tracked hands show up in front of it.
    Desktop(Vec3),
    HeadsetDefault,
    HeadsetManual {
        y: f32,
        z: f32,
        /// Degrees.
        tilt_x: f32,
    },
}

impl DeviceOffset {
    pub fn pose(&self) -> Pose {
        match *self {
            DeviceOffset::Desktop(offset) => Pose::from_translation(offset),
            DeviceOffset::HeadsetDefault => headset_pose(
                DEFAULT_DEVICE_OFFSET_Y_AXIS,
                DEFAULT_DEVICE_OFFSET_Z_AXIS,
                DEFAULT_DEVICE_TILT_X_AXIS,
            ),
            DeviceOffset::HeadsetManual { y, z, tilt_x } => headset_pose(y, z, tilt_x),
        }
    }
}

fn headset_pose(y: f32, z: f32, tilt_x: f32) -> Pose {
    Pose::new(
        Vec3::new(0.0, y, z),
        Quat::from_rotation_x(tilt_x.to_radians()),
    )
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderProfile {
    pub operation_mode: OperationMode,
    /// Metres. Only applies to [`OperationMode::Desktop`].
    pub leap_controller_offset: [f32; 3],
    pub device_offset_mode: DeviceOffsetMode,
    pub device_offset_y_axis: f32,
    pub device_offset_z_axis: f32,
    pub device_tilt_x_axis: f32,
    pub frame_optimization_mode: FrameOptimizationMode,
    pub max_reconnection_attempts: u32,
    pub reconnection_interval: u32,
    pub joint_space: JointSpace,
    pub derive_pointer_pose: bool,
    pub id_change_policy: IdChangePolicy,
}

impl Default for ProviderProfile {
    fn default() -> Self {
        Self {
            operation_mode: OperationMode::default(),
            leap_controller_offset: DEFAULT_LEAP_CONTROLLER_OFFSET,
            device_offset_mode: DeviceOffsetMode::default(),
            device_offset_y_axis: DEFAULT_DEVICE_OFFSET_Y_AXIS,
            device_offset_z_axis: DEFAULT_DEVICE_OFFSET_Z_AXIS,
            device_tilt_x_axis: DEFAULT_DEVICE_TILT_X_AXIS,
            frame_optimization_mode: FrameOptimizationMode::default(),
            max_reconnection_attempts: DEFAULT_MAX_RECONNECTION_ATTEMPTS,
            reconnection_interval: DEFAULT_RECONNECTION_INTERVAL,
            joint_space: JointSpace::default(),
            derive_pointer_pose: true,
            id_change_policy: IdChangePolicy::default(),
        }
    }
}

#[derive(Debug, From)]
pub enum ProfileError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    #[from(skip)]
    OutOfRange {
        field: &'static str,
        value: f32,
        range: RangeInclusive<f32>,
    },
    #[from(skip)]
    NotFinite { field: &'static str },
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileError::Io(e) => write!(f, "failed to read profile: {e}"),
            ProfileError::Parse(e) => write!(f, "failed to parse profile: {e}"),
            ProfileError::OutOfRange {
                field,
                value,
                range,
            } => write!(
                f,
                "{field} is {value}, expected a value in [{}, {}]",
                range.start(),
                range.end()
            ),
            ProfileError::NotFinite { field } => write!(f, "{field} must be finite"),
        }
    }
}

impl std::error::Error for ProfileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProfileError::Io(e) => Some(e),
            ProfileError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl ProviderProfile {
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        debug!("Loading provider profile from {}", path.display());
        let data = std::fs::read(path)?;
        let profile: Self = serde_json::from_slice(&data)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn from_json(json: &str) -> Result<Self, ProfileError> {
        let profile: Self = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        if !Vec3::from_array(self.leap_controller_offset).is_finite() {
            return Err(ProfileError::NotFinite {
                field: "leap_controller_offset",
            });
        }

        for (field, value, range) in [
            (
                "device_offset_y_axis",
                self.device_offset_y_axis,
                DEVICE_OFFSET_RANGE,
            ),
            (
                "device_offset_z_axis",
                self.device_offset_z_axis,
                DEVICE_OFFSET_RANGE,
            ),
            (
                "device_tilt_x_axis",
                self.device_tilt_x_axis,
                DEVICE_TILT_RANGE,
            ),
        ] {
            if !range.contains(&value) {
                return Err(ProfileError::OutOfRange {
                    field,
                    value,
                    range,
                });
            }
        }

        Ok(())
    }

    pub fn device_offset(&self) -> DeviceOffset {
        match (self.operation_mode, self.device_offset_mode) {
            (OperationMode::Desktop, _) => {
                DeviceOffset::Desktop(Vec3::from_array(self.leap_controller_offset))
            }
            (OperationMode::HeadsetMounted, DeviceOffsetMode::Default) => {
                DeviceOffset::HeadsetDefault
            }
            (OperationMode::HeadsetMounted, DeviceOffsetMode::Manual) => {
                DeviceOffset::HeadsetManual {
                    y: self.device_offset_y_axis,
                    z: self.device_offset_z_axis,
                    tilt_x: self.device_tilt_x_axis,
                }
            }
        }
    }

    pub fn converter_options(&self) -> ConverterOptions {
        ConverterOptions {
            derive_pointer_pose: self.derive_pointer_pose,
        }
    }
}
