//! Sensor and label naming
//!
//! Names follow the Waymo open dataset enums. Parsing is case sensitive and
//! expects the canonical upper-case spelling used in asset file names and in
//! the frame descriptor.

named_enum!(
    /// Lidar units mounted on the vehicle
    LidarName {
        Top => "TOP",
        Front => "FRONT",
        SideLeft => "SIDE_LEFT",
        SideRight => "SIDE_RIGHT",
        Rear => "REAR",
    }
);

named_enum!(
    /// Cameras mounted on the vehicle
    CameraName {
        Front => "FRONT",
        FrontLeft => "FRONT_LEFT",
        FrontRight => "FRONT_RIGHT",
        SideLeft => "SIDE_LEFT",
        SideRight => "SIDE_RIGHT",
    }
);

named_enum!(
    /// Semantic class of a 3D box label
    LabelType {
        Unknown => "UNKNOWN",
        Vehicle => "VEHICLE",
        Pedestrian => "PEDESTRIAN",
        Sign => "SIGN",
        Cyclist => "CYCLIST",
    }
);

named_enum!(
    /// Toggleable helper overlays
    HelperName {
        Axes => "AXES",
        Ground => "GROUND",
    }
);

impl LabelType {
    /// Classify a descriptor type string such as `TYPE_VEHICLE`.
    ///
    /// The `TYPE_` prefix is optional. Anything unrecognized maps to
    /// [`LabelType::Unknown`].
    pub fn classify(type_string: &str) -> Self {
        let trimmed = type_string.trim();
        let name = trimmed.strip_prefix("TYPE_").unwrap_or(trimmed);
        name.parse().unwrap_or(LabelType::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lidar_names_round_trip_through_strings() {
        for lidar in LidarName::ALL {
            assert_eq!(lidar.as_str().parse::<LidarName>().unwrap(), *lidar);
        }
        assert!("top".parse::<LidarName>().is_err());
    }

    #[test]
    fn test_camera_name_display() {
        assert_eq!(CameraName::FrontLeft.to_string(), "FRONT_LEFT");
        assert_eq!(CameraName::ALL.len(), 5);
    }

    #[test]
    fn test_label_type_classification_is_fail_soft() {
        assert_eq!(LabelType::classify("TYPE_VEHICLE"), LabelType::Vehicle);
        assert_eq!(LabelType::classify("TYPE_CYCLIST"), LabelType::Cyclist);
        assert_eq!(LabelType::classify("PEDESTRIAN"), LabelType::Pedestrian);
        assert_eq!(LabelType::classify("TYPE_SPACESHIP"), LabelType::Unknown);
        assert_eq!(LabelType::classify(""), LabelType::Unknown);
    }

    #[test]
    fn test_serde_uses_canonical_names() {
        let json = serde_json::to_string(&CameraName::SideRight).unwrap();
        assert_eq!(json, "\"SIDE_RIGHT\"");
        let lidar: LidarName = serde_json::from_str("\"REAR\"").unwrap();
        assert_eq!(lidar, LidarName::Rear);
    }
}
