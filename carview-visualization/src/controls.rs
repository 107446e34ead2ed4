//! Keyboard control surface
//!
//! | key       | action                                   |
//! |-----------|------------------------------------------|
//! | `1`-`5`   | toggle lidar TOP, FRONT, SIDE_LEFT, SIDE_RIGHT, REAR |
//! | `v` `p` `s` `y` `u` | toggle vehicle, pedestrian, sign, cyclist, unknown labels |
//! | `a` `g`   | toggle axes, ground                      |
//! | `c`       | select the next camera                   |
//! | `x`       | clear the camera selection               |
//! | `r`       | reset the main view                      |

use crate::camera::OrbitControls;
use crate::session::ViewerSession;
use crate::visibility::ToggleKey;
use carview_core::{CameraName, HelperName, LabelType, LidarName};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Toggle(ToggleKey),
    NextCamera,
    ClearCamera,
    ResetView,
}

/// Action bound to a key, if any
pub fn key_action(key: &str) -> Option<KeyAction> {
    let action = match key.to_ascii_lowercase().as_str() {
        "1" => KeyAction::Toggle(ToggleKey::Lidar(LidarName::Top)),
        "2" => KeyAction::Toggle(ToggleKey::Lidar(LidarName::Front)),
        "3" => KeyAction::Toggle(ToggleKey::Lidar(LidarName::SideLeft)),
        "4" => KeyAction::Toggle(ToggleKey::Lidar(LidarName::SideRight)),
        "5" => KeyAction::Toggle(ToggleKey::Lidar(LidarName::Rear)),
        "v" => KeyAction::Toggle(ToggleKey::Label(LabelType::Vehicle)),
        "p" => KeyAction::Toggle(ToggleKey::Label(LabelType::Pedestrian)),
        "s" => KeyAction::Toggle(ToggleKey::Label(LabelType::Sign)),
        "y" => KeyAction::Toggle(ToggleKey::Label(LabelType::Cyclist)),
        "u" => KeyAction::Toggle(ToggleKey::Label(LabelType::Unknown)),
        "a" => KeyAction::Toggle(ToggleKey::Helper(HelperName::Axes)),
        "g" => KeyAction::Toggle(ToggleKey::Helper(HelperName::Ground)),
        "c" => KeyAction::NextCamera,
        "x" => KeyAction::ClearCamera,
        "r" => KeyAction::ResetView,
        _ => return None,
    };
    Some(action)
}

/// Camera after `current` in `cameras`; wraps around to no selection
pub fn next_camera(cameras: &[CameraName], current: Option<CameraName>) -> Option<CameraName> {
    match current.and_then(|c| cameras.iter().position(|&other| other == c)) {
        Some(index) => cameras.get(index + 1).copied(),
        None => cameras.first().copied(),
    }
}

pub fn apply_action(action: KeyAction, session: &mut ViewerSession, controls: &mut OrbitControls) {
    match action {
        KeyAction::Toggle(key) => {
            let enabled = !session.is_enabled(key);
            match key {
                ToggleKey::Lidar(lidar) => session.set_lidar(lidar, enabled),
                ToggleKey::Label(label_type) => session.set_label_type(label_type, enabled),
                ToggleKey::Helper(helper) => session.set_helper(helper, enabled),
            }
            tracing::info!(%key, enabled, "toggled");
        }
        KeyAction::NextCamera => {
            let mut cameras = session.available_cameras();
            if cameras.is_empty() {
                cameras = CameraName::ALL.to_vec();
            }
            let camera = next_camera(&cameras, session.selected_camera());
            tracing::info!(camera = ?camera, "camera selected");
            session.select_camera(camera);
        }
        KeyAction::ClearCamera => session.select_camera(None),
        KeyAction::ResetView => controls.request_reset(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{MainCameraConfig, OrbitConfig};
    use crate::config::ViewerConfig;

    #[test]
    fn test_key_bindings() {
        assert_eq!(key_action("3"), Some(KeyAction::Toggle(ToggleKey::Lidar(LidarName::SideLeft))));
        assert_eq!(key_action("V"), Some(KeyAction::Toggle(ToggleKey::Label(LabelType::Vehicle))));
        assert_eq!(key_action("r"), Some(KeyAction::ResetView));
        assert_eq!(key_action("q"), None);
    }

    #[test]
    fn test_next_camera_cycles_through_none() {
        let cameras = [CameraName::Front, CameraName::SideLeft];
        assert_eq!(next_camera(&cameras, None), Some(CameraName::Front));
        assert_eq!(next_camera(&cameras, Some(CameraName::Front)), Some(CameraName::SideLeft));
        assert_eq!(next_camera(&cameras, Some(CameraName::SideLeft)), None);
        assert_eq!(next_camera(&cameras, Some(CameraName::FrontRight)), Some(CameraName::Front));
        assert_eq!(next_camera(&[], None), None);
    }

    #[test]
    fn test_toggle_action_flips_desired_state() {
        let mut session = ViewerSession::new(ViewerConfig::default());
        let mut controls = OrbitControls::new(OrbitConfig::default(), &MainCameraConfig::default().build());
        let key = ToggleKey::Helper(HelperName::Ground);

        apply_action(KeyAction::Toggle(key), &mut session, &mut controls);
        assert!(!session.is_enabled(key));
        apply_action(KeyAction::Toggle(key), &mut session, &mut controls);
        assert!(session.is_enabled(key));

        apply_action(KeyAction::ResetView, &mut session, &mut controls);
        assert!(controls.has_pending());
    }
}
