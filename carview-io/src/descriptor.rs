//! Frame descriptor parsing
//!
//! The descriptor is a JSON document listing camera calibrations under
//! `frustrums` (sic, the key name used by the data pipeline) and box labels
//! under `labels`. Individual records that fail to parse are skipped with a
//! warning so one bad camera never hides the rest of the frame.

use carview_core::{CameraCalibration, CameraName, FrameRecords, Label, LabelType, Point3f, Result, Vector3f};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    #[serde(default)]
    frustrums: Vec<Value>,
    #[serde(default)]
    labels: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawCamera {
    name: String,
    intrinsic: Vec<f32>,
    extrinsic: Vec<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLabel {
    #[serde(rename = "type", default)]
    label_type: String,
    center_x: f32,
    center_y: f32,
    center_z: f32,
    length: f32,
    width: f32,
    height: f32,
    #[serde(default)]
    heading: f32,
}

/// Parse a frame descriptor, skipping malformed records
pub fn parse_descriptor(bytes: &[u8]) -> Result<FrameRecords> {
    let raw: RawDescriptor = serde_json::from_slice(bytes)?;
    let mut records = FrameRecords::default();

    for (index, value) in raw.frustrums.into_iter().enumerate() {
        match parse_camera(value) {
            Ok(calibration) => {
                if let Some(existing) = records.cameras.iter_mut().find(|c| c.name == calibration.name) {
                    tracing::warn!(camera = %calibration.name, "duplicate calibration, keeping the last one");
                    *existing = calibration;
                } else {
                    records.cameras.push(calibration);
                }
            }
            Err(e) => tracing::warn!(index, error = %e, "skipping camera record"),
        }
    }

    for (index, value) in raw.labels.into_iter().enumerate() {
        match serde_json::from_value::<RawLabel>(value) {
            Ok(raw) => records.labels.push(Label::new(
                LabelType::classify(&raw.label_type),
                Point3f::new(raw.center_x, raw.center_y, raw.center_z),
                Vector3f::new(raw.length, raw.width, raw.height),
                raw.heading,
            )),
            Err(e) => tracing::warn!(index, error = %e, "skipping label record"),
        }
    }

    tracing::debug!(
        cameras = records.cameras.len(),
        labels = records.labels.len(),
        "parsed frame descriptor"
    );
    Ok(records)
}

fn parse_camera(value: Value) -> Result<CameraCalibration> {
    let raw: RawCamera = serde_json::from_value(value)?;
    let name: CameraName = raw.name.parse()?;
    CameraCalibration::from_raw(name, &raw.intrinsic, &raw.extrinsic)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_row_major() -> Vec<f32> {
        vec![
            1.0, 0.0, 0.0, 1.5,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 2.0,
            0.0, 0.0, 0.0, 1.0,
        ]
    }

    #[test]
    fn test_parse_cameras_and_labels() {
        let doc = serde_json::json!({
            "frustrums": [
                {"name": "FRONT", "intrinsic": [2000.0, 2000.0, 640.0, 960.0, 0.0, 0.0, 0.0, 0.0, 0.0], "extrinsic": identity_row_major()},
                {"name": "SIDE_LEFT", "intrinsic": [1000.0, 1200.0, 640.0, 960.0, 0.0, 0.0, 0.0, 0.0, 0.0], "extrinsic": identity_row_major()}
            ],
            "labels": [
                {"type": "TYPE_VEHICLE", "centerX": 10.0, "centerY": 0.0, "centerZ": 0.0, "length": 4.0, "width": 2.0, "height": 1.5, "heading": 1.5708},
                {"type": "TYPE_TRAFFIC_CONE", "centerX": 1.0, "centerY": 1.0, "centerZ": 0.0, "length": 0.3, "width": 0.3, "height": 0.5, "heading": 0.0}
            ]
        });
        let records = parse_descriptor(doc.to_string().as_bytes()).unwrap();

        assert_eq!(records.cameras.len(), 2);
        assert_eq!(records.cameras[0].name, CameraName::Front);
        assert_eq!(records.cameras[0].extrinsic.position(), Point3f::new(1.5, 0.0, 2.0));
        assert_eq!(records.labels.len(), 2);
        assert_eq!(records.labels[0].label_type, LabelType::Vehicle);
        assert_eq!(records.labels[0].center, Point3f::new(10.0, 0.0, 0.0));
        assert_eq!(records.labels[1].label_type, LabelType::Unknown);
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let doc = serde_json::json!({
            "frustrums": [
                {"name": "FRONT", "intrinsic": [1.0, 2.0], "extrinsic": identity_row_major()},
                {"name": "REAR_CAMERA", "intrinsic": [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0], "extrinsic": identity_row_major()},
                {"name": "FRONT_LEFT", "intrinsic": [1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], "extrinsic": identity_row_major()}
            ],
            "labels": [
                {"type": "TYPE_SIGN", "centerX": "not a number"}
            ]
        });
        let records = parse_descriptor(doc.to_string().as_bytes()).unwrap();
        assert_eq!(records.cameras.len(), 1);
        assert_eq!(records.cameras[0].name, CameraName::FrontLeft);
        assert!(records.labels.is_empty());
    }

    #[test]
    fn test_missing_sections_default_to_empty() {
        let records = parse_descriptor(b"{}").unwrap();
        assert!(records.cameras.is_empty());
        assert!(records.labels.is_empty());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(parse_descriptor(b"{not json").is_err());
    }
}
