//! Lidar sweeps and the static parts of the scene

use crate::label::wire_box;
use carview_core::{
    hex_to_rgb, Category, HelperName, LidarName, LineSet, ObjectId, Point3f, PointSet, Renderable, Rgb, SceneObject,
    SensorReading, Surface, Transform3D, Vector3f,
};

/// Chrysler Pacifica body, length x width x height in metres
pub const CAR_LENGTH: f32 = 5.18;
pub const CAR_WIDTH: f32 = 2.03;
pub const CAR_HEIGHT: f32 = 1.78;
/// The vehicle origin is the rear axle; the body centre sits this far ahead
pub const CAR_OFFSET_X: f32 = 1.5;

pub const GROUND_SIZE: f32 = 1000.0;
pub const GROUND_COLOR: Rgb = hex_to_rgb(0x222222);
pub const AXES_LENGTH: f32 = 100.0;
pub const EGO_COLOR: Rgb = hex_to_rgb(0xaaaaaa);

/// Display colour of a lidar unit
pub fn lidar_color(lidar: LidarName) -> Rgb {
    match lidar {
        LidarName::Top => hex_to_rgb(0xffffff),
        LidarName::Front => hex_to_rgb(0xff6666),
        LidarName::SideLeft => hex_to_rgb(0x66ff66),
        LidarName::SideRight => hex_to_rgb(0x6699ff),
        LidarName::Rear => hex_to_rgb(0xffcc33),
    }
}

/// Point cloud object of one lidar reading
pub fn lidar_object(reading: SensorReading, point_size: f32) -> SceneObject {
    let points = PointSet {
        cloud: reading.cloud,
        color: lidar_color(reading.lidar),
        point_size,
    };
    SceneObject::new(ObjectId::lidar(reading.lidar), Renderable::Points(points), Transform3D::identity())
}

/// Wireframe of the recording vehicle, resting just above the ground
pub fn ego_vehicle() -> SceneObject {
    let extent = Vector3f::new(CAR_LENGTH, CAR_WIDTH, CAR_HEIGHT);
    let pose = Transform3D::translation(Vector3f::new(CAR_OFFSET_X, 0.0, CAR_HEIGHT / 2.0 + 0.01));
    SceneObject::new(
        ObjectId::new(Category::Static, "EGO_VEHICLE"),
        Renderable::Lines(wire_box(&extent, EGO_COLOR)),
        pose,
    )
}

/// Square ground plane at z = 0
pub fn ground_plane() -> SceneObject {
    let h = GROUND_SIZE / 2.0;
    let corners = [
        Point3f::new(-h, -h, 0.0),
        Point3f::new(h, -h, 0.0),
        Point3f::new(h, h, 0.0),
        Point3f::new(-h, h, 0.0),
    ];
    let surface = Surface {
        vertices: vec![corners[0], corners[1], corners[2], corners[0], corners[2], corners[3]],
        color: GROUND_COLOR,
    };
    SceneObject::new(
        ObjectId::helper(HelperName::Ground),
        Renderable::Surface(surface),
        Transform3D::identity(),
    )
}

/// Red, green and blue lines along +x, +y and +z
pub fn axes() -> SceneObject {
    let mut lines = LineSet::default();
    let origin = Point3f::origin();
    lines.push_segment(origin, Point3f::new(AXES_LENGTH, 0.0, 0.0), [1.0, 0.0, 0.0]);
    lines.push_segment(origin, Point3f::new(0.0, AXES_LENGTH, 0.0), [0.0, 1.0, 0.0]);
    lines.push_segment(origin, Point3f::new(0.0, 0.0, AXES_LENGTH), [0.0, 0.0, 1.0]);
    SceneObject::new(ObjectId::helper(HelperName::Axes), Renderable::Lines(lines), Transform3D::identity())
}

/// Objects present from the first frame on
pub fn static_scene() -> Vec<SceneObject> {
    vec![ego_vehicle(), ground_plane(), axes()]
}
