//! 3D box labels as wireframe scene objects

use carview_core::{
    hex_to_rgb, Category, Label, LabelType, LineSet, ObjectId, Point3f, Renderable, Rgb, SceneObject, Transform3D,
    Vector3f,
};

pub const DEFAULT_LABEL_COLOR: Rgb = hex_to_rgb(0xffffff);

/// Display colour of a label class
pub fn label_color(label_type: LabelType) -> Rgb {
    match label_type {
        LabelType::Vehicle => hex_to_rgb(0x00ff00),
        LabelType::Pedestrian => hex_to_rgb(0xff00ff),
        LabelType::Sign => hex_to_rgb(0x00ffff),
        LabelType::Cyclist => hex_to_rgb(0xffff00),
        LabelType::Unknown => DEFAULT_LABEL_COLOR,
    }
}

/// Scene id of the `index`-th label of a frame
pub fn label_id(label_type: LabelType, index: usize) -> ObjectId {
    ObjectId::new(Category::Label, format!("{}/{}", label_type, index))
}

/// Type a label object was created for, parsed back from its id
pub fn label_type_of(id: &ObjectId) -> Option<LabelType> {
    if id.category != Category::Label {
        return None;
    }
    let (label_type, _) = id.name.split_once('/')?;
    label_type.parse().ok()
}

/// Twelve edges of an origin-centred box with the given extent
pub fn wire_box(extent: &Vector3f, color: Rgb) -> LineSet {
    let half = extent / 2.0;
    let corner = |i: usize| {
        Point3f::new(
            if i & 1 == 0 { -half.x } else { half.x },
            if i & 2 == 0 { -half.y } else { half.y },
            if i & 4 == 0 { -half.z } else { half.z },
        )
    };

    let mut lines = LineSet::default();
    for i in 0..8 {
        // Connect each corner to the neighbours that differ in one higher bit
        for bit in [1, 2, 4] {
            if i & bit == 0 {
                lines.push_segment(corner(i), corner(i | bit), color);
            }
        }
    }
    lines
}

/// Wireframe box posed at the label's centre, turned by its heading about
/// the box's own vertical axis.
pub fn to_bounding_box(label: &Label, index: usize) -> SceneObject {
    let lines = wire_box(&label.extent, label_color(label.label_type));
    let pose = Transform3D::translation(label.center.coords) * Transform3D::rotation_z(label.heading);
    SceneObject::new(label_id(label.label_type, index), Renderable::Lines(lines), pose)
}
