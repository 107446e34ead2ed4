//! PCD (Point Cloud Data) decoding
//!
//! Lidar sweeps are shipped as one PCD file per sensor. Both the `ascii` and
//! `binary` encodings are decoded; `x`, `y` and `z` are required and an
//! `intensity` field is picked up when present. Any other fields are
//! skipped.

use carview_core::{Error, LidarPoint, PointCloud, Result};
use std::io::{BufRead, Read};

/// PCD data format variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcdDataFormat {
    Ascii,
    Binary,
    BinaryCompressed,
}

/// PCD field data types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcdFieldType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl PcdFieldType {
    fn from_type_and_size(type_str: &str, size: usize) -> Result<Self> {
        match (type_str, size) {
            ("I", 1) => Ok(PcdFieldType::I8),
            ("I", 2) => Ok(PcdFieldType::I16),
            ("I", 4) => Ok(PcdFieldType::I32),
            ("U", 1) => Ok(PcdFieldType::U8),
            ("U", 2) => Ok(PcdFieldType::U16),
            ("U", 4) => Ok(PcdFieldType::U32),
            ("F", 4) => Ok(PcdFieldType::F32),
            ("F", 8) => Ok(PcdFieldType::F64),
            _ => Err(Error::InvalidData(format!(
                "Unknown field type/size combination: {}/{}",
                type_str, size
            ))),
        }
    }

    fn size(&self) -> usize {
        match self {
            PcdFieldType::I8 | PcdFieldType::U8 => 1,
            PcdFieldType::I16 | PcdFieldType::U16 => 2,
            PcdFieldType::I32 | PcdFieldType::U32 | PcdFieldType::F32 => 4,
            PcdFieldType::F64 => 8,
        }
    }

    /// Decode one little-endian value
    fn read_le(&self, bytes: &[u8]) -> f64 {
        match self {
            PcdFieldType::I8 => bytes[0] as i8 as f64,
            PcdFieldType::U8 => bytes[0] as f64,
            PcdFieldType::I16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            PcdFieldType::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            PcdFieldType::I32 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            PcdFieldType::U32 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            PcdFieldType::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            PcdFieldType::F64 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&bytes[..8]);
                f64::from_le_bytes(buf)
            }
        }
    }
}

/// PCD field definition
#[derive(Debug, Clone)]
pub struct PcdField {
    pub name: String,
    pub field_type: PcdFieldType,
    pub count: usize,
}

/// PCD header information
#[derive(Debug, Clone)]
pub struct PcdHeader {
    pub version: String,
    pub fields: Vec<PcdField>,
    pub width: usize,
    pub height: usize,
    /// `WIDTH * HEIGHT`, checked when the header is read
    pub points: usize,
    pub data_format: PcdDataFormat,
}

/// Upper bound on points reserved up front; the header alone is not trusted
const MAX_PREALLOCATED_POINTS: usize = 1 << 18;

/// Largest binary point record accepted
const MAX_POINT_STRIDE: usize = 4096;

impl PcdHeader {
    pub fn point_count(&self) -> usize {
        self.points
    }

    fn preallocation(&self) -> usize {
        self.points.min(MAX_PREALLOCATED_POINTS)
    }

    /// Bytes occupied by one point in the binary encoding
    fn point_stride(&self) -> usize {
        self.fields.iter().map(|f| f.field_type.size() * f.count).sum()
    }

    /// Index of the first scalar of each named field within a point record
    fn scalar_offset(&self, name: &str) -> Option<(usize, PcdFieldType)> {
        let mut offset = 0;
        for field in &self.fields {
            if field.name == name {
                return Some((offset, field.field_type));
            }
            offset += field.count;
        }
        None
    }

    fn byte_offset(&self, name: &str) -> Option<(usize, PcdFieldType)> {
        let mut offset = 0;
        for field in &self.fields {
            if field.name == name {
                return Some((offset, field.field_type));
            }
            offset += field.field_type.size() * field.count;
        }
        None
    }
}

/// Decode a PCD document held in memory
pub fn decode_pcd(bytes: &[u8]) -> Result<PointCloud<LidarPoint>> {
    let mut reader = bytes;
    let header = read_header(&mut reader)?;
    read_points(&mut reader, &header)
}

/// Read the PCD header, leaving `reader` positioned at the first data byte
pub fn read_header<R: BufRead>(reader: &mut R) -> Result<PcdHeader> {
    let mut version = None;
    let mut names: Vec<String> = Vec::new();
    let mut sizes: Vec<usize> = Vec::new();
    let mut types: Vec<String> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    let mut width = None;
    let mut height = None;
    let mut points = None;
    let data_format;

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(Error::InvalidData("Unexpected end of file in PCD header".to_string()));
        }

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        let values = &parts[1..];
        match parts[0] {
            "VERSION" => version = values.first().map(|v| v.to_string()),
            "FIELDS" => names = values.iter().map(|v| v.to_string()).collect(),
            "SIZE" => sizes = parse_all(values, "SIZE")?,
            "TYPE" => types = values.iter().map(|v| v.to_string()).collect(),
            "COUNT" => counts = parse_all(values, "COUNT")?,
            "WIDTH" => width = Some(parse_one(values, "WIDTH")?),
            "HEIGHT" => height = Some(parse_one(values, "HEIGHT")?),
            "POINTS" => points = Some(parse_one(values, "POINTS")?),
            "DATA" => {
                data_format = match values.first().copied() {
                    Some("ascii") => PcdDataFormat::Ascii,
                    Some("binary") => PcdDataFormat::Binary,
                    Some("binary_compressed") => PcdDataFormat::BinaryCompressed,
                    other => {
                        return Err(Error::InvalidData(format!("Unknown PCD DATA format: {:?}", other)))
                    }
                };
                break;
            }
            // VIEWPOINT and vendor extensions carry nothing we draw
            _ => {}
        }
    }

    // COUNT is optional and defaults to one scalar per field
    if counts.is_empty() {
        counts = vec![1; names.len()];
    }
    if names.len() != sizes.len() || names.len() != types.len() || names.len() != counts.len() {
        return Err(Error::InvalidData(
            "Mismatch between FIELDS, SIZE, TYPE, and COUNT declarations".to_string(),
        ));
    }

    let fields = names
        .into_iter()
        .zip(sizes)
        .zip(types)
        .zip(counts)
        .map(|(((name, size), type_str), count)| {
            Ok(PcdField {
                name,
                field_type: PcdFieldType::from_type_and_size(&type_str, size)?,
                count,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let stride = fields
        .iter()
        .try_fold(0usize, |acc, f| f.field_type.size().checked_mul(f.count)?.checked_add(acc))
        .filter(|&stride| stride <= MAX_POINT_STRIDE)
        .ok_or_else(|| Error::InvalidData(format!("PCD point record exceeds {} bytes", MAX_POINT_STRIDE)))?;
    if stride == 0 {
        return Err(Error::InvalidData("PCD declares no point data".to_string()));
    }

    let width = width.ok_or_else(|| Error::InvalidData("Missing WIDTH in PCD header".to_string()))?;
    let height = height.unwrap_or(1);
    let count = width
        .checked_mul(height)
        .ok_or_else(|| Error::InvalidData(format!("WIDTH {} * HEIGHT {} overflows", width, height)))?;
    if let Some(points) = points {
        if points != count {
            return Err(Error::InvalidData(format!(
                "POINTS ({}) doesn't match WIDTH * HEIGHT ({})",
                points, count
            )));
        }
    }

    Ok(PcdHeader {
        version: version.unwrap_or_else(|| "0.7".to_string()),
        fields,
        width,
        height,
        points: count,
        data_format,
    })
}

/// Read the point records following a header
pub fn read_points<R: BufRead>(reader: &mut R, header: &PcdHeader) -> Result<PointCloud<LidarPoint>> {
    match header.data_format {
        PcdDataFormat::Ascii => read_ascii_points(reader, header),
        PcdDataFormat::Binary => read_binary_points(reader, header),
        PcdDataFormat::BinaryCompressed => Err(Error::Unsupported(
            "Binary compressed PCD format not yet supported".to_string(),
        )),
    }
}

fn read_ascii_points<R: BufRead>(reader: &mut R, header: &PcdHeader) -> Result<PointCloud<LidarPoint>> {
    let x = ascii_slot(header, "x")?;
    let y = ascii_slot(header, "y")?;
    let z = ascii_slot(header, "z")?;
    let intensity = header.scalar_offset("intensity").map(|(i, _)| i);

    let mut cloud = PointCloud::with_capacity(header.preallocation());
    let mut line = String::new();
    while cloud.len() < header.point_count() {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(Error::InvalidData(format!(
                "PCD data ended after {} of {} points",
                cloud.len(),
                header.point_count()
            )));
        }
        let values: Vec<&str> = line.split_whitespace().collect();
        if values.is_empty() {
            continue;
        }

        let value = |i: usize| -> Result<f32> {
            values
                .get(i)
                .ok_or_else(|| Error::InvalidData("Not enough values in ASCII PCD line".to_string()))?
                .parse::<f32>()
                .map_err(|_| Error::InvalidData(format!("Invalid PCD value: {}", values[i])))
        };

        let mut point = LidarPoint::new(value(x)?, value(y)?, value(z)?);
        if let Some(i) = intensity {
            point.intensity = Some(value(i)?);
        }
        cloud.push(point);
    }

    Ok(cloud)
}

fn read_binary_points<R: Read>(reader: &mut R, header: &PcdHeader) -> Result<PointCloud<LidarPoint>> {
    let x = binary_slot(header, "x")?;
    let y = binary_slot(header, "y")?;
    let z = binary_slot(header, "z")?;
    let intensity = header.byte_offset("intensity");

    let stride = header.point_stride();
    let mut record = vec![0u8; stride];
    let mut cloud = PointCloud::with_capacity(header.preallocation());

    for _ in 0..header.point_count() {
        reader.read_exact(&mut record)?;
        let read = |(offset, field_type): (usize, PcdFieldType)| field_type.read_le(&record[offset..]) as f32;

        let mut point = LidarPoint::new(read(x), read(y), read(z));
        if let Some(slot) = intensity {
            point.intensity = Some(read(slot));
        }
        cloud.push(point);
    }

    Ok(cloud)
}

fn ascii_slot(header: &PcdHeader, name: &str) -> Result<usize> {
    header
        .scalar_offset(name)
        .map(|(i, _)| i)
        .ok_or_else(|| Error::InvalidData(format!("Missing {} coordinate in PCD fields", name)))
}

fn binary_slot(header: &PcdHeader, name: &str) -> Result<(usize, PcdFieldType)> {
    header
        .byte_offset(name)
        .ok_or_else(|| Error::InvalidData(format!("Missing {} coordinate in PCD fields", name)))
}

fn parse_one(values: &[&str], key: &str) -> Result<usize> {
    values
        .first()
        .and_then(|v| v.parse::<usize>().ok())
        .ok_or_else(|| Error::InvalidData(format!("Invalid {} value: {:?}", key, values.first())))
}

fn parse_all(values: &[&str], key: &str) -> Result<Vec<usize>> {
    values
        .iter()
        .map(|v| {
            v.parse::<usize>()
                .map_err(|_| Error::InvalidData(format!("Invalid {} value: {}", key, v)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASCII_PCD: &str = "# .PCD v0.7 - Point Cloud Data file format
VERSION 0.7
FIELDS x y z intensity
SIZE 4 4 4 4
TYPE F F F F
COUNT 1 1 1 1
WIDTH 3
HEIGHT 1
VIEWPOINT 0 0 0 1 0 0 0
POINTS 3
DATA ascii
0.0 0.0 0.0 0.1
1.5 -2.0 0.25 0.2
10 20 30 0.3
";

    #[test]
    fn test_decode_ascii_with_intensity() {
        let cloud = decode_pcd(ASCII_PCD.as_bytes()).unwrap();
        assert_eq!(cloud.len(), 3);
        assert_eq!(cloud[1].position.x, 1.5);
        assert_eq!(cloud[1].position.y, -2.0);
        assert_eq!(cloud[2].position.z, 30.0);
        assert_eq!(cloud[2].intensity, Some(0.3));
    }

    #[test]
    fn test_decode_binary_skips_unused_fields() {
        let mut bytes = b"VERSION 0.7
FIELDS x y z ring
SIZE 4 4 4 2
TYPE F F F U
COUNT 1 1 1 1
WIDTH 2
HEIGHT 1
POINTS 2
DATA binary
"
        .to_vec();
        for (x, y, z, ring) in [(1.0f32, 2.0f32, 3.0f32, 7u16), (-1.0, -2.0, -3.0, 9)] {
            bytes.extend_from_slice(&x.to_le_bytes());
            bytes.extend_from_slice(&y.to_le_bytes());
            bytes.extend_from_slice(&z.to_le_bytes());
            bytes.extend_from_slice(&ring.to_le_bytes());
        }

        let cloud = decode_pcd(&bytes).unwrap();
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud[0].position, carview_core::Point3f::new(1.0, 2.0, 3.0));
        assert_eq!(cloud[1].position, carview_core::Point3f::new(-1.0, -2.0, -3.0));
        assert_eq!(cloud[1].intensity, None);
    }

    #[test]
    fn test_truncated_binary_data_is_an_error() {
        let bytes = b"FIELDS x y z
SIZE 4 4 4
TYPE F F F
WIDTH 2
DATA binary
\x00\x00\x80\x3f";
        assert!(decode_pcd(bytes).is_err());
    }

    #[test]
    fn test_missing_z_field_is_an_error() {
        let pcd = "FIELDS x y\nSIZE 4 4\nTYPE F F\nWIDTH 1\nDATA ascii\n1 2\n";
        let err = decode_pcd(pcd.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Missing z"));
    }

    #[test]
    fn test_points_mismatch_is_rejected() {
        let pcd = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nWIDTH 2\nHEIGHT 1\nPOINTS 3\nDATA ascii\n";
        assert!(decode_pcd(pcd.as_bytes()).is_err());
    }

    #[test]
    fn test_huge_ascii_width_fails_without_allocating() {
        let pcd = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nWIDTH 100000000000000\nDATA ascii\n1 2 3\n";
        let err = decode_pcd(pcd.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("ended after 1 of"));
    }

    #[test]
    fn test_huge_binary_width_is_truncated_data() {
        let mut bytes = b"FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nWIDTH 100000000000000\nDATA binary\n".to_vec();
        bytes.extend_from_slice(&[0u8; 12]);
        assert!(decode_pcd(&bytes).is_err());
    }

    #[test]
    fn test_overflowing_dimensions_are_rejected() {
        let pcd = format!(
            "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nWIDTH {}\nHEIGHT 2\nDATA ascii\n",
            usize::MAX
        );
        let err = decode_pcd(pcd.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::InvalidData(_)));
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn test_oversized_field_count_is_rejected() {
        let pcd = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nCOUNT 1 1 1000000000000000\nWIDTH 1\nDATA binary\n";
        let err = decode_pcd(pcd.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_compressed_is_unsupported() {
        let pcd = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nWIDTH 0\nDATA binary_compressed\n";
        assert!(matches!(decode_pcd(pcd.as_bytes()), Err(Error::Unsupported(_))));
    }
}
