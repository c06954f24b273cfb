//! Built-in conversion routines, one per modality.
//!
//! All of them sit behind the [`Converter`] trait and can be swapped out
//! through [`ConverterSet`].

use image::ImageFormat;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::dispatcher::Converter;
use crate::error::ConvertError;
use crate::types::Modality;

/// One conversion routine per modality. Dispatch is an exhaustive match, so
/// adding a modality without a routine does not compile.
pub struct ConverterSet {
    pub image: Box<dyn Converter>,
    pub point_cloud: Box<dyn Converter>,
    pub label: Box<dyn Converter>,
    pub calib: Box<dyn Converter>,
}

impl ConverterSet {
    pub fn builtin() -> Self {
        ConverterSet {
            image: Box::new(ImageConverter),
            point_cloud: Box::new(PointCloudConverter),
            label: Box::new(LabelConverter),
            calib: Box::new(CalibConverter),
        }
    }

    pub fn for_modality(&self, modality: Modality) -> &dyn Converter {
        match modality {
            Modality::Image => self.image.as_ref(),
            Modality::PointCloud => self.point_cloud.as_ref(),
            Modality::Label => self.label.as_ref(),
            Modality::Calib => self.calib.as_ref(),
        }
    }
}

impl Default for ConverterSet {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Re-encodes a JPEG camera frame as PNG
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageConverter;

impl Converter for ImageConverter {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let img = image::open(input)?;
        img.save_with_format(output, ImageFormat::Png)?;
        Ok(())
    }
}

// Annotation file layout

#[derive(Debug, Deserialize)]
struct AnnotationFile {
    #[serde(default)]
    objects: Vec<ObjectAnnotation>,
    calib: Option<CalibBlock>,
}

#[derive(Debug, Deserialize)]
struct ObjectAnnotation {
    #[serde(alias = "type")]
    label: String,
    #[serde(default)]
    truncated: f64,
    #[serde(default)]
    occluded: u8,
    #[serde(default = "default_alpha")]
    alpha: f64,
    #[serde(default)]
    bbox: [f64; 4],
    /// height, width, length in meters
    dimensions: [f64; 3],
    /// x, y, z in camera coordinates
    location: [f64; 3],
    #[serde(default)]
    rotation_y: f64,
}

fn default_alpha() -> f64 {
    -10.0
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct CalibBlock {
    P0: [f64; 12],
    P1: [f64; 12],
    P2: [f64; 12],
    P3: [f64; 12],
    #[serde(default = "identity_3x3")]
    R0_rect: [f64; 9],
    Tr_velo_to_cam: [f64; 12],
    #[serde(default = "identity_3x4")]
    Tr_imu_to_velo: [f64; 12],
}

fn identity_3x3() -> [f64; 9] {
    [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
}

fn identity_3x4() -> [f64; 12] {
    [
        1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0,
    ]
}

fn read_annotation(path: &Path) -> Result<AnnotationFile, ConvertError> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Transcribes annotation objects into KITTI label lines.
///
/// An annotation without objects produces an empty label file, which marks
/// the sample as empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct LabelConverter;

impl Converter for LabelConverter {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let annotation = read_annotation(input)?;
        let mut writer = BufWriter::new(File::create(output)?);
        for object in &annotation.objects {
            writer.write_all(kitti_label_line(object).as_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn kitti_label_line(object: &ObjectAnnotation) -> String {
    let label = object.label.replace(char::is_whitespace, "_");
    let [x1, y1, x2, y2] = object.bbox;
    let [h, w, l] = object.dimensions;
    let [x, y, z] = object.location;
    format!(
        "{} {:.2} {} {:.2} {:.2} {:.2} {:.2} {:.2} {:.2} {:.2} {:.2} {:.2} {:.2} {:.2} {:.2}\n",
        label,
        object.truncated,
        object.occluded,
        object.alpha,
        x1,
        y1,
        x2,
        y2,
        h,
        w,
        l,
        x,
        y,
        z,
        object.rotation_y
    )
}

/// Transcribes the `calib` block of an annotation into a KITTI calib file
#[derive(Debug, Default, Clone, Copy)]
pub struct CalibConverter;

impl Converter for CalibConverter {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let annotation = read_annotation(input)?;
        let calib = annotation
            .calib
            .ok_or_else(|| ConvertError::invalid_content(input, "missing calib block"))?;

        let mut writer = BufWriter::new(File::create(output)?);
        let rows: [(&str, &[f64]); 7] = [
            ("P0", &calib.P0),
            ("P1", &calib.P1),
            ("P2", &calib.P2),
            ("P3", &calib.P3),
            ("R0_rect", &calib.R0_rect),
            ("Tr_velo_to_cam", &calib.Tr_velo_to_cam),
            ("Tr_imu_to_velo", &calib.Tr_imu_to_velo),
        ];
        for (name, values) in rows {
            let values: Vec<String> = values.iter().map(|v| format!("{:e}", v)).collect();
            writeln!(writer, "{}: {}", name, values.join(" "))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Packs a PCD point cloud into the KITTI binary layout:
/// little-endian `f32` quadruples `x y z intensity`.
///
/// Supports `ascii` and `binary` data sections. A cloud without an
/// intensity field gets intensity 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct PointCloudConverter;

impl Converter for PointCloudConverter {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let bytes = fs::read(input)?;
        let points = parse_pcd(input, &bytes)?;
        let mut writer = BufWriter::new(File::create(output)?);
        for point in points {
            for value in point {
                writer.write_all(&value.to_le_bytes())?;
            }
        }
        writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct PcdField {
    name: String,
    size: usize,
    kind: char,
    count: usize,
}

#[derive(Debug)]
struct PcdHeader {
    fields: Vec<PcdField>,
    points: usize,
    data: String,
}

impl PcdHeader {
    /// Offset in bytes (binary) and column (ascii) of a named field
    fn locate(&self, name: &str) -> Option<(usize, usize, &PcdField)> {
        let mut offset = 0;
        let mut column = 0;
        for field in &self.fields {
            if field.name == name {
                return Some((offset, column, field));
            }
            offset += field.size * field.count;
            column += field.count;
        }
        None
    }

    fn record_size(&self) -> usize {
        self.fields
            .iter()
            .fold(0usize, |acc, f| acc.saturating_add(f.size.saturating_mul(f.count)))
    }
}

fn parse_pcd(path: &Path, bytes: &[u8]) -> Result<Vec<[f32; 4]>, ConvertError> {
    let mut names: Vec<String> = Vec::new();
    let mut sizes: Vec<usize> = Vec::new();
    let mut kinds: Vec<char> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    let mut points = None;
    let mut width = 0usize;
    let mut height = 1usize;
    let mut cursor = 0usize;
    let mut data = None;

    while cursor < bytes.len() {
        let end = bytes[cursor..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| cursor + i + 1)
            .unwrap_or(bytes.len());
        let line = String::from_utf8_lossy(&bytes[cursor..end]).trim().to_string();
        cursor = end;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let key = tokens.next().unwrap_or_default().to_ascii_uppercase();
        let values: Vec<&str> = tokens.collect();
        let parse_usize = |v: &str| {
            v.parse::<usize>()
                .map_err(|_| ConvertError::invalid_content(path, format!("bad {} value '{}'", key, v)))
        };
        match key.as_str() {
            "FIELDS" => names = values.iter().map(|v| v.to_string()).collect(),
            "SIZE" => sizes = values.iter().copied().map(parse_usize).collect::<Result<_, _>>()?,
            "TYPE" => {
                kinds = values
                    .iter()
                    .map(|v| v.chars().next().unwrap_or('F').to_ascii_uppercase())
                    .collect()
            }
            "COUNT" => counts = values.iter().copied().map(parse_usize).collect::<Result<_, _>>()?,
            "WIDTH" => width = values.first().copied().map(parse_usize).transpose()?.unwrap_or(0),
            "HEIGHT" => height = values.first().copied().map(parse_usize).transpose()?.unwrap_or(1),
            "POINTS" => points = values.first().copied().map(parse_usize).transpose()?,
            "DATA" => {
                data = Some(values.first().unwrap_or(&"ascii").to_ascii_lowercase());
                break;
            }
            _ => {}
        }
    }

    let data = data.ok_or_else(|| ConvertError::invalid_content(path, "missing DATA line"))?;
    if sizes.len() != names.len() || kinds.len() != names.len() {
        return Err(ConvertError::invalid_content(
            path,
            "FIELDS, SIZE and TYPE disagree in length",
        ));
    }
    if counts.is_empty() {
        counts = vec![1; names.len()];
    }
    let fields = names
        .into_iter()
        .zip(sizes)
        .zip(kinds)
        .zip(counts)
        .map(|(((name, size), kind), count)| PcdField {
            name,
            size,
            kind,
            count,
        })
        .collect();
    let header = PcdHeader {
        fields,
        points: points.unwrap_or(width.saturating_mul(height)),
        data,
    };

    match header.data.as_str() {
        "ascii" => parse_ascii_points(path, &header, &bytes[cursor..]),
        "binary" => parse_binary_points(path, &header, &bytes[cursor..]),
        other => Err(ConvertError::invalid_content(
            path,
            format!("unsupported DATA encoding '{}'", other),
        )),
    }
}

fn required_fields<'h>(
    path: &Path,
    header: &'h PcdHeader,
) -> Result<[Option<(usize, usize, &'h PcdField)>; 4], ConvertError> {
    let mut located = [None; 4];
    for (slot, name) in ["x", "y", "z", "intensity"].iter().enumerate() {
        located[slot] = header.locate(name);
        if slot < 3 && located[slot].is_none() {
            return Err(ConvertError::invalid_content(
                path,
                format!("missing field '{}'", name),
            ));
        }
    }
    Ok(located)
}

fn parse_ascii_points(
    path: &Path,
    header: &PcdHeader,
    body: &[u8],
) -> Result<Vec<[f32; 4]>, ConvertError> {
    let located = required_fields(path, header)?;
    let text = String::from_utf8_lossy(body);
    // POINTS is untrusted; every point needs at least two bytes of text
    let mut points = Vec::with_capacity(header.points.min(body.len() / 2));
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let columns: Vec<&str> = line.split_whitespace().collect();
        let mut point = [0f32; 4];
        for (slot, field) in located.iter().enumerate() {
            let Some((_, column, _)) = field else {
                continue;
            };
            let token = columns.get(*column).ok_or_else(|| {
                ConvertError::invalid_content(path, format!("short point line '{}'", line))
            })?;
            point[slot] = token.parse::<f32>().map_err(|_| {
                ConvertError::invalid_content(path, format!("bad number '{}'", token))
            })?;
        }
        points.push(point);
    }
    if points.len() != header.points {
        return Err(ConvertError::invalid_content(
            path,
            format!(
                "header declares {} points, body holds {}",
                header.points,
                points.len()
            ),
        ));
    }
    Ok(points)
}

fn parse_binary_points(
    path: &Path,
    header: &PcdHeader,
    body: &[u8],
) -> Result<Vec<[f32; 4]>, ConvertError> {
    let located = required_fields(path, header)?;
    let record = header.record_size();
    let expected = record.checked_mul(header.points);
    if record == 0 || expected.map_or(true, |expected| body.len() < expected) {
        return Err(ConvertError::invalid_content(
            path,
            format!(
                "binary body holds {} bytes, expected {} points of {} bytes",
                body.len(),
                header.points,
                record
            ),
        ));
    }
    let mut points = Vec::with_capacity(header.points);
    for chunk in body.chunks_exact(record).take(header.points) {
        let mut point = [0f32; 4];
        for (slot, field) in located.iter().enumerate() {
            if let Some((offset, _, field)) = field {
                point[slot] = decode_scalar(path, &chunk[*offset..*offset + field.size], field)?;
            }
        }
        points.push(point);
    }
    Ok(points)
}

fn decode_scalar(path: &Path, raw: &[u8], field: &PcdField) -> Result<f32, ConvertError> {
    let value = match (field.kind, raw) {
        ('F', [a, b, c, d]) => f32::from_le_bytes([*a, *b, *c, *d]),
        ('F', [a, b, c, d, e, f, g, h]) => f64::from_le_bytes([*a, *b, *c, *d, *e, *f, *g, *h]) as f32,
        ('U', [a]) => *a as f32,
        ('U', [a, b]) => u16::from_le_bytes([*a, *b]) as f32,
        ('U', [a, b, c, d]) => u32::from_le_bytes([*a, *b, *c, *d]) as f32,
        ('I', [a]) => *a as i8 as f32,
        ('I', [a, b]) => i16::from_le_bytes([*a, *b]) as f32,
        ('I', [a, b, c, d]) => i32::from_le_bytes([*a, *b, *c, *d]) as f32,
        _ => {
            return Err(ConvertError::invalid_content(
                path,
                format!(
                    "unsupported field '{}' of type {}{}",
                    field.name, field.kind, field.size
                ),
            ))
        }
    };
    Ok(value)
}
