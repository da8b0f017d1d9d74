use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Barcode symbologies, valued as bit flags so sets fit in a `u32`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum BarcodeFormat {
    /// Returned when no valid barcode has been detected.
    None = 0,
    Aztec = 1 << 0,
    Codabar = 1 << 1,
    Code39 = 1 << 2,
    Code93 = 1 << 3,
    Code128 = 1 << 4,
    /// GS1 DataBar, formerly RSS-14.
    DataBar = 1 << 5,
    /// GS1 DataBar Expanded, formerly RSS Expanded.
    DataBarExpanded = 1 << 6,
    DataMatrix = 1 << 7,
    Ean8 = 1 << 8,
    Ean13 = 1 << 9,
    /// Interleaved Two of Five.
    Itf = 1 << 10,
    MaxiCode = 1 << 11,
    Pdf417 = 1 << 12,
    QrCode = 1 << 13,
    UpcA = 1 << 14,
    UpcE = 1 << 15,
    MicroQrCode = 1 << 16,
}

impl BarcodeFormat {
    /// Every real symbology, excluding `None`.
    pub const ALL: [BarcodeFormat; 17] = [
        BarcodeFormat::Aztec,
        BarcodeFormat::Codabar,
        BarcodeFormat::Code39,
        BarcodeFormat::Code93,
        BarcodeFormat::Code128,
        BarcodeFormat::DataBar,
        BarcodeFormat::DataBarExpanded,
        BarcodeFormat::DataMatrix,
        BarcodeFormat::Ean8,
        BarcodeFormat::Ean13,
        BarcodeFormat::Itf,
        BarcodeFormat::MaxiCode,
        BarcodeFormat::Pdf417,
        BarcodeFormat::QrCode,
        BarcodeFormat::UpcA,
        BarcodeFormat::UpcE,
        BarcodeFormat::MicroQrCode,
    ];

    pub fn bits(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            BarcodeFormat::None => "None",
            BarcodeFormat::Aztec => "Aztec",
            BarcodeFormat::Codabar => "Codabar",
            BarcodeFormat::Code39 => "Code39",
            BarcodeFormat::Code93 => "Code93",
            BarcodeFormat::Code128 => "Code128",
            BarcodeFormat::DataBar => "DataBar",
            BarcodeFormat::DataBarExpanded => "DataBarExpanded",
            BarcodeFormat::DataMatrix => "DataMatrix",
            BarcodeFormat::Ean8 => "EAN-8",
            BarcodeFormat::Ean13 => "EAN-13",
            BarcodeFormat::Itf => "ITF",
            BarcodeFormat::MaxiCode => "MaxiCode",
            BarcodeFormat::Pdf417 => "PDF417",
            BarcodeFormat::QrCode => "QR Code",
            BarcodeFormat::UpcA => "UPC-A",
            BarcodeFormat::UpcE => "UPC-E",
            BarcodeFormat::MicroQrCode => "Micro QR Code",
        }
    }

    pub fn is_linear(self) -> bool {
        FormatSet::linear_codes().contains(self)
    }

    pub fn is_matrix(self) -> bool {
        FormatSet::matrix_codes().contains(self)
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown barcode format {0:?}")]
pub struct UnknownFormat(pub String);

/// Lowercase alphanumerics only, so "EAN-13", "ean_13" and "Ean13" agree.
fn fold_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl FromStr for BarcodeFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded = fold_name(s);
        let format = match folded.as_str() {
            "qr" => BarcodeFormat::QrCode,
            "microqr" => BarcodeFormat::MicroQrCode,
            "rss14" => BarcodeFormat::DataBar,
            "rssexpanded" => BarcodeFormat::DataBarExpanded,
            "none" => BarcodeFormat::None,
            other => BarcodeFormat::ALL
                .into_iter()
                .find(|format| {
                    fold_name(format.name()) == other || fold_name(&format!("{format:?}")) == other
                })
                .ok_or_else(|| UnknownFormat(s.to_string()))?,
        };
        Ok(format)
    }
}

/// A set of symbologies.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<BarcodeFormat>", from = "Vec<BarcodeFormat>")]
pub struct FormatSet(u32);

impl FormatSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        BarcodeFormat::ALL.into_iter().collect()
    }

    pub fn linear_codes() -> Self {
        [
            BarcodeFormat::Codabar,
            BarcodeFormat::Code39,
            BarcodeFormat::Code93,
            BarcodeFormat::Code128,
            BarcodeFormat::Ean8,
            BarcodeFormat::Ean13,
            BarcodeFormat::Itf,
            BarcodeFormat::DataBar,
            BarcodeFormat::DataBarExpanded,
            BarcodeFormat::UpcA,
            BarcodeFormat::UpcE,
        ]
        .into_iter()
        .collect()
    }

    pub fn matrix_codes() -> Self {
        [
            BarcodeFormat::Aztec,
            BarcodeFormat::DataMatrix,
            BarcodeFormat::MaxiCode,
            BarcodeFormat::Pdf417,
            BarcodeFormat::QrCode,
            BarcodeFormat::MicroQrCode,
        ]
        .into_iter()
        .collect()
    }

    pub fn contains(self, format: BarcodeFormat) -> bool {
        format != BarcodeFormat::None && self.0 & format.bits() != 0
    }

    pub fn insert(&mut self, format: BarcodeFormat) {
        self.0 |= format.bits();
    }

    pub fn with(mut self, format: BarcodeFormat) -> Self {
        self.insert(format);
        self
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = BarcodeFormat> {
        BarcodeFormat::ALL
            .into_iter()
            .filter(move |format| self.contains(*format))
    }
}

impl Default for FormatSet {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Debug for FormatSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<BarcodeFormat> for FormatSet {
    fn from_iter<I: IntoIterator<Item = BarcodeFormat>>(iter: I) -> Self {
        let mut set = FormatSet::empty();
        for format in iter {
            set.insert(format);
        }
        set
    }
}

impl From<FormatSet> for Vec<BarcodeFormat> {
    fn from(set: FormatSet) -> Self {
        set.iter().collect()
    }
}

impl From<Vec<BarcodeFormat>> for FormatSet {
    fn from(formats: Vec<BarcodeFormat>) -> Self {
        formats.into_iter().collect()
    }
}

/// Parses comma-separated names plus the groups `all`, `linear`, `matrix`.
impl FromStr for FormatSet {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = FormatSet::empty();
        for part in s.split(',').map(str::trim).filter(|part| !part.is_empty()) {
            match fold_name(part).as_str() {
                "all" => set.0 |= FormatSet::all().0,
                "linear" | "linearcodes" => set.0 |= FormatSet::linear_codes().0,
                "matrix" | "matrixcodes" => set.0 |= FormatSet::matrix_codes().0,
                _ => set.insert(part.parse()?),
            }
        }
        Ok(set)
    }
}

/// How the decoded payload should be interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    Text,
    Binary,
    Mixed,
    Gs1,
    Iso15434,
    UnknownEci,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Corners of a symbol in frame pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Quadrilateral {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl Quadrilateral {
    pub const fn new(
        top_left: Point,
        top_right: Point,
        bottom_right: Point,
        bottom_left: Point,
    ) -> Self {
        Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        }
    }

    /// Build from corners listed clockwise from the top left.
    pub const fn from_corners([top_left, top_right, bottom_right, bottom_left]: [Point; 4]) -> Self {
        Self::new(top_left, top_right, bottom_right, bottom_left)
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    pub fn center(&self) -> Point {
        let corners = self.corners();
        let x = corners.iter().map(|p| p.x).sum::<f32>() / 4.0;
        let y = corners.iter().map(|p| p.y).sum::<f32>() / 4.0;
        Point::new(x, y)
    }

    pub fn scaled(&self, factor: f32) -> Self {
        let scale = |p: Point| Point::new(p.x * factor, p.y * factor);
        Self::new(
            scale(self.top_left),
            scale(self.top_right),
            scale(self.bottom_right),
            scale(self.bottom_left),
        )
    }
}

/// One decoded symbol. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymbolResult {
    format: BarcodeFormat,
    content_type: ContentType,
    text: String,
    bytes: Vec<u8>,
    position: Quadrilateral,
}

impl SymbolResult {
    pub fn new(
        format: BarcodeFormat,
        content_type: ContentType,
        text: impl Into<String>,
        bytes: Vec<u8>,
        position: Quadrilateral,
    ) -> Self {
        Self {
            format,
            content_type,
            text: text.into(),
            bytes,
            position,
        }
    }

    /// Build from a raw payload: `Text` when it is UTF-8, `Binary` otherwise
    /// with a lossy rendering as text.
    pub fn from_payload(format: BarcodeFormat, bytes: Vec<u8>, position: Quadrilateral) -> Self {
        let (content_type, text) = match std::str::from_utf8(&bytes) {
            Ok(text) => (ContentType::Text, text.to_string()),
            Err(_) => (
                ContentType::Binary,
                String::from_utf8_lossy(&bytes).into_owned(),
            ),
        };
        Self::new(format, content_type, text, bytes, position)
    }

    pub fn format(&self) -> BarcodeFormat {
        self.format
    }

    pub fn format_name(&self) -> &'static str {
        self.format.name()
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn position(&self) -> &Quadrilateral {
        &self.position
    }

    pub fn is_valid(&self) -> bool {
        self.format != BarcodeFormat::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_partition_all_formats() {
        let linear = FormatSet::linear_codes();
        let matrix = FormatSet::matrix_codes();
        assert_eq!(linear.len() + matrix.len(), FormatSet::all().len());
        assert!(linear.iter().all(|format| !matrix.contains(format)));
        assert!(BarcodeFormat::Ean13.is_linear());
        assert!(BarcodeFormat::QrCode.is_matrix());
        assert!(!FormatSet::all().contains(BarcodeFormat::None));
    }

    #[test]
    fn names_parse_loosely() {
        assert_eq!("QR Code".parse::<BarcodeFormat>(), Ok(BarcodeFormat::QrCode));
        assert_eq!("qrcode".parse::<BarcodeFormat>(), Ok(BarcodeFormat::QrCode));
        assert_eq!("ean_13".parse::<BarcodeFormat>(), Ok(BarcodeFormat::Ean13));
        assert_eq!("UPC-E".parse::<BarcodeFormat>(), Ok(BarcodeFormat::UpcE));
        assert_eq!("pdf417".parse::<BarcodeFormat>(), Ok(BarcodeFormat::Pdf417));
        assert!("hologram".parse::<BarcodeFormat>().is_err());
    }

    #[test]
    fn sets_parse_groups_and_names() {
        let set: FormatSet = "qr, code128".parse().unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains(BarcodeFormat::Code128));

        let set: FormatSet = "matrix,ean8".parse().unwrap();
        assert_eq!(set.len(), FormatSet::matrix_codes().len() + 1);
        assert!("qr,bogus".parse::<FormatSet>().is_err());
    }

    #[test]
    fn format_sets_serialize_as_lists() {
        let set = FormatSet::empty()
            .with(BarcodeFormat::QrCode)
            .with(BarcodeFormat::Aztec);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["Aztec","QrCode"]"#);
        let back: FormatSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn payload_content_type_follows_utf8_validity() {
        let text = SymbolResult::from_payload(
            BarcodeFormat::QrCode,
            b"HELLO".to_vec(),
            Quadrilateral::default(),
        );
        assert_eq!(text.content_type(), ContentType::Text);
        assert_eq!(text.text(), "HELLO");

        let binary = SymbolResult::from_payload(
            BarcodeFormat::QrCode,
            vec![0xff, 0xfe, 0x41],
            Quadrilateral::default(),
        );
        assert_eq!(binary.content_type(), ContentType::Binary);
        assert_eq!(binary.bytes(), &[0xff, 0xfe, 0x41]);
        assert!(binary.is_valid());
    }

    #[test]
    fn quadrilateral_center_and_scale() {
        let quad = Quadrilateral::from_corners([
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
        ]);
        assert_eq!(quad.center(), Point::new(1.0, 1.0));
        assert_eq!(quad.scaled(2.0).bottom_right, Point::new(4.0, 4.0));
    }
}
