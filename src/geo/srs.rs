//! Spatial reference handling: tells geodetic from projected systems and
//! decides whether two definitions agree.
//!
//! With `gdal-support` definitions go through OGR's `SpatialRef`. Without
//! it a text parser covers EPSG codes, WKT and PROJ strings.

#[cfg(feature = "gdal-support")]
use gdal::spatial_ref::SpatialRef;

const WGS84_WKT: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AXIS["Latitude",NORTH],AXIS["Longitude",EAST],AUTHORITY["EPSG","4326"]]"#;

const SPHERICAL_MERCATOR_PROJ: &str = "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +wktext +no_defs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SrsKind {
    Geodetic,
    Projected,
}

/// A parsed coordinate reference system definition.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialReference {
    definition: String,
    name: String,
    epsg: Option<u32>,
    kind: SrsKind,
}

impl SpatialReference {
    /// Parse WKT (1 or 2), `EPSG:n`, or a PROJ string.
    ///
    /// Returns `None` when the text is empty or not recognisable as a CRS.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        Self::parse_definition(text)
    }

    #[cfg(feature = "gdal-support")]
    fn parse_definition(text: &str) -> Option<Self> {
        SpatialRef::from_definition(text).ok().and_then(|srs| Self::from_ogr(&srs))
    }

    #[cfg(not(feature = "gdal-support"))]
    fn parse_definition(text: &str) -> Option<Self> {
        Self::parse_text(text)
    }

    #[cfg(feature = "gdal-support")]
    fn ogr_epsg(epsg: u32) -> Option<Self> {
        let srs = Self::from_ogr(&SpatialRef::from_epsg(epsg).ok()?)?;
        Some(Self { epsg: Some(epsg), ..srs })
    }

    #[cfg(not(feature = "gdal-support"))]
    fn ogr_epsg(_epsg: u32) -> Option<Self> {
        None
    }

    #[cfg(feature = "gdal-support")]
    fn ogr_same(&self, other: &SpatialReference) -> Option<bool> {
        let a = SpatialRef::from_definition(&self.definition).ok()?;
        let b = SpatialRef::from_definition(&other.definition).ok()?;
        Some(a == b)
    }

    #[cfg(not(feature = "gdal-support"))]
    fn ogr_same(&self, _other: &SpatialReference) -> Option<bool> {
        None
    }

    #[cfg(feature = "gdal-support")]
    fn from_ogr(srs: &SpatialRef) -> Option<Self> {
        let wkt = srs.to_wkt().ok()?;
        let epsg = srs
            .auth_name()
            .ok()
            .filter(|name| name.eq_ignore_ascii_case("EPSG"))
            .and_then(|_| srs.auth_code().ok())
            .and_then(|code| u32::try_from(code).ok());
        let kind = if srs.is_geographic() {
            SrsKind::Geodetic
        } else {
            SrsKind::Projected
        };
        Some(Self {
            name: wkt_name(&wkt).unwrap_or_default(),
            definition: wkt,
            epsg,
            kind,
        })
    }

    #[cfg_attr(feature = "gdal-support", allow(dead_code))]
    fn parse_text(text: &str) -> Option<Self> {
        let upper = text.to_ascii_uppercase();
        if let Some(code) = upper.strip_prefix("EPSG:") {
            let epsg: u32 = code.trim().parse().ok()?;
            return Some(Self::from_epsg_table(epsg));
        }

        if text.starts_with('+') || text.contains("+proj=") {
            let kind = if text.contains("+proj=longlat") || text.contains("+proj=latlong") {
                SrsKind::Geodetic
            } else if text.contains("+proj=") {
                SrsKind::Projected
            } else {
                return None;
            };
            let epsg = proj_param(text, "+init=epsg:").and_then(|c| c.parse().ok());
            return Some(Self {
                definition: text.to_string(),
                name: proj_param(text, "+proj=").unwrap_or_default().to_string(),
                epsg,
                kind,
            });
        }

        let root = upper.split('[').next()?.trim().to_string();
        let kind = match root.as_str() {
            "GEOGCS" | "GEOGCRS" | "GEODCRS" | "GEOGRAPHICCRS" => SrsKind::Geodetic,
            "PROJCS" | "PROJCRS" | "PROJECTEDCRS" | "COMPD_CS" | "COMPOUNDCRS" => {
                // Compound systems take the kind of their horizontal part
                if root.starts_with("COMP") && !upper.contains("PROJCS") && !upper.contains("PROJCRS") {
                    SrsKind::Geodetic
                } else {
                    SrsKind::Projected
                }
            }
            _ => return None,
        };

        Some(Self {
            definition: text.to_string(),
            name: wkt_name(text).unwrap_or_default(),
            epsg: wkt_root_epsg(text),
            kind,
        })
    }

    pub fn from_epsg(epsg: u32) -> Self {
        Self::ogr_epsg(epsg).unwrap_or_else(|| Self::from_epsg_table(epsg))
    }

    fn from_epsg_table(epsg: u32) -> Self {
        let kind = if is_geographic_epsg(epsg) {
            SrsKind::Geodetic
        } else {
            SrsKind::Projected
        };
        let name = match epsg {
            4326 => "WGS 84".to_string(),
            3857 | 900913 => "WGS 84 / Pseudo-Mercator".to_string(),
            _ => format!("EPSG:{}", epsg),
        };
        Self {
            definition: format!("EPSG:{}", epsg),
            name,
            epsg: Some(epsg),
            kind,
        }
    }

    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    pub fn spherical_mercator() -> Self {
        Self::from_epsg(3857)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn is_geodetic(&self) -> bool {
        self.kind == SrsKind::Geodetic
    }

    pub fn is_spherical_mercator(&self) -> bool {
        matches!(self.epsg, Some(3857 | 900913 | 3785 | 102100))
            || normalize(&self.definition) == normalize(SPHERICAL_MERCATOR_PROJ)
    }

    /// Whether both definitions describe the same system.
    pub fn equivalent_to(&self, other: &SpatialReference) -> bool {
        if self.kind != other.kind {
            return false;
        }
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return canonical_epsg(a) == canonical_epsg(b);
        }
        if self.is_wgs84() && other.is_wgs84() {
            return true;
        }
        if let Some(same) = self.ogr_same(other) {
            return same;
        }
        normalize(&self.definition) == normalize(&other.definition)
    }

    /// Canonical text form, suitable to hand back to the raster library.
    ///
    /// WKT whenever OGR built the definition.
    pub fn to_text(&self) -> String {
        match self.epsg {
            Some(4326) if self.definition.starts_with("EPSG") => WGS84_WKT.to_string(),
            _ => self.definition.clone(),
        }
    }

    fn is_wgs84(&self) -> bool {
        if self.epsg == Some(4326) {
            return true;
        }
        let def = self.definition.to_ascii_uppercase();
        self.is_geodetic()
            && (def.contains("WGS_1984") || def.contains("+DATUM=WGS84") || def.contains("\"WGS 84\""))
            && !def.contains("TOWGS84[")
    }
}

fn canonical_epsg(code: u32) -> u32 {
    match code {
        900913 | 3785 | 102100 => 3857,
        other => other,
    }
}

/// Geographic 2D systems in the EPSG registry, as inclusive code ranges.
/// Codes missing here are treated as projected.
const GEOGRAPHIC_EPSG: &[(u32, u32)] = &[
    (3824, 3824),
    (3889, 3889),
    (4001, 4025),
    (4027, 4036),
    (4120, 4176),
    (4178, 4216),
    (4218, 4289),
    (4291, 4304),
    (4306, 4326),
    (4463, 4463),
    (4470, 4470),
    (4490, 4490),
    (4600, 4646),
    (4657, 4765),
    (4801, 4811),
    (4813, 4821),
    (4901, 4904),
    (6318, 6318),
    (6322, 6322),
    (6325, 6325),
    (6668, 6668),
    (6706, 6706),
    (6783, 6783),
    (7844, 7844),
    (8086, 8086),
];

fn is_geographic_epsg(code: u32) -> bool {
    GEOGRAPHIC_EPSG
        .binary_search_by(|&(start, end)| {
            if end < code {
                std::cmp::Ordering::Less
            } else if start > code {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        })
        .is_ok()
}

fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase()
}

#[cfg_attr(feature = "gdal-support", allow(dead_code))]
fn proj_param<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let start = text.find(key)? + key.len();
    let rest = &text[start..];
    Some(rest.split_whitespace().next().unwrap_or(rest))
}

fn wkt_name(wkt: &str) -> Option<String> {
    let start = wkt.find('"')? + 1;
    let len = wkt[start..].find('"')?;
    Some(wkt[start..start + len].to_string())
}

/// The root AUTHORITY/ID is the last one in the string.
#[cfg_attr(feature = "gdal-support", allow(dead_code))]
fn wkt_root_epsg(wkt: &str) -> Option<u32> {
    let upper = wkt.to_ascii_uppercase();
    let (idx, key) = ["AUTHORITY[\"EPSG\",", "ID[\"EPSG\","]
        .into_iter()
        .filter_map(|key| upper.rfind(key).map(|i| (i, key)))
        .max_by_key(|(i, _)| *i)?;

    let tail = &upper[idx + key.len()..];
    let code: String = tail
        .trim_start_matches(['"', ' '])
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    // Only trust it when it closes the root node
    let close = tail.find(']')?;
    if tail[close + 1..].trim() != "]" {
        return None;
    }
    code.parse().ok()
}
