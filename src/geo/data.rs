use anyhow::{Context, Result};
use geojson::{GeoJson, Geometry, JsonObject, PolygonType, Value};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Ring of (lon, lat) positions
pub type Ring = Vec<(f64, f64)>;

/// One polygon: exterior ring plus holes
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonRings {
    pub exterior: Ring,
    pub holes: Vec<Ring>,
}

/// A province feature with its outline polygons and raw properties
#[derive(Debug, Clone)]
pub struct Province {
    pub name: String,
    pub adcode: Option<i64>,
    pub center: Option<(f64, f64)>,
    pub centroid: Option<(f64, f64)>,
    pub properties: JsonObject,
    pub polygons: Vec<PolygonRings>,
}

impl Province {
    /// Even-odd test against every polygon, holes excluded
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.polygons.iter().any(|polygon| {
            ring_contains(&polygon.exterior, lon, lat)
                && !polygon.holes.iter().any(|h| ring_contains(h, lon, lat))
        })
    }
}

fn ring_contains(ring: &[(f64, f64)], lon: f64, lat: f64) -> bool {
    let mut inside = false;
    let mut j = ring.len().wrapping_sub(1);
    for (i, &(xi, yi)) in ring.iter().enumerate() {
        let (xj, yj) = ring[j];
        if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Sum of series values falling inside each province, keyed by province name
pub fn province_values(provinces: &[Province], series: &[DataPoint]) -> Vec<(String, f64)> {
    provinces
        .iter()
        .filter_map(|province| {
            let inside: Vec<f64> = series
                .iter()
                .filter(|p| p.value.is_finite() && province.contains(p.lon, p.lat))
                .map(|p| p.value)
                .collect();
            (!inside.is_empty()).then(|| (province.name.clone(), inside.iter().sum()))
        })
        .collect()
}

/// A value shown as a light pillar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    pub value: f64,
}

/// Everything loaded from the data directory
#[derive(Debug, Clone, Default)]
pub struct MapData {
    pub provinces: Vec<Province>,
    pub series: Vec<DataPoint>,
}

/// Load province outlines and the pillar series from `data_dir`.
/// Built-in outlines stand in only when `china.json` is absent. A file that
/// is empty or fails to parse yields no provinces, so no map is built.
pub fn load_all(data_dir: &Path) -> MapData {
    let provinces_path = data_dir.join("china.json");
    let provinces = if provinces_path.exists() {
        load_provinces(&provinces_path).unwrap_or_else(|e| {
            warn!("Failed to load {}: {e:#}", provinces_path.display());
            Vec::new()
        })
    } else {
        info!("using built-in province outlines");
        builtin_provinces()
    };
    if provinces.is_empty() {
        warn!("no province features, the map stays empty");
    }

    let series_path = data_dir.join("series.json");
    let series = if series_path.exists() {
        load_series(&series_path).unwrap_or_else(|e| {
            warn!("Failed to load {}: {e:#}", series_path.display());
            default_series()
        })
    } else {
        default_series()
    };

    info!(provinces = provinces.len(), points = series.len(), "map data ready");
    MapData { provinces, series }
}

/// Parse a GeoJSON file of province features
pub fn load_provinces(path: &Path) -> Result<Vec<Province>> {
    let mut bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let geojson: GeoJson = simd_json::serde::from_slice(&mut bytes)
        .with_context(|| format!("parsing GeoJSON {}", path.display()))?;
    Ok(provinces_from_geojson(&geojson))
}

/// Parse a JSON array of data points
pub fn load_series(path: &Path) -> Result<Vec<DataPoint>> {
    let mut bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let series: Vec<DataPoint> = simd_json::serde::from_slice(&mut bytes)
        .with_context(|| format!("parsing series {}", path.display()))?;
    Ok(series)
}

/// Extract polygon features. Features without polygon geometry are skipped.
pub fn provinces_from_geojson(geojson: &GeoJson) -> Vec<Province> {
    let features: Vec<(Option<&JsonObject>, &Geometry)> = match geojson {
        GeoJson::FeatureCollection(fc) => fc
            .features
            .iter()
            .filter_map(|f| f.geometry.as_ref().map(|g| (f.properties.as_ref(), g)))
            .collect(),
        GeoJson::Feature(f) => f
            .geometry
            .as_ref()
            .map(|g| vec![(f.properties.as_ref(), g)])
            .unwrap_or_default(),
        GeoJson::Geometry(g) => vec![(None, g)],
    };

    features
        .into_iter()
        .filter_map(|(props, geometry)| {
            let mut polygons = Vec::new();
            collect_polygons(geometry, &mut polygons);
            if polygons.is_empty() {
                debug!("skipping feature without polygons");
                return None;
            }
            let properties = props.cloned().unwrap_or_default();
            Some(Province {
                name: properties
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
                adcode: properties.get("adcode").and_then(|v| v.as_i64()),
                center: properties.get("center").and_then(lon_lat),
                centroid: properties.get("centroid").and_then(lon_lat),
                properties,
                polygons,
            })
        })
        .collect()
}

fn collect_polygons(geometry: &Geometry, out: &mut Vec<PolygonRings>) {
    match &geometry.value {
        Value::Polygon(rings) => out.extend(polygon_rings(rings)),
        Value::MultiPolygon(polygons) => out.extend(polygons.iter().filter_map(polygon_rings)),
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                collect_polygons(g, out);
            }
        }
        _ => warn!("ignoring non-polygon geometry"),
    }
}

fn polygon_rings(rings: &PolygonType) -> Option<PolygonRings> {
    let mut rings = rings.iter().map(|ring| {
        ring.iter()
            .filter(|pos| pos.len() >= 2)
            .map(|pos| (pos[0], pos[1]))
            .collect::<Ring>()
    });
    let exterior = rings.next()?;
    if exterior.len() < 3 {
        return None;
    }
    Some(PolygonRings {
        exterior,
        holes: rings.filter(|r| r.len() >= 3).collect(),
    })
}

fn lon_lat(value: &serde_json::Value) -> Option<(f64, f64)> {
    let arr = value.as_array()?;
    Some((arr.first()?.as_f64()?, arr.get(1)?.as_f64()?))
}

/// Pillar values shown when no series file is present
pub fn default_series() -> Vec<DataPoint> {
    [
        ("桂林", 110.109828, 25.047893, 980.0),
        ("北京", 116.405285, 39.904989, 2189.0),
        ("上海", 121.472644, 31.231706, 2487.0),
        ("广州", 113.280637, 23.125178, 1868.0),
        ("成都", 104.065735, 30.659462, 2094.0),
        ("武汉", 114.298572, 30.584355, 1233.0),
        ("西安", 108.948024, 34.263161, 1296.0),
        ("乌鲁木齐", 87.617733, 43.792818, 405.0),
        ("拉萨", 91.132212, 29.660361, 87.0),
        ("哈尔滨", 126.642464, 45.756967, 1001.0),
    ]
    .into_iter()
    .map(|(name, lon, lat, value)| DataPoint {
        name: name.to_string(),
        lon,
        lat,
        value,
    })
    .collect()
}

fn builtin(name: &str, adcode: i64, center: (f64, f64), outline: &[(f64, f64)]) -> Province {
    let mut properties = JsonObject::new();
    properties.insert("name".into(), name.into());
    properties.insert("adcode".into(), adcode.into());
    properties.insert("center".into(), serde_json::json!([center.0, center.1]));
    Province {
        name: name.to_string(),
        adcode: Some(adcode),
        center: Some(center),
        centroid: None,
        properties,
        polygons: vec![PolygonRings {
            exterior: outline.to_vec(),
            holes: Vec::new(),
        }],
    }
}

/// Coarse outlines of a few provinces for running without a data file
pub fn builtin_provinces() -> Vec<Province> {
    vec![
        builtin(
            "新疆维吾尔自治区",
            650000,
            (87.617733, 43.792818),
            &[
                (73.5, 39.5), (75.0, 37.0), (78.0, 35.5), (80.5, 35.5), (86.0, 36.0),
                (91.0, 36.5), (94.0, 36.5), (96.0, 42.5), (91.0, 45.0), (90.5, 47.5),
                (87.5, 49.0), (85.0, 47.0), (82.5, 45.5), (80.0, 45.0), (80.0, 42.5),
                (76.0, 40.5), (73.5, 39.5),
            ],
        ),
        builtin(
            "西藏自治区",
            540000,
            (91.132212, 29.660361),
            &[
                (78.5, 32.5), (79.0, 30.5), (81.5, 30.0), (85.0, 28.5), (88.0, 27.9),
                (92.0, 27.0), (96.0, 28.5), (98.5, 29.0), (98.5, 32.5), (96.0, 35.0),
                (91.0, 36.5), (86.0, 36.0), (80.5, 35.5), (78.5, 32.5),
            ],
        ),
        builtin(
            "青海省",
            630000,
            (101.778916, 36.623178),
            &[
                (89.5, 37.0), (91.0, 36.5), (96.0, 35.0), (98.5, 32.5), (101.5, 33.5),
                (103.0, 35.0), (102.5, 37.5), (100.5, 38.5), (98.0, 39.0), (95.0, 38.5),
                (90.5, 38.5), (89.5, 37.0),
            ],
        ),
        builtin(
            "内蒙古自治区",
            150000,
            (111.670801, 40.818311),
            &[
                (97.2, 42.8), (101.0, 42.5), (105.0, 41.7), (111.0, 43.7), (115.5, 45.0),
                (119.5, 46.8), (116.0, 48.0), (117.8, 49.5), (120.0, 52.0), (122.0, 53.3),
                (126.0, 52.5), (121.5, 47.0), (119.5, 45.0), (119.5, 42.5), (113.0, 40.6),
                (111.0, 40.3), (107.0, 39.5), (105.0, 37.8), (103.0, 40.5), (99.5, 40.9),
                (97.2, 42.8),
            ],
        ),
        builtin(
            "黑龙江省",
            230000,
            (126.642464, 45.756967),
            &[
                (121.5, 53.3), (126.0, 52.7), (127.5, 49.8), (131.0, 47.7), (134.8, 48.3),
                (133.0, 45.0), (131.0, 44.8), (130.5, 43.0), (128.0, 44.5), (126.0, 45.0),
                (124.0, 46.0), (122.0, 47.5), (121.5, 53.3),
            ],
        ),
        builtin(
            "四川省",
            510000,
            (104.065735, 30.659462),
            &[
                (97.5, 33.5), (99.0, 29.0), (101.0, 26.5), (103.0, 26.3), (104.5, 28.0),
                (106.0, 28.0), (108.5, 30.0), (108.0, 32.3), (106.0, 32.8), (104.0, 33.4),
                (102.5, 34.0), (97.5, 33.5),
            ],
        ),
        builtin(
            "广东省",
            440000,
            (113.280637, 23.125178),
            &[
                (109.7, 21.5), (111.0, 21.5), (113.5, 22.2), (116.5, 22.9), (117.2, 23.6),
                (116.5, 24.8), (115.0, 24.6), (113.5, 25.3), (112.0, 24.5), (111.5, 23.5),
                (110.4, 22.6), (109.7, 21.5),
            ],
        ),
        builtin(
            "北京市",
            110000,
            (116.405285, 39.904989),
            &[
                (115.4, 39.5), (116.8, 39.4), (117.4, 40.2), (116.8, 41.0), (115.9, 40.6),
                (115.4, 39.5),
            ],
        ),
    ]
}
