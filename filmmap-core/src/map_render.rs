use crate::cache::FilmRecord;
use crate::geocoding::Coordinates;
use anyhow::{Context, Result};
use askama::Template;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const LEAFLET_VERSION: &str = "1.9.4";

/// Fill colours for the population overlay
const POPULATION_LOW: u64 = 10_000_000;
const POPULATION_HIGH: u64 = 20_000_000;

#[derive(Debug, Clone, Serialize)]
struct TileLayer {
    name: &'static str,
    url: &'static str,
    attribution: &'static str,
}

const TILE_LAYERS: [TileLayer; 4] = [
    TileLayer {
        name: "OpenStreetMap",
        url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
        attribution: "&copy; OpenStreetMap contributors",
    },
    TileLayer {
        name: "Terrain",
        url: "https://{s}.tile.opentopomap.org/{z}/{x}/{y}.png",
        attribution: "&copy; OpenStreetMap contributors, SRTM | &copy; OpenTopoMap (CC-BY-SA)",
    },
    TileLayer {
        name: "Watercolor",
        url: "https://tiles.stadiamaps.com/tiles/stamen_watercolor/{z}/{x}/{y}.jpg",
        attribution: "&copy; Stadia Maps &copy; Stamen Design &copy; OpenStreetMap contributors",
    },
    TileLayer {
        name: "Light",
        url: "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}.png",
        attribution: "&copy; OpenStreetMap contributors &copy; CARTO",
    },
];

/// Options for the generated map document
#[derive(Debug, Clone)]
pub struct MapOptions {
    pub center: Coordinates,
    pub zoom: u8,
    /// Name of the marker layer in the layer control
    pub layer_name: String,
    pub home: Option<Coordinates>,
    /// GeoJSON file with a `POP2005` property per feature
    pub population_overlay: Option<PathBuf>,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            center: Coordinates::new(49.839683, 24.029717),
            zoom: 10,
            layer_name: "Films".to_string(),
            home: None,
            population_overlay: None,
        }
    }
}

#[derive(Serialize)]
struct Marker<'a> {
    label: &'a str,
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
struct MapData<'a> {
    center: [f64; 2],
    zoom: u8,
    layer_name: &'a str,
    tiles: &'a [TileLayer],
    markers: Vec<Marker<'a>>,
    home: Option<[f64; 2]>,
    population: Option<serde_json::Value>,
    population_low: u64,
    population_high: u64,
}

/// Standalone Leaflet page; all map content travels in `map_data`
#[derive(Template)]
#[template(path = "map.html")]
struct MapPage<'a> {
    title: &'a str,
    leaflet_version: &'a str,
    /// JSON object literal, embedded unescaped inside a script element
    map_data: String,
}

/// Renders the records as a standalone Leaflet page
pub fn render_map(records: &[FilmRecord], options: &MapOptions) -> Result<String> {
    let population = match &options.population_overlay {
        Some(path) => load_overlay(path)?,
        None => None,
    };

    let data = MapData {
        center: [options.center.latitude, options.center.longitude],
        zoom: options.zoom,
        layer_name: &options.layer_name,
        tiles: &TILE_LAYERS,
        markers: records
            .iter()
            .map(|r| Marker {
                label: &r.title,
                lat: r.latitude,
                lon: r.longitude,
            })
            .collect(),
        home: options.home.map(|h| [h.latitude, h.longitude]),
        population,
        population_low: POPULATION_LOW,
        population_high: POPULATION_HIGH,
    };

    // "</" would close the script element early
    let map_data = serde_json::to_string(&data)?.replace("</", "<\\/");

    let page = MapPage {
        title: &options.layer_name,
        leaflet_version: LEAFLET_VERSION,
        map_data,
    };
    page.render().context("Failed to render map page")
}

/// Renders the map and writes it to `path`
pub fn write_map(path: &Path, records: &[FilmRecord], options: &MapOptions) -> Result<()> {
    let html = render_map(records, options)?;
    fs::write(path, html).with_context(|| format!("Failed to write map to {}", path.display()))?;
    log::info!(
        "Wrote map with {} markers to {}",
        records.len(),
        path.display()
    );
    Ok(())
}

fn load_overlay(path: &Path) -> Result<Option<serde_json::Value>> {
    if !path.exists() {
        log::warn!(
            "Population overlay {} not found, skipping it",
            path.display()
        );
        return Ok(None);
    }

    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
    let value = serde_json::from_str(text)
        .with_context(|| format!("Failed to parse GeoJSON in {}", path.display()))?;
    Ok(Some(value))
}
