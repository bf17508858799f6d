//! Interactive map of enriched records.
//!
//! Records are grouped per country into [`CountryMarker`]s, rendered into a
//! Leaflet page and served on localhost until Ctrl-C. Only records with
//! coordinates get a marker; the header statistics count every record.

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::response::{Html, Json};
use axum::routing::get;
use axum::Router;
use log::info;
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::record::EnrichedRecord;
use crate::template::Template;

pub const DEFAULT_PORT: u16 = 5000;

const MAX_CITIES: usize = 5;
const MAX_IPS: usize = 10;
const MAX_ASNS: usize = 10;

/// One circle on the map.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CountryMarker {
    pub code: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub unique_ips: usize,
    pub unique_asns: usize,
    pub total_cities: usize,
    /// First cities in alphabetical order, `Unknown` excluded.
    pub cities: Vec<String>,
    /// First addresses in ascending order.
    pub ips: Vec<String>,
    /// `ASN <number> - <organization>` lines, ordered by AS number text.
    pub asns: Vec<String>,
    pub radius: usize,
    /// Fill colour on the green → yellow → red intensity scale.
    pub color: String,
}

/// Page header statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MapStats {
    pub total_ips: usize,
    pub total_countries: usize,
    pub total_asns: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MapData {
    pub stats: MapStats,
    pub max_count: usize,
    pub markers: Vec<CountryMarker>,
}

#[derive(Default)]
struct CountryAcc {
    location: Option<(f64, f64)>,
    ips: BTreeSet<String>,
    cities: BTreeSet<String>,
    asns: BTreeMap<String, String>,
}

/// Group `records` per country and compute the header statistics.
pub fn aggregate(records: &[EnrichedRecord]) -> MapData {
    let mut countries: BTreeMap<(String, String), CountryAcc> = BTreeMap::new();

    for record in records {
        let Some(location) = record.coordinates() else {
            continue;
        };
        let key = (
            record.country_code_or_unknown().to_string(),
            record.country_name_or_unknown().to_string(),
        );
        let acc = countries.entry(key).or_default();
        acc.location.get_or_insert(location);
        acc.ips.insert(record.ip.clone());
        if let Some(city) = &record.city {
            acc.cities.insert(city.clone());
        }
        if let Some(asn) = record.asn.as_ref().filter(|a| a.is_known()) {
            acc.asns
                .entry(asn.number_or_unknown())
                .or_insert_with(|| asn.organization_or_unknown().to_string());
        }
    }

    let max_count = countries
        .values()
        .map(|acc| acc.ips.len())
        .max()
        .unwrap_or(1);

    let markers = countries
        .into_iter()
        .filter_map(|((code, name), acc)| {
            let (latitude, longitude) = acc.location?;
            let unique_ips = acc.ips.len();
            Some(CountryMarker {
                radius: (unique_ips * 3).min(20),
                color: intensity_color(unique_ips, max_count),
                unique_asns: acc.asns.len(),
                total_cities: acc.cities.len(),
                cities: acc.cities.into_iter().take(MAX_CITIES).collect(),
                ips: acc.ips.into_iter().take(MAX_IPS).collect(),
                asns: acc
                    .asns
                    .into_iter()
                    .take(MAX_ASNS)
                    .map(|(number, org)| format!("ASN {number} - {org}"))
                    .collect(),
                code,
                name,
                latitude,
                longitude,
                unique_ips,
            })
        })
        .collect();

    MapData {
        stats: stats(records),
        max_count,
        markers,
    }
}

fn stats(records: &[EnrichedRecord]) -> MapStats {
    let ips: FxHashSet<&str> = records.iter().map(|r| r.ip.as_str()).collect();
    let countries: FxHashSet<&str> = records.iter().map(|r| r.country_code_or_unknown()).collect();
    let asns: FxHashSet<u32> = records
        .iter()
        .filter_map(|r| r.asn.as_ref())
        .filter(|a| a.is_known())
        .filter_map(|a| a.number)
        .collect();

    MapStats {
        total_ips: ips.len(),
        total_countries: countries.len(),
        total_asns: asns.len(),
    }
}

/// Linear green → yellow → red scale over `0..=max`.
fn intensity_color(count: usize, max: usize) -> String {
    let t = if max == 0 {
        0.0
    } else {
        (count as f64 / max as f64).clamp(0.0, 1.0)
    };
    let (r, g) = if t <= 0.5 {
        ((t / 0.5 * 255.0).round() as u8, 255u8)
    } else {
        (255u8, ((1.0 - (t - 0.5) / 0.5) * 255.0).round() as u8)
    };
    format!("#{r:02x}{g:02x}00")
}

/// Render the full HTML page for `data`.
pub fn render_page(data: &MapData) -> Result<String> {
    let template = Template::compile(PAGE_TEMPLATE)?;
    // keep "</script>" inside string values from closing the data block
    let json = serde_json::to_string(data)?.replace("</", "<\\/");
    let total_ips = data.stats.total_ips.to_string();
    let total_countries = data.stats.total_countries.to_string();
    let total_asns = data.stats.total_asns.to_string();

    Ok(template.render(|name| match name {
        "total_ips" => &total_ips,
        "total_countries" => &total_countries,
        "total_asns" => &total_asns,
        "map_data" => &json,
        _ => "",
    }))
}

struct MapState {
    page: String,
    data: MapData,
}

async fn index(State(state): State<Arc<MapState>>) -> Html<String> {
    Html(state.page.clone())
}

async fn map_data(State(state): State<Arc<MapState>>) -> Json<MapData> {
    Json(state.data.clone())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down map server");
    }
}

/// Serve the map for `records` on `addr`, blocking until Ctrl-C.
pub fn serve(records: &[EnrichedRecord], addr: SocketAddr) -> Result<()> {
    let data = aggregate(records);
    let page = render_page(&data)?;
    info!(
        "Map: {} IPs, {} countries, {} ASNs, {} markers",
        data.stats.total_ips,
        data.stats.total_countries,
        data.stats.total_asns,
        data.markers.len()
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_server(addr, MapState { page, data }))
}

async fn run_server(addr: SocketAddr, state: MapState) -> Result<()> {
    let app = Router::new()
        .route("/", get(index))
        .route("/data.json", get(map_data))
        .with_state(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| Error::Serve { addr, source })?;

    info!("Map server listening on http://{}/ (open it in a browser, Ctrl-C to stop)", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|source| Error::Serve { addr, source })
}

const PAGE_TEMPLATE: &str = r##"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>IP Filter - Visualization</title>
    <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
    <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
    <script src="https://unpkg.com/leaflet.heat@0.2.0/dist/leaflet-heat.js"></script>
    <style>
        body { margin: 0; padding: 0; background-color: #0a0a0a; }
        #map { position: absolute; top: 0; bottom: 0; width: 100%; }
        .panel {
            position: absolute;
            z-index: 1000;
            background-color: rgba(0, 0, 0, 0.7);
            color: #00ff00;
            border-radius: 5px;
            font-family: 'Courier New', monospace;
            border: 1px solid #00ff00;
        }
        .title { top: 10px; left: 50%; transform: translateX(-50%); padding: 10px 20px; text-align: center; }
        .stats { bottom: 20px; right: 20px; padding: 10px; }
        .legend { bottom: 20px; left: 20px; padding: 10px; font-size: 12px; }
        .legend .bar { width: 160px; height: 10px; background: linear-gradient(to right, #00ff00, #ffff00, #ff0000); }
        .count {
            font-family: 'Courier New', monospace;
            background-color: rgba(0, 0, 0, 0.7);
            color: #00ff00;
            border: 1px solid #00ff00;
            border-radius: 50%;
            width: 40px; height: 40px; line-height: 40px;
            text-align: center; font-weight: bold;
        }
        .popup {
            font-family: 'Courier New', monospace;
            background-color: rgba(0, 0, 0, 0.8);
            color: #00ff00;
            padding: 10px;
            border-radius: 5px;
            border: 1px solid #00ff00;
            min-width: 300px;
        }
        .popup h4 { margin: 0 0 10px 0; color: #fff; }
        .popup .list {
            margin: 10px 0 5px 0; max-height: 120px; overflow-y: auto; font-size: 12px;
            background-color: rgba(0, 0, 0, 0.5); padding: 5px; border-radius: 3px;
        }
    </style>
</head>
<body>
    <div class="panel title">
        <h2 style="margin: 0;">IP Filter - Threat Intelligence Map</h2>
        <small>Visualization of infrastructure</small>
    </div>
    <div class="panel stats">
        <div>Total IPs: {{ total_ips }}</div>
        <div>Countries: {{ total_countries }}</div>
        <div>ASNs: {{ total_asns }}</div>
    </div>
    <div class="panel legend">
        <div>Number of Unique IPs per country</div>
        <div class="bar"></div>
        <div><span>0</span><span id="legend-max" style="float: right;"></span></div>
    </div>
    <div id="map"></div>
    <script>
        const data = {{ map_data }};

        function esc(s) {
            return String(s).replace(/[&<>"']/g, c => ({
                '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;'
            })[c]);
        }

        function list(items, total, noun) {
            let html = items.map(esc).join('<br>');
            if (total > items.length) {
                html += '<br>... (' + total + ' total ' + noun + ')';
            }
            return html;
        }

        function popup(m) {
            return '<div class="popup">'
                + '<h4>' + esc(m.name) + ' (' + esc(m.code.toUpperCase()) + ')</h4>'
                + '<div><strong>Unique IPs:</strong> ' + m.unique_ips + '</div>'
                + '<div><strong>Unique ASNs:</strong> ' + m.unique_asns + '</div>'
                + '<div><strong>Cities:</strong><br>' + list(m.cities, m.total_cities, 'cities') + '</div>'
                + '<div class="list"><strong>IPs:</strong><br>' + list(m.ips, m.unique_ips, 'IPs') + '</div>'
                + '<div class="list"><strong>ASNs:</strong><br>' + list(m.asns, m.unique_asns, 'ASNs') + '</div>'
                + '</div>';
        }

        const map = L.map('map', { preferCanvas: true }).setView([20, 0], 2);
        L.tileLayer('https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}{r}.png', {
            attribution: '&copy; OpenStreetMap contributors &copy; CARTO',
            subdomains: 'abcd',
            maxZoom: 19
        }).addTo(map);

        const heat = [];
        for (const m of data.markers) {
            const content = popup(m);
            L.circleMarker([m.latitude, m.longitude], {
                radius: m.radius,
                color: '#00ff00',
                fill: true,
                fillColor: m.color,
                fillOpacity: 0.7
            }).bindPopup(content, { maxWidth: 400 }).addTo(map);

            L.marker([m.latitude, m.longitude], {
                icon: L.divIcon({
                    html: '<div class="count">' + m.unique_ips + '</div>',
                    className: '',
                    iconSize: [40, 40]
                })
            }).bindPopup(content, { maxWidth: 400 }).addTo(map);

            heat.push([m.latitude, m.longitude, m.unique_ips]);
        }

        if (L.heatLayer) {
            L.heatLayer(heat, { minOpacity: 0.3, radius: 25, max: data.max_count }).addTo(map);
        }
        document.getElementById('legend-max').textContent = data.max_count;
    </script>
</body>
</html>
"##;
