use arousa_etl::geo::{coverage, rivers};
use arousa_etl::EtlConfig;

const RAW_NETWORK: &str = r#"{
  "type": "FeatureCollection",
  "name": "rede_hidrografica",
  "features": [
    {"type": "Feature", "properties": {"NOME": "Rio Ulla"},
     "geometry": {"type": "LineString",
                  "coordinates": [[-8.65, 42.73], [-8.60, 42.75]]}},
    {"type": "Feature", "properties": {"NOME": "Rio Umia"},
     "geometry": {"type": "MultiLineString",
                  "coordinates": [[[-8.76, 42.51], [-8.70, 42.55]]]}},
    {"type": "Feature", "properties": {"NOME": "Rio Sar"},
     "geometry": {"type": "LineString",
                  "coordinates": [[-8.52, 42.95], [-8.50, 43.00]]}},
    {"type": "Feature", "properties": {"NOME": "Rio Miño"},
     "geometry": {"type": "LineString",
                  "coordinates": [[-7.60, 43.01], [-7.55, 43.05]]}}
  ]
}"#;

const STATIONS_CSV: &str = "\
idEstacion;nomeEstacion;rio;lat;lon;concello;provincia\n\
140440;umia_caldas;Umia;42.6029;-8.64249;Caldas de Reis;\n\
140548;sar_santiago;sar;42.8770;-8.52871;santiago;\n\
99001;mino_lugo;;43.01;-7.55;Lugo;Lugo\n";

#[test]
fn rivers_then_coverage_workflow() {
    let dir = tempfile::tempdir().unwrap();

    let mut config = EtlConfig::default();
    config.paths.rivers_input = dir.path().join("raw/rios.geojson");
    config.paths.rivers_output = dir.path().join("processed/red_fluvial_arousa.geojson");
    config.paths.stations_file = dir.path().join("raw/aforos_meta_raw.csv");
    config.paths.coverage_report = dir.path().join("processed/cobertura_arousa.json");

    std::fs::create_dir_all(dir.path().join("raw")).unwrap();
    std::fs::write(&config.paths.rivers_input, RAW_NETWORK).unwrap();
    std::fs::write(&config.paths.stations_file, STATIONS_CSV).unwrap();

    // Step 1: basin filter drops the Miño, keeps Ulla/Umia/Sar.
    let written = rivers::run(&config).unwrap().expect("filter kept rivers");
    let filtered: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&written).unwrap()).unwrap();
    assert_eq!(filtered["features"].as_array().unwrap().len(), 3);
    // Foreign members survive the round trip.
    assert_eq!(filtered["name"], "rede_hidrografica");

    // Step 2: coverage report against the filtered layer.
    let report_path = coverage::run(&config).unwrap();
    let report: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&report_path).unwrap()).unwrap();

    // The Sar headwaters sit north of the study box.
    assert_eq!(report["river_segments_total"], 3);
    assert_eq!(report["river_segments_in_bbox"], 2);
    assert_eq!(report["segments_per_river"]["RIO ULLA"], 1);
    assert_eq!(report["segments_per_river"]["RIO UMIA"], 1);

    let inside = report["stations_inside"].as_array().unwrap();
    let outside = report["stations_outside"].as_array().unwrap();
    assert_eq!(inside.len(), 2);
    assert_eq!(outside.len(), 1);
    assert_eq!(outside[0]["station_id"], 99001);
}

#[test]
fn coverage_without_rivers_layer_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = EtlConfig::default();
    config.paths.rivers_output = dir.path().join("missing.geojson");

    assert!(coverage::run(&config).is_err());
}
