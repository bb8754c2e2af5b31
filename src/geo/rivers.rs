use crate::config::toml_config::EtlConfig;
use crate::geo::geojson::FeatureCollection;
use crate::utils::error::{EtlError, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Attribute names the cartography sources have used for the river
/// name, tried in order.
pub const NAME_PROPERTY_CANDIDATES: [&str; 5] = ["NOME", "NOMBRE", "nombre", "RIO", "TEXTO"];

pub struct RiverFilterOutcome {
    pub collection: FeatureCollection,
    pub name_property: String,
    pub total: usize,
    pub kept: usize,
}

/// Picks the attribute carrying the river name. Errors list every
/// property seen so the caller can extend the candidate list.
pub fn detect_name_property(collection: &FeatureCollection) -> Result<String> {
    for candidate in NAME_PROPERTY_CANDIDATES {
        if collection
            .features
            .iter()
            .any(|f| f.properties.contains_key(candidate))
        {
            return Ok(candidate.to_string());
        }
    }

    let available: BTreeSet<String> = collection
        .features
        .iter()
        .flat_map(|f| f.properties.keys().cloned())
        .collect();

    Err(EtlError::processing(format!(
        "No river-name property detected. Available properties: {:?}",
        available
    )))
}

/// Keeps the features whose name contains any of the basin river
/// keywords (case-insensitive).
pub fn filter_by_river_name(
    collection: FeatureCollection,
    keywords: &[String],
) -> Result<RiverFilterOutcome> {
    let name_property = detect_name_property(&collection)?;
    tracing::info!("🎯 Filtering by detected column: '{}'", name_property);

    let total = collection.features.len();
    let upper_keywords: Vec<String> = keywords.iter().map(|k| k.to_uppercase()).collect();

    let features: Vec<_> = collection
        .features
        .into_iter()
        .filter(|feature| {
            feature
                .property_str(&name_property)
                .map(|name| {
                    let upper = name.to_uppercase();
                    upper_keywords.iter().any(|k| upper.contains(k))
                })
                .unwrap_or(false)
        })
        .collect();

    let kept = features.len();
    tracing::info!("💧 Selected segments: {} of {}", kept, total);

    Ok(RiverFilterOutcome {
        collection: FeatureCollection {
            kind: collection.kind,
            features,
            extra: collection.extra,
        },
        name_property,
        total,
        kept,
    })
}

/// Loads the raw network, filters it to the contributing basins and
/// writes the result. An empty selection leaves no output file behind:
/// downstream steps must not consume an empty layer by mistake.
/// GeoJSON is WGS84 by specification, so no reprojection is involved.
pub fn run(config: &EtlConfig) -> Result<Option<PathBuf>> {
    let input = &config.paths.rivers_input;
    tracing::info!("🔍 Reading river network from {}", input.display());

    let bytes = std::fs::read(input)?;
    let collection = FeatureCollection::from_slice(&bytes)?;
    tracing::info!("✅ Loaded. Total geometries: {}", collection.features.len());

    let outcome = filter_by_river_name(collection, &config.sources.river_keywords)?;

    if outcome.kept == 0 {
        tracing::warn!("The filter returned 0 rivers. Review the keywords.");
        return Ok(None);
    }

    let output = &config.paths.rivers_output;
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, outcome.collection.to_vec_pretty()?)?;
    tracing::info!("💾 Filtered network saved to {}", output.display());

    Ok(Some(output.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection_json(property: &str, names: &[&str]) -> String {
        let features: Vec<String> = names
            .iter()
            .map(|name| {
                format!(
                    r#"{{"type": "Feature", "properties": {{"{}": "{}"}},
                        "geometry": {{"type": "LineString",
                                      "coordinates": [[-8.7, 42.7], [-8.6, 42.75]]}}}}"#,
                    property, name
                )
            })
            .collect();
        format!(
            r#"{{"type": "FeatureCollection", "features": [{}]}}"#,
            features.join(", ")
        )
    }

    fn keywords() -> Vec<String> {
        vec!["ULLA".to_string(), "UMIA".to_string(), "SAR".to_string()]
    }

    #[test]
    fn test_detect_name_property_in_order() {
        let geojson = collection_json("NOME", &["Rio Ulla"]);
        let collection = FeatureCollection::from_slice(geojson.as_bytes()).unwrap();
        assert_eq!(detect_name_property(&collection).unwrap(), "NOME");

        let geojson = collection_json("TEXTO", &["Rio Ulla"]);
        let collection = FeatureCollection::from_slice(geojson.as_bytes()).unwrap();
        assert_eq!(detect_name_property(&collection).unwrap(), "TEXTO");
    }

    #[test]
    fn test_detect_name_property_error_lists_available() {
        let geojson = collection_json("WEIRD_COL", &["Rio Ulla"]);
        let collection = FeatureCollection::from_slice(geojson.as_bytes()).unwrap();
        let err = detect_name_property(&collection).unwrap_err();
        assert!(err.to_string().contains("WEIRD_COL"));
    }

    #[test]
    fn test_filter_keeps_basin_rivers_case_insensitive() {
        let geojson = collection_json(
            "NOME",
            &["Rio Ulla", "rio umia", "RIO SAR", "Rio Miño", "Rego de Vilar"],
        );
        let collection = FeatureCollection::from_slice(geojson.as_bytes()).unwrap();

        let outcome = filter_by_river_name(collection, &keywords()).unwrap();

        assert_eq!(outcome.total, 5);
        assert_eq!(outcome.kept, 3);
        let names: Vec<&str> = outcome
            .collection
            .features
            .iter()
            .filter_map(|f| f.property_str("NOME"))
            .collect();
        assert_eq!(names, vec!["Rio Ulla", "rio umia", "RIO SAR"]);
    }

    #[test]
    fn test_run_writes_filtered_layer() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("rios.geojson");
        std::fs::write(&input, collection_json("NOME", &["Rio Ulla", "Rio Miño"])).unwrap();

        let mut config = EtlConfig::default();
        config.paths.rivers_input = input;
        config.paths.rivers_output = dir.path().join("out/red_fluvial.geojson");

        let written = run(&config).unwrap().unwrap();
        let saved =
            FeatureCollection::from_slice(&std::fs::read(written).unwrap()).unwrap();
        assert_eq!(saved.features.len(), 1);
    }

    #[test]
    fn test_run_empty_selection_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("rios.geojson");
        std::fs::write(&input, collection_json("NOME", &["Rio Miño"])).unwrap();

        let mut config = EtlConfig::default();
        config.paths.rivers_input = input;
        config.paths.rivers_output = dir.path().join("out/red_fluvial.geojson");

        assert!(run(&config).unwrap().is_none());
        assert!(!config.paths.rivers_output.exists());
    }
}
