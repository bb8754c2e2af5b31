pub mod coverage;
pub mod geojson;
pub mod rivers;
