pub mod ctd_pipeline;
pub mod mooring_pipeline;
pub mod stations_pipeline;

#[cfg(test)]
pub mod test_support;
