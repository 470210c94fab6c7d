pub mod animation;
pub mod charts;
pub mod choropleth;
pub mod climate_api;
pub mod life_table;
pub mod percentile;
pub mod queries;
pub mod query_cache;
pub mod selection;
