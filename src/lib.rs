pub mod config;
pub mod dashboard;
pub mod filters;
pub mod prefs;
pub mod query;
pub mod series;
pub mod timerange;
pub mod view;
