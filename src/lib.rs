pub mod alarm;
pub mod config;
pub mod constants;
pub mod detection;
pub mod extractors;
pub mod logging;
pub mod middleware;
pub mod pipeline;
pub mod replay;
pub mod response;
pub mod routes;
pub mod sessions;
pub mod state;
pub mod workers;
