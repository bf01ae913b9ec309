pub mod aggregate;
pub mod config;
pub mod cycle;
pub mod cycle_db;
pub mod decode;
pub mod error;
pub mod memory;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod resolver;
pub mod service;
pub mod table;
pub mod tactical;
pub mod workbook;
