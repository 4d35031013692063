//! Auto-Creative Engine: stages a logo and a product shot, asks a multimodal
//! model for ad concepts, renders one image per concept and hands back a zip
//! of the batch.

pub mod archive;
pub mod config;
pub mod engine;
pub mod error;
pub mod gemini;
pub mod models;
pub mod providers;
pub mod render;
pub mod routes;
pub mod staging;

#[cfg(test)]
mod test_support;
