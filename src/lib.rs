//! OCR Review Server Library
//!
//! Asynchronous OCR jobs over uploaded images, followed by interactive
//! review of the detected regions. The server binary is in main.rs.
//!
//! # Modules
//!
//! - `results`: Regions, geometry identity, the per-image store, clean/hit/export
//! - `jobs`: Job registry and the background OCR worker
//! - `ocr`: OCR engines (Tesseract, remote HTTP, static)
//! - `storage`: Uploaded image storage
//! - `routes`: REST API
//! - `client`: Polling client and edit reconciler

pub mod client;
pub mod config;
pub mod error;
pub mod jobs;
pub mod ocr;
pub mod results;
pub mod routes;
pub mod state;
pub mod storage;
