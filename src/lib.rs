//! covermux - Cover Image + Audio Muxing Service
//!
//! Upload an audio/video file and a cover image, get back a single muxed
//! file. The muxing itself is done by ffmpeg, either behind an HTTP endpoint
//! or locally inside an isolated per-operation namespace.

pub mod cli;
pub mod config;
pub mod error;
pub mod artifact;
pub mod progress;
pub mod upload;
pub mod media;
pub mod sandbox;
pub mod server;
pub mod form;
