//! HTTP image captioning.
//!
//! Two loosely coupled pieces: a single-endpoint caption service
//! ([`server`]) that stages an uploaded image, validates it and hands it to
//! a pretrained vision-to-text model ([`captioner`]), and the browser front
//! end ([`ui`]) that collects an image from a user and shows the result.

pub mod captioner;
pub mod config;
pub mod error;
pub mod server;
pub mod staging;
pub mod ui;
