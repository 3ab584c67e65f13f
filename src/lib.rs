pub mod analyzer;
pub mod catalog;
pub mod choreography;
pub mod clips;
pub mod config;
pub mod export;
pub mod pose;
pub mod scoring;
pub mod weights;

/// Audio file extensions we can decode
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "wav",
    // Native (symphonia containers)
    "m4a", "aac", "mp4",
];

/// Application name for XDG paths
pub const APP_NAME: &str = "stepsync";
