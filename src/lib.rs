// Biosignal explorer core - multi-resolution drill-down and downsampling
// over long recorded multi-channel biosignals
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
