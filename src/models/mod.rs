//! Core data models for the upload service.
//!
//! A `Submission` lives only for the duration of one request; the
//! `MetadataRecord` is what survives it on disk.

pub mod metadata;
pub mod submission;
