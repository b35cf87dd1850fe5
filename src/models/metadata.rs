//! Represents the JSON sidecar recorded for each accepted submission.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::submission::Submission;

/// Metadata persisted as `{id}.json` next to the stored files.
///
/// The record is written once when the submission is accepted and is never
/// rewritten afterwards.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    /// Submission id (96 random bits, hex).
    pub id: String,

    /// Acceptance time, ISO-8601 UTC with millisecond precision.
    pub timestamp: String,

    /// Client network address, if known.
    pub ip: Option<String>,

    /// Stored name of the primary image.
    pub photo_filename: String,

    /// Stored name of the secondary image, if one was sent.
    pub qr_filename: Option<String>,

    pub account: String,

    pub payer_phone: String,

    pub latitude: Option<f64>,

    pub longitude: Option<f64>,

    pub user_agent: Option<String>,
}

impl MetadataRecord {
    /// Assemble the record for an accepted submission.
    pub fn new(
        id: String,
        accepted_at: DateTime<Utc>,
        photo_filename: String,
        submission: &Submission,
    ) -> Self {
        Self {
            id,
            timestamp: accepted_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            ip: submission.client_ip.clone(),
            photo_filename,
            qr_filename: submission.qr.as_ref().map(|f| f.stored_name.clone()),
            account: submission.fields.account(),
            payer_phone: submission.fields.payer_phone(),
            latitude: submission.fields.latitude(),
            longitude: submission.fields.longitude(),
            user_agent: submission.user_agent.clone(),
        }
    }

    /// File name of the sidecar inside the upload directory.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.id)
    }
}
