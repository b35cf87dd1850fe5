//! Represents one upload submission while its request is in flight.

use serde::Serialize;
use std::path::PathBuf;

/// Which file slot of the form a part was sent under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileField {
    Photo,
    Qr,
}

impl FileField {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "photo" => Some(Self::Photo),
            "qr" => Some(Self::Qr),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Qr => "qr",
        }
    }
}

/// A file written to a staging name in the upload directory, not yet
/// visible under its final name.
#[derive(Clone, Debug)]
pub struct StoredFile {
    /// Form slot the file was uploaded under.
    pub field: FileField,

    /// Generated final name (`{ts}-{hex}{ext}`).
    pub stored_name: String,

    /// Staging path the bytes currently live at.
    pub staging_path: PathBuf,

    /// Name the client sent, if any.
    pub original_name: Option<String>,

    /// Declared MIME type.
    pub content_type: String,

    /// Number of bytes written.
    pub size_bytes: u64,
}

/// Raw text fields as received.
#[derive(Clone, Debug, Default)]
pub struct FormFields {
    pub account: Option<String>,
    pub payer_phone: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

impl FormFields {
    /// Record a text part. Returns `false` for names the form does not use.
    pub fn set(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "account" => &mut self.account,
            "payerPhone" => &mut self.payer_phone,
            "latitude" => &mut self.latitude,
            "longitude" => &mut self.longitude,
            _ => return false,
        };
        *slot = Some(value);
        true
    }

    pub fn account(&self) -> String {
        trimmed(self.account.as_deref())
    }

    pub fn payer_phone(&self) -> String {
        trimmed(self.payer_phone.as_deref())
    }

    pub fn latitude(&self) -> Option<f64> {
        parse_coordinate(self.latitude.as_deref())
    }

    pub fn longitude(&self) -> Option<f64> {
        parse_coordinate(self.longitude.as_deref())
    }

    /// The coordinates exactly as the client sent them.
    pub fn received_location(&self) -> ReceivedLocation {
        ReceivedLocation {
            latitude: self.latitude.clone(),
            longitude: self.longitude.clone(),
        }
    }
}

/// Echo of the location fields.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ReceivedLocation {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

/// Everything collected from one `POST /upload`.
#[derive(Debug, Default)]
pub struct Submission {
    pub photo: Option<StoredFile>,
    pub qr: Option<StoredFile>,
    pub fields: FormFields,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl Submission {
    pub fn slot_mut(&mut self, field: FileField) -> &mut Option<StoredFile> {
        match field {
            FileField::Photo => &mut self.photo,
            FileField::Qr => &mut self.qr,
        }
    }

    /// Staged files in promotion order.
    pub fn files(&self) -> impl Iterator<Item = &StoredFile> {
        self.photo.iter().chain(self.qr.iter())
    }
}

fn trimmed(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

/// Blank, unparsable and non-finite values all become `None`.
fn parse_coordinate(value: Option<&str>) -> Option<f64> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}
