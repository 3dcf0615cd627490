//! Request fingerprinting
//!
//! A fingerprint is the SHA-256 digest of a canonical serialization of the
//! request. Within a record, fields are written sorted by wire name, so the
//! order in which a client sent them never matters. Record sequences are
//! written in the order given: reordering records yields a new fingerprint.
//!
//! Every name and value is length-prefixed and each section carries its
//! record count, so no two distinct requests share a byte stream.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;
use crate::records::{DiagnosisRecord, MembershipRecord, ScoringRequest};

/// Bumped whenever the canonical layout changes.
const CANONICAL_VERSION: &[u8] = b"raf.scoring-request.v1";

const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// FINGERPRINT TYPE
// ============================================================================

/// Opaque 32-byte request key. Renders as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestFingerprint([u8; 32]);

impl RequestFingerprint {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First eight hex characters, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for RequestFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestFingerprint({})", self.short())
    }
}

impl FromStr for RequestFingerprint {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| ValidationError::InvalidValue {
            field: "fingerprint".to_string(),
            reason,
        };
        let bytes = hex::decode(s).map_err(|e| invalid(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| invalid(format!("expected 32 bytes, got {}", b.len())))?;
        Ok(Self(bytes))
    }
}

impl Serialize for RequestFingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RequestFingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// CANONICAL FIELDS
// ============================================================================

/// Records that can be written into a fingerprint.
pub trait CanonicalFields {
    /// Section tag written before the records of this type.
    const SECTION: &'static str;

    /// `(wire name, canonical value)` pairs, sorted by name.
    fn canonical_fields(&self) -> Vec<(&'static str, String)>;
}

fn sorted(mut fields: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
    fields.sort_unstable_by(|a, b| a.0.cmp(b.0));
    fields
}

impl CanonicalFields for MembershipRecord {
    const SECTION: &'static str = "memberships";

    fn canonical_fields(&self) -> Vec<(&'static str, String)> {
        sorted(vec![
            ("MemberID", self.member_id.clone()),
            ("DOB", self.birth_date.format(DATE_FORMAT).to_string()),
            ("Gender", self.gender.clone()),
            ("RAType", self.ra_type.clone()),
            ("Hospice", self.hospice.as_str().to_string()),
            ("LTIMCAID", self.ltimcaid.as_str().to_string()),
            ("NEMCAID", self.nemcaid.as_str().to_string()),
            ("OREC", self.orec.clone()),
        ])
    }
}

impl CanonicalFields for DiagnosisRecord {
    const SECTION: &'static str = "diagnoses";

    fn canonical_fields(&self) -> Vec<(&'static str, String)> {
        sorted(vec![
            ("MemberID", self.member_id.clone()),
            ("FromDOS", self.from_dos.format(DATE_FORMAT).to_string()),
            ("ThruDOS", self.thru_dos.format(DATE_FORMAT).to_string()),
            ("DxCode", self.dx_code.clone()),
        ])
    }
}

// ============================================================================
// CANONICAL WRITER
// ============================================================================

struct CanonicalWriter {
    hasher: Sha256,
}

impl CanonicalWriter {
    fn new() -> Self {
        let mut writer = Self {
            hasher: Sha256::new(),
        };
        writer.write_bytes(CANONICAL_VERSION);
        writer
    }

    fn write_len(&mut self, len: usize) {
        self.hasher.update((len as u64).to_be_bytes());
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_len(bytes.len());
        self.hasher.update(bytes);
    }

    fn write_section<R: CanonicalFields>(&mut self, records: &[R]) {
        self.write_bytes(R::SECTION.as_bytes());
        self.write_len(records.len());
        for record in records {
            let fields = record.canonical_fields();
            self.write_len(fields.len());
            for (name, value) in &fields {
                self.write_bytes(name.as_bytes());
                self.write_bytes(value.as_bytes());
            }
        }
    }

    fn finish(self) -> RequestFingerprint {
        let digest = self.hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        RequestFingerprint(bytes)
    }
}

/// Validate the request and compute its fingerprint.
pub fn fingerprint(request: &ScoringRequest) -> Result<RequestFingerprint, ValidationError> {
    request.validate()?;

    let mut writer = CanonicalWriter::new();
    writer.hasher.update(request.payment_year.to_be_bytes());
    writer.write_section(&request.memberships);
    writer.write_section(&request.diagnoses);
    Ok(writer.finish())
}
