//! Records and flag results produced during an analysis session.

use serde::{Deserialize, Serialize};

/// Session-unique invoice identifier, assigned by the engine at ingestion.
///
/// Identifiers are sequential starting at 1, so two sessions fed the same
/// documents in the same order assign the same ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "INV-{:04}", self.0)
    }
}

/// Structural (and optionally visual) fingerprint of a document's layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LayoutSignatureRepr")]
pub struct LayoutSignature {
    /// Feature string describing the document structure.
    pub fingerprint: String,
    /// Hex-encoded 64-bit blockhash of the first page image, if one was computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_hash: Option<String>,
}

impl LayoutSignature {
    pub fn new(fingerprint: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            visual_hash: None,
        }
    }

    pub fn with_visual_hash(mut self, hash: impl Into<String>) -> Self {
        self.visual_hash = Some(hash.into());
        self
    }

    /// An empty signature means the layout is unknown.
    pub fn is_empty(&self) -> bool {
        self.fingerprint.trim().is_empty() && self.visual_hash.is_none()
    }
}

impl From<&str> for LayoutSignature {
    fn from(fingerprint: &str) -> Self {
        Self::new(fingerprint)
    }
}

impl From<String> for LayoutSignature {
    fn from(fingerprint: String) -> Self {
        Self::new(fingerprint)
    }
}

/// Accepts either a bare fingerprint string or the full object form.
#[derive(Deserialize)]
#[serde(untagged)]
enum LayoutSignatureRepr {
    Plain(String),
    Full {
        #[serde(default)]
        fingerprint: String,
        #[serde(default)]
        visual_hash: Option<String>,
    },
}

impl From<LayoutSignatureRepr> for LayoutSignature {
    fn from(repr: LayoutSignatureRepr) -> Self {
        match repr {
            LayoutSignatureRepr::Plain(fingerprint) => Self::new(fingerprint),
            LayoutSignatureRepr::Full {
                fingerprint,
                visual_hash,
            } => Self {
                fingerprint,
                visual_hash,
            },
        }
    }
}

/// Fields produced by a field extractor for one document.
///
/// Every field is a plain string: an empty string is the "unknown" value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceFields {
    pub vendor_name: String,
    pub contact_email: String,
    pub contact_phone: String,
    /// Further email addresses printed on the invoice, after `contact_email`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional_emails: Vec<String>,
    /// Further phone numbers printed on the invoice, after `contact_phone`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional_phones: Vec<String>,
    pub layout_signature: LayoutSignature,
    /// OCR output, kept for audit and preview only.
    pub raw_text: String,
    /// GSTIN / PAN / VAT number as printed on the invoice.
    pub tax_id: String,
    /// Original file name of the uploaded document.
    pub source_name: String,
}

impl InvoiceFields {
    /// Every listed email address, primary first.
    pub fn emails(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.contact_email.as_str())
            .chain(self.additional_emails.iter().map(String::as_str))
    }

    /// Every listed phone number, primary first.
    pub fn phones(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.contact_phone.as_str())
            .chain(self.additional_phones.iter().map(String::as_str))
    }
}

/// An ingested invoice. Read-only once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: RecordId,
    #[serde(flatten)]
    pub fields: InvoiceFields,
}

impl std::ops::Deref for InvoiceRecord {
    type Target = InvoiceFields;

    fn deref(&self) -> &Self::Target {
        &self.fields
    }
}

/// The red-flag rules evaluated by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    /// Same email or phone number as an invoice from another vendor.
    SharedContact,
    /// Layout matches an invoice from another vendor.
    SameLayoutDifferentVendor,
    /// Layout differs from another invoice of the same vendor.
    DifferentLayoutSameVendor,
}

impl FlagKind {
    pub const ALL: [FlagKind; 3] = [
        FlagKind::SharedContact,
        FlagKind::SameLayoutDifferentVendor,
        FlagKind::DifferentLayoutSameVendor,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::SharedContact => "same contact, different vendor",
            Self::SameLayoutDifferentVendor => "same layout, different vendor",
            Self::DifferentLayoutSameVendor => "different layout, same vendor",
        }
    }
}

impl std::fmt::Display for FlagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a prior record conflicts with the new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConflictDetail {
    /// Normalized contact values shared with the prior record.
    Contact {
        #[serde(skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        phone: Option<String>,
    },
    /// Layout similarity score against the prior record.
    Layout { similarity: f64 },
}

impl std::fmt::Display for ConflictDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Contact { email, phone } => {
                let shared: Vec<String> = email
                    .iter()
                    .map(|e| format!("email {e}"))
                    .chain(phone.iter().map(|p| format!("phone {p}")))
                    .collect();
                f.write_str(&shared.join(", "))
            }
            Self::Layout { similarity } => write!(f, "similarity={similarity:.2}"),
        }
    }
}

/// A prior record that triggered a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub record_id: RecordId,
    pub detail: ConflictDetail,
}

/// A triggered rule with every prior record that triggered it, in ingestion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    pub kind: FlagKind,
    pub conflicts: Vec<Conflict>,
}

impl Flag {
    pub fn conflicting_ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.conflicts.iter().map(|c| c.record_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagStatus {
    Red,
    Green,
}

impl std::fmt::Display for FlagStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Red => f.write_str("red"),
            Self::Green => f.write_str("green"),
        }
    }
}

/// Outcome of ingesting one record. Read-only once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagResult {
    pub record_id: RecordId,
    /// At most one entry per [`FlagKind`], in rule order.
    pub flags: Vec<Flag>,
    pub status: FlagStatus,
}

impl FlagResult {
    pub(crate) fn new(record_id: RecordId, flags: Vec<Flag>) -> Self {
        let status = if flags.is_empty() {
            FlagStatus::Green
        } else {
            FlagStatus::Red
        };
        Self {
            record_id,
            flags,
            status,
        }
    }

    pub fn is_red(&self) -> bool {
        self.status == FlagStatus::Red
    }

    pub fn flag(&self, kind: FlagKind) -> Option<&Flag> {
        self.flags.iter().find(|f| f.kind == kind)
    }

    /// Human-readable summary, e.g.
    /// `same contact, different vendor -> INV-0001 (email a@b.com)`.
    pub fn describe(&self) -> String {
        self.flags
            .iter()
            .map(|flag| {
                let refs: Vec<String> = flag
                    .conflicts
                    .iter()
                    .map(|c| format!("{} ({})", c.record_id, c.detail))
                    .collect();
                format!("{} -> {}", flag.kind, refs.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_display() {
        assert_eq!(RecordId(1).to_string(), "INV-0001");
        assert_eq!(RecordId(12345).to_string(), "INV-12345");
    }

    #[test]
    fn test_layout_signature_deserializes_from_string() {
        let sig: LayoutSignature = serde_json::from_str("\"L1\"").unwrap();
        assert_eq!(sig, LayoutSignature::new("L1"));
    }

    #[test]
    fn test_layout_signature_deserializes_from_object() {
        let sig: LayoutSignature =
            serde_json::from_str(r#"{"fingerprint":"typed::a | b","visual_hash":"00ff"}"#)
                .unwrap();
        assert_eq!(sig.fingerprint, "typed::a | b");
        assert_eq!(sig.visual_hash.as_deref(), Some("00ff"));
    }

    #[test]
    fn test_layout_signature_empty() {
        assert!(LayoutSignature::new("  ").is_empty());
        assert!(!LayoutSignature::new("").with_visual_hash("ab").is_empty());
    }

    #[test]
    fn test_invoice_fields_missing_keys_default_to_empty() {
        let fields: InvoiceFields = serde_json::from_str(r#"{"vendor_name":"Acme"}"#).unwrap();
        assert_eq!(fields.vendor_name, "Acme");
        assert!(fields.contact_email.is_empty());
        assert!(fields.layout_signature.is_empty());
        assert!(fields.additional_phones.is_empty());
    }

    #[test]
    fn test_invoice_fields_lists_every_contact() {
        let fields: InvoiceFields = serde_json::from_str(
            r#"{"contact_phone":"9000000001","additional_phones":["9876543210"]}"#,
        )
        .unwrap();
        assert_eq!(
            fields.phones().collect::<Vec<_>>(),
            vec!["9000000001", "9876543210"]
        );
        assert_eq!(fields.emails().collect::<Vec<_>>(), vec![""]);

        let json = serde_json::to_value(InvoiceFields::default()).unwrap();
        assert!(json.get("additional_emails").is_none());
    }

    #[test]
    fn test_flag_result_status_derived() {
        let green = FlagResult::new(RecordId(1), vec![]);
        assert_eq!(green.status, FlagStatus::Green);
        assert!(!green.is_red());

        let red = FlagResult::new(
            RecordId(2),
            vec![Flag {
                kind: FlagKind::SharedContact,
                conflicts: vec![Conflict {
                    record_id: RecordId(1),
                    detail: ConflictDetail::Contact {
                        email: Some("billing@acme.com".into()),
                        phone: None,
                    },
                }],
            }],
        );
        assert!(red.is_red());
        assert_eq!(
            red.describe(),
            "same contact, different vendor -> INV-0001 (email billing@acme.com)"
        );
    }

    #[test]
    fn test_flag_kind_serialization() {
        let json = serde_json::to_string(&FlagKind::SameLayoutDifferentVendor).unwrap();
        assert_eq!(json, "\"same_layout_different_vendor\"");
    }
}
