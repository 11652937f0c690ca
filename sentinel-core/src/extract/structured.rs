//! Structured fields returned by a field structurer.
//!
//! Language models are loose with JSON types: strings arrive as `null`,
//! numbers arrive as strings, a single email arrives as a bare string instead
//! of a list. Every field here deserializes leniently and defaults when absent.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::layout;
use crate::model::InvoiceFields;

/// Table dimensions as reported by the structurer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSize {
    #[serde(deserialize_with = "lenient_count")]
    pub rows: Option<u64>,
    #[serde(deserialize_with = "lenient_count")]
    pub columns: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredInvoice {
    #[serde(deserialize_with = "lenient_string")]
    pub vendor_name: String,
    #[serde(deserialize_with = "lenient_list")]
    pub phone_numbers: Vec<String>,
    #[serde(deserialize_with = "lenient_list")]
    pub email_addresses: Vec<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub gst_or_pan: String,
    #[serde(deserialize_with = "lenient_list")]
    pub table_headers: Vec<String>,
    #[serde(deserialize_with = "lenient_rows")]
    pub table_row_data: Vec<Vec<String>>,
    #[serde(deserialize_with = "lenient_table_size")]
    pub table_size: TableSize,
    /// `scanned` or `typed` (digital).
    #[serde(deserialize_with = "lenient_string")]
    pub scanned_or_typed: String,
    /// `handwritten`, `typed` or `mixed`.
    #[serde(deserialize_with = "lenient_string")]
    pub handwritten_or_typed: String,
}

impl StructuredInvoice {
    /// Convert into engine input. The first email and phone number become the
    /// contact fields; the rest are kept as additional contacts.
    pub fn into_fields(
        self,
        raw_text: String,
        source_name: String,
        visual_hash: Option<String>,
    ) -> InvoiceFields {
        let layout_signature = layout::signature(&self, visual_hash);
        let (contact_email, additional_emails) = split_contacts(&self.email_addresses);
        let (contact_phone, additional_phones) = split_contacts(&self.phone_numbers);

        InvoiceFields {
            contact_email,
            contact_phone,
            additional_emails,
            additional_phones,
            vendor_name: self.vendor_name.trim().to_string(),
            tax_id: self.gst_or_pan.trim().to_string(),
            layout_signature,
            raw_text,
            source_name,
        }
    }
}

/// First non-blank value, then the remaining non-blank values.
fn split_contacts(values: &[String]) -> (String, Vec<String>) {
    let mut values = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let first = values.next().unwrap_or_default();
    (first, values.collect())
}

fn value_to_string(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Array(items) => items
            .into_iter()
            .map(value_to_string)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(value_to_string(Value::deserialize(d)?))
}

fn lenient_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let items = match Value::deserialize(d)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().map(value_to_string).collect(),
        other => vec![value_to_string(other)],
    };
    Ok(items.into_iter().filter(|s| !s.trim().is_empty()).collect())
}

fn lenient_rows<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<String>>, D::Error> {
    let rows = match Value::deserialize(d)? {
        Value::Array(rows) => rows
            .into_iter()
            .map(|row| match row {
                Value::Array(cells) => cells.into_iter().map(value_to_string).collect(),
                Value::Object(map) => map.into_iter().map(|(_, v)| value_to_string(v)).collect(),
                Value::Null => Vec::new(),
                other => vec![value_to_string(other)],
            })
            .filter(|row: &Vec<String>| !row.is_empty())
            .collect(),
        _ => Vec::new(),
    };
    Ok(rows)
}

fn lenient_count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_table_size<'de, D: Deserializer<'de>>(d: D) -> Result<TableSize, D::Error> {
    Ok(match Value::deserialize(d)? {
        value @ Value::Object(_) => serde_json::from_value(value).unwrap_or_default(),
        _ => TableSize::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed() {
        let json = r#"{
            "vendor_name": "XYZ Pvt Ltd",
            "phone_numbers": ["1234567890", "9876543210"],
            "email_addresses": ["example@email.com"],
            "gst_or_pan": "ABCDE1234F",
            "table_headers": ["Description", "Qty", "Rate", "Amount"],
            "table_row_data": [["Item 1", "1", "100", "100"], ["Item 2", "2", "200", "400"]],
            "table_size": {"rows": 2, "columns": 4},
            "scanned_or_typed": "scanned",
            "handwritten_or_typed": "typed"
        }"#;
        let inv: StructuredInvoice = serde_json::from_str(json).unwrap();
        assert_eq!(inv.vendor_name, "XYZ Pvt Ltd");
        assert_eq!(inv.phone_numbers.len(), 2);
        assert_eq!(inv.table_row_data[1][3], "400");
        assert_eq!(inv.table_size, TableSize { rows: Some(2), columns: Some(4) });
    }

    #[test]
    fn test_parse_sloppy_types() {
        let json = r#"{
            "vendor_name": null,
            "phone_numbers": "98765 43210",
            "email_addresses": null,
            "table_headers": ["Item", null, "Amount"],
            "table_row_data": [["Pen", 2, 10.5]],
            "table_size": {"rows": "3", "columns": 2.0},
            "scanned_or_typed": "typed"
        }"#;
        let inv: StructuredInvoice = serde_json::from_str(json).unwrap();
        assert_eq!(inv.vendor_name, "");
        assert_eq!(inv.phone_numbers, vec!["98765 43210"]);
        assert!(inv.email_addresses.is_empty());
        assert_eq!(inv.table_headers, vec!["Item", "Amount"]);
        assert_eq!(inv.table_row_data[0], vec!["Pen", "2", "10.5"]);
        assert_eq!(inv.table_size, TableSize { rows: Some(3), columns: Some(2) });
        assert_eq!(inv.handwritten_or_typed, "");
    }

    #[test]
    fn test_table_size_null() {
        let inv: StructuredInvoice =
            serde_json::from_str(r#"{"table_size": null, "table_row_data": null}"#).unwrap();
        assert_eq!(inv.table_size, TableSize::default());
        assert!(inv.table_row_data.is_empty());
    }

    #[test]
    fn test_into_fields_splits_primary_and_additional_contacts() {
        let inv = StructuredInvoice {
            vendor_name: " Acme ".into(),
            phone_numbers: vec!["".into(), "555-1111".into()],
            email_addresses: vec!["billing@acme.com".into(), "other@acme.com".into()],
            gst_or_pan: "ABCDE1234F".into(),
            scanned_or_typed: "typed".into(),
            ..Default::default()
        };
        let fields = inv.into_fields("raw".into(), "a.pdf".into(), None);
        assert_eq!(fields.vendor_name, "Acme");
        assert_eq!(fields.contact_phone, "555-1111");
        assert!(fields.additional_phones.is_empty());
        assert_eq!(fields.contact_email, "billing@acme.com");
        assert_eq!(fields.additional_emails, vec!["other@acme.com"]);
        assert_eq!(fields.tax_id, "ABCDE1234F");
        assert_eq!(fields.layout_signature.fingerprint, "typed::typed::?x?::unknown");
        assert_eq!(fields.source_name, "a.pdf");
    }
}
