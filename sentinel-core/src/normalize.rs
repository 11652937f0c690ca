//! Normalization applied to fields before any comparison.

/// Trimmed, lower-cased vendor name with inner whitespace collapsed.
pub fn vendor_key(vendor: &str) -> String {
    vendor
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Vendor name reduced to lower-case alphanumeric words, used for fuzzy matching
/// ("ACME Corp." and "Acme Corp" both become "acme corp").
pub fn vendor_words(vendor: &str) -> String {
    vendor
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Trimmed, lower-cased email.
pub fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Digits of a phone number; formatting characters are dropped.
pub fn phone_key(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_key() {
        assert_eq!(vendor_key("  Acme   Corp "), "acme corp");
        assert_eq!(vendor_key("ACME"), "acme");
        assert_eq!(vendor_key("   "), "");
    }

    #[test]
    fn test_vendor_words() {
        assert_eq!(vendor_words("ACME Corp."), "acme corp");
        assert_eq!(vendor_words("Acme-Corp, Ltd"), "acme corp ltd");
    }

    #[test]
    fn test_email_key() {
        assert_eq!(email_key("  Billing@Acme.COM "), "billing@acme.com");
    }

    #[test]
    fn test_phone_key() {
        assert_eq!(phone_key("+1 (555) 111-1111"), "15551111111");
        assert_eq!(phone_key("555-1111"), "5551111");
        assert_eq!(phone_key("n/a"), "");
    }
}
