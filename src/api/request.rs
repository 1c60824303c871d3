use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::fraud::CheckRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

/// Wire shape of a fraud check. Fields are optional so that missing
/// values surface in the per-field error map rather than as a
/// deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudCheckRequest {
    #[serde(default)]
    pub iban: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub vendor_id: Option<i64>,
    #[serde(default)]
    pub invoice_number: Option<String>,
}

impl FraudCheckRequest {
    /// Check all fields, collecting every violation keyed by field name.
    pub fn validate(&self) -> Result<CheckRequest, BTreeMap<&'static str, String>> {
        let mut errors = BTreeMap::new();

        let iban = self.iban.as_deref().map(str::trim).unwrap_or_default();
        if iban.is_empty() {
            errors.insert("iban", "IBAN cannot be null or empty".to_string());
        }

        match self.amount {
            None => {
                errors.insert("amount", "Amount cannot be null".to_string());
            }
            Some(amount) if amount < Decimal::new(1, 2) => {
                errors.insert("amount", "Amount must be positive".to_string());
            }
            Some(_) => {}
        }

        match self.vendor_id {
            None => {
                errors.insert("vendorId", "Vendor ID cannot be null".to_string());
            }
            Some(id) if id <= 0 => {
                errors.insert("vendorId", "Vendor ID must be positive".to_string());
            }
            Some(_) => {}
        }

        let invoice = self
            .invoice_number
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();
        if invoice.is_empty() {
            errors.insert(
                "invoiceNumber",
                "Invoice number cannot be null or empty".to_string(),
            );
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(CheckRequest {
            iban: self.iban.clone().unwrap_or_default(),
            amount: self.amount.unwrap_or_default(),
            vendor_id: self.vendor_id.unwrap_or_default(),
            invoice_number: self.invoice_number.clone().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn valid_request() -> FraudCheckRequest {
        FraudCheckRequest {
            iban: Some("BG80BNBG96611020345678".to_string()),
            amount: Some(Decimal::from_str("1500.00").unwrap()),
            vendor_id: Some(1),
            invoice_number: Some("INV-001".to_string()),
        }
    }

    #[test]
    fn test_valid_request_converts() {
        let check = valid_request().validate().unwrap();
        assert_eq!(check.iban, "BG80BNBG96611020345678");
        assert_eq!(check.vendor_id, 1);
    }

    #[test]
    fn test_amount_from_string_body() {
        let req: FraudCheckRequest = serde_json::from_str(
            r#"{"iban":"BG80BNBG96611020345678","amount":"1500.00","vendorId":1,"invoiceNumber":"INV-001"}"#,
        )
        .unwrap();

        assert_eq!(req.amount, Some(Decimal::from_str("1500.00").unwrap()));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_missing_fields_collect_per_field_errors() {
        let req: FraudCheckRequest = serde_json::from_str("{}").unwrap();
        let errors = req.validate().unwrap_err();

        assert_eq!(errors.len(), 4);
        assert_eq!(errors["iban"], "IBAN cannot be null or empty");
        assert_eq!(errors["amount"], "Amount cannot be null");
        assert_eq!(errors["vendorId"], "Vendor ID cannot be null");
        assert_eq!(errors["invoiceNumber"], "Invoice number cannot be null or empty");
    }

    #[test]
    fn test_amount_must_be_positive() {
        let mut req = valid_request();
        req.amount = Some(Decimal::ZERO);
        assert_eq!(req.validate().unwrap_err()["amount"], "Amount must be positive");

        req.amount = Some(Decimal::from_str("-5").unwrap());
        assert!(req.validate().is_err());

        // The smallest accepted amount.
        req.amount = Some(Decimal::from_str("0.01").unwrap());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_vendor_id_must_be_positive() {
        let mut req = valid_request();
        req.vendor_id = Some(0);
        assert_eq!(
            req.validate().unwrap_err()["vendorId"],
            "Vendor ID must be positive"
        );
    }

    #[test]
    fn test_blank_strings_rejected() {
        let mut req = valid_request();
        req.iban = Some("   ".to_string());
        req.invoice_number = Some("".to_string());

        let errors = req.validate().unwrap_err();
        assert!(errors.contains_key("iban"));
        assert!(errors.contains_key("invoiceNumber"));
    }
}
