//! Widths of the text columns user input ends up in. Values are measured in
//! characters, matching `VARCHAR(n)`.

use crate::error::{DomainError, Result};

/// Category, product and shipping names, and account emails.
pub const MAX_NAME_LEN: usize = 255;
pub const MAX_SKU_LEN: usize = 100;
pub const MAX_PHONE_NUMBER_LEN: usize = 50;
pub const MAX_CARD_NUMBER_LEN: usize = 32;
pub const MAX_CARD_EXP_LEN: usize = 10;
pub const MAX_CARD_CVV_LEN: usize = 4;

/// Fails with a validation error naming `field` when `value` is longer than
/// `max` characters.
pub(crate) fn check_length(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(DomainError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_characters_not_bytes() {
        let name = "é".repeat(MAX_SKU_LEN);
        assert!(name.len() > MAX_SKU_LEN);
        assert!(check_length("sku", &name, MAX_SKU_LEN).is_ok());

        let err = check_length("sku", &format!("{name}x"), MAX_SKU_LEN).unwrap_err();
        assert_eq!(err.to_string(), "sku must be at most 100 characters");
    }
}
