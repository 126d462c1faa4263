// Utility helpers shared by the chain and token clients

use ethers::types::{Address, U256};
use std::str::FromStr;

use crate::error::{AppError, Result};

/// Parses a hex EVM address, rejecting blanks and malformed input.
pub fn parse_address(address: &str) -> Result<Address> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidAddress("empty address".to_string()));
    }
    Address::from_str(trimmed).map_err(|_| AppError::InvalidAddress(trimmed.to_string()))
}

/// EIP-55 form of an address.
pub fn checksum_address(address: &str) -> Result<String> {
    let parsed = parse_address(address)?;
    Ok(ethers::utils::to_checksum(&parsed, None))
}

/// Converts a non-negative decimal string into integer base units.
pub fn to_base_units(amount: &str, decimals: u32) -> Result<U256> {
    let trimmed = amount.trim();
    if trimmed.is_empty() || trimmed.starts_with('-') {
        return Err(AppError::InvalidAmount(amount.to_string()));
    }
    let units = ethers::utils::parse_units(trimmed, decimals)
        .map_err(|e| AppError::InvalidAmount(format!("{}: {}", amount, e)))?;
    Ok(units.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_base_units_scales_by_decimals() {
        assert_eq!(to_base_units("1.5", 6).unwrap(), U256::from(1_500_000u64));
        assert_eq!(
            to_base_units("2", 18).unwrap(),
            U256::from(2_000_000_000_000_000_000u128)
        );
    }

    #[test]
    fn to_base_units_rejects_negative_and_garbage() {
        assert!(to_base_units("-1", 6).is_err());
        assert!(to_base_units("abc", 6).is_err());
        assert!(to_base_units("  ", 6).is_err());
    }

    #[test]
    fn checksum_address_normalizes_case() {
        let checksummed = checksum_address("0xcac524bca292aaade2df8a05cc58f0a65b1b3bb9").unwrap();
        assert_eq!(checksummed, "0xCaC524BcA292aaade2DF8A05cC58F0a65B1B3bB9");
    }

    #[test]
    fn parse_address_rejects_short_hex() {
        assert!(parse_address("0x1234").is_err());
    }
}
