use crate::core::error::Error;
use crate::primitives::funcs::parse_coins;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const UATOM_DENOM: &str = "uatom";

/// Number of fractional digits of an SDK `Dec`.
const DEC_PRECISION: usize = 18;

/// An integer amount of a denomination, serialized the way the SDK's JSON codec does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

impl Coin {
    pub fn new(denom: &str, amount: u128) -> Self {
        Self {
            denom: denom.to_string(),
            amount: amount.to_string(),
        }
    }

    pub fn amount_u128(&self) -> Result<u128, Error> {
        self.amount
            .parse()
            .map_err(|e| Error::from(format!("invalid amount {}: {}", self.amount, e)))
    }

    /// Parses a comma separated list like `110000000000stake,100photon`, sorted by denom.
    pub fn parse_list(coins: &str) -> Result<Vec<Coin>, Error> {
        let mut parsed = parse_coins(coins)?
            .into_iter()
            .map(|(amount, denom)| {
                if amount.contains('.') {
                    return Err(Error::from(format!("{}{} is not an integer coin", amount, denom)));
                }
                Ok(Coin { denom, amount })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        parsed.sort_by(|a, b| a.denom.cmp(&b.denom));
        Ok(parsed)
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// A decimal amount of a denomination. The amount always carries 18 fractional digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecCoin {
    pub denom: String,
    pub amount: String,
}

impl DecCoin {
    pub fn new(denom: &str, amount: &str) -> Result<Self, Error> {
        Ok(Self {
            denom: denom.to_string(),
            amount: format_dec(amount)?,
        })
    }

    /// Parses `0.00001uatom,1photon` into sorted decimal coins.
    pub fn parse_list(coins: &str) -> Result<Vec<DecCoin>, Error> {
        let mut parsed = parse_coins(coins)?
            .into_iter()
            .map(|(amount, denom)| DecCoin::new(&denom, &amount))
            .collect::<Result<Vec<_>, Error>>()?;
        parsed.sort_by(|a, b| a.denom.cmp(&b.denom));
        Ok(parsed)
    }
}

impl fmt::Display for DecCoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Renders a decimal string with exactly 18 fractional digits, eg. `0.00001` into
/// `0.000010000000000000`.
pub fn format_dec(amount: &str) -> Result<String, Error> {
    let (int, frac) = amount.split_once('.').unwrap_or((amount, ""));
    let valid = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if int.is_empty() || !valid(int) || !valid(frac) {
        return Err(Error::from(format!("invalid decimal {:?}", amount)));
    }
    if frac.len() > DEC_PRECISION {
        return Err(Error::from(format!(
            "decimal {} has more than {} fractional digits",
            amount, DEC_PRECISION
        )));
    }
    let int = int.trim_start_matches('0');
    let int = if int.is_empty() { "0" } else { int };
    Ok(format!("{}.{:0<width$}", int, frac, width = DEC_PRECISION))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coin_list_is_sorted_by_denom() {
        let coins =
            Coin::parse_list("110000000000stake,100000000000000000photon,100000000000000000uatom")
                .unwrap();
        let denoms = coins.iter().map(|c| c.denom.as_str()).collect::<Vec<_>>();
        assert_eq!(denoms, vec!["photon", "stake", "uatom"]);
        assert_eq!(coins[1].to_string(), "110000000000stake");
        assert!(Coin::parse_list("0.5uatom").is_err());
    }

    #[test]
    fn dec_amounts_carry_full_precision() {
        assert_eq!(format_dec("0.00001").unwrap(), "0.000010000000000000");
        assert_eq!(format_dec("5").unwrap(), "5.000000000000000000");
        assert_eq!(format_dec("007.5").unwrap(), "7.500000000000000000");
        assert!(format_dec("1.0000000000000000001").is_err());
        assert!(format_dec(".5").is_err());
        assert!(format_dec("1e5").is_err());

        let fees = DecCoin::parse_list("0.0001uatom").unwrap();
        assert_eq!(fees, vec![DecCoin::new(UATOM_DENOM, "0.0001").unwrap()]);
        assert_eq!(fees[0].amount, "0.000100000000000000");
    }
}
