use std::{
    fmt::{Debug, Display},
    iter::Sum,
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const SCALE: i64 = 100;

/// Money amount with two fixed decimal places, stored as an integer.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Decimal(i64);

impl Decimal {
    pub fn int(value: i64) -> Decimal {
        Decimal(value * SCALE)
    }

    pub fn zero() -> Decimal {
        Decimal(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn inner(&self) -> i64 {
        self.0
    }
}

impl Display for Decimal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{}{}.{:02}", sign, abs / SCALE, abs % SCALE)
    }
}

impl Debug for Decimal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl From<f64> for Decimal {
    fn from(value: f64) -> Self {
        Decimal((value * SCALE as f64).round() as i64)
    }
}

impl From<u32> for Decimal {
    fn from(value: u32) -> Self {
        Decimal::int(value as i64)
    }
}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.parse::<f64>().map_err(|_| ParseDecimalError)?;
        Ok(Decimal::from(value))
    }
}

impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, other: Decimal) -> Decimal {
        Decimal(self.0 + other.0)
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, other: Decimal) -> Decimal {
        Decimal(self.0 - other.0)
    }
}

impl std::ops::AddAssign for Decimal {
    fn add_assign(&mut self, other: Decimal) {
        self.0 += other.0;
    }
}

impl std::ops::SubAssign for Decimal {
    fn sub_assign(&mut self, other: Decimal) {
        self.0 -= other.0;
    }
}

impl Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Decimal {
        iter.fold(Decimal::zero(), |acc, x| acc + x)
    }
}

#[derive(Debug)]
pub struct ParseDecimalError;

impl Display for ParseDecimalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse decimal value")
    }
}

impl std::error::Error for ParseDecimalError {}

impl Serialize for Decimal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Decimal(i64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!("20.00", Decimal::int(20).to_string());
        assert_eq!("-5.00", Decimal::int(-5).to_string());
        assert_eq!("0.00", Decimal::zero().to_string());
        assert_eq!("12.34", Decimal::from(12.34).to_string());
        assert_eq!("-0.05", Decimal::from(-0.05).to_string());
    }

    #[test]
    fn test_parse() {
        assert_eq!(Decimal::int(20), "20".parse().unwrap());
        assert_eq!(Decimal::from(12.34), "12.34".parse().unwrap());
        assert_eq!(Decimal::from(-0.5), "-0.5".parse().unwrap());
        assert!("money".parse::<Decimal>().is_err());
    }

    #[test]
    fn test_arithmetic() {
        let mut balance = Decimal::int(50);
        balance -= Decimal::int(20);
        assert_eq!(Decimal::int(30), balance);
        balance += Decimal::from(0.5);
        assert_eq!(Decimal::from(30.5), balance);
        assert_eq!(Decimal::int(10), Decimal::int(4) + Decimal::int(6));
        assert!((Decimal::int(5) - Decimal::int(20)).is_negative());
    }

    #[test]
    fn test_ordering() {
        assert!(Decimal::int(5) < Decimal::int(20));
        assert!(Decimal::int(20) >= Decimal::int(20));
        assert!(Decimal::int(-1) < Decimal::zero());
    }

    #[test]
    fn test_sum() {
        let total: Decimal = [Decimal::int(1), Decimal::int(2), Decimal::from(0.5)]
            .into_iter()
            .sum();
        assert_eq!(Decimal::from(3.5), total);
    }
}
