use std::fmt;
use std::str::FromStr;

/// RFID tag identifier as reported by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId(pub u64);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TagId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(TagId)
    }
}

impl From<u64> for TagId {
    fn from(v: u64) -> Self {
        TagId(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_surrounding_whitespace() {
        let t: TagId = " 2018121243 ".parse().unwrap();
        assert_eq!(t, TagId(2018121243));
        assert_eq!(t.to_string(), "2018121243");
    }

    #[test]
    fn rejects_non_numeric() {
        assert!("ab12".parse::<TagId>().is_err());
    }
}
