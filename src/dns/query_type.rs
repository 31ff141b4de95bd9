//! Record type and class codes

use std::fmt;
use std::str::FromStr;

/// `QueryType` represents the requested Record Type of a query
///
/// Only the types of RFC 1035 3.2.2 plus the `*` query type are known. Any
/// other code is kept in `Unknown` so that it can be reported back without
/// loss.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Hash, Copy)]
pub enum QueryType {
    Unknown(u16),
    A,     // 1
    Ns,    // 2
    Md,    // 3
    Mf,    // 4
    Cname, // 5
    Soa,   // 6
    Mb,    // 7
    Mg,    // 8
    Mr,    // 9
    Null,  // 10
    Wks,   // 11
    Ptr,   // 12
    Hinfo, // 13
    Minfo, // 14
    Mx,    // 15
    Txt,   // 16
    All,   // 255
}

impl QueryType {
    pub fn to_num(&self) -> u16 {
        match *self {
            QueryType::Unknown(x) => x,
            QueryType::A => 1,
            QueryType::Ns => 2,
            QueryType::Md => 3,
            QueryType::Mf => 4,
            QueryType::Cname => 5,
            QueryType::Soa => 6,
            QueryType::Mb => 7,
            QueryType::Mg => 8,
            QueryType::Mr => 9,
            QueryType::Null => 10,
            QueryType::Wks => 11,
            QueryType::Ptr => 12,
            QueryType::Hinfo => 13,
            QueryType::Minfo => 14,
            QueryType::Mx => 15,
            QueryType::Txt => 16,
            QueryType::All => 255,
        }
    }

    pub fn from_num(num: u16) -> QueryType {
        match num {
            1 => QueryType::A,
            2 => QueryType::Ns,
            3 => QueryType::Md,
            4 => QueryType::Mf,
            5 => QueryType::Cname,
            6 => QueryType::Soa,
            7 => QueryType::Mb,
            8 => QueryType::Mg,
            9 => QueryType::Mr,
            10 => QueryType::Null,
            11 => QueryType::Wks,
            12 => QueryType::Ptr,
            13 => QueryType::Hinfo,
            14 => QueryType::Minfo,
            15 => QueryType::Mx,
            16 => QueryType::Txt,
            255 => QueryType::All,
            _ => QueryType::Unknown(num),
        }
    }

    /// Zone file mnemonic, `None` for codes outside the table
    pub fn mnemonic(&self) -> Option<&'static str> {
        let name = match *self {
            QueryType::Unknown(_) => return None,
            QueryType::A => "A",
            QueryType::Ns => "NS",
            QueryType::Md => "MD",
            QueryType::Mf => "MF",
            QueryType::Cname => "CNAME",
            QueryType::Soa => "SOA",
            QueryType::Mb => "MB",
            QueryType::Mg => "MG",
            QueryType::Mr => "MR",
            QueryType::Null => "NULL",
            QueryType::Wks => "WKS",
            QueryType::Ptr => "PTR",
            QueryType::Hinfo => "HINFO",
            QueryType::Minfo => "MINFO",
            QueryType::Mx => "MX",
            QueryType::Txt => "TXT",
            QueryType::All => "*",
        };

        Some(name)
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mnemonic() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "TYPE{}", self.to_num()),
        }
    }
}

impl FromStr for QueryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let qtype = match s.to_uppercase().as_str() {
            "A" => QueryType::A,
            "NS" => QueryType::Ns,
            "MD" => QueryType::Md,
            "MF" => QueryType::Mf,
            "CNAME" => QueryType::Cname,
            "SOA" => QueryType::Soa,
            "MB" => QueryType::Mb,
            "MG" => QueryType::Mg,
            "MR" => QueryType::Mr,
            "NULL" => QueryType::Null,
            "WKS" => QueryType::Wks,
            "PTR" => QueryType::Ptr,
            "HINFO" => QueryType::Hinfo,
            "MINFO" => QueryType::Minfo,
            "MX" => QueryType::Mx,
            "TXT" => QueryType::Txt,
            other => return Err(format!("Unknown record type: {}", other)),
        };

        Ok(qtype)
    }
}

/// Record class. Only the Internet class is served.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Hash, Copy)]
pub enum RecordClass {
    Unknown(u16),
    In, // 1
}

impl RecordClass {
    pub fn to_num(&self) -> u16 {
        match *self {
            RecordClass::Unknown(x) => x,
            RecordClass::In => 1,
        }
    }

    pub fn from_num(num: u16) -> RecordClass {
        match num {
            1 => RecordClass::In,
            _ => RecordClass::Unknown(num),
        }
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RecordClass::In => write!(f, "IN"),
            RecordClass::Unknown(x) => write!(f, "CLASS{}", x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_codes() {
        for num in (1..=16).chain(std::iter::once(255)) {
            let qtype = QueryType::from_num(num);
            assert!(qtype.mnemonic().is_some(), "code {} missing", num);
            assert_eq!(qtype.to_num(), num);
        }
    }

    #[test]
    fn test_unknown_codes_are_kept() {
        for num in [0u16, 17, 28, 254, 256, 65535].iter() {
            let qtype = QueryType::from_num(*num);
            assert_eq!(qtype, QueryType::Unknown(*num));
            assert_eq!(qtype.to_num(), *num);
            assert_eq!(qtype.to_string(), format!("TYPE{}", num));
        }
    }

    #[test]
    fn test_mnemonic_parse() {
        assert_eq!("a".parse::<QueryType>().unwrap(), QueryType::A);
        assert_eq!("Hinfo".parse::<QueryType>().unwrap(), QueryType::Hinfo);
        assert_eq!(QueryType::Minfo.to_string(), "MINFO");
        assert!("AAAA".parse::<QueryType>().is_err());
        assert!("*".parse::<QueryType>().is_err());
    }

    #[test]
    fn test_class() {
        assert_eq!(RecordClass::from_num(1), RecordClass::In);
        assert_eq!(RecordClass::from_num(5), RecordClass::Unknown(5));
        assert_eq!(RecordClass::Unknown(3).to_string(), "CLASS3");
    }
}
