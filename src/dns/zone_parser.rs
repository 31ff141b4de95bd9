//! Zone file loader for the record store
//!
//! Reads the subset of the RFC 1035 master file format that maps onto the
//! record types this server answers:
//! - `$ORIGIN` and `$TTL` directives
//! - `;` comments and parenthesised multi-line records
//! - `@` for the origin, relative names, and a blank owner repeating the
//!   previous one
//! - TTL values with `s`, `m`, `h`, `d` and `w` units
//! - the generic `\# <length> <hex>` rdata form of RFC 3597 for any type

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;

use crate::dns::authority::RecordStoreBuilder;
use crate::dns::name::DomainName;
use crate::dns::query_type::QueryType;

/// Parser errors with line number information
#[derive(Debug)]
pub enum ParseError {
    InvalidSyntax { line: usize, message: String },
    InvalidRecordType { line: usize, record_type: String },
    InvalidIpAddress { line: usize, addr: String },
    InvalidDomainName { line: usize, domain: String },
    InvalidTtl { line: usize, ttl: String },
    InvalidRdata { line: usize, message: String },
    MissingField { line: usize, field: String },
    UnsupportedClass { line: usize, class: String },
    IoError { line: usize, error: std::io::Error },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::InvalidSyntax { line, message } =>
                write!(f, "Line {}: Invalid syntax: {}", line, message),
            ParseError::InvalidRecordType { line, record_type } =>
                write!(f, "Line {}: Unknown record type: {}", line, record_type),
            ParseError::InvalidIpAddress { line, addr } =>
                write!(f, "Line {}: Invalid IP address: {}", line, addr),
            ParseError::InvalidDomainName { line, domain } =>
                write!(f, "Line {}: Invalid domain name: {}", line, domain),
            ParseError::InvalidTtl { line, ttl } =>
                write!(f, "Line {}: Invalid TTL value: {}", line, ttl),
            ParseError::InvalidRdata { line, message } =>
                write!(f, "Line {}: Invalid record data: {}", line, message),
            ParseError::MissingField { line, field } =>
                write!(f, "Line {}: Missing required field: {}", line, field),
            ParseError::UnsupportedClass { line, class } =>
                write!(f, "Line {}: Unsupported class: {}", line, class),
            ParseError::IoError { line, error } =>
                write!(f, "Line {}: IO error: {}", line, error),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::IoError { error, .. } => Some(error),
            _ => None,
        }
    }
}

type Result<T> = std::result::Result<T, ParseError>;

/// One whitespace separated field; quoted strings keep their spaces
#[derive(Debug, Clone, PartialEq)]
struct Token {
    text: String,
    quoted: bool,
}

/// Zone file parser state
pub struct ZoneParser {
    origin: String,
    default_ttl: u32,
    line_number: usize,
    last_domain: Option<DomainName>,
}

impl ZoneParser {
    /// Create a new zone parser for the given zone
    pub fn new(zone_name: &str) -> Self {
        ZoneParser {
            origin: zone_name.trim_end_matches('.').to_string(),
            default_ttl: 3600, // Default 1 hour
            line_number: 0,
            last_domain: None,
        }
    }

    /// Parse a zone file from a string, returning the number of records added
    pub fn parse_string(&mut self, content: &str, builder: &mut RecordStoreBuilder) -> Result<usize> {
        let lines: Vec<String> = content.lines().map(|l| l.to_string()).collect();
        self.parse_lines(&lines, builder)
    }

    /// Parse a zone file from a file path
    pub fn parse_file(&mut self, path: &Path, builder: &mut RecordStoreBuilder) -> Result<usize> {
        let file = File::open(path).map_err(|e| ParseError::IoError {
            line: 0,
            error: e,
        })?;

        let reader = BufReader::new(file);
        let lines = reader.lines().collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| ParseError::IoError {
                line: self.line_number,
                error: e,
            })?;

        let count = self.parse_lines(&lines, builder)?;
        log::info!("Loaded {} records for {} from {}", count, self.origin, path.display());

        Ok(count)
    }

    fn parse_lines(&mut self, lines: &[String], builder: &mut RecordStoreBuilder) -> Result<usize> {
        let mut count = 0;
        let mut pending: Vec<Token> = Vec::new();
        let mut pending_start = 0;
        let mut pending_indented = false;
        let mut depth = 0usize;

        for (idx, line) in lines.iter().enumerate() {
            self.line_number = idx + 1;

            if depth == 0 {
                pending_start = self.line_number;
                pending_indented = line.starts_with(' ') || line.starts_with('\t');
            }

            for token in self.tokenize(line)? {
                if !token.quoted && token.text == "(" {
                    depth += 1;
                } else if !token.quoted && token.text == ")" {
                    depth = depth.checked_sub(1).ok_or_else(|| ParseError::InvalidSyntax {
                        line: self.line_number,
                        message: "Unbalanced closing parenthesis".to_string(),
                    })?;
                } else {
                    pending.push(token);
                }
            }

            if depth > 0 || pending.is_empty() {
                continue;
            }

            self.line_number = pending_start;
            if self.parse_entry(&pending, pending_indented, builder)? {
                count += 1;
            }
            pending.clear();
        }

        if depth > 0 {
            return Err(ParseError::InvalidSyntax {
                line: pending_start,
                message: "Unclosed parentheses in multi-line record".to_string(),
            });
        }

        Ok(count)
    }

    /// Splits a line into fields, dropping the comment
    fn tokenize(&self, line: &str) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        let mut chars = line.chars().peekable();

        while let Some(&c) = chars.peek() {
            match c {
                ';' => break,
                c if c.is_whitespace() => {
                    chars.next();
                }
                '(' | ')' => {
                    chars.next();
                    tokens.push(Token { text: c.to_string(), quoted: false });
                }
                '"' => {
                    chars.next();
                    let mut text = String::new();
                    let mut closed = false;
                    while let Some(c) = chars.next() {
                        match c {
                            '"' => {
                                closed = true;
                                break;
                            }
                            '\\' => {
                                if let Some(escaped) = chars.next() {
                                    text.push(escaped);
                                }
                            }
                            _ => text.push(c),
                        }
                    }
                    if !closed {
                        return Err(ParseError::InvalidSyntax {
                            line: self.line_number,
                            message: "Unterminated quoted string".to_string(),
                        });
                    }
                    tokens.push(Token { text, quoted: true });
                }
                _ => {
                    let mut text = String::new();
                    while let Some(&c) = chars.peek() {
                        if c.is_whitespace() || c == ';' || c == '(' || c == ')' || c == '"' {
                            break;
                        }
                        text.push(c);
                        chars.next();
                    }
                    tokens.push(Token { text, quoted: false });
                }
            }
        }

        Ok(tokens)
    }

    /// Handles one logical entry; returns whether a record was added
    fn parse_entry(&mut self, tokens: &[Token], indented: bool, builder: &mut RecordStoreBuilder) -> Result<bool> {
        if tokens[0].text.starts_with('$') && !tokens[0].quoted {
            self.parse_directive(tokens)?;
            return Ok(false);
        }

        self.parse_record(tokens, indented, builder)?;
        Ok(true)
    }

    fn parse_directive(&mut self, tokens: &[Token]) -> Result<()> {
        let value = tokens.get(1).map(|t| t.text.as_str());

        match tokens[0].text.to_uppercase().as_str() {
            "$ORIGIN" => {
                let origin = value.ok_or_else(|| self.missing("origin"))?;
                let name = self.normalize_domain(origin)?;
                self.origin = name.to_dotted();
            }
            "$TTL" => {
                let ttl = value.ok_or_else(|| self.missing("ttl"))?;
                self.default_ttl = self.parse_ttl(ttl)?;
            }
            other => {
                return Err(ParseError::InvalidSyntax {
                    line: self.line_number,
                    message: format!("Unsupported directive: {}", other),
                });
            }
        }

        Ok(())
    }

    fn parse_record(&mut self, tokens: &[Token], indented: bool, builder: &mut RecordStoreBuilder) -> Result<()> {
        let mut fields = tokens.iter();

        let owner = if indented {
            self.last_domain.clone().ok_or_else(|| ParseError::InvalidSyntax {
                line: self.line_number,
                message: "Record without owner and no previous owner".to_string(),
            })?
        } else {
            let owner = fields.next().ok_or_else(|| self.missing("owner"))?;
            self.normalize_domain(&owner.text)?
        };

        let mut ttl = None;
        let mut rtype = None;
        for field in fields.by_ref() {
            let text = field.text.as_str();
            if text.eq_ignore_ascii_case("IN") {
                continue;
            }
            if ["CS", "CH", "HS"].iter().any(|c| text.eq_ignore_ascii_case(c)) {
                return Err(ParseError::UnsupportedClass {
                    line: self.line_number,
                    class: text.to_string(),
                });
            }
            if ttl.is_none() && text.starts_with(|c: char| c.is_ascii_digit()) {
                ttl = Some(self.parse_ttl(text)?);
                continue;
            }

            let qtype = QueryType::from_str(text).map_err(|_| ParseError::InvalidRecordType {
                line: self.line_number,
                record_type: text.to_string(),
            })?;
            rtype = Some(qtype);
            break;
        }

        let rtype = rtype.ok_or_else(|| self.missing("type"))?;
        let rdata_fields: Vec<&Token> = fields.collect();
        let rdata = self.encode_rdata(rtype, &rdata_fields)?;
        let ttl = ttl.unwrap_or(self.default_ttl);

        log::debug!("zone record {} {} {} ({} bytes)", owner, ttl, rtype, rdata.len());

        builder
            .add(&owner, rtype, ttl, rdata)
            .map_err(|e| ParseError::InvalidRdata {
                line: self.line_number,
                message: e.to_string(),
            })?;
        self.last_domain = Some(owner);

        Ok(())
    }

    /// Encodes the rdata fields of one record into wire form
    fn encode_rdata(&self, rtype: QueryType, fields: &[&Token]) -> Result<Vec<u8>> {
        if let Some(first) = fields.first() {
            if !first.quoted && first.text == "\\#" {
                return self.encode_generic(fields);
            }
        }

        let mut rdata = Vec::new();
        match rtype {
            QueryType::A => {
                let addr = self.field(fields, 0, "address")?;
                let addr = Ipv4Addr::from_str(addr).map_err(|_| ParseError::InvalidIpAddress {
                    line: self.line_number,
                    addr: addr.to_string(),
                })?;
                rdata.extend_from_slice(&addr.octets());
            }
            QueryType::Ns
            | QueryType::Md
            | QueryType::Mf
            | QueryType::Cname
            | QueryType::Mb
            | QueryType::Mg
            | QueryType::Mr
            | QueryType::Ptr => {
                let host = self.normalize_domain(self.field(fields, 0, "host")?)?;
                rdata.extend_from_slice(&host.to_wire());
            }
            QueryType::Minfo => {
                let rmailbx = self.normalize_domain(self.field(fields, 0, "rmailbx")?)?;
                let emailbx = self.normalize_domain(self.field(fields, 1, "emailbx")?)?;
                rdata.extend_from_slice(&rmailbx.to_wire());
                rdata.extend_from_slice(&emailbx.to_wire());
            }
            QueryType::Mx => {
                let priority = self.field(fields, 0, "priority")?;
                let priority = priority.parse::<u16>().map_err(|_| ParseError::InvalidRdata {
                    line: self.line_number,
                    message: format!("Invalid MX priority: {}", priority),
                })?;
                let host = self.normalize_domain(self.field(fields, 1, "host")?)?;
                rdata.extend_from_slice(&priority.to_be_bytes());
                rdata.extend_from_slice(&host.to_wire());
            }
            QueryType::Txt => {
                if fields.is_empty() {
                    return Err(self.missing("text"));
                }
                for field in fields {
                    self.push_character_string(&mut rdata, &field.text)?;
                }
            }
            QueryType::Hinfo => {
                self.push_character_string(&mut rdata, self.field(fields, 0, "cpu")?)?;
                self.push_character_string(&mut rdata, self.field(fields, 1, "os")?)?;
            }
            QueryType::Soa => {
                let m_name = self.normalize_domain(self.field(fields, 0, "mname")?)?;
                let r_name = self.normalize_domain(self.field(fields, 1, "rname")?)?;
                let serial = self.field(fields, 2, "serial")?;
                let serial = serial.parse::<u32>().map_err(|_| ParseError::InvalidRdata {
                    line: self.line_number,
                    message: format!("Invalid SOA serial: {}", serial),
                })?;

                rdata.extend_from_slice(&m_name.to_wire());
                rdata.extend_from_slice(&r_name.to_wire());
                rdata.extend_from_slice(&serial.to_be_bytes());
                for (i, field) in ["refresh", "retry", "expire", "minimum"].iter().enumerate() {
                    let value = self.parse_ttl(self.field(fields, 3 + i, field)?)?;
                    rdata.extend_from_slice(&value.to_be_bytes());
                }
            }
            QueryType::Null | QueryType::Wks => {
                return Err(ParseError::InvalidRdata {
                    line: self.line_number,
                    message: format!("{} records need the \\# generic form", rtype),
                });
            }
            QueryType::All | QueryType::Unknown(_) => {
                return Err(ParseError::InvalidRecordType {
                    line: self.line_number,
                    record_type: rtype.to_string(),
                });
            }
        }

        Ok(rdata)
    }

    /// `\# <length> <hex>...`, hex may be split over several fields
    fn encode_generic(&self, fields: &[&Token]) -> Result<Vec<u8>> {
        let len = self.field(fields, 1, "length")?;
        let len = len.parse::<usize>().map_err(|_| ParseError::InvalidRdata {
            line: self.line_number,
            message: format!("Invalid rdata length: {}", len),
        })?;

        let hex_text: String = fields.iter().skip(2).map(|t| t.text.as_str()).collect();
        let rdata = hex::decode(&hex_text).map_err(|e| ParseError::InvalidRdata {
            line: self.line_number,
            message: format!("Invalid hex rdata: {}", e),
        })?;

        if rdata.len() != len {
            return Err(ParseError::InvalidRdata {
                line: self.line_number,
                message: format!("Declared {} bytes but found {}", len, rdata.len()),
            });
        }

        Ok(rdata)
    }

    fn push_character_string(&self, rdata: &mut Vec<u8>, text: &str) -> Result<()> {
        let mut bytes = Vec::with_capacity(text.len());
        for ch in text.chars() {
            if (ch as u32) > 0xFF {
                return Err(ParseError::InvalidRdata {
                    line: self.line_number,
                    message: format!("Character {:?} does not fit an octet", ch),
                });
            }
            bytes.push(ch as u8);
        }

        if bytes.len() > 255 {
            return Err(ParseError::InvalidRdata {
                line: self.line_number,
                message: format!("Character string of {} bytes exceeds 255", bytes.len()),
            });
        }

        rdata.push(bytes.len() as u8);
        rdata.extend_from_slice(&bytes);

        Ok(())
    }

    fn field<'t>(&self, fields: &[&'t Token], idx: usize, name: &str) -> Result<&'t str> {
        fields
            .get(idx)
            .map(|t| t.text.as_str())
            .ok_or_else(|| self.missing(name))
    }

    fn missing(&self, field: &str) -> ParseError {
        ParseError::MissingField {
            line: self.line_number,
            field: field.to_string(),
        }
    }

    /// Parse TTL value with support for time units (s, m, h, d, w)
    pub fn parse_ttl(&self, ttl_str: &str) -> Result<u32> {
        let invalid = || ParseError::InvalidTtl {
            line: self.line_number,
            ttl: ttl_str.to_string(),
        };

        if ttl_str.is_empty() {
            return Err(invalid());
        }

        let mut total: u32 = 0;
        let mut number = String::new();
        for c in ttl_str.chars() {
            if c.is_ascii_digit() {
                number.push(c);
                continue;
            }

            let multiplier = match c.to_ascii_lowercase() {
                's' => 1,
                'm' => 60,
                'h' => 3600,
                'd' => 86400,
                'w' => 604800,
                _ => return Err(invalid()),
            };
            let value = number.parse::<u32>().map_err(|_| invalid())?;
            total = value
                .checked_mul(multiplier)
                .and_then(|v| total.checked_add(v))
                .ok_or_else(invalid)?;
            number.clear();
        }

        if !number.is_empty() {
            let value = number.parse::<u32>().map_err(|_| invalid())?;
            total = total.checked_add(value).ok_or_else(invalid)?;
        }

        Ok(total)
    }

    /// Resolves `@` and relative names against the current origin
    fn normalize_domain(&self, domain: &str) -> Result<DomainName> {
        let absolute = if domain == "@" {
            self.origin.clone()
        } else if domain.ends_with('.') {
            domain.to_string()
        } else if self.origin.is_empty() {
            domain.to_string()
        } else {
            format!("{}.{}", domain, self.origin)
        };

        DomainName::from_dotted(&absolute).map_err(|_| ParseError::InvalidDomainName {
            line: self.line_number,
            domain: domain.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::authority::RecordStore;
    use crate::dns::query_type::RecordClass;

    fn load(origin: &str, zone: &str) -> RecordStore {
        let mut builder = RecordStore::builder();
        ZoneParser::new(origin).parse_string(zone, &mut builder).unwrap();
        builder.build()
    }

    fn lookup<'a>(store: &'a RecordStore, domain: &str, qtype: QueryType) -> &'a [crate::dns::protocol::ResourceRecord] {
        let name = DomainName::from_dotted(domain).unwrap();
        store.lookup(&name, qtype, RecordClass::In).unwrap()
    }

    #[test]
    fn test_parse_basic_zone() {
        let zone = r#"
$TTL 360
@       IN  A     188.138.0.9
        IN  A     127.0.0.1
www     60  IN A  10.0.0.1
mail.example.com. IN A 10.0.0.2
@       MX  10 mail
"#;
        let store = load("example.com", zone);

        let apex = lookup(&store, "example.com", QueryType::A);
        assert_eq!(apex.len(), 2);
        assert_eq!(apex[0].rdata(), &[188, 138, 0, 9]);
        assert_eq!(apex[1].rdata(), &[127, 0, 0, 1]);
        assert_eq!(apex[0].ttl(), 360);

        let www = lookup(&store, "www.example.com", QueryType::A);
        assert_eq!(www[0].ttl(), 60);
        assert_eq!(lookup(&store, "mail.example.com", QueryType::A).len(), 1);

        let mx = lookup(&store, "example.com", QueryType::Mx);
        assert_eq!(mx[0].rdata(), b"\x00\x0a\x04mail\x07example\x03com\x00");
    }

    #[test]
    fn test_parse_ttl_units() {
        let parser = ZoneParser::new("example.com");
        assert_eq!(parser.parse_ttl("3600").unwrap(), 3600);
        assert_eq!(parser.parse_ttl("1h").unwrap(), 3600);
        assert_eq!(parser.parse_ttl("1d").unwrap(), 86400);
        assert_eq!(parser.parse_ttl("1w").unwrap(), 604800);
        assert_eq!(parser.parse_ttl("1h30m").unwrap(), 5400);
        assert!(parser.parse_ttl("1x").is_err());
        assert!(parser.parse_ttl("h").is_err());
        assert!(parser.parse_ttl("99999999w").is_err());
    }

    #[test]
    fn test_txt_record_quotes() {
        let zone = "@ TXT \"v=spf1 include:example.net ~all\" \"semi;colon\" ; trailing comment\n";
        let store = load("example.com", zone);

        let txt = lookup(&store, "example.com", QueryType::Txt);
        let mut expected = Vec::new();
        for s in [&b"v=spf1 include:example.net ~all"[..], &b"semi;colon"[..]].iter() {
            expected.push(s.len() as u8);
            expected.extend_from_slice(s);
        }
        assert_eq!(txt[0].rdata(), expected.as_slice());
    }

    #[test]
    fn test_multiline_soa() {
        let zone = r#"
$ORIGIN example.com.
@ IN SOA ns1 hostmaster (
        2024010101 ; serial
        1h         ; refresh
        600        ; retry
        1w         ; expire
        300 )      ; minimum
"#;
        let store = load("ignored.org", zone);

        let soa = lookup(&store, "example.com", QueryType::Soa);
        assert_eq!(soa.len(), 1);

        let mut expected = b"\x03ns1\x07example\x03com\x00\x0ahostmaster\x07example\x03com\x00".to_vec();
        for value in [2024010101u32, 3600, 600, 604800, 300].iter() {
            expected.extend_from_slice(&value.to_be_bytes());
        }
        assert_eq!(soa[0].rdata(), expected.as_slice());
    }

    #[test]
    fn test_name_and_string_types() {
        let zone = r#"
alias   CNAME www
www     HINFO "x86" linux
box     MINFO admin errors.example.net.
1.0.0   PTR   host.example.com.
"#;
        let store = load("example.com", zone);

        assert_eq!(
            lookup(&store, "alias.example.com", QueryType::Cname)[0].rdata(),
            b"\x03www\x07example\x03com\x00"
        );
        assert_eq!(
            lookup(&store, "www.example.com", QueryType::Hinfo)[0].rdata(),
            b"\x03x86\x05linux"
        );
        assert_eq!(
            lookup(&store, "box.example.com", QueryType::Minfo)[0].rdata(),
            b"\x05admin\x07example\x03com\x00\x06errors\x07example\x03net\x00"
        );
        assert_eq!(lookup(&store, "1.0.0.example.com", QueryType::Ptr).len(), 1);
    }

    #[test]
    fn test_generic_rdata() {
        let zone = "blob NULL \\# 4 DEAD BEEF\n";
        let store = load("example.com", zone);

        let null = lookup(&store, "blob.example.com", QueryType::Null);
        assert_eq!(null[0].rdata(), &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(null[0].rdlength(), 4);
    }

    #[test]
    fn test_generic_rdata_length_mismatch() {
        let mut builder = RecordStore::builder();
        let err = ZoneParser::new("example.com")
            .parse_string("blob NULL \\# 5 DEADBEEF\n", &mut builder)
            .unwrap_err();

        assert!(matches!(err, ParseError::InvalidRdata { line: 1, .. }));
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let mut builder = RecordStore::builder();
        let mut parser = ZoneParser::new("example.com");

        let err = parser
            .parse_string("@ A 10.0.0.1\n@ A 300.0.0.1\n", &mut builder)
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidIpAddress { line: 2, .. }));

        let err = parser.parse_string("@ AAAA ::1\n", &mut builder).unwrap_err();
        assert!(matches!(err, ParseError::InvalidRecordType { line: 1, .. }));

        let err = parser.parse_string("@ CH A 10.0.0.1\n", &mut builder).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedClass { line: 1, .. }));

        let err = ZoneParser::new("example.com")
            .parse_string("  A 10.0.0.1\n", &mut builder)
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidSyntax { line: 1, .. }));
    }

    #[test]
    fn test_unclosed_parenthesis() {
        let mut builder = RecordStore::builder();
        let err = ZoneParser::new("example.com")
            .parse_string("@ SOA ns1 host (\n 1 2 3 4\n", &mut builder)
            .unwrap_err();

        assert!(matches!(err, ParseError::InvalidSyntax { line: 1, .. }));
    }
}
