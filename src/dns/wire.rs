//! Minimal DNS wire format codec (RFC 1035).
//!
//! Parses incoming queries and encodes authoritative TXT responses. The
//! response parser exists for tests and tooling that inspect our answers.

use std::fmt;

// DNS wire format constants
const HEADER_SIZE: usize = 12;
const FLAG_QR: u16 = 0x8000; // Query/Response flag
const FLAG_AA: u16 = 0x0400; // Authoritative answer
const FLAG_TC: u16 = 0x0200; // Truncated
const FLAG_RD: u16 = 0x0100; // Recursion desired
const FLAG_OPCODE_MASK: u16 = 0x7800;
const FLAG_RCODE_MASK: u16 = 0x000F; // Response code mask

// RFC 1035: Maximum hostname length is 253 characters
const MAX_HOSTNAME_LEN: usize = 253;
// RFC 1035: Maximum label length is 63 characters
const MAX_LABEL_LEN: usize = 63;
// RFC 1035: character-strings carry at most 255 bytes
const MAX_CHARACTER_STRING: usize = 255;
// Keeps RDLENGTH within u16 after length prefixes are added
const MAX_TXT_BYTES: usize = 65_000;

// RFC 1035: classic UDP message limit, used when the query has no EDNS OPT
const DEFAULT_UDP_PAYLOAD: usize = 512;
// Cap on the EDNS payload size we honour
const MAX_UDP_PAYLOAD: usize = 4096;

// Pointer to the question name, which always starts right after the header
const QUESTION_NAME_POINTER: [u8; 2] = [0xC0, HEADER_SIZE as u8];

const CLASS_IN: u16 = 1;

// DNS record type values
const TYPE_A: u16 = 1;
const TYPE_TXT: u16 = 16;
const TYPE_AAAA: u16 = 28;
const TYPE_OPT: u16 = 41;
const TYPE_ANY: u16 = 255;

/// DNS response codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    NoError = 0,
    FormErr = 1,
    ServFail = 2,
    NxDomain = 3,
    NotImp = 4,
    Refused = 5,
}

impl ResponseCode {
    /// Create from raw 4-bit value
    pub fn from_u16(value: u16) -> Self {
        match value & FLAG_RCODE_MASK {
            0 => ResponseCode::NoError,
            1 => ResponseCode::FormErr,
            2 => ResponseCode::ServFail,
            3 => ResponseCode::NxDomain,
            4 => ResponseCode::NotImp,
            5 => ResponseCode::Refused,
            _ => ResponseCode::ServFail, // Treat unknown as server failure
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseCode::NoError => write!(f, "NOERROR"),
            ResponseCode::FormErr => write!(f, "FORMERR"),
            ResponseCode::ServFail => write!(f, "SERVFAIL"),
            ResponseCode::NxDomain => write!(f, "NXDOMAIN"),
            ResponseCode::NotImp => write!(f, "NOTIMP"),
            ResponseCode::Refused => write!(f, "REFUSED"),
        }
    }
}

/// DNS record types, for logging the query type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum RecordType {
    A,
    AAAA,
    TXT,
    ANY,
    Other(u16),
}

impl RecordType {
    /// Create from raw type value
    pub fn from_u16(value: u16) -> Self {
        match value {
            TYPE_A => RecordType::A,
            TYPE_AAAA => RecordType::AAAA,
            TYPE_TXT => RecordType::TXT,
            TYPE_ANY => RecordType::ANY,
            other => RecordType::Other(other),
        }
    }

    /// Convert to raw type value
    pub fn to_u16(self) -> u16 {
        match self {
            RecordType::A => TYPE_A,
            RecordType::AAAA => TYPE_AAAA,
            RecordType::TXT => TYPE_TXT,
            RecordType::ANY => TYPE_ANY,
            RecordType::Other(v) => v,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::AAAA => write!(f, "AAAA"),
            RecordType::TXT => write!(f, "TXT"),
            RecordType::ANY => write!(f, "ANY"),
            RecordType::Other(v) => write!(f, "TYPE{}", v),
        }
    }
}

/// One TXT answer: class IN, TTL 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxtRecord {
    pub name: String,
    pub text: String,
}

/// Parsed DNS query header and first question
#[derive(Debug)]
pub struct DnsQuery {
    id: u16,
    flags: u16,
    qdcount: u16,
    qname: String,
    qtype: RecordType,
    question_end: usize, // Position after QNAME+QTYPE+QCLASS
    udp_payload_size: usize,
}

impl DnsQuery {
    /// Parse a DNS message header and its first question.
    ///
    /// Messages with the QR bit set or several questions still parse; the
    /// server decides to drop them.
    pub fn parse(buf: &[u8]) -> Result<DnsQuery, &'static str> {
        if buf.len() < HEADER_SIZE {
            return Err("Packet too short for DNS header");
        }

        let id = u16::from_be_bytes([buf[0], buf[1]]);
        let flags = u16::from_be_bytes([buf[2], buf[3]]);
        let qdcount = u16::from_be_bytes([buf[4], buf[5]]);

        if qdcount == 0 {
            return Err("No question section in query");
        }

        let (qname, qname_end_pos) = parse_name(buf, HEADER_SIZE)?;

        // Need 4 more bytes for QTYPE and QCLASS
        if buf.len() < qname_end_pos + 4 {
            return Err("Packet too short for question");
        }

        let qtype_raw = u16::from_be_bytes([buf[qname_end_pos], buf[qname_end_pos + 1]]);
        let question_end = qname_end_pos + 4;

        let udp_payload_size = if qdcount == 1 {
            edns_payload_size(buf, question_end).unwrap_or(DEFAULT_UDP_PAYLOAD)
        } else {
            DEFAULT_UDP_PAYLOAD
        };

        Ok(DnsQuery {
            id,
            flags,
            qdcount,
            qname,
            qtype: RecordType::from_u16(qtype_raw),
            question_end,
            udp_payload_size,
        })
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    /// Query name (absolute, with trailing dot)
    pub fn name(&self) -> &str {
        &self.qname
    }

    pub fn query_type(&self) -> RecordType {
        self.qtype
    }

    pub fn question_count(&self) -> u16 {
        self.qdcount
    }

    /// True when the QR bit marks this message as a response
    pub fn is_response(&self) -> bool {
        self.flags & FLAG_QR != 0
    }

    /// Largest UDP response the client accepts: its EDNS payload size,
    /// otherwise 512 bytes
    pub fn udp_payload_size(&self) -> usize {
        self.udp_payload_size
    }
}

/// Payload size advertised by an OPT record in the additional section.
/// Answer and authority records in a query are skipped over.
fn edns_payload_size(buf: &[u8], question_end: usize) -> Option<usize> {
    let ancount = u16::from_be_bytes([buf[6], buf[7]]) as usize;
    let nscount = u16::from_be_bytes([buf[8], buf[9]]) as usize;
    let arcount = u16::from_be_bytes([buf[10], buf[11]]) as usize;

    let mut pos = question_end;
    for index in 0..ancount + nscount + arcount {
        pos = skip_name(buf, pos)?;
        if pos + 10 > buf.len() {
            return None;
        }
        let rtype = u16::from_be_bytes([buf[pos], buf[pos + 1]]);
        let class = u16::from_be_bytes([buf[pos + 2], buf[pos + 3]]) as usize;
        let rdlength = u16::from_be_bytes([buf[pos + 8], buf[pos + 9]]) as usize;

        if index >= ancount + nscount && rtype == TYPE_OPT {
            // RFC 6891: values below 512 are treated as 512
            return Some(class.clamp(DEFAULT_UDP_PAYLOAD, MAX_UDP_PAYLOAD));
        }
        pos += 10 + rdlength;
    }

    None
}

/// Encode an authoritative response to `query` with the given TXT answers.
///
/// The question is echoed from the original bytes. Answers owned by the
/// question name are compressed to a pointer at it. When the answers do not
/// fit the client's UDP payload size they are dropped and TC is set.
pub fn build_txt_response(
    query_buf: &[u8],
    query: &DnsQuery,
    rcode: ResponseCode,
    answers: &[TxtRecord],
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(512);

    let flags = FLAG_QR
        | FLAG_AA
        | (query.flags & FLAG_OPCODE_MASK)
        | (query.flags & FLAG_RD)
        | (rcode as u16);

    // Header
    buf.extend_from_slice(&query.id.to_be_bytes());
    buf.extend_from_slice(&flags.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes()); // QDCOUNT
    buf.extend_from_slice(&(answers.len() as u16).to_be_bytes()); // ANCOUNT
    buf.extend_from_slice(&[0x00, 0x00]); // NSCOUNT
    buf.extend_from_slice(&[0x00, 0x00]); // ARCOUNT

    // Question, as received
    buf.extend_from_slice(&query_buf[HEADER_SIZE..query.question_end]);

    for answer in answers {
        if answer.name.eq_ignore_ascii_case(&query.qname) {
            buf.extend_from_slice(&QUESTION_NAME_POINTER);
        } else {
            encode_name(&mut buf, &answer.name);
        }
        buf.extend_from_slice(&TYPE_TXT.to_be_bytes());
        buf.extend_from_slice(&CLASS_IN.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes()); // TTL

        let rdata = encode_txt_rdata(&answer.text);
        buf.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        buf.extend_from_slice(&rdata);
    }

    if buf.len() > query.udp_payload_size {
        truncate_to_question(&mut buf, query);
    }

    buf
}

/// Keep header and question only, with ANCOUNT zeroed and TC set
fn truncate_to_question(buf: &mut Vec<u8>, query: &DnsQuery) {
    buf.truncate(query.question_end);
    buf[6..8].copy_from_slice(&0u16.to_be_bytes());
    let flags = u16::from_be_bytes([buf[2], buf[3]]) | FLAG_TC;
    buf[2..4].copy_from_slice(&flags.to_be_bytes());
}

/// Split text into length-prefixed character-strings of at most 255 bytes
fn encode_txt_rdata(text: &str) -> Vec<u8> {
    let bytes = &text.as_bytes()[..text.len().min(MAX_TXT_BYTES)];
    if bytes.is_empty() {
        return vec![0];
    }

    let mut rdata = Vec::with_capacity(bytes.len() + bytes.len() / MAX_CHARACTER_STRING + 1);
    for chunk in bytes.chunks(MAX_CHARACTER_STRING) {
        rdata.push(chunk.len() as u8);
        rdata.extend_from_slice(chunk);
    }
    rdata
}

/// Encode a domain name in DNS wire format, uncompressed
fn encode_name(buf: &mut Vec<u8>, domain: &str) {
    for label in domain.trim_end_matches('.').split('.') {
        if label.is_empty() {
            continue;
        }
        let label = &label.as_bytes()[..label.len().min(MAX_LABEL_LEN)];
        buf.push(label.len() as u8);
        buf.extend_from_slice(label);
    }
    buf.push(0); // Terminating zero
}

/// Parsed DNS response (read-only view into bytes)
#[derive(Debug)]
pub struct DnsResponse<'a> {
    buf: &'a [u8],
    id: u16,
    flags: u16,
    qdcount: u16,
    ancount: u16,
}

impl<'a> DnsResponse<'a> {
    /// Parse a DNS response header from raw bytes
    pub fn parse(buf: &'a [u8]) -> Result<DnsResponse<'a>, &'static str> {
        if buf.len() < HEADER_SIZE {
            return Err("Packet too short for DNS header");
        }

        let flags = u16::from_be_bytes([buf[2], buf[3]]);
        if flags & FLAG_QR == 0 {
            return Err("Not a response (QR bit not set)");
        }

        Ok(DnsResponse {
            buf,
            id: u16::from_be_bytes([buf[0], buf[1]]),
            flags,
            qdcount: u16::from_be_bytes([buf[4], buf[5]]),
            ancount: u16::from_be_bytes([buf[6], buf[7]]),
        })
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn response_code(&self) -> ResponseCode {
        ResponseCode::from_u16(self.flags)
    }

    pub fn is_authoritative(&self) -> bool {
        self.flags & FLAG_AA != 0
    }

    pub fn is_truncated(&self) -> bool {
        self.flags & FLAG_TC != 0
    }

    pub fn answer_count(&self) -> u16 {
        self.ancount
    }

    /// Decode the answer section, in order. Non-TXT answers are skipped.
    pub fn txt_answers(&self) -> Result<Vec<TxtRecord>, &'static str> {
        let buf = self.buf;
        let mut pos = HEADER_SIZE;

        for _ in 0..self.qdcount {
            pos = skip_name(buf, pos).ok_or("Truncated question")? + 4;
        }

        let mut answers = Vec::with_capacity(self.ancount as usize);
        for _ in 0..self.ancount {
            let (name, name_end) = parse_name(buf, pos)?;
            pos = name_end;

            // TYPE(2) + CLASS(2) + TTL(4) + RDLENGTH(2)
            if pos + 10 > buf.len() {
                return Err("Truncated answer");
            }
            let rtype = u16::from_be_bytes([buf[pos], buf[pos + 1]]);
            let rdlength = u16::from_be_bytes([buf[pos + 8], buf[pos + 9]]) as usize;
            pos += 10;
            if pos + rdlength > buf.len() {
                return Err("Answer data extends beyond packet");
            }

            if rtype == TYPE_TXT {
                answers.push(TxtRecord {
                    name,
                    text: decode_txt_rdata(&buf[pos..pos + rdlength])?,
                });
            }
            pos += rdlength;
        }

        Ok(answers)
    }

    /// Find minimum TTL in answer section
    pub fn min_ttl(&self) -> Option<u32> {
        let buf = self.buf;
        let mut pos = HEADER_SIZE;

        for _ in 0..self.qdcount {
            pos = skip_name(buf, pos)? + 4;
        }

        let mut min_ttl: Option<u32> = None;
        for _ in 0..self.ancount {
            pos = skip_name(buf, pos)?;
            if pos + 10 > buf.len() {
                break;
            }
            let ttl = u32::from_be_bytes([buf[pos + 4], buf[pos + 5], buf[pos + 6], buf[pos + 7]]);
            min_ttl = Some(min_ttl.map_or(ttl, |m| m.min(ttl)));

            let rdlength = u16::from_be_bytes([buf[pos + 8], buf[pos + 9]]) as usize;
            pos += 10 + rdlength;
        }

        min_ttl
    }
}

/// Join the character-strings of a TXT RDATA
fn decode_txt_rdata(rdata: &[u8]) -> Result<String, &'static str> {
    let mut bytes = Vec::with_capacity(rdata.len());
    let mut pos = 0;
    while pos < rdata.len() {
        let len = rdata[pos] as usize;
        pos += 1;
        if pos + len > rdata.len() {
            return Err("Character-string extends beyond RDATA");
        }
        bytes.extend_from_slice(&rdata[pos..pos + len]);
        pos += len;
    }
    String::from_utf8(bytes).map_err(|_| "Invalid UTF-8 in TXT data")
}

/// Parse a DNS name from the buffer, handling compression pointers
fn parse_name(buf: &[u8], start: usize) -> Result<(String, usize), &'static str> {
    let mut name_parts = Vec::new();
    let mut pos = start;
    let mut followed_pointer = false;
    let mut end_pos = 0;
    let mut total_len: usize = 0;

    loop {
        if pos >= buf.len() {
            return Err("Name extends beyond packet");
        }

        let len = buf[pos] as usize;

        if len == 0 {
            if !followed_pointer {
                end_pos = pos + 1;
            }
            break;
        }

        // Compression pointer (top 2 bits = 11)
        if len & 0xC0 == 0xC0 {
            if pos + 1 >= buf.len() {
                return Err("Compression pointer extends beyond packet");
            }
            if !followed_pointer {
                end_pos = pos + 2;
            }
            let offset = ((len & 0x3F) << 8) | (buf[pos + 1] as usize);
            // Only backward pointers, which also rules out loops
            if offset >= pos {
                return Err("Forward compression pointer (loop protection)");
            }
            pos = offset;
            followed_pointer = true;
            continue;
        }

        if len > MAX_LABEL_LEN {
            return Err("Label exceeds maximum length (63)");
        }

        pos += 1;
        if pos + len > buf.len() {
            return Err("Label extends beyond packet");
        }

        // Label plus its dot separator
        total_len += len + 1;
        if total_len > MAX_HOSTNAME_LEN {
            return Err("Hostname exceeds maximum length (253)");
        }

        let label = std::str::from_utf8(&buf[pos..pos + len])
            .map_err(|_| "Invalid UTF-8 in label")?
            .to_string();
        name_parts.push(label);
        pos += len;
    }

    let name = if name_parts.is_empty() {
        ".".to_string()
    } else {
        name_parts.join(".") + "."
    };

    Ok((name, end_pos))
}

/// Skip over a DNS name without decoding it
fn skip_name(buf: &[u8], start: usize) -> Option<usize> {
    let mut pos = start;

    loop {
        let len = *buf.get(pos)? as usize;

        if len == 0 {
            return Some(pos + 1);
        }

        // A pointer ends the name
        if len & 0xC0 == 0xC0 {
            return Some(pos + 2);
        }

        pos += 1 + len;
    }
}

// ==================== Helper for building DNS packets (tests) ====================
