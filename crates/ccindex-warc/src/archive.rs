//! Streaming WARC record reader.
//!
//! Accepts record-at-a-time gzip archives (one gzip member per record, the
//! usual `.warc.gz` layout) as well as uncompressed WARC. Offsets and lengths
//! refer to the *source* byte stream, so for gzip input they delimit the
//! compressed member and can be fed straight back into a ranged GET.
//!
//! Records come out as a two-phase handle: [`UnconsumedRecord`] exposes only
//! the WARC header; [`UnconsumedRecord::drain`] reads the content block and
//! yields a [`ConsumedRecord`], the only type with a [`position`](ConsumedRecord::position).

use std::io::{self, BufRead, BufReader, Read};

use flate2::bufread::{DeflateDecoder, GzDecoder, MultiGzDecoder, ZlibDecoder};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Upper bound for one WARC header block
const MAX_HEADER_BYTES: usize = 1 << 20;

/// Content blocks are read into memory; don't trust Content-Length for capacity
const MAX_PREALLOC: u64 = 1 << 20;

/// Cap on an inflated `Content-Encoding` payload
const MAX_DECODED_BYTES: u64 = 64 << 20;

/// Buffered reader that knows how many bytes have been consumed
pub struct CountingBufReader<R> {
    inner: BufReader<R>,
    position: u64,
}

impl<R: Read> CountingBufReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::with_capacity(64 * 1024, inner),
            position: 0,
        }
    }

    /// Bytes consumed so far
    pub const fn position(&self) -> u64 {
        self.position
    }
}

impl<R: Read> Read for CountingBufReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl<R: Read> BufRead for CountingBufReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt);
        self.position += amt as u64;
    }
}

/// Value of the `WARC-Type` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordType {
    Warcinfo,
    Response,
    Resource,
    Request,
    Metadata,
    Revisit,
    Conversion,
    Continuation,
    Other(String),
}

impl RecordType {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "warcinfo" => Self::Warcinfo,
            "response" => Self::Response,
            "resource" => Self::Resource,
            "request" => Self::Request,
            "metadata" => Self::Metadata,
            "revisit" => Self::Revisit,
            "conversion" => Self::Conversion,
            "continuation" => Self::Continuation,
            other => Self::Other(other.to_string()),
        }
    }
}

/// WARC version line plus named fields, in archive order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarcHeader {
    pub version: String,
    pub fields: Vec<(String, String)>,
}

impl WarcHeader {
    /// Case-insensitive field lookup, first occurrence wins
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn record_type(&self) -> RecordType {
        self.get("WARC-Type")
            .map_or_else(|| RecordType::Other(String::new()), RecordType::parse)
    }

    pub fn target_uri(&self) -> Option<&str> {
        // WARC/1.0 writers sometimes wrap the URI in angle brackets
        self.get("WARC-Target-URI")
            .map(|v| v.trim_start_matches('<').trim_end_matches('>'))
            .filter(|v| !v.is_empty())
    }

    pub fn date(&self) -> Option<&str> {
        self.get("WARC-Date").filter(|v| !v.is_empty())
    }

    pub fn content_length(&self) -> Option<u64> {
        self.get("Content-Length")?.parse().ok()
    }

    /// Read one header block. `Ok(None)` on clean end of input.
    fn read_from(reader: &mut dyn BufRead) -> io::Result<Option<Self>> {
        let mut line = Vec::new();
        let mut total = 0usize;

        // Version line, tolerating blank lines left over from the previous record
        let version = loop {
            line.clear();
            let n = reader.read_until(b'\n', &mut line)?;
            if n == 0 {
                return Ok(None);
            }
            total += n;
            let text = trim_eol(&line);
            if text.is_empty() {
                if total > MAX_HEADER_BYTES {
                    return Err(invalid("runaway blank lines before WARC header"));
                }
                continue;
            }
            if !text.starts_with(b"WARC/") {
                return Err(invalid(format!(
                    "expected WARC version line, found {:?}",
                    String::from_utf8_lossy(&text[..text.len().min(32)])
                )));
            }
            break String::from_utf8_lossy(text).into_owned();
        };

        let mut fields: Vec<(String, String)> = Vec::new();
        loop {
            line.clear();
            let n = reader.read_until(b'\n', &mut line)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "archive ended inside a WARC header",
                ));
            }
            total += n;
            if total > MAX_HEADER_BYTES {
                return Err(invalid("WARC header block too large"));
            }
            let text = trim_eol(&line);
            if text.is_empty() {
                break;
            }
            let text = String::from_utf8_lossy(text);
            if text.starts_with([' ', '\t']) {
                // Folded continuation of the previous field
                if let Some((_, value)) = fields.last_mut() {
                    value.push(' ');
                    value.push_str(text.trim());
                }
                continue;
            }
            match text.split_once(':') {
                Some((name, value)) => {
                    fields.push((name.trim().to_string(), value.trim().to_string()));
                }
                None => log::debug!("ignoring WARC header line without colon: {text}"),
            }
        }

        Ok(Some(Self { version, fields }))
    }
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// Where a record sits in the source byte stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPosition {
    pub offset: u64,
    pub length: u64,
}

/// Record whose content has not been read yet
#[derive(Debug, Clone, Copy)]
struct OpenRecord {
    start: u64,
    remaining: u64,
    compressed: bool,
}

enum Input<R> {
    Raw(CountingBufReader<R>),
    Member(BufReader<GzDecoder<CountingBufReader<R>>>),
    /// An I/O error struck while switching layers
    Broken,
}

/// Lazy sequence of WARC records over any byte stream
pub struct ArchiveReader<R> {
    input: Input<R>,
    open: Option<OpenRecord>,
}

impl<R> std::fmt::Debug for ArchiveReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveReader")
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}

impl<R: Read> ArchiveReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            input: Input::Raw(CountingBufReader::new(inner)),
            open: None,
        }
    }

    /// Bytes consumed from the source so far (only exact between records)
    pub fn position(&self) -> u64 {
        match &self.input {
            Input::Raw(raw) => raw.position(),
            Input::Member(member) => member.get_ref().get_ref().position(),
            Input::Broken => 0,
        }
    }

    /// Advance to the next record. A record dropped without `drain` is skipped.
    pub fn next_record(&mut self) -> io::Result<Option<UnconsumedRecord<'_, R>>> {
        if let Some(open) = self.open.take() {
            self.skip_content(open)?;
        }

        loop {
            let raw = self.raw()?;
            skip_blank(raw)?;
            let start = raw.position();
            let compressed = {
                let buf = raw.fill_buf()?;
                if buf.is_empty() {
                    return Ok(None);
                }
                buf.starts_with(&GZIP_MAGIC)
            };
            if compressed {
                self.enter_member()?;
            }

            let Some(header) = WarcHeader::read_from(self.body()?)? else {
                if compressed {
                    // Empty gzip member, keep going
                    self.leave_member()?;
                    continue;
                }
                return Ok(None);
            };
            let remaining = header
                .content_length()
                .ok_or_else(|| invalid("WARC record without a valid Content-Length"))?;

            self.open = Some(OpenRecord {
                start,
                remaining,
                compressed,
            });
            return Ok(Some(UnconsumedRecord {
                reader: self,
                header,
            }));
        }
    }

    fn raw(&mut self) -> io::Result<&mut CountingBufReader<R>> {
        match &mut self.input {
            Input::Raw(raw) => Ok(raw),
            Input::Member(_) => Err(io::Error::other("archive reader is inside a gzip member")),
            Input::Broken => Err(broken()),
        }
    }

    fn body(&mut self) -> io::Result<&mut dyn BufRead> {
        match &mut self.input {
            Input::Raw(raw) => Ok(raw),
            Input::Member(member) => Ok(member),
            Input::Broken => Err(broken()),
        }
    }

    fn enter_member(&mut self) -> io::Result<()> {
        match std::mem::replace(&mut self.input, Input::Broken) {
            Input::Raw(raw) => {
                self.input = Input::Member(BufReader::new(GzDecoder::new(raw)));
                Ok(())
            }
            other => {
                self.input = other;
                Err(io::Error::other("nested gzip member"))
            }
        }
    }

    /// Check the member holds nothing past the record trailer, then return
    /// to the raw stream. Returns the source position just past the member.
    fn leave_member(&mut self) -> io::Result<u64> {
        match std::mem::replace(&mut self.input, Input::Broken) {
            Input::Member(mut member) => {
                skip_blank(&mut member)?;
                if !member.fill_buf()?.is_empty() {
                    return Err(invalid(
                        "gzip member continues beyond a single record \
                         (whole-file gzip is not a record-at-a-time archive)",
                    ));
                }
                let raw = member.into_inner().into_inner();
                let end = raw.position();
                self.input = Input::Raw(raw);
                Ok(end)
            }
            other => {
                self.input = other;
                Err(io::Error::other("not inside a gzip member"))
            }
        }
    }

    fn read_content(&mut self, open: OpenRecord) -> io::Result<Vec<u8>> {
        let mut content = Vec::with_capacity(open.remaining.min(MAX_PREALLOC) as usize);
        self.body()?
            .take(open.remaining)
            .read_to_end(&mut content)?;
        if (content.len() as u64) < open.remaining {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "record content truncated: {} of {} bytes",
                    content.len(),
                    open.remaining
                ),
            ));
        }
        Ok(content)
    }

    fn skip_content(&mut self, open: OpenRecord) -> io::Result<()> {
        let copied = io::copy(&mut self.body()?.take(open.remaining), &mut io::sink())?;
        if copied < open.remaining {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "record content truncated",
            ));
        }
        self.close(open)?;
        Ok(())
    }

    /// Consume the record trailer, returning the end position in the source
    fn close(&mut self, open: OpenRecord) -> io::Result<u64> {
        if open.compressed {
            self.leave_member()
        } else {
            let raw = self.raw()?;
            skip_blank(raw)?;
            Ok(raw.position())
        }
    }
}

fn broken() -> io::Error {
    io::Error::other("archive reader unusable after an earlier error")
}

/// Skip CR/LF bytes between records
fn skip_blank(reader: &mut (impl BufRead + ?Sized)) -> io::Result<()> {
    loop {
        let buf = reader.fill_buf()?;
        let n = buf.iter().take_while(|b| matches!(b, b'\r' | b'\n')).count();
        if n == 0 {
            return Ok(());
        }
        reader.consume(n);
    }
}

/// Record handle before its content is read: header only, no position
pub struct UnconsumedRecord<'a, R> {
    reader: &'a mut ArchiveReader<R>,
    header: WarcHeader,
}

impl<R> std::fmt::Debug for UnconsumedRecord<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnconsumedRecord")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl<R: Read> UnconsumedRecord<'_, R> {
    pub fn header(&self) -> &WarcHeader {
        &self.header
    }

    pub fn record_type(&self) -> RecordType {
        self.header.record_type()
    }

    /// Read the whole content block; the position becomes known afterwards.
    pub fn drain(self) -> io::Result<ConsumedRecord> {
        let Some(open) = self.reader.open.take() else {
            return Err(io::Error::other("record already drained"));
        };
        let content = self.reader.read_content(open)?;
        let end = self.reader.close(open)?;
        Ok(ConsumedRecord {
            header: self.header,
            content,
            position: RecordPosition {
                offset: open.start,
                length: end - open.start,
            },
        })
    }
}

/// Fully read record, owning its header and content block
#[derive(Debug, Clone)]
pub struct ConsumedRecord {
    header: WarcHeader,
    content: Vec<u8>,
    position: RecordPosition,
}

impl ConsumedRecord {
    pub fn header(&self) -> &WarcHeader {
        &self.header
    }

    pub fn record_type(&self) -> RecordType {
        self.header.record_type()
    }

    /// Raw content block (for `response` records: the HTTP message)
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub const fn position(&self) -> RecordPosition {
        self.position
    }

    /// Split the captured HTTP response into status, headers and payload
    pub fn http_response(&self) -> HttpResponse {
        HttpResponse::parse(&self.content)
    }
}

/// Captured HTTP response inside a `response` record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    /// Entity body with transfer and content encodings removed when possible
    pub payload: Vec<u8>,
    /// Set when a declared encoding could not be undone; payload is then raw
    pub decode_error: Option<String>,
}

impl HttpResponse {
    pub fn parse(block: &[u8]) -> Self {
        let (status, headers, body) = split_http(block);
        let mut response = Self {
            status,
            headers,
            payload: Vec::new(),
            decode_error: None,
        };

        let chunked = response
            .header("Transfer-Encoding")
            .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"));
        let body = if chunked {
            match dechunk(body) {
                Some(joined) => joined,
                None => {
                    response.decode_error = Some("malformed chunked body".to_string());
                    body.to_vec()
                }
            }
        } else {
            body.to_vec()
        };

        let encoding = response
            .header("Content-Encoding")
            .map(|v| v.trim().to_ascii_lowercase());
        response.payload = match encoding.as_deref() {
            Some("gzip" | "x-gzip") => decode_with(&body, MAX_DECODED_BYTES, |b| MultiGzDecoder::new(b))
                .unwrap_or_else(|e| {
                    response.decode_error = Some(format!("gzip: {e}"));
                    body
                }),
            Some("deflate") => decode_with(&body, MAX_DECODED_BYTES, |b| ZlibDecoder::new(b))
                .or_else(|_| decode_with(&body, MAX_DECODED_BYTES, |b| DeflateDecoder::new(b)))
                .unwrap_or_else(|e| {
                    response.decode_error = Some(format!("deflate: {e}"));
                    body
                }),
            _ => body,
        };
        response
    }

    /// Case-insensitive header lookup, first occurrence wins
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type").filter(|v| !v.is_empty())
    }
}

/// Inflate `body`, refusing output larger than `limit` bytes
fn decode_with<'b, D: Read>(
    body: &'b [u8],
    limit: u64,
    decoder: impl FnOnce(&'b [u8]) -> D,
) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(body.len().saturating_mul(2).min(limit as usize));
    decoder(body).take(limit + 1).read_to_end(&mut out)?;
    if out.len() as u64 > limit {
        return Err(invalid(format!("decoded payload exceeds {limit} bytes")));
    }
    Ok(out)
}

type HttpHead = (Option<u16>, Vec<(String, String)>);

fn split_http(block: &[u8]) -> (Option<u16>, Vec<(String, String)>, &[u8]) {
    let mut slots = [httparse::EMPTY_HEADER; 128];
    let mut parsed = httparse::Response::new(&mut slots);
    if let Ok(httparse::Status::Complete(n)) = parsed.parse(block) {
        let headers = parsed
            .headers
            .iter()
            .map(|h| {
                (
                    h.name.to_string(),
                    String::from_utf8_lossy(h.value).trim().to_string(),
                )
            })
            .collect();
        return (parsed.code, headers, &block[n..]);
    }

    // Lenient path for responses httparse rejects (bad header bytes, too many headers)
    let Some((head_len, sep_len)) = find_head_end(block) else {
        return (None, Vec::new(), block);
    };
    let (status, headers) = parse_head_lenient(&block[..head_len]);
    (status, headers, &block[head_len + sep_len..])
}

fn find_head_end(block: &[u8]) -> Option<(usize, usize)> {
    if let Some(i) = block.windows(4).position(|w| w == b"\r\n\r\n") {
        return Some((i, 4));
    }
    block.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2))
}

fn parse_head_lenient(head: &[u8]) -> HttpHead {
    let text = String::from_utf8_lossy(head);
    let mut lines = text.lines();
    let status = lines
        .next()
        .filter(|l| l.starts_with("HTTP/"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok());
    let headers = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    (status, headers)
}

/// Join a chunked transfer-encoded body; `None` if the framing is broken
fn dechunk(mut body: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(body.len());
    loop {
        let eol = body.iter().position(|&b| b == b'\n')?;
        let size_line = std::str::from_utf8(&body[..eol]).ok()?;
        let size_hex = size_line.split(';').next()?.trim();
        let size = usize::from_str_radix(size_hex, 16).ok()?;
        body = &body[eol + 1..];
        if size == 0 {
            return Some(out);
        }
        if body.len() < size {
            return None;
        }
        out.extend_from_slice(&body[..size]);
        body = &body[size..];
        body = body
            .strip_prefix(b"\r\n")
            .or_else(|| body.strip_prefix(b"\n"))
            .unwrap_or(body);
    }
}
