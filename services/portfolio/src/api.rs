use routing::StoreAlias;

use crate::store::{PhotoRecord, Season};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoApiResponse {
    pub stored_photo_id: String,
    pub store_alias: StoreAlias,
    pub photos_total: usize,
}

/// Reads the flat photo upload payload. The accepted shape is a single JSON
/// object of string fields, a string array for `tags`, and an integer-or-null
/// `uploaded_at_unix`; anything else is rejected with a field-level message.
pub fn parse_photo_request(body: &str) -> Result<PhotoRecord, String> {
    let mut reader = JsonReader::new(body);
    reader.expect(b'{', "request body must be a JSON object")?;

    let mut photo_id = None;
    let mut title = None;
    let mut season_raw = None;
    let mut zone = None;
    let mut tags = Vec::new();
    let mut uploaded_at_unix = None;

    if !reader.try_consume(b'}') {
        loop {
            let key = reader.string("object key")?;
            reader.expect(b':', "expected ':' after object key")?;
            match key.as_str() {
                "photo_id" => photo_id = Some(reader.string("photo_id")?),
                "title" => title = Some(reader.string("title")?),
                "season" => season_raw = Some(reader.string("season")?),
                "zone" => zone = Some(reader.string("zone")?),
                "tags" => tags = reader.string_array("tags")?,
                "uploaded_at_unix" => {
                    uploaded_at_unix = reader.integer_or_null("uploaded_at_unix")?;
                }
                other => return Err(format!("unknown photo field '{other}'")),
            }
            if reader.try_consume(b',') {
                continue;
            }
            reader.expect(b'}', "expected ',' or '}' in photo object")?;
            break;
        }
    }
    reader.end()?;

    let season_raw = season_raw.ok_or_else(|| "season is required".to_string())?;
    let season = Season::parse(&season_raw)
        .ok_or_else(|| "season must be one of: spring, summer, autumn, winter".to_string())?;

    Ok(PhotoRecord {
        photo_id: photo_id.ok_or_else(|| "photo_id is required".to_string())?,
        title: title.ok_or_else(|| "title is required".to_string())?,
        season,
        zone: zone.ok_or_else(|| "zone is required".to_string())?,
        tags,
        uploaded_at_unix,
    })
}

pub fn render_photo_response_json(resp: &PhotoApiResponse) -> String {
    format!(
        "{{\"stored_photo_id\":\"{}\",\"store_alias\":\"{}\",\"photos_total\":{}}}",
        json_escape(&resp.stored_photo_id),
        resp.store_alias.as_str(),
        resp.photos_total
    )
}

pub fn render_photo_list_json(alias: StoreAlias, photos: &[PhotoRecord]) -> String {
    let rendered: Vec<String> = photos.iter().map(render_photo_json).collect();
    format!(
        "{{\"store_alias\":\"{}\",\"photos_total\":{},\"photos\":[{}]}}",
        alias.as_str(),
        photos.len(),
        rendered.join(",")
    )
}

fn render_photo_json(photo: &PhotoRecord) -> String {
    let tags: Vec<String> = photo
        .tags
        .iter()
        .map(|tag| format!("\"{}\"", json_escape(tag)))
        .collect();
    format!(
        "{{\"photo_id\":\"{}\",\"title\":\"{}\",\"season\":\"{}\",\"zone\":\"{}\",\"tags\":[{}],\"uploaded_at_unix\":{}}}",
        json_escape(&photo.photo_id),
        json_escape(&photo.title),
        photo.season.as_str(),
        json_escape(&photo.zone),
        tags.join(","),
        photo
            .uploaded_at_unix
            .map(|value| value.to_string())
            .unwrap_or_else(|| "null".to_string())
    )
}

pub fn json_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}

struct JsonReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> JsonReader<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.bytes.get(self.pos), Some(b' ' | b'\n' | b'\r' | b'\t')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: u8, context: &str) -> Result<(), String> {
        self.skip_whitespace();
        match self.bytes.get(self.pos) {
            Some(byte) if *byte == expected => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(context.to_string()),
        }
    }

    fn try_consume(&mut self, expected: u8) -> bool {
        self.skip_whitespace();
        if self.bytes.get(self.pos) == Some(&expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn string(&mut self, field: &str) -> Result<String, String> {
        self.expect(b'"', &format!("{field} must be a string"))?;
        let mut out = Vec::new();
        loop {
            let byte = *self
                .bytes
                .get(self.pos)
                .ok_or_else(|| format!("unterminated string in {field}"))?;
            self.pos += 1;
            match byte {
                b'"' => {
                    return String::from_utf8(out)
                        .map_err(|_| format!("{field} must be valid UTF-8"));
                }
                b'\\' => {
                    let escaped = *self
                        .bytes
                        .get(self.pos)
                        .ok_or_else(|| format!("unterminated escape in {field}"))?;
                    self.pos += 1;
                    match escaped {
                        b'"' => out.push(b'"'),
                        b'\\' => out.push(b'\\'),
                        b'/' => out.push(b'/'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0C),
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'u' => {
                            let code = self.hex4(field)?;
                            let ch = char::from_u32(code)
                                .ok_or_else(|| format!("invalid unicode escape in {field}"))?;
                            let mut buf = [0u8; 4];
                            out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                        }
                        _ => return Err(format!("invalid escape sequence in {field}")),
                    }
                }
                byte if byte.is_ascii_control() => {
                    return Err(format!("unescaped control character in {field}"));
                }
                byte => out.push(byte),
            }
        }
    }

    fn string_array(&mut self, field: &str) -> Result<Vec<String>, String> {
        self.expect(b'[', &format!("{field} must be an array of strings"))?;
        let mut items = Vec::new();
        if self.try_consume(b']') {
            return Ok(items);
        }
        loop {
            items.push(self.string(field)?);
            if self.try_consume(b',') {
                continue;
            }
            self.expect(b']', &format!("expected ',' or ']' in {field}"))?;
            return Ok(items);
        }
    }

    fn integer_or_null(&mut self, field: &str) -> Result<Option<i64>, String> {
        self.skip_whitespace();
        if self.bytes.get(self.pos..self.pos + 4) == Some(b"null".as_slice()) {
            self.pos += 4;
            return Ok(None);
        }
        let start = self.pos;
        if self.bytes.get(self.pos) == Some(&b'-') {
            self.pos += 1;
        }
        while matches!(self.bytes.get(self.pos), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        let raw = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| format!("{field} must be an integer or null"))?;
        raw.parse::<i64>()
            .map(Some)
            .map_err(|_| format!("{field} must be an integer or null"))
    }

    fn hex4(&mut self, field: &str) -> Result<u32, String> {
        let mut value: u32 = 0;
        for _ in 0..4 {
            let byte = *self
                .bytes
                .get(self.pos)
                .ok_or_else(|| format!("incomplete unicode escape in {field}"))?;
            self.pos += 1;
            value = (value << 4)
                + match byte {
                    b'0'..=b'9' => (byte - b'0') as u32,
                    b'a'..=b'f' => (byte - b'a' + 10) as u32,
                    b'A'..=b'F' => (byte - b'A' + 10) as u32,
                    _ => return Err(format!("invalid unicode escape in {field}")),
                };
        }
        Ok(value)
    }

    fn end(&mut self) -> Result<(), String> {
        self.skip_whitespace();
        if self.pos < self.bytes.len() {
            return Err("unexpected trailing content after photo object".to_string());
        }
        Ok(())
    }
}
