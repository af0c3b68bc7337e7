use bytes::Bytes;
use http_host::{parse_request, HeaderOffsetIndex, HttpRequest, KnownHeader};

/// Filler written into every field of [`FakeRequest::sentinel`].
pub const SENTINEL: &str = "ZZZZ";

/// Builds raw request bytes the way a client would send them.
#[derive(Debug, Clone)]
pub struct FakeRequest {
    method: String,
    target: String,
    protocol: Option<String>,
    headers: Vec<(String, String)>,
}

impl FakeRequest {
    pub fn new(method: &str, target: &str) -> Self {
        Self {
            method: method.to_string(),
            target: target.to_string(),
            protocol: Some("HTTP/1.1".to_string()),
            headers: vec![("Host".to_string(), "example.com".to_string())],
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new("GET", target)
    }

    /// `GET /a/b.html?x=1 HTTP/1.1` with only a Host header.
    pub fn simple_get() -> Self {
        Self::get("/a/b.html?x=1")
    }

    /// A request carrying every well-known header, each with the value
    /// `value-of-<lowercased name>`. Host and Authorization keep values a
    /// parser accepts; Authorization decodes to `user:secret`.
    pub fn with_all_known_headers() -> Self {
        let mut req = Self::get("/all").without_headers();
        for header in KnownHeader::ALL {
            let value = match header {
                KnownHeader::Host => "example.com".to_string(),
                KnownHeader::Authorization => "Basic dXNlcjpzZWNyZXQ=".to_string(),
                other => format!("value-of-{}", other.name().to_ascii_lowercase()),
            };
            req = req.header(header.name(), &value);
        }
        req
    }

    /// A request where every field the bridge can read holds [`SENTINEL`].
    pub fn sentinel() -> Self {
        let target = format!("/{SENTINEL}/{SENTINEL}.{SENTINEL}?{SENTINEL}");
        let mut req = Self::new(SENTINEL, &target).without_headers();
        for header in KnownHeader::ALL {
            req = req.header(header.name(), SENTINEL);
        }
        req
    }

    /// Drops the protocol, producing an HTTP/0.9 simple request line.
    pub fn http_09(mut self) -> Self {
        self.protocol = None;
        self
    }

    pub fn protocol(mut self, protocol: &str) -> Self {
        self.protocol = Some(protocol.to_string());
        self
    }

    pub fn without_headers(mut self) -> Self {
        self.headers.clear();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn raw(&self) -> Bytes {
        let mut out = String::new();
        out.push_str(&self.method);
        out.push(' ');
        out.push_str(&self.target);
        match &self.protocol {
            Some(protocol) => {
                out.push(' ');
                out.push_str(protocol);
                out.push_str("\r\n");
                for (name, value) in &self.headers {
                    out.push_str(name);
                    out.push_str(": ");
                    out.push_str(value);
                    out.push_str("\r\n");
                }
                out.push_str("\r\n");
            }
            None => out.push_str("\r\n"),
        }
        Bytes::from(out)
    }

    /// Parses [`Self::raw`] against the global header index.
    ///
    /// Panics when the host would reject the request; fixtures are expected
    /// to be well formed.
    pub fn parsed(&self) -> HttpRequest {
        match parse_request(self.raw(), HeaderOffsetIndex::global()) {
            Ok(req) => req,
            Err(e) => panic!("fake request does not parse: {e}"),
        }
    }
}
