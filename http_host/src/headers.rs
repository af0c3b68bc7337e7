use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use bytes::Bytes;
use std::fmt;
use std::sync::OnceLock;

/// How the parser treats a repeated occurrence of a cached header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// A second occurrence makes the request invalid.
    Unique,
    /// The cache keeps the first occurrence; later ones are only listed.
    FirstWins,
}

/// Location of a header's slot inside [`HeadersIn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeaderOffset(pub(crate) usize);

impl HeaderOffset {
    pub fn get(self) -> usize {
        self.0
    }

    pub fn header(self) -> Option<KnownHeader> {
        KnownHeader::ALL.get(self.0).copied()
    }
}

macro_rules! known_headers {
    ($($variant:ident => $name:literal, $policy:ident;)*) => {
        /// Request headers the host parses into a dedicated cache slot.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum KnownHeader {
            $($variant,)*
        }

        impl KnownHeader {
            pub const ALL: &'static [KnownHeader] = &[$(KnownHeader::$variant,)*];

            pub const COUNT: usize = Self::ALL.len();

            /// Canonical spelling, as the host lists it.
            pub const fn name(self) -> &'static str {
                match self {
                    $(KnownHeader::$variant => $name,)*
                }
            }

            pub const fn policy(self) -> Policy {
                match self {
                    $(KnownHeader::$variant => Policy::$policy,)*
                }
            }
        }
    };
}

known_headers! {
    Host => "Host", Unique;
    Connection => "Connection", FirstWins;
    IfModifiedSince => "If-Modified-Since", Unique;
    IfUnmodifiedSince => "If-Unmodified-Since", Unique;
    IfMatch => "If-Match", Unique;
    IfNoneMatch => "If-None-Match", Unique;
    UserAgent => "User-Agent", FirstWins;
    Referer => "Referer", FirstWins;
    ContentLength => "Content-Length", Unique;
    ContentRange => "Content-Range", Unique;
    ContentType => "Content-Type", FirstWins;
    Range => "Range", FirstWins;
    IfRange => "If-Range", Unique;
    TransferEncoding => "Transfer-Encoding", Unique;
    Te => "TE", FirstWins;
    Expect => "Expect", Unique;
    Upgrade => "Upgrade", FirstWins;
    AcceptEncoding => "Accept-Encoding", FirstWins;
    Via => "Via", FirstWins;
    Authorization => "Authorization", Unique;
    KeepAlive => "Keep-Alive", FirstWins;
    XForwardedFor => "X-Forwarded-For", FirstWins;
    XRealIp => "X-Real-IP", FirstWins;
    Accept => "Accept", FirstWins;
    AcceptLanguage => "Accept-Language", FirstWins;
    Depth => "Depth", FirstWins;
    Destination => "Destination", FirstWins;
    Overwrite => "Overwrite", FirstWins;
    Date => "Date", FirstWins;
    Cookie => "Cookie", FirstWins;
}

impl KnownHeader {
    pub const fn offset(self) -> HeaderOffset {
        HeaderOffset(self as usize)
    }
}

impl fmt::Display for KnownHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One received header line.
#[derive(Debug, Clone)]
pub struct TableElt {
    pub hash: usize,
    pub key: Bytes,
    pub lowcase_key: Bytes,
    pub value: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub user: Bytes,
    pub passwd: Bytes,
}

/// Per-request header cache.
///
/// `headers` keeps every line in arrival order. `slots` points into it for
/// each [`KnownHeader`] that was sent; an empty slot means the client never
/// sent that header.
#[derive(Debug)]
pub struct HeadersIn {
    headers: Vec<TableElt>,
    slots: [Option<usize>; KnownHeader::COUNT],
    basic_auth: OnceLock<Option<BasicCredentials>>,
}

impl Default for HeadersIn {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            slots: [None; KnownHeader::COUNT],
            basic_auth: OnceLock::new(),
        }
    }
}

impl HeadersIn {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, elt: TableElt) -> usize {
        self.headers.push(elt);
        self.headers.len() - 1
    }

    pub(crate) fn fill_slot(&mut self, offset: HeaderOffset, position: usize) {
        if let Some(slot) = self.slots.get_mut(offset.0) {
            *slot = Some(position);
        }
    }

    pub fn slot(&self, offset: HeaderOffset) -> Option<&TableElt> {
        let position = (*self.slots.get(offset.0)?)?;
        self.headers.get(position)
    }

    pub fn get(&self, header: KnownHeader) -> Option<&Bytes> {
        self.slot(header.offset()).map(|elt| &elt.value)
    }

    pub fn contains(&self, header: KnownHeader) -> bool {
        self.slot(header.offset()).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableElt> {
        self.headers.iter()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Credentials from `Authorization: Basic ...`, decoded on first use and
    /// cached for the remainder of the request.
    pub fn basic_auth(&self) -> Option<&BasicCredentials> {
        self.basic_auth
            .get_or_init(|| {
                self.get(KnownHeader::Authorization)
                    .and_then(decode_basic)
            })
            .as_ref()
    }
}

// Padding is optional and anything after the first '=' is ignored.
const BASIC_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

fn decode_basic(value: &Bytes) -> Option<BasicCredentials> {
    const SCHEME: &[u8] = b"basic ";

    if value.len() < SCHEME.len() || !value[..SCHEME.len()].eq_ignore_ascii_case(SCHEME) {
        return None;
    }

    let encoded = &value[SCHEME.len()..];
    let start = encoded.iter().position(|&c| c != b' ')?;
    let encoded = &encoded[start..];
    let end = encoded.iter().position(|&c| c == b'=').unwrap_or(encoded.len());

    let decoded = Bytes::from(BASIC_ENGINE.decode(&encoded[..end]).ok()?);
    let colon = decoded.iter().position(|&c| c == b':')?;
    if colon == 0 {
        return None;
    }

    Some(BasicCredentials {
        user: decoded.slice(..colon),
        passwd: decoded.slice(colon + 1..),
    })
}
