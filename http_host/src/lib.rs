//! Model of the host server's request record and the header tables that
//! back it.

pub mod hash;
pub mod headers;
pub mod index;
pub mod parse;
pub mod request;

pub use headers::{BasicCredentials, HeaderOffset, HeadersIn, KnownHeader, TableElt};
pub use index::HeaderOffsetIndex;
pub use parse::{parse_request, ParseError};
pub use request::{HttpMethod, HttpRequest, RequestCtx};
