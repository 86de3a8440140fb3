//! XML serialization
//!
//! Writes [`FragmentDocument`](xmlview_engine::FragmentDocument)s as UTF-8
//! XML with `quick-xml`. Formatted output indents each level by a fixed
//! number of spaces and breaks lines with CRLF; compact output has no
//! whitespace between tags. Namespace declarations are emitted where a
//! prefix is first needed and inherited by descendants.

pub mod error;
pub mod serializer;
pub mod text;

pub use error::{FormatError, Result};
pub use serializer::{to_string, SerializerOptions, XmlSerializer};
pub use text::{comment_text, escape_attribute, escape_text, is_xml_char, normalize};
