//! Renders [serializable](serde::Serialize) values as YAML documents.
use std::io::Write;

use serde::Serialize;
use snafu::{ResultExt, Snafu};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize value as YAML"))]
    SerializeValue { source: serde_yaml::Error },

    #[snafu(display("failed to write YAML document start marker"))]
    WriteDocumentStart { source: std::io::Error },

    #[snafu(display("serialized YAML is not valid UTF-8"))]
    DecodeUtf8 { source: std::string::FromUtf8Error },
}

/// Controls how values are rendered.
///
/// The defaults produce documents that can be concatenated into a multi-document stream and
/// applied with `kubectl`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Starts the document with `---`.
    pub explicit_document: bool,

    /// Renders enum variants as single-entry maps (`{Variant: value}`) instead of YAML tags.
    pub singleton_map: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            explicit_document: true,
            singleton_map: true,
        }
    }
}

/// Writes `value` as a single YAML document to `writer`.
pub fn to_writer<T, W>(value: &T, mut writer: W, options: SerializeOptions) -> Result<()>
where
    T: Serialize,
    W: Write,
{
    if options.explicit_document {
        writeln!(writer, "---").context(WriteDocumentStartSnafu)?;
    }

    let mut serializer = serde_yaml::Serializer::new(writer);
    let serialized = if options.singleton_map {
        serde_yaml::with::singleton_map_recursive::serialize(value, &mut serializer)
    } else {
        value.serialize(&mut serializer)
    };

    serialized.context(SerializeValueSnafu)
}

/// Renders `value` into memory, nothing is returned if any part of it fails to serialize.
pub fn to_string<T: Serialize>(value: &T, options: SerializeOptions) -> Result<String> {
    let mut buffer = Vec::new();
    to_writer(value, &mut buffer, options)?;

    String::from_utf8(buffer).context(DecodeUtf8Snafu)
}

/// Method form of [`to_string`], available on every serializable type.
pub trait YamlDocument: Serialize + Sized {
    fn to_yaml_string(&self, options: SerializeOptions) -> Result<String> {
        to_string(self, options)
    }
}

impl<T: Serialize> YamlDocument for T {}
