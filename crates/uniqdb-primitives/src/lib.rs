#[macro_use]
mod macros;

///
/// ValueKind
///
/// Physical value domain of one aggregate argument column.
/// Key encoders and the function registry dispatch on this once per query.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ValueKind {
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    UInt128,
    Float32,
    Float64,
    Text,
}

impl ValueKind {
    /// Return the full metadata descriptor for one value kind.
    #[must_use]
    pub const fn metadata(self) -> ValueMetadata {
        value_kind_registry!(metadata_from_registry, self)
    }

    /// Return the coarse family of this value kind.
    #[must_use]
    pub const fn family(self) -> ValueFamily {
        self.metadata().family
    }

    /// Return the display name used in error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.metadata().name
    }

    /// Return the in-memory width in bytes, or `None` for variable-width text.
    #[must_use]
    pub const fn fixed_width(self) -> Option<u8> {
        self.metadata().fixed_width
    }

    /// Return the exact-path surrogate key width for this value kind.
    #[must_use]
    pub const fn key_width(self) -> KeyWidth {
        self.metadata().key_width
    }

    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(self.family(), ValueFamily::Text)
    }

    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self.family(), ValueFamily::Float)
    }

    /// Return whether values of this kind are 128 bits wide.
    #[must_use]
    pub const fn is_wide(self) -> bool {
        matches!(self.fixed_width(), Some(16))
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

///
/// ValueMetadata
///
/// Registry descriptor shared by the key encoders and the function registry.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ValueMetadata {
    pub family: ValueFamily,
    pub name: &'static str,
    pub fixed_width: Option<u8>,
    pub key_width: KeyWidth,
}

///
/// ValueFamily
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ValueFamily {
    Integer,
    Float,
    Text,
}

///
/// KeyWidth
///
/// Width of the surrogate key used by exact distinct counting.
/// `Narrow` keys are the value widened to 64 bits; `Wide` keys are 128 bits.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum KeyWidth {
    Narrow,
    Wide,
}

/// Ordered list of all value kinds in registry order.
pub const ALL_VALUE_KINDS: [ValueKind; 13] = value_kind_registry!(all_kinds_from_registry);

///
/// TESTS
///
