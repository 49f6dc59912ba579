//! Key syntax: `K`, `K[n]`, `K[]`, `K[#]`, `K[*]`, `K[@]`.

/// Addressing mode selected by the bracket contents of a key reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// `K` or `K[0]` — write target defaults to index 0.
    Index(usize),
    /// `K[]` — append-only, not a valid read address by itself.
    Array,
    /// `K[#]` — element count, read-only projection.
    Count,
    /// `K[*]` — space-joined concatenation, read-only projection.
    Concat,
    /// `K[@]` — bracketed join (`[a, b, c]`), read-only projection.
    Format,
}

impl KeyType {
    /// True for projections that may only appear on the read side of an
    /// expression (never as an assignment target).
    pub fn is_read_only_projection(self) -> bool {
        matches!(self, KeyType::Count | KeyType::Concat | KeyType::Format)
    }
}

/// Whether a key may be written by ordinary (non-forced) config input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    ReadOnly,
    Settable,
}

/// Splits `name[suffix]` into the bare name and its `KeyType`. A name with no
/// brackets at all is `Index(0)`.
pub fn parse_key(raw: &str) -> (&str, KeyType) {
    let Some(open) = raw.find('[') else {
        return (raw, KeyType::Index(0));
    };
    let Some(close) = raw.rfind(']') else {
        return (raw, KeyType::Index(0));
    };
    if close < open {
        return (raw, KeyType::Index(0));
    }
    let name = &raw[..open];
    let inner = &raw[open + 1..close];
    let ty = if inner.is_empty() {
        KeyType::Array
    } else if inner == "#" {
        KeyType::Count
    } else if inner == "*" {
        KeyType::Concat
    } else if inner == "@" {
        KeyType::Format
    } else if let Ok(n) = inner.parse::<usize>() {
        KeyType::Index(n)
    } else {
        // Unrecognized bracket content falls back to index 0; callers treat
        // this the same as an unbracketed key and the parser layer is
        // responsible for rejecting malformed key syntax up front.
        KeyType::Index(0)
    };
    (name, ty)
}

pub fn class_of(name: &str) -> KeyClass {
    if name.starts_with('_') {
        KeyClass::ReadOnly
    } else {
        KeyClass::Settable
    }
}

/// Splits a raw value literal on top-level commas if bracketed (`[a, b, c]`),
/// trimming each element; otherwise returns a single-element list.
pub fn parse_value(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if let Some(inner) = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
    {
        if inner.trim().is_empty() {
            return vec![String::new()];
        }
        inner.split(',').map(|s| s.trim().to_string()).collect()
    } else {
        vec![trimmed.to_string()]
    }
}
