use indexmap::IndexMap;

use super::key::{self, KeyClass, KeyType};

/// An ordered, multi-valued map from key name to a list of strings.
///
/// Every stored value is a list; a scalar key is simply a one-element list.
/// Iteration order matches insertion order, which is what lets `dump` and
/// the evaluator's `[@]`/`[*]` projections reproduce a stable, readable
/// rendering of a node.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    values: IndexMap<String, Vec<String>>,
}

/// Why a `set`/`append` call was rejected.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SymtabError {
    #[error("key '{0}' is read-only")]
    ReadOnly(String),
    #[error("index {index} out of range for key '{key}' (len {len})")]
    OutOfRange { key: String, index: usize, len: usize },
    #[error("projection key '{0}' is not a valid assignment target")]
    ProjectionTarget(String),
    #[error("value for '{0}' must be a single element")]
    NotScalar(String),
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deep copy, used when a source node is instantiated into a tree.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    pub fn exists(&self, name: &str) -> bool {
        let (bare, _) = key::parse_key(name);
        self.values.contains_key(bare)
    }

    /// Raw list for a bare key name (no bracket suffix applied).
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.values.get(name).map(Vec::as_slice)
    }

    pub fn get_string(&self, name: &str) -> String {
        self.values
            .get(name)
            .and_then(|v| v.first())
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get_string(name).trim().parse().ok()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Resolves a bracketed key reference (`K`, `K[n]`, `K[#]`, `K[*]`,
    /// `K[@]`) against the stored list for `K`, projecting read-only views
    /// as needed.
    pub fn resolve(&self, reference: &str) -> Option<Vec<String>> {
        let (name, ty) = key::parse_key(reference);
        let list = self.values.get(name)?;
        match ty {
            KeyType::Index(n) => list.get(n).cloned().map(|s| vec![s]),
            KeyType::Array => Some(list.clone()),
            KeyType::Count => Some(vec![list.len().to_string()]),
            KeyType::Concat => Some(vec![list.join(" ")]),
            KeyType::Format => Some(vec![format!("[{}]", list.join(", "))]),
        }
    }

    /// `set` semantics: rejects read-only keys unless `force`; the first
    /// write to an absent key must target index 0; subsequent writes may
    /// only replace a single existing index in range.
    pub fn set(&mut self, reference: &str, raw_value: &str, force: bool) -> Result<(), SymtabError> {
        let (name, ty) = key::parse_key(reference);

        if !force && key::class_of(name) == KeyClass::ReadOnly {
            return Err(SymtabError::ReadOnly(name.to_string()));
        }
        if ty.is_read_only_projection() {
            return Err(SymtabError::ProjectionTarget(name.to_string()));
        }

        let index = match ty {
            KeyType::Index(n) => n,
            KeyType::Array => 0,
            _ => unreachable!("read-only projections rejected above"),
        };

        match self.values.get_mut(name) {
            None => {
                if index != 0 {
                    return Err(SymtabError::OutOfRange {
                        key: name.to_string(),
                        index,
                        len: 0,
                    });
                }
                // First write may be a bracketed list literal (`K = [a, b, c]`);
                // the whole parsed list becomes the key's value, not just its
                // first element.
                self.values.insert(name.to_string(), key::parse_value(raw_value));
            }
            Some(list) => {
                if index >= list.len() {
                    return Err(SymtabError::OutOfRange {
                        key: name.to_string(),
                        index,
                        len: list.len(),
                    });
                }
                let parsed = key::parse_value(raw_value);
                if parsed.len() != 1 {
                    return Err(SymtabError::NotScalar(name.to_string()));
                }
                list[index] = parsed.into_iter().next().unwrap();
            }
        }
        tracing::trace!(key = name, "symtab set");
        Ok(())
    }

    /// `append` semantics: only INDEX or ARRAY targets are allowed. `K[]`
    /// appends a new element; `K[n]` space-concatenates onto the existing
    /// element at `n`, creating a single empty element first if absent.
    pub fn append(
        &mut self,
        reference: &str,
        raw_value: &str,
        force: bool,
    ) -> Result<(), SymtabError> {
        let (name, ty) = key::parse_key(reference);

        if !force && key::class_of(name) == KeyClass::ReadOnly {
            return Err(SymtabError::ReadOnly(name.to_string()));
        }
        if ty.is_read_only_projection() {
            return Err(SymtabError::ProjectionTarget(name.to_string()));
        }

        let parsed = key::parse_value(raw_value);
        if parsed.len() != 1 {
            return Err(SymtabError::NotScalar(name.to_string()));
        }
        let value = parsed.into_iter().next().unwrap();

        let list = self.values.entry(name.to_string()).or_default();
        match ty {
            KeyType::Array => list.push(value),
            KeyType::Index(n) => {
                if list.is_empty() {
                    list.push(String::new());
                }
                if n >= list.len() {
                    return Err(SymtabError::OutOfRange {
                        key: name.to_string(),
                        index: n,
                        len: list.len(),
                    });
                }
                if list[n].is_empty() {
                    list[n] = value;
                } else {
                    list[n].push(' ');
                    list[n].push_str(&value);
                }
            }
            _ => unreachable!("read-only projections rejected above"),
        }
        tracing::trace!(key = name, "symtab append");
        Ok(())
    }

    /// Force-set a read-only key; the only entry point the parser and tree
    /// builder use to seed `_FILENAME`/`_LINE`.
    pub fn set_forced(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(name.to_string(), vec![value.into()]);
    }

    pub fn dump(&self, w: &mut impl std::fmt::Write, indent: usize) -> std::fmt::Result {
        let pad = " ".repeat(indent);
        for (k, v) in &self.values {
            writeln!(w, "{pad}{k} = [{}]", v.join(", "))?;
        }
        Ok(())
    }
}
