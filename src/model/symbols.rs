//! State codes and the symbol alphabet of a CHARACTERS block.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Default symbols of the STANDARD data type.
pub const DEFAULT_SYMBOLS: &[char] = &['0', '1'];
/// Default missing-data symbol.
pub const DEFAULT_MISSING: char = '?';
/// Default gap symbol.
pub const DEFAULT_GAP: char = '-';

// =#========================================================================#=
// STATE CODE
// =#========================================================================$=
/// Integer code of a discrete character state.
///
/// Codes are 1-based: the `k`-th symbol of the alphabet maps to code `k`,
/// which in turn refers to the `k`-th state label of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StateCode(usize);

impl StateCode {
    /// Creates a state code from its 1-based value; `None` for 0.
    pub fn new(code: usize) -> Option<Self> {
        (code > 0).then_some(Self(code))
    }

    /// Creates a state code from a 0-based index (e.g. a likelihood column).
    pub fn from_index(index: usize) -> Self {
        Self(index + 1)
    }

    /// The 1-based code.
    pub fn code(self) -> usize {
        self.0
    }

    /// The 0-based index, e.g. into a list of state labels.
    pub fn index(self) -> usize {
        self.0 - 1
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value of one matrix cell: a state code, or `None` for missing data.
pub type CellState = Option<StateCode>;

// =#========================================================================#=
// SYMBOL TABLE
// =#========================================================================$=
/// Result of looking up one matrix symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolLookup {
    /// Symbol of the alphabet, mapped to its code
    State(StateCode),
    /// The designated missing symbol
    Missing,
    /// The designated gap symbol
    Gap,
    /// Neither alphabet, missing nor gap
    Unknown,
}

/// Problems detected while assembling a [SymbolTable].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolTableError {
    #[error("symbol '{0}' is not alphanumeric")]
    NotAlphanumeric(char),
    #[error("symbol '{0}' is listed more than once")]
    Duplicate(char),
    #[error("{role} symbol '{symbol}' is also listed in SYMBOLS")]
    Reserved { role: &'static str, symbol: char },
    #[error("missing and gap symbol are both '{0}'")]
    MissingIsGap(char),
}

/// Ordered alphabet of state symbols, plus the designated missing and gap
/// symbols of one parsed file.
///
/// # Invariants
/// * Symbols are distinct and alphanumeric
/// * `missing` and `gap` differ from each other and from every symbol
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolTable {
    symbols: Vec<char>,
    missing: char,
    gap: char,
}

impl SymbolTable {
    /// Creates a symbol table, validating the invariants above.
    pub fn new(symbols: Vec<char>, missing: char, gap: char) -> Result<Self, SymbolTableError> {
        for (i, &symbol) in symbols.iter().enumerate() {
            if !symbol.is_ascii_alphanumeric() {
                return Err(SymbolTableError::NotAlphanumeric(symbol));
            }
            if symbols[..i].contains(&symbol) {
                return Err(SymbolTableError::Duplicate(symbol));
            }
        }
        if missing == gap {
            return Err(SymbolTableError::MissingIsGap(missing));
        }
        if symbols.contains(&missing) {
            return Err(SymbolTableError::Reserved {
                role: "MISSING",
                symbol: missing,
            });
        }
        if symbols.contains(&gap) {
            return Err(SymbolTableError::Reserved {
                role: "GAP",
                symbol: gap,
            });
        }

        Ok(Self {
            symbols,
            missing,
            gap,
        })
    }

    /// Looks up a matrix symbol: first match in the alphabet, then the
    /// missing and the gap symbol.
    pub fn lookup(&self, symbol: char) -> SymbolLookup {
        if let Some(pos) = self.symbols.iter().position(|&s| s == symbol) {
            SymbolLookup::State(StateCode::from_index(pos))
        } else if symbol == self.missing {
            SymbolLookup::Missing
        } else if symbol == self.gap {
            SymbolLookup::Gap
        } else {
            SymbolLookup::Unknown
        }
    }

    /// The alphabet in code order.
    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }

    /// The symbol for `code`, if within the alphabet.
    pub fn symbol(&self, code: StateCode) -> Option<char> {
        self.symbols.get(code.index()).copied()
    }

    pub fn missing(&self) -> char {
        self.missing
    }

    pub fn gap(&self) -> char {
        self.gap
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.to_vec(),
            missing: DEFAULT_MISSING,
            gap: DEFAULT_GAP,
        }
    }
}
