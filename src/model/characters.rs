//! Discrete characters, their state labels, and the character matrix.

use crate::model::symbols::{CellState, StateCode};
use crate::model::taxa::TaxonIndex;

// =#========================================================================#=
// CHARACTER
// =#========================================================================$=
/// A discrete trait (e.g. geographic location) with its ordered state labels.
///
/// State code `k` refers to the `k`-th label, so the valid codes of this
/// character are `1..=num_states()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Character {
    name: String,
    state_labels: Vec<String>,
}

impl Character {
    pub fn new(name: String, state_labels: Vec<String>) -> Self {
        Self { name, state_labels }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of declared state labels.
    pub fn num_states(&self) -> usize {
        self.state_labels.len()
    }

    pub fn state_labels(&self) -> &[String] {
        &self.state_labels
    }

    /// Label of state `code`, if within range.
    pub fn state_label(&self, code: StateCode) -> Option<&str> {
        self.state_labels.get(code.index()).map(String::as_str)
    }

    /// Whether `code` lies within `1..=num_states()`.
    pub fn in_range(&self, code: StateCode) -> bool {
        code.code() <= self.state_labels.len()
    }

    /// Code of the state with the given label.
    pub fn state_code(&self, label: &str) -> Option<StateCode> {
        self.state_labels
            .iter()
            .position(|l| l == label)
            .map(StateCode::from_index)
    }
}

// =#========================================================================#=
// CHARACTER LABEL SET
// =#========================================================================$=
/// Ordered characters of a CHARACTERS block, from its `CHARSTATELABELS` command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharacterLabelSet {
    characters: Vec<Character>,
}

impl CharacterLabelSet {
    pub fn new(characters: Vec<Character>) -> Self {
        Self { characters }
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Character by 0-based column index.
    pub fn get(&self, column: usize) -> Option<&Character> {
        self.characters.get(column)
    }

    /// Column index and character with the given name.
    pub fn find(&self, name: &str) -> Option<(usize, &Character)> {
        self.characters
            .iter()
            .enumerate()
            .find(|(_, c)| c.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Character> {
        self.characters.iter()
    }
}

// =#========================================================================#=
// CHARACTER MATRIX
// =#========================================================================$=
/// 2-D table of cell states: rows follow the [TaxonSet](crate::model::TaxonSet)
/// order, columns the [CharacterLabelSet] order.
///
/// Only constructed by the metadata parser after all rows were mapped and
/// bounds-checked, so every cell is either missing or a valid state of its
/// column's character.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterMatrix {
    num_taxa: usize,
    num_characters: usize,
    /// Row-major cells
    cells: Vec<CellState>,
}

impl CharacterMatrix {
    /// Assembles a matrix from rows given in taxon order.
    ///
    /// # Panics
    /// Panics if a row does not have `num_characters` cells.
    pub(crate) fn from_rows(num_characters: usize, rows: Vec<Vec<CellState>>) -> Self {
        let num_taxa = rows.len();
        let mut cells = Vec::with_capacity(num_taxa * num_characters);
        for row in rows {
            assert_eq!(row.len(), num_characters);
            cells.extend(row);
        }
        Self {
            num_taxa,
            num_characters,
            cells,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.num_taxa
    }

    pub fn num_columns(&self) -> usize {
        self.num_characters
    }

    /// Cell of taxon `taxon` and 0-based character `column`.
    pub fn get(&self, taxon: TaxonIndex, column: usize) -> Option<CellState> {
        if taxon >= self.num_taxa || column >= self.num_characters {
            return None;
        }
        Some(self.cells[taxon * self.num_characters + column])
    }

    /// Row of taxon `taxon`.
    pub fn row(&self, taxon: TaxonIndex) -> Option<&[CellState]> {
        if taxon >= self.num_taxa {
            return None;
        }
        let start = taxon * self.num_characters;
        Some(&self.cells[start..start + self.num_characters])
    }

    /// Column of character `column`, indexed by taxon.
    pub fn column(&self, column: usize) -> Option<Vec<CellState>> {
        if column >= self.num_characters {
            return None;
        }
        Some(
            (0..self.num_taxa)
                .map(|taxon| self.cells[taxon * self.num_characters + column])
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(c: usize) -> CellState {
        StateCode::new(c)
    }

    #[test]
    fn test_matrix_access() {
        let matrix = CharacterMatrix::from_rows(
            2,
            vec![vec![code(1), code(2)], vec![None, code(1)], vec![code(2), None]],
        );
        assert_eq!(matrix.num_rows(), 3);
        assert_eq!(matrix.num_columns(), 2);
        assert_eq!(matrix.get(1, 0), Some(None));
        assert_eq!(matrix.get(2, 0), Some(code(2)));
        assert_eq!(matrix.get(3, 0), None);
        assert_eq!(matrix.row(0), Some(&[code(1), code(2)][..]));
        assert_eq!(matrix.column(1), Some(vec![code(2), code(1), None]));
        assert_eq!(matrix.column(2), None);
    }

    #[test]
    fn test_character_range() {
        let location = Character::new(
            "location".to_string(),
            vec!["Asia".to_string(), "Europe".to_string()],
        );
        assert!(location.in_range(StateCode::new(2).unwrap()));
        assert!(!location.in_range(StateCode::new(3).unwrap()));
        assert_eq!(location.state_label(StateCode::new(1).unwrap()), Some("Asia"));
        assert_eq!(location.state_code("Europe"), StateCode::new(2));
    }
}
