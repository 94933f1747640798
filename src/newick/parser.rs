//! Recursive-descent parser for Newick strings.

use crate::model::{BranchLength, LabelResolver, NodeId, PhyloTree, PhyloTreeBuilder};
use crate::newick::defs::{NEWICK_LABEL_DELIMITERS, is_branch_length_byte};
use crate::parser::byte_parser::ByteParser;
use crate::parser::byte_source::ByteSource;
use crate::parser::parsing_error::ParsingError;

// =#========================================================================#=
// NEWICK PARSER
// =#========================================================================$=
/// Parser for Newick format phylogenetic trees over a fixed taxon set.
///
/// Trees may be multifurcating; internal vertices may carry a label and every
/// vertex an optional branch length. Each taxon of the resolver's
/// [TaxonSet](crate::model::TaxonSet) must appear exactly once as a leaf.
///
/// # Example
/// ```
/// use nexnet::model::{LabelResolver, TaxonSet};
/// use nexnet::newick::NewickParser;
/// use nexnet::parser::ByteParser;
///
/// let mut taxa = TaxonSet::with_capacity(3);
/// for label in ["Kea", "Kaka", "Kakapo"] {
///     taxa.insert(label);
/// }
/// let mut newick_parser = NewickParser::new(LabelResolver::new_verbatim_labels_resolver(&taxa));
/// let mut byte_parser = ByteParser::for_str("((Kea:1.0,Kaka:1.0)Nestor:0.5,Kakapo:1.5);");
///
/// let tree = newick_parser.parse_str(&mut byte_parser)?;
/// assert_eq!(tree.num_leaves(), 3);
/// assert_eq!(tree.node(3).label(), Some("Nestor"));
/// # Ok::<(), nexnet::parser::ParsingError>(())
/// ```
pub struct NewickParser<'a> {
    resolver: LabelResolver<'a>,
}

// ============================================================================
// API (pub)
// ============================================================================
impl<'a> NewickParser<'a> {
    pub fn new(resolver: LabelResolver<'a>) -> Self {
        Self { resolver }
    }

    /// Parses all Newick trees from the byte source until EOF.
    pub fn parse_all<B: ByteSource>(
        &mut self,
        mut byte_parser: ByteParser<B>,
    ) -> Result<Vec<PhyloTree>, ParsingError> {
        let mut trees = Vec::new();
        loop {
            byte_parser.skip_comment_and_whitespace()?;
            if byte_parser.is_eof() {
                break;
            }
            trees.push(self.parse_str(&mut byte_parser)?);
        }
        Ok(trees)
    }

    /// Parses a single Newick tree, including its terminating `;`.
    pub fn parse_str<B: ByteSource>(
        &mut self,
        parser: &mut ByteParser<B>,
    ) -> Result<PhyloTree, ParsingError> {
        self.parse_str_and_name(parser, None)
    }

    /// Parses a single Newick tree and gives it the provided name.
    pub(crate) fn parse_str_and_name<B: ByteSource>(
        &mut self,
        parser: &mut ByteParser<B>,
        tree_name: Option<String>,
    ) -> Result<PhyloTree, ParsingError> {
        let mut builder = PhyloTreeBuilder::new(self.resolver.taxa().len());
        let root = self.parse_root(parser, &mut builder)?;

        let tree = builder
            .finish(root)
            .map_err(|e| ParsingError::invalid_newick_string(parser, e.to_string()))?;
        Ok(match tree_name {
            Some(name) => tree.with_name(name),
            None => tree,
        })
    }
}

// ============================================================================
// Parsing (private)
// ============================================================================
impl NewickParser<'_> {
    /// Parses the root vertex followed by the terminating `;`.
    fn parse_root<B: ByteSource>(
        &mut self,
        parser: &mut ByteParser<B>,
        builder: &mut PhyloTreeBuilder,
    ) -> Result<NodeId, ParsingError> {
        let root = self.parse_vertex(parser, builder)?;

        parser.skip_comment_and_whitespace()?;
        if !parser.consume_if(b';') {
            let next_char = parser.peek().map(char::from);
            return Err(ParsingError::invalid_newick_string(
                parser,
                format!("Expected ';' at end of tree but found {next_char:?}"),
            ));
        }
        Ok(root)
    }

    /// Dispatches to `parse_internal_vertex` if at `(`, otherwise `parse_leaf`.
    fn parse_vertex<B: ByteSource>(
        &mut self,
        parser: &mut ByteParser<B>,
        builder: &mut PhyloTreeBuilder,
    ) -> Result<NodeId, ParsingError> {
        parser.skip_comment_and_whitespace()?;
        if parser.peek_is(b'(') {
            self.parse_internal_vertex(parser, builder)
        } else {
            self.parse_leaf(parser, builder)
        }
    }

    /// `(child[,child]*)[label][:branch_length]`
    fn parse_internal_vertex<B: ByteSource>(
        &mut self,
        parser: &mut ByteParser<B>,
        builder: &mut PhyloTreeBuilder,
    ) -> Result<NodeId, ParsingError> {
        let children = self.parse_children(parser, builder)?;

        parser.skip_comment_and_whitespace()?;
        let label = match parser.peek() {
            Some(b) if !NEWICK_LABEL_DELIMITERS.contains(&b) => {
                Some(parser.parse_label(NEWICK_LABEL_DELIMITERS)?)
            }
            _ => None,
        };
        let branch_length = self.parse_branch_length(parser)?;

        builder
            .add_internal(children, branch_length, label)
            .map_err(|e| ParsingError::invalid_newick_string(parser, e.to_string()))
    }

    /// `(child[,child]*)`, expects parser at opening `(`.
    fn parse_children<B: ByteSource>(
        &mut self,
        parser: &mut ByteParser<B>,
        builder: &mut PhyloTreeBuilder,
    ) -> Result<Vec<NodeId>, ParsingError> {
        if !parser.consume_if(b'(') {
            let next_char = parser.peek().map(char::from);
            return Err(ParsingError::invalid_newick_string(
                parser,
                format!("Expected '(' before children but found {next_char:?}"),
            ));
        }

        let mut children = Vec::with_capacity(2);
        loop {
            children.push(self.parse_vertex(parser, builder)?);

            parser.skip_comment_and_whitespace()?;
            if parser.consume_if(b',') {
                continue;
            }
            if parser.consume_if(b')') {
                return Ok(children);
            }
            let next_char = parser.peek().map(char::from);
            return Err(ParsingError::invalid_newick_string(
                parser,
                format!("Expected ',' or ')' after child but found {next_char:?}"),
            ));
        }
    }

    /// `label[:branch_length]`, with the label resolved to a taxon.
    fn parse_leaf<B: ByteSource>(
        &mut self,
        parser: &mut ByteParser<B>,
        builder: &mut PhyloTreeBuilder,
    ) -> Result<NodeId, ParsingError> {
        let label = parser.parse_label(NEWICK_LABEL_DELIMITERS)?;
        if label.is_empty() {
            let next_char = parser.peek().map(char::from);
            return Err(ParsingError::invalid_newick_string(
                parser,
                format!("Expected leaf label but found {next_char:?}"),
            ));
        }
        let taxon = self
            .resolver
            .resolve_label(&label)
            .map_err(|e| ParsingError::unresolved_label(parser, e.to_string()))?;
        let branch_length = self.parse_branch_length(parser)?;

        builder.add_leaf(taxon, branch_length).map_err(|_| {
            ParsingError::invalid_newick_string(
                parser,
                format!("Taxon '{label}' occurs more than once in tree"),
            )
        })
    }

    /// Parses optional branch length `[:number]`, supporting scientific notation.
    fn parse_branch_length<B: ByteSource>(
        &mut self,
        parser: &mut ByteParser<B>,
    ) -> Result<Option<BranchLength>, ParsingError> {
        parser.skip_comment_and_whitespace()?;
        if !parser.consume_if(b':') {
            return Ok(None);
        }
        parser.skip_comment_and_whitespace()?;

        let mut branch_length_str = String::new();
        while let Some(b) = parser.peek() {
            if !is_branch_length_byte(b) {
                break;
            }
            branch_length_str.push(b as char);
            parser.next_byte();
        }

        let value: f64 = branch_length_str.parse().map_err(|_| {
            ParsingError::invalid_newick_string(
                parser,
                format!("Invalid branch length: {branch_length_str}"),
            )
        })?;
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaxonSet;
    use crate::parser::ParsingErrorType;

    fn taxa(labels: &[&str]) -> TaxonSet {
        let mut taxa = TaxonSet::with_capacity(labels.len());
        for label in labels {
            taxa.insert(label);
        }
        taxa
    }

    fn parse(taxa: &TaxonSet, input: &str) -> Result<PhyloTree, ParsingError> {
        let mut parser = NewickParser::new(LabelResolver::new_verbatim_labels_resolver(taxa));
        parser.parse_str(&mut ByteParser::for_str(input))
    }

    #[test]
    fn test_ids_post_order_root_last() {
        let taxa = taxa(&["t1", "t2", "t3", "t4"]);
        let tree = parse(&taxa, "((t1,t2),(t3,t4));").unwrap();
        assert_eq!(tree.num_leaves(), 4);
        assert_eq!(tree.num_internal(), 3);
        assert_eq!(tree.root(), 6);
        assert_eq!(tree.node(4).children(), &[0, 1]);
        assert_eq!(tree.node(5).children(), &[2, 3]);
        assert_eq!(tree.node(6).children(), &[4, 5]);
    }

    #[test]
    fn test_multifurcation_labels_and_branch_lengths() {
        let taxa = taxa(&["A", "B", "C", "D"]);
        let tree = parse(
            &taxa,
            "(D:1e-2, (C:0.5,[comment] B:0.25, 'A':1)inner:2.0) root ;",
        )
        .unwrap();
        let inner = tree.node(4);
        assert_eq!(inner.children(), &[2, 1, 0]);
        assert_eq!(inner.label(), Some("inner"));
        assert_eq!(inner.branch_length(), Some(2.0));
        assert_eq!(tree.node(3).branch_length(), Some(0.01));
        assert_eq!(tree.node(tree.root()).label(), Some("root"));
    }

    #[test]
    fn test_unknown_leaf() {
        let taxa = taxa(&["A", "B"]);
        let err = parse(&taxa, "(A,X);").unwrap_err();
        assert!(matches!(err.kind(), ParsingErrorType::UnresolvedLabel(_)));
    }

    #[test]
    fn test_taxon_missing_or_duplicated() {
        let taxa = taxa(&["A", "B", "C"]);
        assert!(matches!(
            parse(&taxa, "(A,B);").unwrap_err().kind(),
            ParsingErrorType::InvalidNewickString(_)
        ));
        assert!(matches!(
            parse(&taxa, "((A,B),(A,C));").unwrap_err().kind(),
            ParsingErrorType::InvalidNewickString(_)
        ));
    }

    #[test]
    fn test_missing_semicolon() {
        let taxa = taxa(&["A", "B"]);
        assert!(matches!(
            parse(&taxa, "(A,B)").unwrap_err().kind(),
            ParsingErrorType::InvalidNewickString(_)
        ));
    }

    #[test]
    fn test_parse_all() {
        let taxa = taxa(&["A", "B"]);
        let mut parser = NewickParser::new(LabelResolver::new_verbatim_labels_resolver(&taxa));
        let trees = parser
            .parse_all(ByteParser::for_str("(A,B);\n[second]\n(B:1,A:2);\n"))
            .unwrap();
        assert_eq!(trees.len(), 2);
        assert_eq!(trees[1].node(2).children(), &[1, 0]);
    }
}
