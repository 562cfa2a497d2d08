/*! XML tree

A small owned tree built from [quick_xml] events, with the queries the corpus builder
and the HTTP clients need:
- find descendants by name or by predicate ([tree::Element::find], [tree::Element::find_all]),
- outermost elements of a kind ([tree::Element::outermost]),
- top-down rewriting, removing or replacing subtrees by text ([tree::Element::rewrite]).
!*/
mod tree;

pub use tree::{parse, Descendants, Element, Node, Rewrite};
