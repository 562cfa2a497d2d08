/*! Corpus building

Turns converted articles (`xml/<id>.xml`) into plain text documents for language modelling:

1. [parser] keeps the prose of the article. In-text citations become their author/year label,
   parenthetical and unresolved citations are dropped, non-prose elements (titles, floats, notes,
   conversion errors) are removed and math becomes a placeholder token.
1. [cleaner] lowercases and tokenizes the text, numbers become `<num>`, math becomes `<latex>`,
   stopwords are removed.
1. [builder] writes `corpus/<id>.txt` and optionally the flat and abstracts corpora.
!*/
pub mod builder;
pub mod cleaner;
pub mod parser;

pub use builder::{CorpusBuilder, CorpusStats, DocumentOutcome};
pub use cleaner::Cleaner;
pub use parser::{parse_article, Article, CitationStats};
