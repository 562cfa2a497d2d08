/*! # arXiv corpus

Turns the arXiv bulk source archives into a plain-text research corpus:

1. [metadata] harvests the submissions of a set, which become the accepted [identifiers],
1. [storage] lists and fetches bulk archives from the requester-pays bucket (or a mirror),
1. [extract] unpacks the accepted submissions and [preprint] selects their main document,
1. [convert] runs the LaTeX to XML conversion tool on each preprint,
1. [corpus] extracts, cleans and tokenizes the prose of the converted articles.

[pipelines] wires those steps together, and the `arxiv-corpus` binary exposes them as subcommands.
All state lives on the filesystem (see [config::Layout]), so every step can be interrupted and resumed.
!*/
pub mod cancel;
pub mod config;
pub mod convert;
pub mod corpus;
pub mod error;
pub mod extract;
pub mod identifiers;
pub mod io;
pub mod metadata;
pub mod pipelines;
pub mod preprint;
pub mod storage;
pub mod xml;
