/*! Submission identifiers

Holds the [IdentifierSet] of accepted submissions, loaded once per run from the metadata table.
!*/
mod identifier;

pub use identifier::normalize;
pub use identifier::submission_id;
pub use identifier::IdentifierSet;
