/*! Archive storage

Bulk source archives live in the requester-pays `arxiv` S3 bucket ([s3]).
Copies are kept in a secondary store ([mirror]) which is looked up first,
so that an archive is paid for only once.
!*/
pub mod mirror;
pub mod s3;
pub mod sigv4;

pub use mirror::{DirMirror, Mirror};
pub use s3::{ObjectEntry, S3Client};
