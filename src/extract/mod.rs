/*! Archive extraction

arXiv bulk source archives are tarballs of per-submission bundles:

```text
arXiv_src_1009_002.tar
├── 1009/1009.1724.gz   gzipped tarball of the submission sources
├── 1009/1009.1725.gz   bare gzipped .tex (single-file submission)
└── 1009/1009.1726.pdf  PDF-only submission, no sources
```

[Extractor] keeps the accepted bundles, [Member] resolves the shape of each of them.
!*/
mod archive;
mod member;

pub use archive::{archive_id, ExtractionSummary, Extractor};
pub use member::{is_tar_header, Member};
