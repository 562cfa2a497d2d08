/*! arXiv metadata

The metadata table (`arxiv_metadata_astroph.csv` by default) lists the submissions of a set,
and is the source of the accepted identifiers (see [crate::identifiers::IdentifierSet]).

It is harvested from the arXiv OAI-PMH endpoint using `ListRecords` requests,
following `resumptionToken`s until the last page, and is refreshed incrementally
from the day after the latest `date_retrieved` of the table.
!*/
mod harvest;
mod record;

pub use harvest::{append_records, last_retrieved, Harvest, Harvester};
pub use record::{parse_page, MetadataRecord, Page, ResumptionToken};
