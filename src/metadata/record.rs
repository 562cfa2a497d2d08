//! OAI-PMH `ListRecords` pages in the `arXiv` metadata format.
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::identifiers::normalize;
use crate::xml::{self, Element};

/// A row of the metadata table.
///
/// Field order is the column order of the CSV file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub identifier: Option<String>,
    pub filename: Option<String>,
    pub filename_parsed: Option<String>,
    pub spec: Option<String>,
    pub title: Option<String>,
    pub datestamp: Option<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
    pub authors: Option<String>,
    pub categories: Option<String>,
    pub journal: Option<String>,
    pub doi: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub comments: Option<String>,
    pub date_retrieved: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumptionToken {
    pub token: String,
    pub cursor: Option<usize>,
    pub complete_list_size: Option<usize>,
}

/// A parsed `ListRecords` answer.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<MetadataRecord>,
    /// Absent (or empty) on the last page.
    pub resumption: Option<ResumptionToken>,
    pub response_date: Option<String>,
}

fn text_of(e: &Element, name: &str) -> Option<String> {
    e.find_by_name(name).map(|e| e.text().trim().to_string())
}

fn record(e: &Element) -> MetadataRecord {
    let header = e.child("header");
    let metadata = e.child("metadata");
    let header_text = |name: &str| header.and_then(|h| text_of(h, name));
    let metadata_text = |name: &str| metadata.and_then(|m| text_of(m, name));

    let authors = metadata.map(|m| {
        m.find_all(|e| e.is("author"))
            .into_iter()
            .filter_map(|author| {
                let forenames = text_of(author, "forenames")?;
                let keyname = text_of(author, "keyname")?;
                Some(format!("{} {}", forenames, keyname))
            })
            .join(", ")
    });

    let filename = metadata_text("id");
    MetadataRecord {
        identifier: header_text("identifier"),
        filename_parsed: filename.as_deref().map(normalize),
        filename,
        spec: header_text("setSpec"),
        title: metadata_text("title"),
        datestamp: header_text("datestamp"),
        created: metadata_text("created"),
        updated: metadata_text("updated"),
        authors,
        categories: metadata_text("categories"),
        journal: metadata_text("journal-ref"),
        doi: metadata_text("doi"),
        abstract_text: metadata_text("abstract"),
        comments: metadata_text("comments"),
        date_retrieved: None,
    }
}

/// Parse a `ListRecords` page. An OAI `noRecordsMatch` error is an empty last page.
pub fn parse_page(content: &str) -> Result<Page, Error> {
    let root = xml::parse(content)?;

    if let Some(error) = root.child("error") {
        let code = error.attr("code").unwrap_or_default();
        if code != "noRecordsMatch" {
            return Err(Error::Custom(format!(
                "OAI error {}: {}",
                code,
                error.text().trim()
            )));
        }
    }

    let response_date = root.child("responseDate").map(|e| e.text().trim().to_string());

    let (records, resumption) = match root.child("ListRecords") {
        Some(list) => {
            let records = list.elements().filter(|e| e.is("record")).map(record).collect();
            let resumption = list.child("resumptionToken").and_then(|t| {
                let token = t.text().trim().to_string();
                if token.is_empty() {
                    return None;
                }
                Some(ResumptionToken {
                    token,
                    cursor: t.attr("cursor").and_then(|c| c.parse().ok()),
                    complete_list_size: t.attr("completeListSize").and_then(|c| c.parse().ok()),
                })
            });
            (records, resumption)
        }
        None => (Vec::new(), None),
    };

    Ok(Page {
        records,
        resumption,
        response_date,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const PAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
<responseDate>2019-05-06T10:00:00Z</responseDate>
<request verb="ListRecords">http://export.arxiv.org/oai2</request>
<ListRecords>
<record>
<header>
 <identifier>oai:arXiv.org:astro-ph/0001001</identifier>
 <datestamp>2008-11-13</datestamp>
 <setSpec>physics:astro-ph</setSpec>
</header>
<metadata>
 <arXiv xmlns="http://arxiv.org/OAI/arXiv/">
 <id>astro-ph/0001001</id><created>2000-01-01</created>
 <authors><author><keyname>Doe</keyname><forenames>Jane</forenames></author><author><keyname>Roe</keyname><forenames>R.</forenames></author><author><keyname>Collaboration</keyname></author></authors>
 <title>Stars &amp; gas</title>
 <categories>astro-ph astro-ph.GA</categories>
 <journal-ref>ApJ 1 (2000)</journal-ref>
 <abstract>  We study stars.
 </abstract>
 </arXiv>
</metadata>
</record>
<record>
<header><identifier>oai:arXiv.org:1009.1724</identifier><datestamp>2010-09-10</datestamp><setSpec>physics:astro-ph</setSpec></header>
<metadata><arXiv><id>1009.1724</id><doi>10.1000/x</doi></arXiv></metadata>
</record>
<resumptionToken cursor="0" completeListSize="3">4196431|1001</resumptionToken>
</ListRecords>
</OAI-PMH>"#;

    #[test]
    fn parse_records() {
        let page = parse_page(PAGE).unwrap();
        assert_eq!(page.response_date.as_deref(), Some("2019-05-06T10:00:00Z"));
        assert_eq!(page.records.len(), 2);

        let first = &page.records[0];
        assert_eq!(first.identifier.as_deref(), Some("oai:arXiv.org:astro-ph/0001001"));
        assert_eq!(first.filename.as_deref(), Some("astro-ph/0001001"));
        assert_eq!(first.filename_parsed.as_deref(), Some("astro-ph0001001"));
        assert_eq!(first.spec.as_deref(), Some("physics:astro-ph"));
        assert_eq!(first.title.as_deref(), Some("Stars & gas"));
        assert_eq!(first.authors.as_deref(), Some("Jane Doe, R. Roe"));
        assert_eq!(first.categories.as_deref(), Some("astro-ph astro-ph.GA"));
        assert_eq!(first.journal.as_deref(), Some("ApJ 1 (2000)"));
        assert_eq!(first.abstract_text.as_deref(), Some("We study stars."));
        assert_eq!(first.doi, None);
        assert_eq!(first.updated, None);

        let second = &page.records[1];
        assert_eq!(second.filename_parsed.as_deref(), Some("1009.1724"));
        assert_eq!(second.doi.as_deref(), Some("10.1000/x"));

        let token = page.resumption.unwrap();
        assert_eq!(token.token, "4196431|1001");
        assert_eq!(token.cursor, Some(0));
        assert_eq!(token.complete_list_size, Some(3));
    }

    #[test]
    fn last_page() {
        let page = parse_page(
            r#"<OAI-PMH><responseDate>2019-05-06T10:00:00Z</responseDate><ListRecords><resumptionToken cursor="1001" completeListSize="1002"/></ListRecords></OAI-PMH>"#,
        )
        .unwrap();
        assert!(page.records.is_empty());
        assert!(page.resumption.is_none());
    }

    #[test]
    fn oai_errors() {
        let page = parse_page(
            r#"<OAI-PMH><responseDate>2019-05-06T10:00:00Z</responseDate><error code="noRecordsMatch">none</error></OAI-PMH>"#,
        )
        .unwrap();
        assert!(page.records.is_empty());
        assert!(page.resumption.is_none());

        assert!(parse_page(
            r#"<OAI-PMH><error code="badResumptionToken">expired</error></OAI-PMH>"#
        )
        .is_err());
    }
}
