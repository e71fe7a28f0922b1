//! Default email body built from the attributes of a batch.
//!
//! The table is a Handlebars template rendered with escaping turned off, so
//! attribute names and values reach the body verbatim.

use crate::error::{DispatchError, DispatchResult};
use crate::models::Batch;
use handlebars::Handlebars;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeSet;
use tracing::debug;

/// Format used for the `entryDate` column.
const ENTRY_DATE_FORMAT: &str = "%a %b %d %H:%M:%S UTC %Y";

const TABLE_TEMPLATE_NAME: &str = "batch_table";

const TABLE_TEMPLATE: &str = concat!(
    r#"<table border="1" cellspacing="0" >"#,
    r#"<thead align="center" valign="middle">"#,
    "<tr>",
    "{{#each columns}}<th>{{this}}</th>{{/each}}",
    "<th>entryDate</th><th>size</th>",
    "</tr>",
    "</thead>",
    "<tbody>",
    "{{#each rows}}<tr>{{#each cells}}<td>{{this}}</td>{{/each}}</tr>{{/each}}",
    "</tbody>",
    "</table>",
);

#[derive(Serialize)]
struct TableData<'a> {
    columns: Vec<&'a str>,
    rows: Vec<TableRow<'a>>,
}

#[derive(Serialize)]
struct TableRow<'a> {
    cells: Vec<Cow<'a, str>>,
}

/// Builds an HTML table with one row per record.
///
/// Columns are the distinct attribute names of the batch in lexicographic
/// order, followed by `entryDate` and `size`. Missing attributes render as
/// empty cells.
pub struct BodySynthesizer {
    handlebars: Handlebars<'static>,
}

impl BodySynthesizer {
    /// Create a synthesizer with the table template registered.
    pub fn new() -> DispatchResult<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars
            .register_template_string(TABLE_TEMPLATE_NAME, TABLE_TEMPLATE)
            .map_err(|e| {
                DispatchError::Template(format!("Failed to register {TABLE_TEMPLATE_NAME}: {e}"))
            })?;
        Ok(Self { handlebars })
    }

    pub fn synthesize(&self, batch: &Batch) -> DispatchResult<String> {
        let columns: BTreeSet<&str> = batch
            .records()
            .iter()
            .flat_map(|record| record.attributes().keys().map(String::as_str))
            .collect();

        let rows = batch
            .records()
            .iter()
            .map(|record| {
                let mut cells: Vec<Cow<'_, str>> = columns
                    .iter()
                    .map(|column| record.attribute(column).unwrap_or("").into())
                    .collect();
                cells.push(record.entry_date().format(ENTRY_DATE_FORMAT).to_string().into());
                cells.push(record.size().to_string().into());
                TableRow { cells }
            })
            .collect();

        debug!(batch_id = %batch.id(), columns = columns.len(), "Rendering batch table");

        let data = TableData {
            columns: columns.into_iter().collect(),
            rows,
        };
        self.handlebars
            .render(TABLE_TEMPLATE_NAME, &data)
            .map_err(|e| DispatchError::Template(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use chrono::{TimeZone, Utc};

    fn synthesize(batch: &Batch) -> String {
        BodySynthesizer::new().unwrap().synthesize(batch).unwrap()
    }

    fn record(size: u64, secs: i64) -> Record {
        Record::new(size).with_entry_date(Utc.timestamp_opt(secs, 0).unwrap())
    }

    #[test]
    fn test_disjoint_attributes_fill_blank_cells() {
        let batch = Batch::new(vec![
            record(10, 0).with_attribute("a", "1"),
            record(20, 86_400).with_attribute("b", "2"),
        ])
        .unwrap();

        let html = synthesize(&batch);

        assert_eq!(
            html,
            "<table border=\"1\" cellspacing=\"0\" >\
             <thead align=\"center\" valign=\"middle\">\
             <tr><th>a</th><th>b</th><th>entryDate</th><th>size</th></tr>\
             </thead>\
             <tbody>\
             <tr><td>1</td><td></td><td>Thu Jan 01 00:00:00 UTC 1970</td><td>10</td></tr>\
             <tr><td></td><td>2</td><td>Fri Jan 02 00:00:00 UTC 1970</td><td>20</td></tr>\
             </tbody>\
             </table>"
        );
    }

    #[test]
    fn test_columns_are_sorted_regardless_of_insertion() {
        let batch = Batch::new(vec![
            record(1, 0)
                .with_attribute("zeta", "z")
                .with_attribute("alpha", "a")
                .with_attribute("mid", "m"),
        ])
        .unwrap();

        let html = synthesize(&batch);
        assert!(html.contains(
            "<tr><th>alpha</th><th>mid</th><th>zeta</th><th>entryDate</th><th>size</th></tr>"
        ));
        assert!(html.contains("<tr><td>a</td><td>m</td><td>z</td>"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let batch = Batch::new(vec![
            record(3, 5).with_attribute("k2", "v2").with_attribute("k1", "v1"),
            record(4, 6).with_attribute("k3", "v3"),
        ])
        .unwrap();

        let synthesizer = BodySynthesizer::new().unwrap();
        let first = synthesizer.synthesize(&batch).unwrap();
        for _ in 0..10 {
            assert_eq!(synthesizer.synthesize(&batch).unwrap(), first);
        }
    }

    #[test]
    fn test_values_are_not_escaped() {
        let batch = Batch::new(vec![record(1, 0).with_attribute("<b>", "<i>x</i>")]).unwrap();
        let html = synthesize(&batch);
        assert!(html.contains("<th><b></th>"));
        assert!(html.contains("<td><i>x</i></td>"));
    }

    #[test]
    fn test_records_without_attributes() {
        let batch = Batch::new(vec![record(7, 0)]).unwrap();
        let html = synthesize(&batch);
        assert!(html.contains("<tr><th>entryDate</th><th>size</th></tr>"));
        assert!(html.contains("<tr><td>Thu Jan 01 00:00:00 UTC 1970</td><td>7</td></tr>"));
    }

    #[test]
    fn test_template_syntax_in_values_is_literal() {
        let batch = Batch::new(vec![record(1, 0).with_attribute("tpl", "{{columns}} & \"q\"")]).unwrap();
        let html = synthesize(&batch);
        assert!(html.contains("<td>{{columns}} & \"q\"</td>"));
    }
}
