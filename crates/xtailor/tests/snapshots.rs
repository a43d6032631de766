use std::fs;
use std::path::PathBuf;

use insta::assert_snapshot;
use time::macros::datetime;
use xtailor::app::export::{ExportOptions, Exporter};
use xtailor::app::parse::parse_document;
use xtailor::cli::listing;
use xtailor::domain::model::{ItemIdGenerator, TailoringDocument};

fn merge_fixture() -> TailoringDocument {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/merge-order.xml");
    let text = fs::read_to_string(path).unwrap();
    parse_document(&text, &mut ItemIdGenerator::new()).unwrap()
}

#[test]
fn merge_fixture_listing() {
    assert_snapshot!("merge_order_listing", listing(&merge_fixture().items));
}

#[test]
fn merge_fixture_export() {
    let rendered = Exporter::new()
        .unwrap()
        .render_at(
            &merge_fixture(),
            &ExportOptions::default(),
            datetime!(2024-05-01 12:30:00 UTC),
        )
        .unwrap();
    assert_snapshot!("merge_order_export", rendered);
}
