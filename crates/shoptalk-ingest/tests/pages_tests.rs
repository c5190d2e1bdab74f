use std::fs;

use shoptalk_ingest::pages::{load_pages, png_dimensions};

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
    bytes
}

#[test]
fn png_header_probe_reads_dimensions() {
    assert_eq!(png_dimensions(&png_bytes(120, 80)), Some((120, 80)));
    assert_eq!(png_dimensions(b"not a png at all"), None);
    assert_eq!(png_dimensions(&[]), None);
}

#[test]
fn pages_assemble_from_text_and_figure_files() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let dir = tmp.path();
    fs::write(dir.join("001.txt"), "SETUP\nbolt the vise to the table before indicating").expect("write");
    fs::write(dir.join("002.txt"), "probe calibration procedure using the ring gauge").expect("write");
    fs::write(dir.join("002-schematic.png"), png_bytes(320, 240)).expect("write");
    fs::write(dir.join("notes.md"), "ignored sidecar file").expect("write");
    fs::write(dir.join("003-broken.png"), b"corrupt bytes").expect("write");

    let pages = load_pages(dir).expect("load");
    assert_eq!(pages.len(), 2, "only numbered pages load; the corrupt figure's page has no text");

    assert_eq!(pages[0].number, 1);
    assert!(pages[0].text.starts_with("SETUP"));
    assert!(pages[0].images.is_empty());

    assert_eq!(pages[1].number, 2);
    assert_eq!(pages[1].images.len(), 1);
    assert_eq!((pages[1].images[0].width, pages[1].images[0].height), (320, 240));
}

#[test]
fn figures_without_a_page_text_still_form_a_page() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let dir = tmp.path();
    fs::write(dir.join("004-diagram.png"), png_bytes(200, 200)).expect("write");

    let pages = load_pages(dir).expect("load");
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].number, 4);
    assert!(pages[0].text.is_empty());
    assert_eq!(pages[0].images.len(), 1);
}
