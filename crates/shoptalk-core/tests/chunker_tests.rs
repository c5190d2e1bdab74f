use shoptalk_core::chunker::{chunk_page, detect_section_title, ChunkingConfig};

fn numbered_words(n: usize) -> String {
    (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
}

#[test]
fn heading_detection_variants() {
    assert_eq!(
        detect_section_title("TROUBLESHOOTING\nerror code E34 means spindle fault"),
        Some("TROUBLESHOOTING".to_string())
    );
    assert_eq!(
        detect_section_title("3. Coolant system\nCheck the level weekly."),
        Some("3. Coolant system".to_string())
    );
    assert_eq!(
        detect_section_title("3) Coolant system\nCheck the level weekly."),
        Some("3) Coolant system".to_string())
    );
    assert_eq!(
        detect_section_title("Chapter 4 Spindle Maintenance\nbody text"),
        Some("Chapter 4 Spindle Maintenance".to_string())
    );
    assert_eq!(
        detect_section_title("The operator must check the coolant level.\nmore"),
        None,
        "ordinary sentence is not a heading"
    );
    let long_upper = "A".repeat(120);
    assert_eq!(detect_section_title(&long_upper), None, "headings are short");
}

#[test]
fn page_at_max_words_yields_one_chunk() {
    let config = ChunkingConfig::default();
    let text = numbered_words(config.max_words);
    let chunks = chunk_page(&text, 7, &config);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].page_number, 7);
}

#[test]
fn page_over_max_words_splits_with_trailing_overlap() {
    let config = ChunkingConfig::default();
    let text = numbered_words(config.max_words + 1);
    let chunks = chunk_page(&text, 1, &config);
    assert!(chunks.len() >= 2, "one word over the max forces a second chunk");

    let first: Vec<&str> = chunks[0].text.split_whitespace().collect();
    let second: Vec<&str> = chunks[1].text.split_whitespace().collect();
    let tail = &first[first.len() - config.overlap_words..];
    assert_eq!(
        &second[..config.overlap_words],
        tail,
        "the first chunk's trailing words reappear at the start of the second"
    );
}

#[test]
fn cut_prefers_sentence_boundary_in_tail() {
    let config = ChunkingConfig { max_words: 100, overlap_words: 20, min_words: 5 };
    // A period lands ~90% through the first candidate span.
    let mut words: Vec<String> = (0..150).map(|i| format!("w{i}")).collect();
    words[89] = "stop.".to_string();
    let text = words.join(" ");

    let chunks = chunk_page(&text, 1, &config);
    assert!(chunks.len() >= 2);
    assert!(
        chunks[0].text.ends_with("stop."),
        "chunk should end at the sentence boundary, got: ...{}",
        &chunks[0].text[chunks[0].text.len().saturating_sub(20)..]
    );
}

#[test]
fn tiny_spans_are_dropped_as_noise() {
    let config = ChunkingConfig::default();
    assert!(chunk_page("grease fitting", 3, &config).is_empty());
    assert!(chunk_page("", 3, &config).is_empty());
    assert!(chunk_page("   \n  ", 3, &config).is_empty());
}

#[test]
fn chunking_is_deterministic() {
    let config = ChunkingConfig::default();
    let text = numbered_words(2000);
    let a = chunk_page(&text, 12, &config);
    let b = chunk_page(&text, 12, &config);
    assert_eq!(a, b, "same input produces identical chunk boundaries");
}

#[test]
fn section_title_annotates_but_never_discards_text() {
    let config = ChunkingConfig::default();
    let text = "MAINTENANCE SCHEDULE\nGrease the ways every forty hours of operation.";
    let chunks = chunk_page(text, 22, &config);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].section_title.as_deref(), Some("MAINTENANCE SCHEDULE"));
    assert!(chunks[0].text.contains("Grease the ways"));
}
