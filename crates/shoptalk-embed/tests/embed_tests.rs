use shoptalk_core::traits::Embedder;
use shoptalk_embed::{FakeEmbedder, EMBEDDING_DIM};

#[test]
fn fake_embedder_shapes_and_determinism() {
    let embedder = FakeEmbedder::new(EMBEDDING_DIM);
    let texts = vec!["spindle warmup program".to_string(), "spindle warmup program".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 384, "embedding dim is 384");

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input
    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[test]
fn empty_and_short_input_never_fail() {
    let embedder = FakeEmbedder::new(EMBEDDING_DIM);
    let empty = embedder.embed("").expect("empty input embeds");
    assert_eq!(empty.len(), EMBEDDING_DIM);

    let short = embedder.embed("E34").expect("short input embeds");
    assert_eq!(short.len(), EMBEDDING_DIM);
}

#[test]
fn different_texts_produce_different_vectors() {
    let embedder = FakeEmbedder::new(EMBEDDING_DIM);
    let a = embedder.embed("spindle bearing noise").expect("embed");
    let b = embedder.embed("coolant level low").expect("embed");
    assert_ne!(a, b);
}
