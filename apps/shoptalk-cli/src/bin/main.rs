use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use shoptalk_core::chunker::ChunkingConfig;
use shoptalk_core::config::{expand_path, Config};
use shoptalk_core::traits::{CorpusStore, VisionDescriber};
use shoptalk_core::types::{Document, Machine, Manual, Retrieval};
use shoptalk_embed::default_embedder;
use shoptalk_hybrid::{HybridRetriever, RetrievalParams};
use shoptalk_ingest::pages::load_pages;
use shoptalk_ingest::{HttpVisionDescriber, ManualIngestor};
use shoptalk_lexical::IndexManager;
use shoptalk_store::LanceStore;

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        eprintln!("Usage: {} <ingest|note|ask|machines|seed> [args...]", prog);
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

/// Pull every `--name value` pair out of `args`.
fn take_flag_values(args: &mut Vec<String>, name: &str) -> Vec<String> {
    let mut values = Vec::new();
    while let Some(pos) = args.iter().position(|a| a == name) {
        args.remove(pos);
        if pos < args.len() {
            values.push(args.remove(pos));
        }
    }
    values
}

fn take_flag(args: &mut Vec<String>, name: &str) -> Option<String> {
    take_flag_values(args, name).pop()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let (cmd, mut args) = parse_args();

    let db_dir: String = config.get_or("data.lancedb_dir", "./data/lancedb".to_string());
    let store = Arc::new(LanceStore::open(&expand_path(&db_dir)).await?);
    let embedder = default_embedder()?;
    let index = Arc::new(IndexManager::new(store.clone()));

    let params = RetrievalParams {
        alpha: config.get_or("retrieval.alpha", 0.6),
        min_confidence: config.get_or("retrieval.min_confidence", 0.28),
        over_fetch: config.get_or("retrieval.over_fetch", 2),
    };

    match cmd.as_str() {
        "ingest" => {
            let manual_id = take_flag(&mut args, "--id").unwrap_or_else(|| {
                eprintln!("ingest requires --id <manual-id>");
                std::process::exit(1)
            });
            let title = take_flag(&mut args, "--title").unwrap_or_else(|| manual_id.clone());
            let manual = Manual {
                id: manual_id,
                title,
                manual_type: take_flag(&mut args, "--type"),
                source_url: take_flag(&mut args, "--source-url"),
                machines: take_flag_values(&mut args, "--machine"),
            };
            let dir = args.first().map(PathBuf::from).unwrap_or_else(|| {
                eprintln!("Usage: shoptalk ingest <pages-dir> --id <manual-id> --title <title> [--type <type>] [--machine <id>]...");
                std::process::exit(1)
            });

            let chunking = ChunkingConfig {
                max_words: config.get_or("chunking.max_words", 800),
                overlap_words: config.get_or("chunking.overlap_words", 200),
                min_words: config.get_or("chunking.min_words", 5),
            };
            let vision: Option<Arc<dyn VisionDescriber>> =
                match config.get::<String>("vision.endpoint") {
                    Ok(endpoint) => Some(Arc::new(HttpVisionDescriber::new(endpoint))),
                    Err(_) => None,
                };

            let pages = load_pages(&dir)?;
            info!(manual = %manual.id, pages = pages.len(), "starting ingest");
            let ingestor =
                ManualIngestor::new(store, embedder, index, vision, chunking);
            let report = ingestor.ingest(&manual, &pages).await?;
            println!(
                "Ingested {} pages into {} chunks ({} text, {} figures, {} figures skipped)",
                report.pages,
                report.total_chunks(),
                report.text_chunks,
                report.figure_chunks,
                report.figures_skipped
            );
        }
        "note" => {
            let machine = take_flag(&mut args, "--machine");
            let text = args.first().cloned().unwrap_or_else(|| {
                eprintln!("Usage: shoptalk note \"<text>\" [--machine <id>]");
                std::process::exit(1)
            });
            if text.trim().is_empty() {
                anyhow::bail!("note text cannot be empty");
            }
            let retriever = HybridRetriever::new(store, embedder, index, params);
            let note = retriever.save_note(&text, machine.as_deref()).await?;
            println!("Note saved: {}", note.id);
        }
        "ask" => {
            let machine = take_flag(&mut args, "--machine");
            let top_k: usize = take_flag(&mut args, "--top-k")
                .and_then(|v| v.parse().ok())
                .unwrap_or(4);
            let query = args.first().cloned().unwrap_or_else(|| {
                eprintln!("Usage: shoptalk ask \"<query>\" [--machine <id>] [--top-k <n>]");
                std::process::exit(1)
            });

            let retriever = HybridRetriever::new(store, embedder, index, params);
            match retriever.retrieve(&query, top_k, machine.as_deref()).await? {
                Retrieval::Answer { hits, debug } => {
                    for (i, hit) in hits.iter().enumerate() {
                        match &hit.document {
                            Document::Note(n) => println!(
                                "{}. [note {}] fused {:.3} (sem {:.3}, lex {:.3})\n   {}",
                                i + 1,
                                n.created_at.format("%Y-%m-%d"),
                                hit.fused_score,
                                hit.semantic_score,
                                hit.lexical_score,
                                n.text
                            ),
                            Document::Chunk(c) => {
                                let section = c
                                    .section_title
                                    .as_deref()
                                    .map(|s| format!(", {s}"))
                                    .unwrap_or_default();
                                println!(
                                    "{}. [{} p.{}{}] fused {:.3} (sem {:.3}, lex {:.3})\n   {}",
                                    i + 1,
                                    c.manual_title,
                                    c.page_number,
                                    section,
                                    hit.fused_score,
                                    hit.semantic_score,
                                    hit.lexical_score,
                                    c.text
                                );
                            }
                        }
                    }
                    println!("debug: {}", serde_json::to_string(&debug)?);
                }
                Retrieval::NoAnswer { reason } => {
                    println!("No reliable answer: {}", serde_json::to_string(&reason)?);
                }
            }
        }
        "machines" => match args.first().map(String::as_str) {
            Some("add") => {
                if args.len() < 3 {
                    eprintln!("Usage: shoptalk machines add <id> <name> [description]");
                    std::process::exit(1);
                }
                let machine = Machine {
                    id: args[1].clone(),
                    name: args[2].clone(),
                    description: args.get(3).cloned(),
                };
                store.register_machine(&machine).await?;
                println!("Machine registered: {} ({})", machine.name, machine.id);
            }
            _ => {
                let machines = store.list_machines().await?;
                if machines.is_empty() {
                    println!("No machines registered.");
                }
                for m in machines {
                    println!("{:<12} {} {}", m.id, m.name, m.description.unwrap_or_default());
                }
            }
        },
        "seed" => {
            for (id, name, description) in SEED_MACHINES {
                store
                    .register_machine(&Machine {
                        id: (*id).to_string(),
                        name: (*name).to_string(),
                        description: Some((*description).to_string()),
                    })
                    .await?;
            }
            let retriever = HybridRetriever::new(store, embedder, index, params);
            let mut count = 0usize;
            for (machine, text) in SEED_NOTES {
                retriever.save_note(text, Some(*machine)).await?;
                count += 1;
            }
            println!("Seeded {} machines and {} notes.", SEED_MACHINES.len(), count);
        }
        _ => {
            eprintln!("Unknown command: {}", cmd);
            std::process::exit(1);
        }
    }
    Ok(())
}

const SEED_MACHINES: &[(&str, &str, &str)] = &[
    ("haas-vf2", "Haas VF-2", "Vertical CNC mill, general purpose"),
    ("haas-st20", "Haas ST-20Y", "CNC turning center with live tooling"),
    ("ur10e", "UR10e", "Collaborative robot for machine tending"),
    ("ir-r11i", "Ingersoll Rand R11i", "Rotary screw compressor, shop air"),
];

const SEED_NOTES: &[(&str, &str)] = &[
    (
        "haas-vf2",
        "Spindle warmup on the VF-2 takes longer in winter. Ran the 20 minute warmup \
         program at 6000 RPM before the first job and the vibration settled down.",
    ),
    (
        "haas-vf2",
        "Chatter on 6061 parts with the half inch 3 flute. Switched to a 2 flute at \
         8000 RPM and 60 IPM, chatter gone and the finish is much better.",
    ),
    (
        "haas-vf2",
        "Coolant concentration was down to 4 percent. Mixed a new batch to 7 percent \
         and cleaned the stringy steel chips out of the conveyor.",
    ),
    (
        "haas-st20",
        "Bar feeder jamming on 2 inch cold rolled stock. Adjusted the pusher finger \
         tension and chamfered the bar ends before loading, running smooth now.",
    ),
    (
        "haas-st20",
        "Jaw marks on the thin wall bushings. Switched to pie jaws bored to the part \
         OD and dropped chuck pressure from 200 to 150 PSI.",
    ),
    (
        "ur10e",
        "Gripper losing oily parts coming off the lathe. Added rubber pads to the \
         fingers and raised grip force from 60 to 80 percent, holding fine now.",
    ),
    (
        "ur10e",
        "Waypoints drifted after the pallet change. Re-taught pick and place with the \
         pendant and recalibrated the TCP with the four point method.",
    ),
    (
        "ir-r11i",
        "Compressor oil was low on the Monday check, added half a quart of synthetic. \
         It is consuming more than usual, might be a small leak at the separator.",
    ),
    (
        "ir-r11i",
        "High temperature alarm during the afternoon heat. Opened the ventilation \
         louvers and blew out the cooler fins, temperature back in range.",
    ),
];
