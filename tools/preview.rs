/// Preview — run a sample batch through the pipeline and print the
/// repaired lines plus the full diagnostic report.
///
/// Usage: preview [--category <topic>] [--tone <tone>] [--rating <G|PG-13|R|Explicit>]
///                [--tags <raw>] [--entity] [--seed <n>] [--line <text>]...
///
/// With no --line arguments a canned batch of deliberately broken
/// candidates is used, which is handy for eyeballing the repairs.

use caption_engine::core::pipeline::CaptionEngine;
use caption_engine::core::tags::classify;
use caption_engine::schema::request::{BatchRequest, Rating};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && (args[1] == "--help" || args[1] == "-h") {
        print_usage();
        return;
    }

    let mut category = "gym".to_string();
    let mut tone = "sarcastic".to_string();
    let mut rating = Rating::Pg13;
    let mut raw_tags = String::new();
    let mut want_entity = false;
    let mut seed: u64 = 42;
    let mut lines: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--category" if i + 1 < args.len() => {
                i += 1;
                category = args[i].clone();
            }
            "--tone" if i + 1 < args.len() => {
                i += 1;
                tone = args[i].clone();
            }
            "--rating" if i + 1 < args.len() => {
                i += 1;
                rating = match Rating::parse_label(&args[i]) {
                    Some(r) => r,
                    None => {
                        eprintln!("Unknown rating: {}", args[i]);
                        std::process::exit(1);
                    }
                };
            }
            "--tags" if i + 1 < args.len() => {
                i += 1;
                raw_tags = args[i].clone();
            }
            "--entity" => {
                want_entity = true;
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            "--line" if i + 1 < args.len() => {
                i += 1;
                lines.push(args[i].clone());
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    if lines.is_empty() {
        lines = vec![
            "my workout went, like, really badly and the".to_string(),
            "Leg day! It ruined everything! Twice!".to_string(),
            "here is a caption about the treadmill".to_string(),
            "protein shake tastes like regret".to_string(),
        ];
    }

    let mut engine = match CaptionEngine::builder().seed(seed).build() {
        Ok(e) => e,
        Err(e) => {
            eprintln!("ERROR: engine build failed: {}", e);
            std::process::exit(1);
        }
    };

    let request = BatchRequest {
        raw_lines: lines,
        category,
        subcategory: String::new(),
        tone,
        rating,
        tags: classify(&raw_tags),
        require_pop_culture_entity: want_entity,
    };

    let result = match engine.process_batch(&request) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    println!("=== Lines ===\n");
    for (i, line) in result.outcome.lines().iter().enumerate() {
        println!("  {}. [{:>3} chars] {}", i + 1, line.chars().count(), line);
    }

    println!("\n=== Report ===\n");
    for sub in &result.report.sub_scores {
        println!("  {:<14} {:>3}", sub.0, sub.1);
    }
    println!("  {:<14} {:>3}", "overall", result.report.overall_score);

    for lr in &result.report.per_line {
        if !lr.pass {
            println!("\n  line {}:", lr.index + 1);
            for reason in &lr.reasons {
                println!("    - {}", reason);
            }
        }
    }
    for reason in &result.report.batch_reasons {
        println!("\n  batch: {}", reason);
    }

    println!(
        "\n  verdict: {}",
        if result.report.retry_recommended {
            "RETRY RECOMMENDED"
        } else {
            "ACCEPTED"
        }
    );
}

fn print_usage() {
    println!("Usage: preview [--category <topic>] [--tone <tone>] [--rating <G|PG-13|R|Explicit>]");
    println!("               [--tags <raw>] [--entity] [--seed <n>] [--line <text>]...");
}
