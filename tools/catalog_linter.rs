/// Catalog Linter — validates the engine's data tables against the
/// configuration invariants the pipeline assumes at build time.
///
/// Usage: catalog_linter [--voices <path>] [--lexicons <path>] [--entities <path>]
///
/// With no arguments the built-in catalogs are linted.

use caption_engine::core::entity::EntityPool;
use caption_engine::core::lexicon::{LexiconSet, FALLBACK_TOPIC};
use caption_engine::core::voice::VoiceCatalog;
use caption_engine::schema::request::Rating;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && (args[1] == "--help" || args[1] == "-h") {
        println!("Usage: catalog_linter [--voices <path>] [--lexicons <path>] [--entities <path>]");
        process::exit(0);
    }

    let mut voices_path = None;
    let mut lexicons_path = None;
    let mut entities_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--voices" if i + 1 < args.len() => {
                i += 1;
                voices_path = Some(args[i].clone());
            }
            "--lexicons" if i + 1 < args.len() => {
                i += 1;
                lexicons_path = Some(args[i].clone());
            }
            "--entities" if i + 1 < args.len() => {
                i += 1;
                entities_path = Some(args[i].clone());
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    let mut voices = match VoiceCatalog::builtin() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: built-in voice catalog failed to load: {}", e);
            process::exit(1);
        }
    };
    if let Some(ref path) = voices_path {
        if let Err(e) = voices.load_from_ron(Path::new(path)) {
            eprintln!("ERROR: failed to load voices from {}: {}", path, e);
            process::exit(1);
        }
    }

    let mut lexicons = match LexiconSet::builtin() {
        Ok(l) => l,
        Err(e) => {
            eprintln!("ERROR: built-in lexicon catalog failed to load: {}", e);
            process::exit(1);
        }
    };
    if let Some(ref path) = lexicons_path {
        if let Err(e) = lexicons.load_from_ron(Path::new(path)) {
            eprintln!("ERROR: failed to load lexicons from {}: {}", path, e);
            process::exit(1);
        }
    }

    let mut entities = match EntityPool::builtin() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("ERROR: built-in entity pool failed to load: {}", e);
            process::exit(1);
        }
    };
    if let Some(ref path) = entities_path {
        if let Err(e) = entities.load_from_ron(Path::new(path)) {
            eprintln!("ERROR: failed to load entities from {}: {}", path, e);
            process::exit(1);
        }
    }

    println!(
        "Loaded {} voices, {} lexicon topics, {} entities",
        voices.len(),
        lexicons.len(),
        entities.len()
    );

    let (errors, warnings) = lint(&voices, &lexicons, &entities);

    println!("\n=== Catalog Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn lint(
    voices: &VoiceCatalog,
    lexicons: &LexiconSet,
    entities: &EntityPool,
) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Every rating tier must have enough voices for a distinct batch.
    for rating in Rating::all() {
        let eligible = voices.eligible(rating);
        if eligible.is_empty() {
            errors.push(format!(
                "rating {} has no eligible voices (pipeline build would fail)",
                rating.label()
            ));
        } else if eligible.len() < 4 {
            warnings.push(format!(
                "rating {} has only {} voices (a 4-line batch will repeat)",
                rating.label(),
                eligible.len()
            ));
        }
    }

    // The fallback topic backs every unresolvable request.
    if lexicons.get(FALLBACK_TOPIC).is_none() {
        errors.push(format!(
            "lexicon catalog is missing the '{}' fallback topic",
            FALLBACK_TOPIC
        ));
    }

    // Every topic needs an injection candidate.
    for topic in lexicons.topics() {
        let entry = lexicons.get(topic).unwrap();
        if entry.first_general().is_none() {
            errors.push(format!(
                "topic '{}' has an empty general bucket (nothing to inject)",
                topic
            ));
        }
        if entry.cultural.is_empty() {
            warnings.push(format!(
                "topic '{}' has no cultural words (entity weaving always targets it)",
                topic
            ));
        }
    }

    // A dry entity pool turns requests for pop culture into retries.
    if entities.is_empty() {
        warnings.push("entity pool is empty (entity requests will always fail)".to_string());
    } else if entities.len() < 4 {
        warnings.push(format!(
            "entity pool has only {} entries (cooldown window 3 can drain it)",
            entities.len()
        ));
    }

    (errors, warnings)
}
