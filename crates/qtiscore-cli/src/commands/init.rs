//! The `qtiscore init` command.

use std::path::Path;

use anyhow::{Context, Result};

const SAMPLE_FILES: [(&str, &str); 7] = [
    ("qtiscore.toml", include_str!("../../../../fixtures/qtiscore.toml")),
    ("items/choice.json", include_str!("../../../../fixtures/items/choice.json")),
    ("items/text-entry.json", include_str!("../../../../fixtures/items/text-entry.json")),
    ("test.json", include_str!("../../../../fixtures/test.json")),
    ("results/alice.json", include_str!("../../../../fixtures/results/alice.json")),
    ("results/bob.json", include_str!("../../../../fixtures/results/bob.json")),
    ("results/carol.json", include_str!("../../../../fixtures/results/carol.json")),
];

pub fn execute() -> Result<()> {
    for (name, content) in SAMPLE_FILES {
        let path = Path::new(name);
        if path.exists() {
            println!("{name} already exists, skipping.");
            continue;
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, content).with_context(|| format!("failed to write {name}"))?;
        println!("Created {name}");
    }

    println!("\nNext steps:");
    println!("  1. Run: qtiscore validate --items items --test test.json");
    println!("  2. Run: qtiscore score --items items --test test.json --results results --format all");

    Ok(())
}
