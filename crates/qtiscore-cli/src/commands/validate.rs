//! The `qtiscore validate` command.

use std::path::PathBuf;

use anyhow::Result;

use qtiscore_core::parser::{self, ValidationWarning};
use qtiscore_core::OperatorRegistry;

pub fn execute(items_path: PathBuf, test_path: Option<PathBuf>) -> Result<()> {
    let registry = OperatorRegistry::standard();
    let items = parser::load_items(&items_path)?;
    let mut warnings: Vec<ValidationWarning> = Vec::new();

    println!("Items: {} ({} definitions)", items_path.display(), items.len());
    for item in &items {
        warnings.extend(parser::validate_item(item, &registry));
    }

    if let Some(test_path) = &test_path {
        let test = parser::load_test(test_path)?;
        println!("Test: {} ({} item references)", test.identifier, test.item_refs.len());
        for item_ref in &test.item_refs {
            if !items.iter().any(|i| i.identifier == item_ref.identifier) {
                warnings.push(ValidationWarning {
                    subject: test.identifier.clone(),
                    message: format!("item reference has no definition: {}", item_ref.identifier),
                });
            }
        }
        warnings.extend(parser::validate_test(&test, &registry));
    }

    for w in &warnings {
        println!("  [{}] WARNING: {}", w.subject, w.message);
    }

    if warnings.is_empty() {
        println!("All definitions valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
