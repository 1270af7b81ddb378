use partsheet_core::error::PartsheetError;
use partsheet_core::model::CANONICAL_SCHEMA;
use partsheet_core::parsing::header::{HeaderAliasFile, HeaderTable};
use std::path::Path;

pub fn list(header_file: Option<&Path>) -> Result<(), PartsheetError> {
    let mut table = HeaderTable::builtin()?;
    if let Some(path) = header_file {
        table.extend(HeaderTable::load(path)?);
    }

    for column in CANONICAL_SCHEMA {
        println!("{}", column.name());
        for (spelling, _) in table.entries().iter().filter(|(_, c)| *c == column) {
            println!("  {spelling}");
        }
    }
    println!("\n{} alias(es)", table.len());
    Ok(())
}

pub fn validate(file: &Path) -> Result<(), PartsheetError> {
    let table = HeaderTable::load(file)?;
    let content = std::fs::read_to_string(file)?;
    let alias_file: HeaderAliasFile = serde_json::from_str(&content)?;

    println!(
        "Header table '{}' (v{}) is valid.",
        alias_file.name.as_deref().unwrap_or("unnamed"),
        alias_file.version.as_deref().unwrap_or("-")
    );
    println!("  Aliases: {}", table.len());

    // Not errors: spellings the built-in table already maps differently.
    let builtin = HeaderTable::builtin()?;
    let mut warnings = Vec::new();
    for (spelling, column) in table.entries() {
        if let Some(existing) = builtin.lookup(spelling) {
            if existing != column {
                warnings.push(format!(
                    "'{}' overrides built-in mapping {} -> {}",
                    spelling,
                    existing.name(),
                    column.name()
                ));
            }
        }
    }
    let mapped: Vec<_> = table.entries().iter().map(|(_, c)| *c).collect();
    for column in CANONICAL_SCHEMA {
        if !mapped.contains(&column) {
            warnings.push(format!("no alias maps to '{}'", column.name()));
        }
    }

    if !warnings.is_empty() {
        println!("\nWarnings:");
        for w in &warnings {
            println!("  - {w}");
        }
    }
    Ok(())
}
