use std::error::Error;

use doppel::{Document, DoppelConfig, ResolveOptions};
use tracing_subscriber::EnvFilter;

const DEMO_CONFIG: &str = r#"
version: "1.0"
name: "doppel demo"

backend:
  kind: memory

profiles:
  Person:
    rules:
      - name: firstName
        type: text
      - name: lastName
        type: text
        boost: 2.0
      - name: ssn
        type: keyword
        boost: 3.0
"#;

fn person(id: &str, first: &str, last: &str, ssn: &str) -> Document {
    Document::new()
        .with("id", id)
        .with("entityType", "Person")
        .with("firstName", first)
        .with("lastName", last)
        .with("ssn", ssn)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => DoppelConfig::from_file(path)?,
        None => DoppelConfig::from_yaml(DEMO_CONFIG)?,
    };
    let stack = config.build()?;

    stack.backend.bulk_index(
        "entities",
        &[
            person("p-1", "John", "Smith", "111-22-3333"),
            person("p-2", "Jon", "Smith", "999-88-7777"),
            person("p-3", "Mary", "Jones", "444-55-6666"),
        ],
    )?;

    let probe = person("incoming", "Jon", "Smyth", "999-88-7777");
    let resolution = stack.resolver.resolve(&probe, &ResolveOptions::new())?;

    println!("similar entities for `{}`:", resolution.id);
    for hit in &resolution.hits {
        println!("  {:>6.3}  {}", hit.score, hit.id);
    }

    Ok(())
}
