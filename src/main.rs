use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use dotenvy::dotenv;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod config;
mod llm;
mod prompt;
mod utils;

use config::CONFIG;
use prompt::attributes::resolve;
use prompt::{AttributeLayer, GenerationOutcome, PromptGenerator};
use utils::logging::init_logging;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliCommand {
    Generate,
    Resolve,
}

#[derive(Debug, Default)]
struct CliArgs {
    context: Option<PathBuf>,
    locked: Option<PathBuf>,
    predicted: Option<PathBuf>,
    offline: bool,
}

fn usage() -> &'static str {
    "Usage: product_prompt_generator <generate|resolve> [--context <file.json>] [--locked <file.json>] [--predicted <file.json>] [--offline]"
}

fn parse_args(args: &[String]) -> anyhow::Result<(CliCommand, CliArgs)> {
    let command = match args.get(1).map(|value| value.as_str()) {
        Some("generate") => CliCommand::Generate,
        Some("resolve") => CliCommand::Resolve,
        Some("--help") | Some("-h") | None => return Err(anyhow!(usage())),
        Some(other) => return Err(anyhow!("Unknown command: {other}\n{}", usage())),
    };

    let mut parsed = CliArgs::default();
    let mut index = 2;
    while index < args.len() {
        let flag = args[index].as_str();
        match flag {
            "--context" | "--locked" | "--predicted" => {
                index += 1;
                let value = args
                    .get(index)
                    .ok_or_else(|| anyhow!("Missing value for {flag}"))?;
                let path = Some(PathBuf::from(value));
                match flag {
                    "--context" => parsed.context = path,
                    "--locked" => parsed.locked = path,
                    _ => parsed.predicted = path,
                }
            }
            "--offline" => {
                parsed.offline = true;
            }
            "--help" | "-h" => {
                return Err(anyhow!(usage()));
            }
            other => {
                return Err(anyhow!("Unknown argument: {other}\n{}", usage()));
            }
        }
        index += 1;
    }

    Ok((command, parsed))
}

/// Reads a JSON object of attributes; scalar values are stringified, nulls skipped.
fn parse_layer(raw: &str) -> anyhow::Result<AttributeLayer> {
    let object: BTreeMap<String, Value> =
        serde_json::from_str(raw).context("attribute file must be a JSON object")?;
    let mut layer = AttributeLayer::new();
    for (key, value) in object {
        let text = match value {
            Value::Null => continue,
            Value::String(text) => text,
            Value::Bool(_) | Value::Number(_) => value.to_string(),
            Value::Array(_) | Value::Object(_) => {
                warn!("Skipping non-scalar attribute '{}'", key);
                continue;
            }
        };
        layer.insert(key, text);
    }
    Ok(layer)
}

async fn load_layer(path: Option<&Path>) -> anyhow::Result<Option<AttributeLayer>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let layer = parse_layer(&raw).with_context(|| format!("invalid {}", path.display()))?;
    Ok(Some(layer))
}

fn build_generator(offline: bool) -> PromptGenerator {
    let table = CONFIG.classifier_table();
    if offline {
        info!("Offline mode requested; backend synthesis disabled");
        return PromptGenerator::offline(table);
    }
    let backend = llm::build_backend(&CONFIG);
    if backend.is_none() {
        warn!(
            "No credentials for provider {}; prompts will use fallback synthesis",
            CONFIG.backend_provider.as_str()
        );
    }
    PromptGenerator::new(backend, table, CONFIG.retry_policy())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let _guards = init_logging(&CONFIG.log_level);

    let args: Vec<String> = std::env::args().collect();
    let (command, cli) = parse_args(&args)?;

    let context = load_layer(cli.context.as_deref()).await?;
    let locked = load_layer(cli.locked.as_deref()).await?;
    let predicted = load_layer(cli.predicted.as_deref()).await?;

    let generator = build_generator(cli.offline);

    match command {
        CliCommand::Resolve => {
            let descriptor = resolve(context.as_ref(), locked.as_ref(), predicted.as_ref());
            let table = generator.table();
            let category = table.classify(
                descriptor.product_group.as_deref(),
                &descriptor.product_type,
            );
            let model_profile = table.model_profile(descriptor.customer_segment.as_deref());
            let output = json!({
                "descriptor": descriptor,
                "category": category,
                "model_profile": model_profile,
                "classifier_table_version": table.version,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        CliCommand::Generate => {
            let cancel = CancellationToken::new();
            let ctrl_c_token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Ctrl-C received; cancelling generation");
                    ctrl_c_token.cancel();
                }
            });

            let outcome = generator
                .generate_with_cancellation(
                    context.as_ref(),
                    locked.as_ref(),
                    predicted.as_ref(),
                    &cancel,
                )
                .await;
            match outcome {
                GenerationOutcome::Completed(result) => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
                GenerationOutcome::Cancelled => {
                    return Err(anyhow!("generation cancelled"));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn parses_generate_with_all_layers() {
        let (command, cli) = parse_args(&args(&[
            "bin",
            "generate",
            "--context",
            "c.json",
            "--predicted",
            "p.json",
            "--offline",
        ]))
        .unwrap();
        assert_eq!(command, CliCommand::Generate);
        assert_eq!(cli.context, Some(PathBuf::from("c.json")));
        assert_eq!(cli.locked, None);
        assert_eq!(cli.predicted, Some(PathBuf::from("p.json")));
        assert!(cli.offline);
    }

    #[test]
    fn rejects_unknown_and_incomplete_arguments() {
        assert!(parse_args(&args(&["bin"])).is_err());
        assert!(parse_args(&args(&["bin", "render"])).is_err());
        assert!(parse_args(&args(&["bin", "resolve", "--locked"])).is_err());
        assert!(parse_args(&args(&["bin", "resolve", "--verbose"])).is_err());
    }

    #[test]
    fn layer_parsing_stringifies_scalars() {
        let layer = parse_layer(
            r#"{"color": "Red", "size_count": 4, "organic": true, "notes": null, "tags": ["a"]}"#,
        )
        .unwrap();
        assert_eq!(layer["color"], "Red");
        assert_eq!(layer["size_count"], "4");
        assert_eq!(layer["organic"], "true");
        assert!(!layer.contains_key("notes"));
        assert!(!layer.contains_key("tags"));
        assert!(parse_layer("[1, 2]").is_err());
    }
}
