//! One-shot AI commands on a stored PEI: `pei action`, `pei refine`,
//! `pei generate` and `pei analyze`.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use pei_core::ai::ReasoningMode;
use pei_core::assistant::{ActionError, ActionKind, ActionOutcome, Assistant};

use crate::render;
use crate::resolve::resolve_pei_id;
use crate::session::{Input, Services, persist, review_pending};

fn mode(extended: bool) -> ReasoningMode {
    if extended {
        ReasoningMode::Extended
    } else {
        ReasoningMode::Fast
    }
}

/// Print the blank required fields after a validation failure.
async fn explain(assistant: &Assistant, err: ActionError) -> anyhow::Error {
    if let ActionError::Validation(v) = &err {
        println!("Campos obrigatórios em branco:");
        assistant.with_session(|s| render::print_errors(&s.form)).await;
        if let Some(first) = v.fields.first() {
            println!("Comece por {first}.");
        }
    }
    err.into()
}

async fn open(services: &Services, pei: &str) -> Result<()> {
    let id = resolve_pei_id(services.store(), pei).await?;
    services.assistant.open_pei(id).await?;
    Ok(())
}

pub struct ActionArgs<'a> {
    pub pei: &'a str,
    pub field: &'a str,
    pub action: ActionKind,
    pub extended: bool,
    pub yes: bool,
    pub save_activities: bool,
}

/// Run a field action and deal with its outcome.
pub async fn run_action(services: &Services, args: ActionArgs<'_>) -> Result<()> {
    open(services, args.pei).await?;
    let assistant = &services.assistant;

    println!("Consultando a IA ({})...", render::mode_label(mode(args.extended)));
    let outcome = match assistant
        .run_action(args.field, args.action, mode(args.extended))
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return Err(explain(assistant, e).await),
    };

    match outcome {
        ActionOutcome::Staged(_) => {
            let mut input = Input::stdin();
            if review_pending(assistant, &mut input, args.yes).await? {
                persist(assistant).await?;
            }
        }
        ActionOutcome::Critique(critique) => {
            render::print_critique(args.field, &critique);
            persist(assistant).await?;
        }
        ActionOutcome::Activities(activities) => {
            for (i, activity) in activities.iter().enumerate() {
                render::print_new_activity(i + 1, activity);
            }
            persist(assistant).await?;
            if args.save_activities {
                let stored = assistant.save_activities(&activities).await?;
                println!("{} atividades adicionadas ao banco.", stored.len());
            }
        }
    }
    Ok(())
}

pub async fn run_refine(
    services: &Services,
    pei: &str,
    field: &str,
    instruction: Option<&str>,
    extended: bool,
    yes: bool,
) -> Result<()> {
    open(services, pei).await?;
    let assistant = &services.assistant;
    assistant.refine(field, None, instruction, mode(extended)).await?;

    let mut input = Input::stdin();
    if review_pending(assistant, &mut input, yes).await? {
        persist(assistant).await?;
    }
    Ok(())
}

/// Compose the full PEI document and print it or write it to `output`.
pub async fn run_generate(
    services: &Services,
    pei: &str,
    extended: bool,
    output: Option<&Path>,
) -> Result<()> {
    open(services, pei).await?;
    let assistant = &services.assistant;
    let document = match assistant.generate_full_pei(mode(extended)).await {
        Ok(document) => document,
        Err(e) => return Err(explain(assistant, e).await),
    };

    match output {
        Some(path) => {
            std::fs::write(path, &document)
                .with_context(|| format!("falha ao gravar {}", path.display()))?;
            info!(path = %path.display(), "PEI document written");
            println!("PEI gravado em {}", path.display());
        }
        None => println!("{document}"),
    }
    Ok(())
}

pub async fn run_analyze(services: &Services, pei: &str, extended: bool, json: bool) -> Result<()> {
    open(services, pei).await?;
    let assistant = &services.assistant;
    let analysis = match assistant.analyze_pei(mode(extended)).await {
        Ok(analysis) => analysis,
        Err(e) => return Err(explain(assistant, e).await),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        render::print_analysis(&analysis);
    }
    Ok(())
}
