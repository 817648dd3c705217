//! `pei activities ...` and `pei files ...` handlers.

use std::path::Path;

use anyhow::{Result, bail};

use pei_core::attachments;
use pei_db::models::Activity;

use crate::render;
use crate::resolve::resolve_activity_id;
use crate::session::Services;
use crate::{ActivityCommands, FileCommands};

// -----------------------------------------------------------------------
// Activity bank
// -----------------------------------------------------------------------

pub async fn run_activity_command(command: ActivityCommands, services: &Services) -> Result<()> {
    match command {
        ActivityCommands::List {
            favorites,
            dua,
            search,
        } => cmd_list_activities(services, favorites, dua, search.as_deref()).await,
        ActivityCommands::Show { id } => cmd_show_activity(services, &id).await,
        ActivityCommands::Favorite { id } => cmd_toggle_favorite(services, &id).await,
        ActivityCommands::Delete { id } => cmd_delete_activity(services, &id).await,
    }
}

/// Whether an activity passes the list filters.
pub fn activity_matches(activity: &Activity, favorites: bool, dua: bool, search: Option<&str>) -> bool {
    if favorites && !activity.is_favorited {
        return false;
    }
    if dua && !activity.is_dua {
        return false;
    }
    match search.map(str::to_lowercase) {
        Some(term) => [&activity.title, &activity.description, &activity.discipline]
            .iter()
            .map(|s| s.to_lowercase())
            .chain(activity.goal_tags.iter().map(|t| t.to_lowercase()))
            .any(|s| s.contains(&term)),
        None => true,
    }
}

async fn cmd_list_activities(
    services: &Services,
    favorites: bool,
    dua: bool,
    search: Option<&str>,
) -> Result<()> {
    let activities: Vec<Activity> = services
        .store()
        .list_activities()
        .await?
        .into_iter()
        .filter(|a| activity_matches(a, favorites, dua, search))
        .collect();

    if activities.is_empty() {
        println!("Nenhuma atividade encontrada.");
        return Ok(());
    }
    for activity in &activities {
        render::print_activity_row(activity);
    }
    println!();
    println!("{} atividades.", activities.len());
    Ok(())
}

async fn cmd_show_activity(services: &Services, input: &str) -> Result<()> {
    let id = resolve_activity_id(services.store(), input).await?;
    match services.store().get_activity(id).await? {
        Some(activity) => render::print_activity(&activity),
        None => bail!("atividade {id} não encontrada"),
    }
    Ok(())
}

async fn cmd_toggle_favorite(services: &Services, input: &str) -> Result<()> {
    let id = resolve_activity_id(services.store(), input).await?;
    match services.store().toggle_favorite(id).await? {
        Some(activity) if activity.is_favorited => println!("Atividade {id} marcada como favorita."),
        Some(_) => println!("Atividade {id} removida das favoritas."),
        None => bail!("atividade {id} não encontrada"),
    }
    Ok(())
}

async fn cmd_delete_activity(services: &Services, input: &str) -> Result<()> {
    let id = resolve_activity_id(services.store(), input).await?;
    if !services.store().delete_activity(id).await? {
        bail!("atividade {id} não encontrada");
    }
    println!("Atividade {id} excluída.");
    Ok(())
}

// -----------------------------------------------------------------------
// Support files
// -----------------------------------------------------------------------

pub async fn run_file_command(command: FileCommands, services: &Services) -> Result<()> {
    match command {
        FileCommands::Add { path, unselected } => {
            cmd_add_file(services, &path, !unselected).await
        }
        FileCommands::List => cmd_list_files(services).await,
        FileCommands::Select { id } => cmd_set_selected(services, &id, true).await,
        FileCommands::Unselect { id } => cmd_set_selected(services, &id, false).await,
        FileCommands::Remove { id } => cmd_remove_file(services, &id).await,
    }
}

async fn cmd_add_file(services: &Services, path: &Path, selected: bool) -> Result<()> {
    let file = attachments::load_support_file(path, selected)?;
    let stored = services.store().add_rag_file(&file).await?;
    println!(
        "Adicionado {} ({}, {}){}",
        stored.name,
        stored.kind,
        stored.mime_type,
        if stored.selected { ", selecionado" } else { "" }
    );
    println!("  ID: {}", stored.id);
    Ok(())
}

async fn cmd_list_files(services: &Services) -> Result<()> {
    let files = services.store().list_rag_files().await?;
    if files.is_empty() {
        println!("Nenhum arquivo de apoio. Use `pei files add <caminho>` para adicionar um.");
        return Ok(());
    }
    for file in &files {
        render::print_rag_file_row(file);
    }
    let selected = files.iter().filter(|f| f.selected).count();
    println!();
    println!("{selected} de {} arquivos são enviados nos pedidos à IA.", files.len());
    Ok(())
}

async fn resolve_file_id(services: &Services, input: &str) -> Result<uuid::Uuid> {
    if let Ok(id) = uuid::Uuid::parse_str(input) {
        return Ok(id);
    }
    let files = services.store().list_rag_files().await?;
    let hits: Vec<_> = files
        .iter()
        .filter(|f| f.name == input || f.id.to_string().starts_with(input))
        .collect();
    match hits.as_slice() {
        [one] => Ok(one.id),
        [] => bail!("nenhum arquivo de apoio corresponde a {input:?}"),
        _ => bail!("{input:?} corresponde a {} arquivos de apoio; use o ID", hits.len()),
    }
}

async fn cmd_set_selected(services: &Services, input: &str, selected: bool) -> Result<()> {
    let id = resolve_file_id(services, input).await?;
    match services.store().set_rag_file_selected(id, selected).await? {
        Some(file) if file.selected => println!("{} será enviado nos pedidos à IA.", file.name),
        Some(file) => println!("{} deixará de ser enviado.", file.name),
        None => bail!("arquivo de apoio {id} não encontrado"),
    }
    Ok(())
}

async fn cmd_remove_file(services: &Services, input: &str) -> Result<()> {
    let id = resolve_file_id(services, input).await?;
    if !services.store().delete_rag_file(id).await? {
        bail!("arquivo de apoio {id} não encontrado");
    }
    println!("Arquivo de apoio {id} removido.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn activity(title: &str, favorited: bool, dua: bool, tags: &[&str]) -> Activity {
        Activity {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: "Jogo com cartões".to_string(),
            discipline: "Matemática".to_string(),
            skills: vec![],
            needs: vec![],
            goal_tags: tags.iter().map(|t| t.to_string()).collect(),
            is_favorited: favorited,
            is_dua: dua,
            source_pei_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn filters_combine() {
        let a = activity("Bingo", true, false, &["Curto Prazo"]);
        let b = activity("Mural", false, true, &["DUA"]);
        assert!(activity_matches(&a, true, false, None));
        assert!(!activity_matches(&b, true, false, None));
        assert!(activity_matches(&b, false, true, None));
        assert!(!activity_matches(&a, true, true, None));
    }

    #[test]
    fn search_covers_text_and_tags() {
        let a = activity("Bingo de palavras", false, false, &["Curto Prazo"]);
        assert!(activity_matches(&a, false, false, Some("BINGO")));
        assert!(activity_matches(&a, false, false, Some("matemática")));
        assert!(activity_matches(&a, false, false, Some("curto")));
        assert!(!activity_matches(&a, false, false, Some("leitura")));
    }
}
