//! `pei list`, `pei show`, `pei delete`, `pei set` and `pei fields`.

use anyhow::{Result, bail};

use pei_core::assistant::ActionKind;
use pei_core::catalog;

use crate::render;
use crate::resolve::resolve_pei_id;
use crate::session::{Services, persist};

/// List stored PEIs, most recently updated first.
pub async fn run_list(services: &Services) -> Result<()> {
    let records = services.store().list_peis().await?;
    if records.is_empty() {
        println!("Nenhum PEI salvo. Use `pei edit` para começar um.");
        return Ok(());
    }
    println!("  {:<36}  {:<30}  ATUALIZADO", "ID", "ALUNO");
    for record in &records {
        render::print_record_row(record);
    }
    Ok(())
}

/// Show one PEI with per-section progress.
pub async fn run_show(services: &Services, pei: &str, full: bool) -> Result<()> {
    let id = resolve_pei_id(services.store(), pei).await?;
    let record = services.assistant.open_pei(id).await?;

    println!("PEI: {} ({})", record.student_name, record.id);
    println!(
        "Criado em {}, atualizado em {}",
        record.created_at.format("%Y-%m-%d %H:%M"),
        record.updated_at.format("%Y-%m-%d %H:%M")
    );
    println!();

    services
        .assistant
        .with_session(|s| {
            render::print_form(&s.form, full);
            for id in catalog::GOAL_FIELDS {
                if let Some(critique) = s.form.critique(id) {
                    render::print_critique(id, critique);
                    println!();
                }
            }
        })
        .await;
    Ok(())
}

pub async fn run_delete(services: &Services, pei: &str) -> Result<()> {
    let id = resolve_pei_id(services.store(), pei).await?;
    if services.store().delete_pei(id).await? {
        println!("PEI {id} excluído.");
    } else {
        bail!("PEI {id} não encontrado");
    }
    Ok(())
}

/// Set a field on a stored PEI. The value is a user edit, so an AI marker
/// on the field is dropped.
pub async fn run_set(services: &Services, pei: &str, field: &str, value: &str) -> Result<()> {
    if catalog::catalog().field(field).is_none() {
        bail!("campo desconhecido {field:?}; use `pei fields` para listar os campos");
    }
    let id = resolve_pei_id(services.store(), pei).await?;
    services.assistant.open_pei(id).await?;
    services.assistant.set_field(field, value).await;
    persist(&services.assistant).await
}

/// Print the field catalog with the AI actions each field offers.
pub fn run_fields() {
    let cat = catalog::catalog();
    for section in &cat.sections {
        let required = if section.required { " (obrigatório)" } else { "" };
        println!("{}{required}", section.title);
        for field in &section.fields {
            let actions: Vec<&str> = ActionKind::available_for(&field.id)
                .iter()
                .map(ActionKind::as_str)
                .collect();
            println!("  {:<22} {}", field.id, field.label);
            if !actions.is_empty() {
                println!("  {:<22} ações: {}", "", actions.join(", "));
            }
        }
        println!();
    }
    println!("Disciplinas: {}", cat.discipline_options.join(", "));
}
