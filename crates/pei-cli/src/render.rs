//! Plain-text rendering shared by the subcommands.

use pei_core::ai::ReasoningMode;
use pei_core::approval::SuggestionDraft;
use pei_core::catalog;
use pei_core::form::FormState;
use pei_core::response::PeiAnalysis;
use pei_db::models::{Activity, NewActivity, PeiRecord, RagFile, SmartCritique};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn mode_label(mode: ReasoningMode) -> &'static str {
    match mode {
        ReasoningMode::Fast => "modo rápido",
        ReasoningMode::Extended => "raciocínio estendido",
    }
}

/// Shorten `s` to at most `max` characters, keeping only the first line.
pub fn truncate(s: &str, max: usize) -> String {
    let line = s.lines().next().unwrap_or("");
    let more = line.chars().count() > max || s.lines().nth(1).is_some();
    if !more {
        return line.to_string();
    }
    let kept: String = line.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// The form grouped by section, with progress and markers.
///
/// `*` marks a required field, `[IA]` an AI-drafted value and `!` a
/// validation error.
pub fn print_form(form: &FormState, full: bool) {
    let cat = catalog::catalog();
    for (section, progress) in cat.sections.iter().zip(form.section_progress()) {
        println!(
            "{} ({}/{}, {:.0}%)",
            section.title,
            progress.filled,
            progress.total,
            progress.percent()
        );
        for field in &section.fields {
            let value = form.get(&field.id);
            let mut markers = String::new();
            if section.required {
                markers.push('*');
            }
            if form.is_ai_generated(&field.id) {
                markers.push_str("[IA]");
            }
            if form.errors().contains_key(&field.id) {
                markers.push('!');
            }
            let shown = if full {
                value.to_string()
            } else {
                truncate(value, 60)
            };
            println!("  {:<22} {:<6} {}", field.id, markers, shown);
        }
        println!();
    }
}

pub fn print_errors(form: &FormState) {
    for (id, message) in form.errors() {
        println!("  {} ({id}): {message}", catalog::catalog().label(id));
    }
}

pub fn print_record_row(record: &PeiRecord) {
    println!(
        "  {}  {:<30}  {}",
        record.id,
        truncate(&record.student_name, 30),
        record.updated_at.format(TIME_FORMAT)
    );
}

pub fn print_draft(draft: &SuggestionDraft) {
    let mode = if draft.is_appending {
        "será anexada"
    } else {
        "substituirá o conteúdo atual"
    };
    println!("Sugestão para \"{}\" ({mode}):", draft.label);
    println!("---");
    println!("{}", draft.content);
    println!("---");
}

pub fn print_critique(field_id: &str, critique: &SmartCritique) {
    println!("Análise SMART de \"{}\":", catalog::catalog().label(field_id));
    for (label, feedback) in critique.criteria() {
        println!("  {label}");
        println!("    Crítica:  {}", feedback.critique);
        println!("    Sugestão: {}", feedback.suggestion);
    }
}

fn print_activity_body(
    title: &str,
    description: &str,
    discipline: &str,
    skills: &[String],
    needs: &[String],
    tags: &[String],
) {
    println!("  {title}");
    if !discipline.is_empty() {
        println!("    Disciplina:   {discipline}");
    }
    if !description.is_empty() {
        println!("    Descrição:    {description}");
    }
    if !skills.is_empty() {
        println!("    Habilidades:  {}", skills.join(", "));
    }
    if !needs.is_empty() {
        println!("    Necessidades: {}", needs.join(", "));
    }
    if !tags.is_empty() {
        println!("    Tags:         {}", tags.join(", "));
    }
}

pub fn print_new_activity(index: usize, activity: &NewActivity) {
    print!("{index}.");
    print_activity_body(
        &activity.title,
        &activity.description,
        &activity.discipline,
        &activity.skills,
        &activity.needs,
        &activity.goal_tags,
    );
}

pub fn print_activity(activity: &Activity) {
    println!("Atividade {}", activity.id);
    print_activity_body(
        &activity.title,
        &activity.description,
        &activity.discipline,
        &activity.skills,
        &activity.needs,
        &activity.goal_tags,
    );
    println!("    Favorita:     {}", if activity.is_favorited { "sim" } else { "não" });
    if let Some(origin) = activity.source_pei_id {
        println!("    PEI de origem: {origin}");
    }
}

pub fn print_activity_row(activity: &Activity) {
    let star = if activity.is_favorited { "*" } else { " " };
    let dua = if activity.is_dua { "DUA" } else { "   " };
    println!(
        "  {star} {}  {dua}  {:<40}  {}",
        activity.id,
        truncate(&activity.title, 40),
        activity.discipline
    );
}

pub fn print_rag_file_row(file: &RagFile) {
    let mark = if file.selected { "[x]" } else { "[ ]" };
    println!(
        "  {mark} {}  {:<5}  {:<12}  {}",
        file.id, file.kind, file.mime_type, file.name
    );
}

fn print_list(title: &str, items: &[String]) {
    println!("{title}:");
    for item in items {
        println!("  - {item}");
    }
}

pub fn print_analysis(analysis: &PeiAnalysis) {
    print_list("Pontos fortes", &analysis.strengths);
    print_list("Pontos a melhorar", &analysis.weaknesses);
    println!("Análise das metas:\n  {}", analysis.goal_analysis);
    println!("Análise pedagógica:\n  {}", analysis.pedagogical_analysis);
    println!(
        "Análise psicopedagógica:\n  {}",
        analysis.psychopedagogical_analysis
    );
    print_list("Sugestões", &analysis.suggestions);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_single_lines() {
        assert_eq!(truncate("Ana", 10), "Ana");
        assert_eq!(truncate("", 10), "");
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        assert_eq!(truncate("avaliação contínua", 10), "avaliaç...");
    }

    #[test]
    fn truncate_marks_hidden_lines() {
        assert_eq!(truncate("linha um\nlinha dois", 40), "linha um...");
    }
}
