//! Prompt construction for every assistant action.
//!
//! Builders are pure: the same form values and attachments always produce
//! the same segments. The form context lists non-empty fields in catalog
//! order, and selected support files follow the instruction segment.

use serde::Serialize;

use pei_db::models::{FieldMap, RagFile, RagFileKind};

use crate::catalog::{self, DIAGNOSIS_FIELD, DUA_FIELD, SKILLS_FIELD};

/// One piece of a multi-part prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Segment {
    Text(String),
    /// Base64 payload with its MIME type.
    InlineData { mime_type: String, data: String },
}

impl Segment {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            Self::InlineData { .. } => None,
        }
    }
}

/// What gets sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Text(String),
    Segments(Vec<Segment>),
}

impl Prompt {
    /// Prompt as an ordered segment list.
    pub fn segments(&self) -> Vec<Segment> {
        match self {
            Self::Text(t) => vec![Segment::Text(t.clone())],
            Self::Segments(s) => s.clone(),
        }
    }

    /// Concatenated text of all text segments.
    pub fn text(&self) -> String {
        match self {
            Self::Text(t) => t.clone(),
            Self::Segments(s) => s.iter().filter_map(Segment::as_text).collect(),
        }
    }
}

const CONTEXT_START: &str = "--- INÍCIO DO CONTEXTO DO PEI ATUAL ---";
const CONTEXT_END: &str = "--- FIM DO CONTEXTO DO PEI ATUAL ---";

/// Default refinement instruction when the user gives none.
pub const DEFAULT_REFINE_INSTRUCTION: &str = "Por favor, refine e aprimore este texto.";

/// `"{label}: {value}"` lines for every non-empty field except `exclude`.
pub fn form_context(values: &FieldMap, exclude: &str) -> String {
    catalog::catalog()
        .fields()
        .filter(|f| f.id != exclude)
        .filter_map(|f| {
            values
                .get(&f.id)
                .filter(|v| !v.is_empty())
                .map(|v| format!("{}: {v}", f.label))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Segments for the selected support files, in their given order.
pub fn attachment_segments(files: &[RagFile]) -> Vec<Segment> {
    let mut out = Vec::new();
    for file in files.iter().filter(|f| f.selected) {
        match file.kind {
            RagFileKind::Text => out.push(Segment::Text(format!(
                "\n\n--- INÍCIO DO FICHEIRO DE APOIO: {name} ---\n\n{content}\n\n--- FIM DO FICHEIRO DE APOIO: {name} ---\n\n",
                name = file.name,
                content = file.content,
            ))),
            RagFileKind::Image => {
                out.push(Segment::Text(format!(
                    "A imagem a seguir, intitulada \"{}\", serve como contexto visual:",
                    file.name
                )));
                out.push(Segment::InlineData {
                    mime_type: file.mime_type.clone(),
                    data: file.content.clone(),
                });
            }
        }
    }
    out
}

fn with_attachments(instruction: String, files: &[RagFile]) -> Prompt {
    let mut segments = vec![Segment::Text(instruction)];
    segments.extend(attachment_segments(files));
    Prompt::Segments(segments)
}

/// Draft the content of a single field from the rest of the form.
pub fn fill_field(values: &FieldMap, field_id: &str, files: &[RagFile]) -> Prompt {
    let label = catalog::catalog().label(field_id);
    let context = form_context(values, field_id);
    let instruction = format!(
        "Aja como um especialista em educação inclusiva. Sua tarefa é preencher o campo \"{label}\" de um PEI.\n\n\
         Para garantir coesão e coerência, analise CUIDADOSAMENTE os campos já preenchidos do PEI \
         (e arquivos de apoio se houver) antes de gerar sua resposta.\n\n\
         {CONTEXT_START}\n{context}\n{CONTEXT_END}\n\n\
         Agora, com base no contexto, gere o conteúdo para o campo: \"{label}\".\n\
         Sua resposta deve ser apenas o texto para este campo, sem introduções ou títulos."
    );
    with_attachments(instruction, files)
}

/// List the student's specific educational needs.
pub fn suggest_needs(values: &FieldMap, field_id: &str, files: &[RagFile]) -> Prompt {
    let diagnosis = values.get(DIAGNOSIS_FIELD).map(String::as_str).unwrap_or("");
    let skills = values
        .get(SKILLS_FIELD)
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("Não informado");
    let context = form_context(values, field_id);
    let instruction = format!(
        "Aja como um psicopedagogo especialista.\n\
         Com base no diagnóstico, nas habilidades do aluno e nos ficheiros de apoio, sugira uma lista \
         de necessidades educacionais específicas a serem abordadas no PEI.\n\n\
         Contexto do Aluno:\n---\n\
         Diagnóstico e/ou Descrição Atual: {diagnosis}\n\
         Habilidades Acadêmicas Atuais: {skills}\n---\n\
         Contexto do PEI:\n---\n{context}\n---\n\n\
         Liste as necessidades específicas.\n\
         Sua resposta deve ser uma lista de itens, cada um em uma nova linha, começando com um hífen (-).\n\
         Exemplo:\n\
         - Apoio visual para instruções\n\
         - Tempo extra para avaliações\n\
         - Mediação em interações sociais\n\n\
         Gere apenas a lista, sem introduções ou conclusões."
    );
    with_attachments(instruction, files)
}

/// Suggest curricular adaptations grouped by area.
pub fn suggest_adaptations(values: &FieldMap, field_id: &str, files: &[RagFile]) -> Prompt {
    let diagnosis = values
        .get(DIAGNOSIS_FIELD)
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("Não informado");
    let context = form_context(values, field_id);
    let instruction = format!(
        "Aja como um especialista em educação inclusiva e psicopedagogia.\n\
         Com base no diagnóstico, necessidades, metas do aluno e ficheiros de apoio, sugira uma lista \
         detalhada de adaptações curriculares.\n\n\
         Contexto do Aluno:\n---\n\
         Diagnóstico e Necessidades Específicas: {diagnosis}\n---\n\
         Contexto do PEI:\n---\n{context}\n---\n\n\
         Forneça sugestões práticas para adaptações em:\n\
         1. **Materiais:** (ex: textos com fontes maiores, uso de audiolivros)\n\
         2. **Atividades:** (ex: instruções segmentadas, tempo extra)\n\
         3. **Avaliações:** (ex: provas orais, questões de múltipla escolha)\n\
         4. **Ambiente:** (ex: sentar próximo ao professor, reduzir estímulos visuais)\n\n\
         Gere uma lista bem estruturada e formatada com clareza.\n\
         Sua resposta deve ser apenas a lista, sem introduções ou conclusões."
    );
    with_attachments(instruction, files)
}

/// SMART review of one goal. Sent as a single plain prompt.
pub fn smart_critique(goal: &str) -> Prompt {
    Prompt::Text(format!(
        "Analise a seguinte meta de um PEI com base nos critérios SMART (Específica, Mensurável, \
         Atingível, Relevante, Temporal). Forneça uma crítica construtiva e uma sugestão de melhoria \
         para cada critério.\n\n\
         Meta para Análise: \"{goal}\"\n\n\
         Sua resposta DEVE ser um objeto JSON válido, sem nenhum texto adicional antes ou depois. \
         Use a seguinte estrutura:\n\
         {{\n\
         \x20 \"isSpecific\": {{ \"critique\": \"...\", \"suggestion\": \"...\" }},\n\
         \x20 \"isMeasurable\": {{ \"critique\": \"...\", \"suggestion\": \"...\" }},\n\
         \x20 \"isAchievable\": {{ \"critique\": \"...\", \"suggestion\": \"...\" }},\n\
         \x20 \"isRelevant\": {{ \"critique\": \"...\", \"suggestion\": \"...\" }},\n\
         \x20 \"isTimeBound\": {{ \"critique\": \"...\", \"suggestion\": \"...\" }}\n\
         }}"
    ))
}

const ACTIVITY_EXAMPLE: &str = r#"[
  {
    "title": "...",
    "description": "...",
    "discipline": "...",
    "skills": ["...", "..."],
    "needs": ["...", "..."],
    "goalTags": ["..."]
  }
]"#;

const DUA_ACTIVITY_EXAMPLE: &str = r#"[
  {
    "title": "...",
    "description": "...",
    "discipline": "...",
    "skills": ["...", "..."],
    "needs": ["...", "..."],
    "goalTags": ["DUA"],
    "isDUA": true
  }
]"#;

/// Suggest three to five adapted activities.
///
/// Goal fields are answered from the goal text alone; other fields get the
/// whole form as context. The DUA field asks for UDL-aligned activities.
pub fn suggest_activities(values: &FieldMap, field_id: &str, files: &[RagFile]) -> Prompt {
    let is_dua = field_id == DUA_FIELD;
    let (subject, context) = if catalog::is_goal_field(field_id) {
        let goal = values.get(field_id).map(String::as_str).unwrap_or("");
        (
            "na seguinte meta de um PEI",
            format!("Meta: \"{goal}\""),
        )
    } else {
        (
            "no contexto completo do PEI fornecido",
            format!(
                "{CONTEXT_START}\n\n{}\n{CONTEXT_END}",
                form_context(values, field_id)
            ),
        )
    };
    let lead = if is_dua {
        "Com base nos princípios do Desenho Universal para a Aprendizagem (DUA) e"
    } else {
        "Com base"
    };
    let example = if is_dua {
        DUA_ACTIVITY_EXAMPLE
    } else {
        ACTIVITY_EXAMPLE
    };
    let instruction = format!(
        "{lead} {subject}, sugira 3 a 5 atividades educacionais adaptadas.\n\n\
         Contexto Adicional:\n{context}\n\n\
         Sua resposta DEVE ser um array de objetos JSON válido, sem nenhum texto adicional antes ou \
         depois. Use a seguinte estrutura:\n{example}"
    );
    with_attachments(instruction, files)
}

/// Compose a complete PEI document from the form.
pub fn full_pei(values: &FieldMap, files: &[RagFile]) -> Prompt {
    let context = form_context(values, "");
    let instruction = format!(
        "Aja como um especialista em educação especial e psicopedagogia.\n\
         Com base nos dados de ficheiros de apoio e do formulário, elabore um Plano Educacional \
         Individualizado (PEI) completo, coeso e profissional.\n\
         O documento final deve ser bem estruturado, com parágrafos claros e uma linguagem técnica, \
         mas compreensível.\n\
         Conecte as diferentes seções de forma lógica (ex: as metas devem refletir o diagnóstico e a \
         avaliação, e as atividades devem estar alinhadas às metas).\n\
         Se houver campos não preenchidos, use seu conhecimento para fazer inferências razoáveis.\n\
         O tom deve ser formal e respeitoso.\n\n\
         Contexto do PEI:\n---\n{context}\n---\n\n\
         Elabore o PEI completo a seguir."
    );
    with_attachments(instruction, files)
}

/// Multidisciplinary review of the whole plan, answered as a JSON object.
///
/// The form context travels in its own segment between the instruction and
/// the attachments.
pub fn intelligent_analysis(values: &FieldMap, files: &[RagFile]) -> Prompt {
    let instruction = "Aja como uma equipe multidisciplinar de especialistas em educação composta por \
         um pedagogo e um psicopedagogo.\n\
         Sua tarefa é realizar uma análise completa e aprofundada do seguinte Plano Educacional \
         Individualizado (PEI).\n\n\
         Analise o PEI fornecido e retorne um objeto JSON válido, sem nenhum texto ou formatação \
         adicional antes ou depois. A estrutura do JSON deve ser a seguinte:\n\n\
         {\n\
         \x20 \"strengths\": [\"Liste aqui os pontos fortes do PEI, como a clareza das metas, a adequação das estratégias, etc.\"],\n\
         \x20 \"weaknesses\": [\"Liste aqui os pontos fracos ou áreas que precisam de mais detalhes, como metas vagas, falta de estratégias específicas, etc.\"],\n\
         \x20 \"goalAnalysis\": \"Forneça uma análise detalhada das metas (curto, médio, longo prazo), avaliando se são SMART (Específicas, Mensuráveis, Atingíveis, Relevantes, Temporais) e se estão alinhadas com o perfil do aluno.\",\n\
         \x20 \"pedagogicalAnalysis\": \"Do ponto de vista pedagógico, analise as estratégias, adaptações curriculares e metodologias. Elas são adequadas para as necessidades do aluno? Estão alinhadas com as boas práticas de educação inclusiva?\",\n\
         \x20 \"psychopedagogicalAnalysis\": \"Do ponto de vista psicopedagógico, analise a coerência entre o diagnóstico, a avaliação inicial e as propostas de intervenção. O plano considera os aspectos cognitivos, sociais e emocionais do aluno de forma integrada?\",\n\
         \x20 \"suggestions\": [\"Liste sugestões práticas e acionáveis para melhorar o PEI, abordando os pontos fracos identificados. Seja específico nas suas recomendações.\"]\n\
         }\n\n\
         Certifique-se de que sua análise seja construtiva, profissional e baseada em evidências do próprio PEI.";
    let mut segments = vec![
        Segment::text(instruction),
        Segment::Text(format!(
            "Contexto do PEI:\n---\n{}\n---",
            form_context(values, "")
        )),
    ];
    segments.extend(attachment_segments(files));
    Prompt::Segments(segments)
}

/// Rewrite `current` following a free-form instruction.
pub fn refine(
    values: &FieldMap,
    field_id: &str,
    current: &str,
    instruction: Option<&str>,
    files: &[RagFile],
) -> Prompt {
    let label = catalog::catalog().label(field_id);
    let instruction = instruction
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_REFINE_INSTRUCTION);
    let context = form_context(values, field_id);
    let text = format!(
        "Aja como um especialista em educação. O usuário está editando o campo \"{label}\" de um PEI.\n\n\
         Texto Atual:\n---\n{current}\n---\n\n\
         O usuário forneceu a seguinte instrução para refinar o texto: \"{instruction}\".\n\n\
         Considere também o seguinte contexto de documentos de apoio e do restante do PEI para manter \
         a coerência.\n\n\
         Contexto do PEI:\n---\n{context}\n---\n\n\
         Refine o texto atual com base na instrução e no contexto. Mantenha o propósito original, mas \
         aprimore a clareza e a estrutura. Devolva apenas o texto aprimorado."
    );
    with_attachments(text, files)
}
