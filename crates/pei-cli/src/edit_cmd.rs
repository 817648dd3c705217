//! `pei edit` and `pei open`: the interactive editing session.
//!
//! AI requests run as background tasks so the user can keep editing while
//! they are outstanding; autosave ticks alongside them.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::AsyncBufRead;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use pei_core::assistant::{ActionError, ActionKind, ActionOutcome, Assistant};
use pei_core::autosave::{AutosaveConfig, spawn_autosave};
use pei_core::catalog;
use pei_core::context::{AppContext, View};
use pei_core::store::RecordStore;
use pei_db::models::NewActivity;

use crate::render;
use crate::resolve::resolve_pei_id;
use crate::session::{Input, Services};
use crate::{bank_cmds, pei_cmds};

const PRIVACY_NOTICE: &str = "\
Política de privacidade

Os dados do PEI ficam no banco de dados configurado em `pei init`.
Ao usar uma ação de IA, o conteúdo do formulário e os arquivos de apoio
selecionados são enviados ao serviço de IA configurado para gerar a
sugestão. Nenhuma sugestão é gravada no PEI sem a sua aprovação.
Remova arquivos de apoio com `pei files remove` e PEIs com `pei delete`.";

const HELP: &str = "\
Comandos:
  show [full]               mostra o formulário
  fields                    lista os campos e as suas ações de IA
  set <campo> [valor]       preenche um campo (sem valor: lê um bloco)
  ai <campo> <ação>         executa uma ação de IA em segundo plano
  refine <campo> [texto]    reescreve um campo seguindo uma instrução
  draft                     mostra a sugestão pendente
  approve | reject          aplica ou descarta a sugestão pendente
  edit                      substitui o texto da sugestão pendente
  keep                      guarda no banco as últimas atividades sugeridas
  think [on|off]            liga ou desliga o raciocínio estendido
  generate | analyze        documento completo do PEI / análise multidisciplinar
  status                    pedidos de IA em andamento
  save                      valida e salva
  new | open <pei>          começa um PEI em branco / abre um PEI salvo
  quit";

/// One line of input to the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Show { full: bool },
    Fields,
    Set { field: String, value: Option<String> },
    Ai { field: String, action: ActionKind },
    Refine { field: String, instruction: Option<String> },
    Draft,
    Approve,
    Reject,
    EditDraft,
    Keep,
    Think(Option<bool>),
    Generate,
    Analyze,
    Status,
    Save,
    New,
    Open(String),
    Quit,
}

/// Parse one editor line. Blank lines parse to `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    let rest_opt = (!rest.is_empty()).then(|| rest.to_string());

    let need_field = |rest: &str| -> Result<(String, Option<String>), String> {
        let (field, tail) = match rest.split_once(char::is_whitespace) {
            Some((f, t)) => (f, Some(t.trim().to_string()).filter(|t| !t.is_empty())),
            None if !rest.is_empty() => (rest, None),
            None => return Err(format!("uso: {verb} <campo> ...")),
        };
        if catalog::catalog().field(field).is_none() {
            return Err(format!("campo desconhecido {field:?}"));
        }
        Ok((field.to_string(), tail))
    };

    let command = match verb {
        "help" | "?" => Command::Help,
        "show" => Command::Show {
            full: rest == "full",
        },
        "fields" => Command::Fields,
        "set" => {
            let (field, value) = need_field(rest)?;
            Command::Set { field, value }
        }
        "ai" => {
            let (field, action) = need_field(rest)?;
            let action = action
                .ok_or_else(|| "uso: ai <campo> <ação>".to_string())?
                .parse::<ActionKind>()?;
            Command::Ai { field, action }
        }
        "refine" => {
            let (field, instruction) = need_field(rest)?;
            Command::Refine { field, instruction }
        }
        "draft" => Command::Draft,
        "approve" => Command::Approve,
        "reject" => Command::Reject,
        "edit" => Command::EditDraft,
        "keep" => Command::Keep,
        "think" => Command::Think(match rest {
            "" => None,
            "on" => Some(true),
            "off" => Some(false),
            other => return Err(format!("think aceita on ou off, recebeu {other:?}")),
        }),
        "generate" => Command::Generate,
        "analyze" => Command::Analyze,
        "status" => Command::Status,
        "save" => Command::Save,
        "new" => Command::New,
        "open" => Command::Open(rest_opt.ok_or_else(|| "uso: open <pei>".to_string())?),
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("comando desconhecido {other:?}; digite `help`")),
    };
    Ok(Some(command))
}

/// Print an assistant error, listing blank required fields.
async fn report(assistant: &Assistant, err: &ActionError) {
    println!("{err}");
    if matches!(err, ActionError::Validation(_)) {
        assistant.with_session(|s| render::print_errors(&s.form)).await;
    }
}

/// Activities from the latest suggestion, tied to the form generation they
/// were suggested for.
#[derive(Debug)]
struct SuggestedActivities {
    activities: Vec<NewActivity>,
    epoch: u64,
}

struct Editor {
    assistant: Arc<Assistant>,
    ctx: AppContext,
    tasks: JoinSet<()>,
    last_activities: Arc<Mutex<Option<SuggestedActivities>>>,
}

impl Editor {
    fn new(assistant: Arc<Assistant>, ctx: AppContext) -> Self {
        Self {
            assistant,
            ctx,
            tasks: JoinSet::new(),
            last_activities: Arc::new(Mutex::new(None)),
        }
    }

    /// Drop suggestions made for the form that is being replaced.
    async fn forget_suggestions(&self) {
        if let Some(dropped) = self.last_activities.lock().await.take() {
            debug!(count = dropped.activities.len(), "unsaved activity suggestions dropped");
        }
    }

    async fn run<R: AsyncBufRead + Unpin>(
        &mut self,
        store: &dyn RecordStore,
        input: &mut Input<R>,
    ) -> Result<()> {
        println!("Digite `help` para ver os comandos.");
        loop {
            // Reap finished background requests.
            while let Some(joined) = self.tasks.try_join_next() {
                if let Err(e) = joined {
                    warn!(error = %e, "background request panicked");
                }
            }

            let Some(line) = input.line("pei> ").await? else {
                break;
            };
            let command = match parse_command(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(msg) => {
                    println!("{msg}");
                    continue;
                }
            };
            debug!(?command, view = %self.ctx.current_view(), "editor command");
            if command == Command::Quit {
                break;
            }
            self.dispatch(store, input, command).await?;
        }
        Ok(())
    }

    async fn dispatch<R: AsyncBufRead + Unpin>(
        &mut self,
        store: &dyn RecordStore,
        input: &mut Input<R>,
        command: Command,
    ) -> Result<()> {
        let assistant = Arc::clone(&self.assistant);
        match command {
            Command::Help => println!("{HELP}"),
            Command::Show { full } => {
                assistant
                    .with_session(|s| render::print_form(&s.form, full))
                    .await
            }
            Command::Fields => pei_cmds::run_fields(),
            Command::Set { field, value } => {
                let value = match value {
                    Some(v) => v,
                    None => input.block().await?,
                };
                assistant.set_field(&field, value).await;
            }
            Command::Ai { field, action } => self.spawn_action(field, action),
            Command::Refine { field, instruction } => {
                let mode = self.ctx.reasoning_mode();
                self.tasks.spawn(async move {
                    match assistant.refine(&field, None, instruction.as_deref(), mode).await {
                        Ok(draft) => {
                            render::print_draft(&draft);
                            println!("Use `approve`, `edit` ou `reject`.");
                        }
                        Err(e) => report(&assistant, &e).await,
                    }
                });
            }
            Command::Draft => match assistant.pending_draft().await {
                Some(draft) => render::print_draft(&draft),
                None => println!("Nenhuma sugestão pendente."),
            },
            Command::Approve => match assistant.approve().await {
                Ok(field) => println!("Aplicada em {field}."),
                Err(e) => report(&assistant, &e).await,
            },
            Command::Reject => match assistant.reject().await {
                Some(_) => println!("Sugestão descartada."),
                None => println!("Nenhuma sugestão pendente."),
            },
            Command::EditDraft => {
                if assistant.pending_draft().await.is_none() {
                    println!("Nenhuma sugestão pendente.");
                } else {
                    let text = input.block().await?;
                    if let Err(e) = assistant.edit_draft(text).await {
                        report(&assistant, &e).await;
                    }
                }
            }
            Command::Keep => match self.last_activities.lock().await.take() {
                None => println!("Nenhuma atividade sugerida para guardar."),
                Some(SuggestedActivities { activities, epoch }) => {
                    match assistant.save_activities_from(&activities, epoch).await {
                        Ok(stored) => println!("{} atividades adicionadas ao banco.", stored.len()),
                        Err(e) => report(&assistant, &e).await,
                    }
                }
            },
            Command::Think(setting) => {
                let enabled = match setting {
                    Some(on) => {
                        self.ctx.set_thinking_mode(on);
                        on
                    }
                    None => self.ctx.toggle_thinking_mode(),
                };
                println!(
                    "Raciocínio estendido {} ({}).",
                    if enabled { "ligado" } else { "desligado" },
                    render::mode_label(self.ctx.reasoning_mode())
                );
            }
            Command::Generate => {
                let mode = self.ctx.reasoning_mode();
                self.tasks.spawn(async move {
                    match assistant.generate_full_pei(mode).await {
                        Ok(document) => println!("\n{document}\n"),
                        Err(e) => report(&assistant, &e).await,
                    }
                });
            }
            Command::Analyze => {
                let mode = self.ctx.reasoning_mode();
                self.tasks.spawn(async move {
                    match assistant.analyze_pei(mode).await {
                        Ok(analysis) => render::print_analysis(&analysis),
                        Err(e) => report(&assistant, &e).await,
                    }
                });
            }
            Command::Status => {
                let running = assistant
                    .with_session(|s| {
                        let mut running = Vec::new();
                        for field in catalog::catalog().fields() {
                            for action in ActionKind::ALL {
                                if s.is_loading(&field.id, action) {
                                    running.push(format!("{} ({action})", field.id));
                                }
                            }
                        }
                        (running, s.busy())
                    })
                    .await;
                match running {
                    (_, false) => println!("Nenhum pedido de IA em andamento."),
                    (fields, true) if fields.is_empty() => {
                        println!("Um pedido sobre o PEI completo está em andamento.")
                    }
                    (fields, true) => println!("Em andamento: {}", fields.join(", ")),
                }
            }
            Command::Save => match assistant.save().await {
                Ok(record) => {
                    self.ctx.navigate_to_edit_pei(record.id);
                    println!("PEI de {} salvo ({}).", record.student_name, record.id);
                }
                Err(e) => report(&assistant, &e).await,
            },
            Command::New => {
                assistant.new_pei().await;
                self.forget_suggestions().await;
                self.ctx.navigate_to_new_pei();
                println!("Novo PEI em branco.");
            }
            Command::Open(pei) => {
                let id = match resolve_pei_id(store, &pei).await {
                    Ok(id) => id,
                    Err(e) => {
                        println!("{e:#}");
                        return Ok(());
                    }
                };
                match assistant.open_pei(id).await {
                    Ok(record) => {
                        self.forget_suggestions().await;
                        self.ctx.navigate_to_edit_pei(id);
                        println!("Editando o PEI de {} ({id}).", record.student_name);
                    }
                    Err(e) => report(&assistant, &e).await,
                }
            }
            Command::Quit => {}
        }
        Ok(())
    }

    fn spawn_action(&mut self, field: String, action: ActionKind) {
        let assistant = Arc::clone(&self.assistant);
        let last_activities = Arc::clone(&self.last_activities);
        let mode = self.ctx.reasoning_mode();
        println!("Pedido {action} enviado para {field}.");
        self.tasks.spawn(async move {
            let epoch = assistant.epoch().await;
            match assistant.run_action(&field, action, mode).await {
                Ok(ActionOutcome::Staged(draft)) => {
                    render::print_draft(&draft);
                    println!("Use `approve`, `edit` ou `reject`.");
                }
                Ok(ActionOutcome::Critique(critique)) => render::print_critique(&field, &critique),
                Ok(ActionOutcome::Activities(activities)) => {
                    for (i, activity) in activities.iter().enumerate() {
                        render::print_new_activity(i + 1, activity);
                    }
                    println!("Use `keep` para guardá-las no banco.");
                    *last_activities.lock().await = Some(SuggestedActivities { activities, epoch });
                }
                Err(e) => report(&assistant, &e).await,
            }
        });
    }
}

/// Run the editor on a new PEI or on `pei`.
pub async fn run_edit(
    services: &Services,
    autosave: AutosaveConfig,
    pei: Option<&str>,
    extended: bool,
) -> Result<()> {
    let assistant = Arc::clone(&services.assistant);
    let mut ctx = AppContext::new(Some(View::PeiForm.as_str()));
    ctx.set_thinking_mode(extended);

    match pei {
        Some(pei) => {
            let id = resolve_pei_id(services.store(), pei).await?;
            let record = assistant.open_pei(id).await?;
            ctx.navigate_to_edit_pei(id);
            println!("Editando o PEI de {} ({id}).", record.student_name);
        }
        None => {
            assistant.new_pei().await;
            ctx.navigate_to_new_pei();
            println!("Novo PEI. Preencha aluno-nome para ativar o salvamento automático.");
        }
    }

    let cancel = CancellationToken::new();
    let autosaver = spawn_autosave(Arc::clone(&assistant), autosave, cancel.clone());

    let mut editor = Editor::new(Arc::clone(&assistant), ctx);
    let mut input = Input::stdin();
    let result = editor.run(services.store(), &mut input).await;

    if !editor.tasks.is_empty() {
        println!("{} pedidos de IA por terminar serão descartados.", editor.tasks.len());
    }
    editor.tasks.shutdown().await;
    cancel.cancel();
    if let Err(e) = autosaver.await {
        warn!(error = %e, "autosave task ended abnormally");
    }

    // One last save so nothing typed since the previous tick is lost.
    if assistant.with_session(|s| s.form.owner_name().is_some()).await {
        crate::session::persist(&assistant).await?;
    }
    result
}

/// Start on the requested view. Unknown or missing names open the form.
pub async fn run_open(
    services: &Services,
    autosave: AutosaveConfig,
    view: Option<&str>,
) -> Result<()> {
    let ctx = AppContext::new(view);
    if let Some(name) = view.filter(|v| v.parse::<View>().is_err()) {
        println!("Tela desconhecida {name:?}; abrindo {}.", ctx.current_view());
    }
    match ctx.current_view() {
        View::PeiForm => run_edit(services, autosave, None, ctx.thinking_mode()).await,
        View::PeiList => pei_cmds::run_list(services).await,
        View::ActivityBank => {
            bank_cmds::run_activity_command(
                crate::ActivityCommands::List {
                    favorites: false,
                    dua: false,
                    search: None,
                },
                services,
            )
            .await
        }
        View::ActivityDetail => {
            println!("Nenhuma atividade selecionada. Use `pei activities show <id>`.");
            Ok(())
        }
        View::Files => bank_cmds::run_file_command(crate::FileCommands::List, services).await,
        View::PrivacyPolicy => {
            println!("{PRIVACY_NOTICE}");
            Ok(())
        }
    }
}
