//! Wiring shared by the commands: services, line input and draft review.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

use pei_core::ai::GeminiClient;
use pei_core::assistant::Assistant;
use pei_core::autosave::{AutosaveOutcome, AutosaveTracker};
use pei_core::store::{PgStore, RecordStore};
use pei_db::pool;

use crate::config::PeiConfig;
use crate::render;

/// Connected store plus an assistant over it.
pub struct Services {
    pub pool: PgPool,
    pub store: Arc<PgStore>,
    pub assistant: Arc<Assistant>,
}

impl Services {
    pub async fn connect(config: &PeiConfig) -> Result<Self> {
        let pool = pool::create_pool(&config.db_config).await?;
        let store = Arc::new(PgStore::new(pool.clone()));
        let generator =
            Arc::new(GeminiClient::new(config.gemini.clone()).context("falha ao criar o cliente de IA")?);
        let assistant = Arc::new(Assistant::new(generator, store.clone()));
        Ok(Self {
            pool,
            store,
            assistant,
        })
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Persist the session without validation, the way autosave does.
///
/// Used after one-shot commands change a stored PEI.
pub async fn persist(assistant: &Assistant) -> Result<()> {
    match assistant.autosave(&mut AutosaveTracker::new(false)).await? {
        AutosaveOutcome::Saved(id) => println!("PEI {id} salvo."),
        AutosaveOutcome::NoOwner => {
            println!("Não salvo: preencha primeiro o nome do aluno (aluno-nome).")
        }
        AutosaveOutcome::Unchanged => {}
    }
    Ok(())
}

// -----------------------------------------------------------------------
// Line input
// -----------------------------------------------------------------------

/// Line reader over stdin or, in tests, any buffered reader.
pub struct Input<R> {
    lines: Lines<R>,
}

impl Input<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> Input<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// Print `prompt` and read one line. `None` at end of input.
    pub async fn line(&mut self, prompt: &str) -> Result<Option<String>> {
        if !prompt.is_empty() {
            print!("{prompt}");
            std::io::stdout().flush().context("falha ao escrever na saída padrão")?;
        }
        self.lines.next_line().await.context("falha ao ler a entrada")
    }

    /// Read lines up to a line holding a single `.` or end of input.
    pub async fn block(&mut self) -> Result<String> {
        println!("(termine com uma linha contendo apenas \".\")");
        let mut out = Vec::new();
        while let Some(line) = self.lines.next_line().await.context("falha ao ler a entrada")? {
            if line.trim() == "." {
                break;
            }
            out.push(line);
        }
        Ok(out.join("\n"))
    }
}

// -----------------------------------------------------------------------
// Draft review
// -----------------------------------------------------------------------

/// What the user decided about a staged draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Edit,
    Reject,
}

impl Decision {
    pub fn parse(answer: &str) -> Option<Self> {
        match answer.trim().to_lowercase().as_str() {
            "a" | "aprovar" | "approve" | "s" | "sim" | "y" | "yes" => Some(Self::Approve),
            "e" | "editar" | "edit" => Some(Self::Edit),
            "r" | "rejeitar" | "reject" | "n" | "nao" | "não" | "no" => Some(Self::Reject),
            _ => None,
        }
    }
}

/// Walk the user through the pending draft. Returns whether it was applied.
///
/// With `auto_approve` the draft is committed without asking. End of input
/// counts as a rejection.
pub async fn review_pending<R: AsyncBufRead + Unpin>(
    assistant: &Assistant,
    input: &mut Input<R>,
    auto_approve: bool,
) -> Result<bool> {
    let Some(draft) = assistant.pending_draft().await else {
        println!("Nenhuma sugestão pendente.");
        return Ok(false);
    };
    render::print_draft(&draft);

    if auto_approve {
        assistant.approve().await?;
        println!("Aprovada.");
        return Ok(true);
    }

    loop {
        let Some(answer) = input.line("[a]provar, [e]ditar ou [r]ejeitar? ").await? else {
            assistant.reject().await;
            return Ok(false);
        };
        match Decision::parse(&answer) {
            Some(Decision::Approve) => {
                assistant.approve().await?;
                println!("Aprovada.");
                return Ok(true);
            }
            Some(Decision::Edit) => {
                let text = input.block().await?;
                assistant.edit_draft(text).await?;
                if let Some(edited) = assistant.pending_draft().await {
                    render::print_draft(&edited);
                }
            }
            Some(Decision::Reject) => {
                assistant.reject().await;
                println!("Rejeitada.");
                return Ok(false);
            }
            None => println!("Responda a, e ou r."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decisions_accept_portuguese_and_english() {
        assert_eq!(Decision::parse(" Aprovar "), Some(Decision::Approve));
        assert_eq!(Decision::parse("y"), Some(Decision::Approve));
        assert_eq!(Decision::parse("e"), Some(Decision::Edit));
        assert_eq!(Decision::parse("não"), Some(Decision::Reject));
        assert_eq!(Decision::parse("talvez"), None);
    }

    #[tokio::test]
    async fn block_stops_at_dot_line() {
        let mut input = Input::new(&b"primeira\nsegunda\n.\ndepois\n"[..]);
        assert_eq!(input.block().await.unwrap(), "primeira\nsegunda");
        assert_eq!(input.line("").await.unwrap().as_deref(), Some("depois"));
        assert_eq!(input.line("").await.unwrap(), None);
    }
}
