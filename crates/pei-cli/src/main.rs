mod action_cmds;
mod bank_cmds;
mod config;
mod edit_cmd;
mod pei_cmds;
mod render;
mod resolve;
mod session;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use pei_core::assistant::ActionKind;
use pei_db::pool;

use action_cmds::ActionArgs;
use config::PeiConfig;
use session::Services;

#[derive(Parser)]
#[command(name = "pei", about = "Elaboração de Planos Educacionais Individualizados com apoio de IA")]
struct Cli {
    /// URL do banco de dados (tem prioridade sobre PEI_DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Cria o arquivo de configuração (não precisa de banco de dados)
    Init {
        /// URL de conexão PostgreSQL
        #[arg(long, default_value = "postgresql://localhost:5432/pei")]
        db_url: String,
        /// Chave da API Gemini (senão lida de PEI_API_KEY ou GEMINI_API_KEY)
        #[arg(long)]
        api_key: Option<String>,
        /// Sobrescreve um arquivo de configuração existente
        #[arg(long)]
        force: bool,
    },
    /// Cria o banco de dados se necessário e aplica as migrações
    DbInit,
    /// Abre uma tela: pei-form-view, pei-list-view, activity-bank-view, ...
    Open {
        /// Nome da tela; nomes desconhecidos abrem pei-form-view
        #[arg(long)]
        view: Option<String>,
    },
    /// Sessão de edição interativa com salvamento automático
    Edit {
        /// PEI a editar (ID, prefixo do ID ou nome do aluno); omita para um novo
        pei: Option<String>,
        /// Usa raciocínio estendido nos pedidos à IA
        #[arg(long)]
        extended: bool,
    },
    /// Lista os PEIs salvos
    List,
    /// Mostra um PEI salvo
    Show {
        /// ID do PEI, prefixo do ID ou nome do aluno
        pei: String,
        /// Mostra os valores dos campos por inteiro
        #[arg(long)]
        full: bool,
    },
    /// Exclui um PEI salvo
    Delete {
        /// ID do PEI, prefixo do ID ou nome do aluno
        pei: String,
    },
    /// Preenche um campo de um PEI salvo
    Set {
        /// ID do PEI, prefixo do ID ou nome do aluno
        pei: String,
        /// ID do campo (veja `pei fields`)
        field: String,
        /// Novo valor
        value: String,
    },
    /// Lista os campos do formulário e as ações de IA de cada um
    Fields,
    /// Executa uma ação de IA num campo de um PEI salvo
    Action {
        /// ID do PEI, prefixo do ID ou nome do aluno
        pei: String,
        /// ID do campo (veja `pei fields`)
        field: String,
        /// fill, suggest-needs, suggest-adaptations, smart ou suggest-activities
        action: ActionKind,
        /// Usa raciocínio estendido
        #[arg(long)]
        extended: bool,
        /// Aprova a sugestão sem perguntar
        #[arg(long)]
        yes: bool,
        /// Guarda as atividades sugeridas no banco
        #[arg(long)]
        save_activities: bool,
    },
    /// Reescreve um campo de um PEI salvo seguindo uma instrução
    Refine {
        /// ID do PEI, prefixo do ID ou nome do aluno
        pei: String,
        /// ID do campo
        field: String,
        /// O que mudar (por padrão, uma melhoria geral)
        #[arg(long, short)]
        instruction: Option<String>,
        /// Usa raciocínio estendido
        #[arg(long)]
        extended: bool,
        /// Aprova o novo texto sem perguntar
        #[arg(long)]
        yes: bool,
    },
    /// Gera o documento completo do PEI
    Generate {
        /// ID do PEI, prefixo do ID ou nome do aluno
        pei: String,
        /// Usa raciocínio estendido
        #[arg(long)]
        extended: bool,
        /// Grava neste arquivo em vez da saída padrão
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Análise multidisciplinar de um PEI
    Analyze {
        /// ID do PEI, prefixo do ID ou nome do aluno
        pei: String,
        /// Usa raciocínio estendido
        #[arg(long)]
        extended: bool,
        /// Mostra a análise em JSON
        #[arg(long)]
        json: bool,
    },
    /// Banco de atividades
    Activities {
        #[command(subcommand)]
        command: ActivityCommands,
    },
    /// Arquivos de apoio enviados à IA como contexto
    Files {
        #[command(subcommand)]
        command: FileCommands,
    },
    /// Gera o autocompletar para o shell
    Completions {
        /// Shell de destino
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ActivityCommands {
    /// Lista as atividades do banco, das mais recentes às mais antigas
    List {
        /// Só as favoritas
        #[arg(long)]
        favorites: bool,
        /// Só as atividades DUA
        #[arg(long)]
        dua: bool,
        /// Busca no título, descrição, disciplina e tags, sem distinguir maiúsculas
        #[arg(long)]
        search: Option<String>,
    },
    /// Mostra uma atividade
    Show {
        /// ID da atividade ou prefixo do ID
        id: String,
    },
    /// Marca ou desmarca como favorita
    Favorite {
        /// ID da atividade ou prefixo do ID
        id: String,
    },
    /// Exclui uma atividade
    Delete {
        /// ID da atividade ou prefixo do ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum FileCommands {
    /// Adiciona um arquivo de texto ou imagem
    Add {
        /// Caminho do arquivo
        path: PathBuf,
        /// Adiciona sem o selecionar para os pedidos à IA
        #[arg(long)]
        unselected: bool,
    },
    /// Lista os arquivos de apoio
    List,
    /// Envia o arquivo nos pedidos à IA
    Select {
        /// ID do arquivo, prefixo do ID ou nome
        id: String,
    },
    /// Deixa de enviar o arquivo nos pedidos à IA
    Unselect {
        /// ID do arquivo, prefixo do ID ou nome
        id: String,
    },
    /// Remove um arquivo de apoio
    Remove {
        /// ID do arquivo, prefixo do ID ou nome
        id: String,
    },
}

/// Execute the `pei init` command: write config file.
fn cmd_init(db_url: &str, api_key: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "o arquivo de configuração já existe em {}\nUse --force para sobrescrever.",
            path.display()
        );
    }

    let has_key = api_key.is_some();
    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        ai: config::AiSection {
            api_key,
            ..config::AiSection::default()
        },
        autosave: config::AutosaveSection::default(),
    };

    config::save_config(&cfg)?;

    println!("Configuração gravada em {}", path.display());
    println!("  database.url = {db_url}");
    if has_key {
        println!("  ai.api_key   = (definida)");
    } else {
        println!("  ai.api_key   = (não definida; exporte PEI_API_KEY ou GEMINI_API_KEY)");
    }
    println!();
    println!("Próximo passo: execute `pei db-init` para criar e migrar o banco de dados.");

    Ok(())
}

/// Execute the `pei db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = PeiConfig::resolve(cli_db_url)?;

    println!("Inicializando o banco de dados do pei...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Banco de dados pronto. Tabelas:");
    for (table, count) in &counts {
        println!("  {table}: {count} linhas");
    }

    db_pool.close().await;

    println!("pei db-init concluído.");
    Ok(())
}

/// Run `command` against a connected store, closing the pool afterwards.
async fn with_services(config: &PeiConfig, command: Commands) -> anyhow::Result<()> {
    let services = Services::connect(config).await?;
    let result = run_connected(config, &services, command).await;
    services.close().await;
    result
}

async fn run_connected(
    config: &PeiConfig,
    services: &Services,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Open { view } => {
            edit_cmd::run_open(services, config.autosave, view.as_deref()).await
        }
        Commands::Edit { pei, extended } => {
            edit_cmd::run_edit(services, config.autosave, pei.as_deref(), extended).await
        }
        Commands::List => pei_cmds::run_list(services).await,
        Commands::Show { pei, full } => pei_cmds::run_show(services, &pei, full).await,
        Commands::Delete { pei } => pei_cmds::run_delete(services, &pei).await,
        Commands::Set { pei, field, value } => {
            pei_cmds::run_set(services, &pei, &field, &value).await
        }
        Commands::Action {
            pei,
            field,
            action,
            extended,
            yes,
            save_activities,
        } => {
            action_cmds::run_action(
                services,
                ActionArgs {
                    pei: &pei,
                    field: &field,
                    action,
                    extended,
                    yes,
                    save_activities,
                },
            )
            .await
        }
        Commands::Refine {
            pei,
            field,
            instruction,
            extended,
            yes,
        } => {
            action_cmds::run_refine(services, &pei, &field, instruction.as_deref(), extended, yes)
                .await
        }
        Commands::Generate {
            pei,
            extended,
            output,
        } => action_cmds::run_generate(services, &pei, extended, output.as_deref()).await,
        Commands::Analyze {
            pei,
            extended,
            json,
        } => action_cmds::run_analyze(services, &pei, extended, json).await,
        Commands::Activities { command } => {
            bank_cmds::run_activity_command(command, services).await
        }
        Commands::Files { command } => bank_cmds::run_file_command(command, services).await,
        Commands::Init { .. } | Commands::DbInit | Commands::Fields | Commands::Completions { .. } => {
            anyhow::bail!("o comando não usa conexão com o banco de dados")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            api_key,
            force,
        } => {
            cmd_init(&db_url, api_key, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Fields => {
            pei_cmds::run_fields();
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "pei", &mut std::io::stdout());
        }
        command => {
            let resolved = PeiConfig::resolve(cli.database_url.as_deref())?;
            if let Err(e) = with_services(&resolved, command).await {
                eprintln!("{e:#}");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod test_util {
    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Serialise tests that touch process environment variables.
    pub fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }
}
