//! Generative model invocation.
//!
//! [`Generator`] is the seam between the assistant and a concrete model
//! backend. [`GeminiClient`] is the production implementation; tests plug
//! in scripted generators.

pub mod gemini;

use async_trait::async_trait;

use crate::prompt::Prompt;

pub use gemini::{GeminiClient, GeminiConfig};

/// Fixed system instruction sent with every request.
pub const SYSTEM_INSTRUCTION: &str = "Você é um assistente especializado em educação, focado na criação de Planos Educacionais Individualizados (PEI). Suas respostas devem ser profissionais, bem estruturadas e direcionadas para auxiliar educadores. Sempre que apropriado, considere e sugira estratégias baseadas nos princípios do Desenho Universal para a Aprendizagem (DUA).";

/// How much deliberation the model may spend before answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReasoningMode {
    /// No thinking budget.
    #[default]
    Fast,
    /// Large thinking budget.
    Extended,
}

impl std::fmt::Display for ReasoningMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Fast => "fast",
            Self::Extended => "extended",
        })
    }
}

/// Failure while talking to the model, categorised for display.
///
/// The `Display` text is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("Chave de API inválida ou não configurada.")]
    Authentication,

    #[error("Limite de requisições excedido. Tente novamente em alguns instantes.")]
    RateLimited,

    #[error("O serviço de IA está temporariamente indisponível.")]
    Unavailable,

    #[error("A IA retornou uma resposta vazia.")]
    EmptyResponse,

    #[error("Erro: {0}")]
    Other(String),
}

impl ServiceError {
    /// Categorise an HTTP failure from its status code and error message.
    pub fn from_status(status: u16, message: &str) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            429 => Self::RateLimited,
            502..=504 => Self::Unavailable,
            _ if message.contains("API key") => Self::Authentication,
            _ => Self::Other(format!("HTTP {status}: {message}")),
        }
    }
}

/// A text generation backend.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Short backend name for logs (e.g. the model id).
    fn name(&self) -> &str;

    /// Send `prompt` and return the model's non-empty text reply.
    async fn generate(&self, prompt: &Prompt, mode: ReasoningMode) -> Result<String, ServiceError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn Generator) {}
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_categories() {
        assert_eq!(ServiceError::from_status(401, "x"), ServiceError::Authentication);
        assert_eq!(ServiceError::from_status(403, "x"), ServiceError::Authentication);
        assert_eq!(ServiceError::from_status(429, "x"), ServiceError::RateLimited);
        assert_eq!(ServiceError::from_status(503, "x"), ServiceError::Unavailable);
        assert_eq!(
            ServiceError::from_status(400, "API key not valid. Please pass a valid API key."),
            ServiceError::Authentication
        );
        assert_eq!(
            ServiceError::from_status(500, "boom"),
            ServiceError::Other("HTTP 500: boom".into())
        );
    }

    #[test]
    fn user_messages_are_portuguese() {
        assert_eq!(
            ServiceError::RateLimited.to_string(),
            "Limite de requisições excedido. Tente novamente em alguns instantes."
        );
        assert_eq!(ServiceError::Other("falhou".into()).to_string(), "Erro: falhou");
    }
}
