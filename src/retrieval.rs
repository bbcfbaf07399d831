//! Question-time retrieval and context assembly.
//!
//! The engine embeds an incoming question, pulls the nearest chunks from
//! the vector index, and assembles them into a labeled context block. The
//! downstream text-generation collaborator is external: this module only
//! builds the grounded prompt, it never calls a model.

use tracing::{debug, info};

use crate::embedding::EmbeddingProvider;
use crate::stores::{RetrievalMatch, VectorStore};
use crate::types::PipelineError;

/// Snippet separator placed between context entries.
const SNIPPET_SEPARATOR: &str = "\n\n---\n\n";

/// Assembled retrieval output: the context block for the generation
/// collaborator plus the raw matches for citation and audit.
#[derive(Clone, Debug)]
pub struct AnswerContext {
    pub context_block: String,
    pub matches: Vec<RetrievalMatch>,
}

impl AnswerContext {
    /// Renders the single-prompt payload handed to the external generation
    /// model: analyst preamble, grounded snippets, then the question.
    pub fn prompt(&self, question: &str) -> String {
        format!(
            "You are a financial analyst. Using ONLY the snippets below, \
             answer the question precisely.\n\n{}\n\n**Question:** {question}\n**Answer:**",
            self.context_block
        )
    }
}

/// Embeds questions and retrieves the most similar stored chunks.
pub struct RetrievalEngine<P, S> {
    embedder: P,
    store: S,
}

impl<P, S> RetrievalEngine<P, S>
where
    P: EmbeddingProvider,
    S: VectorStore,
{
    pub fn new(embedder: P, store: S) -> Self {
        Self { embedder, store }
    }

    /// Retrieves up to `top_k` matches for `question` and assembles their
    /// metadata into a context block, one `**filename**:` labeled snippet
    /// per match, truncated to `snippet_chars` characters, in descending
    /// similarity order.
    ///
    /// If embedding or querying fails, the single error is surfaced as-is;
    /// a partial or garbled context is never returned.
    pub async fn answer_context(
        &self,
        question: &str,
        top_k: usize,
        snippet_chars: usize,
    ) -> Result<AnswerContext, PipelineError> {
        let query_vector = self.embedder.embed(question).await?;
        let matches = self.store.query(&query_vector, top_k).await?;
        debug!(matches = matches.len(), top_k, "retrieved nearest chunks");

        let snippets: Vec<String> = matches
            .iter()
            .map(|m| {
                format!(
                    "**{}**:\n{}",
                    m.metadata.filename,
                    truncate_chars(&m.metadata.text, snippet_chars)
                )
            })
            .collect();

        let context_block = snippets.join(SNIPPET_SEPARATOR);
        info!(
            question_chars = question.chars().count(),
            context_chars = context_block.chars().count(),
            "context assembled"
        );
        Ok(AnswerContext {
            context_block,
            matches,
        })
    }
}

/// Cuts `text` to at most `max_chars` characters on a char boundary.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
