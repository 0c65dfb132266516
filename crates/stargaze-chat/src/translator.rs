//! Prompt-driven query generation.
//!
//! Every operation builds a message list from the prior conversation plus a
//! fixed instruction, sends it to the completion service, and constrains
//! the output: classification to five labels, queries to the shape allowed
//! by their [`QuerySchema`].

use std::sync::Arc;

use stargaze_core::config::CompletionConfig;
use stargaze_core::{Classification, GeneratedQuery, QueryKind, Turn};

use crate::completion::{CompletionClient, CompletionRequest};
use crate::error::ChatError;
use crate::validator::QuerySchema;

// =============================================================================
// Prompts
// =============================================================================

const CLASSIFY_INSTRUCTION: &str = "\
You are a classifier for astronomy-related queries.

Classify ONLY the MOST RECENT user message into one of these types:
- SQL: NASA Exoplanet Archive queries (e.g., discovery year, planet radius).
- GAIA: Gaia DR3 catalog queries (e.g., star brightness, ADQL queries).
- IMAGE: Image requests (e.g., pictures of Mars, galaxies, planets).
- GENERAL: Astronomy Q&A (e.g., What is a pulsar?).
- INVALID: Anything not astronomy-related.

Use the previous conversation only to disambiguate the last user message.

Respond with EXACTLY one word: SQL, GAIA, IMAGE, GENERAL, or INVALID.
No explanations.";

/// How a generator introduces itself and grounds the model for one target.
struct PromptProfile {
    persona: &'static str,
    extra_rules: &'static [&'static str],
    examples: &'static [(&'static str, &'static str)],
}

const EXOPLANET_PROFILE: PromptProfile = PromptProfile {
    persona: "a SQL assistant for NASA's Exoplanet Archive",
    extra_rules: &[
        "If the user asks for a specific number of results (e.g., 'list 5 ...'), add LIMIT N at the end.",
    ],
    examples: &[
        (
            "List planets discovered after 2018 using transit",
            "SELECT pl_name FROM ps WHERE disc_year > 2018 AND discoverymethod = 'Transit'",
        ),
        (
            "List 5 exoplanets discovered in 2020",
            "SELECT pl_name FROM ps WHERE disc_year = 2020 LIMIT 5",
        ),
    ],
};

const GAIA_PROFILE: PromptProfile = PromptProfile {
    persona: "an ADQL assistant for the ESA Gaia Archive",
    extra_rules: &[],
    examples: &[(
        "List stars brighter than magnitude 10 within 5 degrees of RA=120, DEC=22",
        "SELECT source_id, ra, dec, phot_g_mean_mag FROM gaiadr3.gaia_source \
         WHERE phot_g_mean_mag < 10 AND 1=CONTAINS(POINT('ICRS', ra, dec), CIRCLE('ICRS', 120.0, 22.0, 5.0))",
    )],
};

fn query_prompt(schema: &QuerySchema, profile: &PromptProfile, text: &str) -> String {
    let dialect = schema.kind.as_str();
    let mut prompt = format!(
        "You are {} (table: {}).\n\nUse ONLY these fields:\n",
        profile.persona, schema.table
    );
    for column in schema.columns {
        prompt.push_str(&format!("- {}\n", column));
    }

    prompt.push_str("\nRules:\n");
    prompt.push_str(&format!("- Output ONLY valid {}.\n", dialect));
    prompt.push_str("- No explanations, no markdown, no extra words.\n");
    prompt.push_str("- Use correct column names.\n");
    prompt.push_str(&format!("- Must start with SELECT and use FROM {}.\n", schema.table));
    for rule in profile.extra_rules {
        prompt.push_str(&format!("- {}\n", rule));
    }

    for (i, (input, output)) in profile.examples.iter().enumerate() {
        prompt.push_str(&format!(
            "\nExample {}:\nInput: {}\nOutput: {}\n",
            i + 1,
            input,
            output
        ));
    }

    prompt.push_str(&format!("\nConvert:\n\"{}\"\n", text));
    prompt
}

fn general_prompt(text: &str) -> String {
    format!(
        "You're a helpful astronomy tutor. Answer clearly for beginners:\n\n\"{}\"\n",
        text
    )
}

/// Trim, uppercase and strip trailing periods from a raw label.
fn normalize_label(raw: &str) -> String {
    raw.trim().trim_end_matches('.').trim_end().to_uppercase()
}

// =============================================================================
// QueryGenerator
// =============================================================================

/// Turns an utterance plus prior turns into a label, a query or an answer.
///
/// `history` is always the conversation *before* the current utterance;
/// the generator appends the utterance itself and never mutates history.
pub struct QueryGenerator {
    client: Arc<dyn CompletionClient>,
    config: CompletionConfig,
    exoplanets: QuerySchema,
    gaia: QuerySchema,
}

impl QueryGenerator {
    pub fn new(client: Arc<dyn CompletionClient>, config: CompletionConfig) -> Self {
        Self {
            client,
            config,
            exoplanets: QuerySchema::exoplanets(),
            gaia: QuerySchema::gaia(),
        }
    }

    /// Classify the most recent utterance into one of the five intents.
    pub async fn classify(
        &self,
        text: &str,
        history: &[Turn],
    ) -> Result<Classification, ChatError> {
        let mut messages = history.to_vec();
        messages.push(Turn::user(text));
        messages.push(Turn::user(CLASSIFY_INSTRUCTION));

        let raw = self
            .client
            .complete(&CompletionRequest {
                messages,
                temperature: Some(0.0),
                max_tokens: self.config.classify_max_tokens,
            })
            .await?;

        let label = normalize_label(&raw);
        tracing::info!(label = %label, "Classification result");
        label
            .parse::<Classification>()
            .map_err(|_| ChatError::Classification(label))
    }

    /// Generate a shape-checked SQL query for the exoplanet table.
    pub async fn generate_sql(
        &self,
        text: &str,
        history: &[Turn],
    ) -> Result<GeneratedQuery, ChatError> {
        self.generate(&self.exoplanets, &EXOPLANET_PROFILE, text, history)
            .await
    }

    /// Generate a shape-checked ADQL query for the Gaia catalog.
    pub async fn generate_adql(
        &self,
        text: &str,
        history: &[Turn],
    ) -> Result<GeneratedQuery, ChatError> {
        self.generate(&self.gaia, &GAIA_PROFILE, text, history).await
    }

    /// Answer a general astronomy question; the text is returned verbatim.
    pub async fn answer_general(&self, text: &str, history: &[Turn]) -> Result<String, ChatError> {
        let mut messages = history.to_vec();
        messages.push(Turn::user(general_prompt(text)));

        self.client
            .complete(&CompletionRequest {
                messages,
                temperature: None,
                max_tokens: self.config.general_max_tokens,
            })
            .await
    }

    async fn generate(
        &self,
        schema: &QuerySchema,
        profile: &PromptProfile,
        text: &str,
        history: &[Turn],
    ) -> Result<GeneratedQuery, ChatError> {
        let max_tokens = match schema.kind {
            QueryKind::Sql => self.config.sql_max_tokens,
            QueryKind::Adql => self.config.adql_max_tokens,
        };

        let mut messages = history.to_vec();
        messages.push(Turn::user(query_prompt(schema, profile, text)));

        let raw = self
            .client
            .complete(&CompletionRequest {
                messages,
                temperature: None,
                max_tokens,
            })
            .await?;

        let query = schema.accept(&raw).inspect_err(|e| {
            tracing::warn!(kind = %schema.kind, error = %e, "Rejected generated query");
        })?;
        tracing::info!(kind = %query.kind, query = %query.text, "Query generated");
        Ok(query)
    }
}
