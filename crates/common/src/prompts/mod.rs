//! Prompt templates for grounded generation.
//!
//! The instruction wording is deliberately rigid: answers must come only
//! from retrieved content, in the language of the question, with no inline
//! source list (citations are surfaced structurally by the gateway).

/// System instruction applied to every grounded generation call unless the
/// caller overrides it.
pub const RAG_SYSTEM_PROMPT: &str = "\
You are a precise, factual assistant that answers questions based on the provided documents.

STRICT RULES:
1. ONLY use information explicitly stated in the documents.
2. If the information is not found, say \"This information is not available in the provided documents.\"
3. Do NOT make assumptions or add external knowledge.
4. Be concise and direct; lead with the answer itself.
5. Always respond in the SAME language as the user's question, translating \
retrieved content if it is written in another language.
6. If asked for a count or number, state the specific number clearly.
7. Do NOT list sources or citations in the answer text; they are reported separately.";

/// Instruction template wrapped around a search query.
pub fn format_search_prompt(query: &str) -> String {
    format!(
        "Answer this question using ONLY information from the provided documents.\n\
         \n\
         Question: {query}\n\
         \n\
         INSTRUCTIONS:\n\
         1. Give a DIRECT answer first (number, name, fact).\n\
         2. Respond in the SAME LANGUAGE as the question above.\n\
         3. If relevant data exists in documents written in other languages, \
         translate the answer to match the question's language.\n\
         4. If the information is not in the documents, clearly say so.\n\
         5. Do not include a source list in the answer."
    )
}

/// Instruction template for direct question answering.
pub fn format_qa_prompt(question: &str) -> String {
    format!(
        "Answer this question using ONLY the provided documents.\n\
         \n\
         Question: {question}\n\
         \n\
         FORMAT YOUR ANSWER:\n\
         1. Start with the direct answer (number, name, or key fact).\n\
         2. Add one or two sentences of context if helpful.\n\
         3. Use the SAME LANGUAGE as the question.\n\
         4. If the information is not found, say: \"This information is not available in the documents.\"\n\
         5. Do not include a source list in the answer."
    )
}

/// Prompt asking for a factual summary of everything in a store.
pub const SUMMARIZATION_PROMPT: &str = "\
Provide a factual summary of the key information in the provided documents.

Instructions:
- Include ONLY information explicitly stated in the documents.
- Organize by main topics.
- Be concise and factual.
- Respond in the same language as this prompt.
- Do not include a source list in the summary.";
