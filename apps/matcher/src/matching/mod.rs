// Resume matching: document text extraction, embeddings, similarity scoring.
// Parsing and model inference run on the blocking pool, never on the runtime threads.

pub mod embedding;
pub mod extract;
pub mod handlers;
pub mod similarity;
