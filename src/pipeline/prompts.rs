use crate::llm::Message;

pub const SYSTEM_PROMPT: &str = "You are a financial chatbot who answers the user's question as accurately \
as possible. Be conversational and concise, work the question into the response, and use proper \
grammar. Base your answer on the news excerpts provided.";

pub const GREETING: &str = "Hello! I am a financial chatbot who reads recent market news to answer your \
financial questions. It may take me some time to generate a response, so please be patient!";

/// Messages for one turn: instruction, then context as its own system
/// message, then the user's query last.
pub fn build(system_instruction: &str, context: &str, query: &str) -> Vec<Message> {
    vec![
        Message::system(system_instruction),
        Message::system(context),
        Message::user(query),
    ]
}
