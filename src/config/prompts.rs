//! Built-in prompt templates and canned replies

/// Prompt sent in place of the raw text when the user attached an image
pub fn image_prompt(text: &str) -> String {
    format!(
        "The user has shared an image with the message: \"{}\". Please respond naturally to their message, acknowledging the image they shared. Be conversational and helpful.",
        text
    )
}

/// Built-in replies that don't require a provider
pub mod builtin {
    /// Generic replies used when the provider cannot answer
    pub const FALLBACK_REPLIES: &[&str] = &[
        "I understand what you're saying. That's an interesting point!",
        "Thanks for sharing that with me. I'd love to explore that further.",
        "That's a great observation. What made you think of that?",
        "I see what you mean. Let me add to that conversation.",
        "Interesting! I hadn't considered that angle before.",
        "That's a fascinating insight. It reminds me of something similar.",
        "I'm processing what you just said. That's quite thought-provoking.",
        "Thanks for sharing that! It opens up some interesting possibilities.",
        "I appreciate you sharing that. It gives me a new perspective.",
        "Great question! Here's what I think about that.",
        "That's a really good point. Let me think about that for a moment.",
        "I find what you're saying quite intriguing. Can you tell me more?",
        "That's an excellent observation. It makes me wonder about...",
        "I'm glad you brought that up. It's definitely worth exploring.",
        "That's a thoughtful perspective. What led you to that conclusion?",
    ];

    /// Last-resort reply for a text turn when reply generation itself broke
    pub const TEXT_TURN_FALLBACK: &str =
        "I understand what you're saying. That's an interesting point!";

    /// Last-resort reply for a turn that carried an image
    pub const IMAGE_TURN_FALLBACK: &str =
        "That's a beautiful image! I can see the details clearly. What would you like to discuss about it?";
}

pub fn default_fallback_replies() -> Vec<String> {
    builtin::FALLBACK_REPLIES
        .iter()
        .map(|s| s.to_string())
        .collect()
}
