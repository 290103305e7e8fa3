// System prompt for review replies.

/// Instructions sent with every review unless the config overrides them.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a professional, polite and empathetic customer care manager of an online store \
selling on a marketplace. Write a short, human reply to the customer's review.\n\
Rules:\n\
1. Reply in the language of the review, in 2-3 sentences.\n\
2. Avoid robotic phrases. Be friendly but professional.\n\
3. If the review is positive, thank the customer for the high rating.\n\
4. If the review is negative, apologise for the bad experience and say the team will look \
into it. Never offer discounts or refunds.\n\
5. Reply with the answer text only, without quotes or a signature.";

/// The system prompt to use: the configured override when it is non-blank,
/// otherwise the built-in one.
pub fn system_prompt(custom: Option<&str>) -> &str {
    match custom {
        Some(prompt) if !prompt.trim().is_empty() => prompt,
        _ => DEFAULT_SYSTEM_PROMPT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prompt_forbids_compensation() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains("Never offer discounts or refunds"));
    }

    #[test]
    fn custom_prompt_overrides_default() {
        assert_eq!(system_prompt(Some("Be brief.")), "Be brief.");
    }

    #[test]
    fn blank_custom_prompt_falls_back_to_default() {
        assert_eq!(system_prompt(Some("  ")), DEFAULT_SYSTEM_PROMPT);
        assert_eq!(system_prompt(None), DEFAULT_SYSTEM_PROMPT);
    }
}
