use crate::domain::value_objects::{
    enums::{output_formats::OutputFormat, tone_presets::TonePreset},
    generation::ResolvedContext,
};

/// Platform-specific instructions for one output format.
fn format_instructions(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::TwitterThread => {
            "Write a Twitter/X thread of 5 to 8 tweets. Number each tweet like \"1/\". \
             Keep every tweet under 280 characters. Open with a strong hook and end with a call to action."
        }
        OutputFormat::LinkedinPost => {
            "Write a LinkedIn post of 150 to 300 words. Start with a one-line hook, use short \
             paragraphs, and finish with a question that invites comments. Add 3 to 5 relevant hashtags."
        }
        OutputFormat::InstagramCaption => {
            "Write an Instagram caption under 2,200 characters. Lead with an attention-grabbing first \
             line, keep it conversational, and end with 8 to 15 relevant hashtags."
        }
        OutputFormat::FacebookPost => {
            "Write a Facebook post of 80 to 200 words that feels personal and encourages shares and comments."
        }
        OutputFormat::TiktokScript => {
            "Write a 30 to 60 second TikTok video script. Include a hook for the first 3 seconds, \
             on-screen text cues in brackets, and a closing call to action."
        }
        OutputFormat::Newsletter => {
            "Write an email newsletter section with a subject line, a short intro, 3 key takeaways \
             as bullet points, and a closing sentence linking back to the original content."
        }
        OutputFormat::YoutubeDescription => {
            "Write a YouTube video description: a 2 sentence summary, a list of chapter-style \
             highlights, and 3 to 5 hashtags at the end."
        }
    }
}

fn tone_instructions(tone: TonePreset) -> &'static str {
    match tone {
        TonePreset::Professional => "polished and authoritative",
        TonePreset::Casual => "relaxed and friendly",
        TonePreset::Witty => "clever and playful with light humor",
        TonePreset::Inspirational => "uplifting and motivating",
        TonePreset::Educational => "clear and explanatory, teaching the reader something",
        TonePreset::Bold => "direct, confident, and opinionated",
    }
}

/// Builds the generation prompt for one format from the already normalized source text.
pub fn build_prompt(format: OutputFormat, source: &str, context: &ResolvedContext) -> String {
    let emoji = if context.emoji_on {
        "Use emojis where they feel natural."
    } else {
        "Do not use emojis."
    };

    format!(
        "You are an expert social media copywriter repurposing existing content.\n\
         \n\
         Task: {instructions}\n\
         Target audience: {audience}\n\
         Goal: {goal}\n\
         Writing style: {style}\n\
         Tone: {tone}\n\
         {emoji}\n\
         \n\
         Only use facts present in the source content. Return the finished {format_name} text \
         only, without preamble or commentary.\n\
         \n\
         Source content:\n\
         \"\"\"\n\
         {source}\n\
         \"\"\"",
        instructions = format_instructions(format),
        audience = context.target_audience,
        goal = context.goal,
        style = context.style,
        tone = tone_instructions(context.tone),
        format_name = format.as_str().replace('_', " "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::generation::GenerationContext;

    #[test]
    fn prompt_carries_context_and_source() {
        let context = GenerationContext {
            target_audience: Some("founders".to_string()),
            emoji_on: Some(true),
            tone_preset: Some("bold".to_string()),
            ..Default::default()
        }
        .resolve()
        .unwrap();

        let prompt = build_prompt(OutputFormat::LinkedinPost, "Shipping beats perfection.", &context);

        assert!(prompt.contains("Target audience: founders"));
        assert!(prompt.contains("direct, confident"));
        assert!(prompt.contains("Use emojis"));
        assert!(prompt.contains("Shipping beats perfection."));
        assert!(prompt.contains("linkedin post"));
    }

    #[test]
    fn every_format_has_instructions() {
        let context = GenerationContext::default().resolve().unwrap();
        for format in OutputFormat::ALL {
            let prompt = build_prompt(format, "text", &context);
            assert!(prompt.contains("Do not use emojis."));
            assert!(prompt.contains(format_instructions(format)));
        }
    }
}
