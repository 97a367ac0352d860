//! Generation prompt assembly

use crate::models::ChatTurn;
use crate::query::FilterSpec;

const ANSWER_TEMPLATE: &str = r#"You are an assistant helping a business owner understand their customer reviews.
Answer the question using only the reviews below. If the reviews do not contain the answer, say so.

Filter criteria applied: {criteria}
Number of matching reviews: {review_count}

Reviews:
{context}
{history}
Question: {question}
{count_instruction}
Answer:"#;

/// Inputs to the generation prompt
#[derive(Debug, Clone, Copy)]
pub struct PromptInput<'a> {
    pub question: &'a str,
    pub context: &'a [String],
    pub filter: Option<&'a FilterSpec>,
    pub review_count: usize,
    pub history: &'a [ChatTurn],
}

/// True for questions asking for a number of reviews
pub fn is_count_question(question: &str) -> bool {
    question.to_lowercase().contains("how many")
}

/// Fixed opening sentence stating the number of matching reviews
pub fn count_sentence(count: usize) -> String {
    if count == 1 {
        "Based on the provided reviews, there is 1 review that matches your criteria.".to_string()
    } else {
        format!(
            "Based on the provided reviews, there are {} reviews that match your criteria.",
            count
        )
    }
}

/// Render the generation prompt
///
/// Only the most recent `max_history_turns` turns are included.
pub fn build_answer_prompt(
    input: &PromptInput<'_>,
    count_lead: Option<&str>,
    max_history_turns: usize,
) -> String {
    let criteria = input
        .filter
        .and_then(|f| serde_json::to_string(f).ok())
        .unwrap_or_else(|| "none".to_string());

    let context = input
        .context
        .iter()
        .enumerate()
        .map(|(i, text)| format!("[{}] {}", i + 1, text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n");

    let skip = input.history.len().saturating_sub(max_history_turns);
    let history = if max_history_turns == 0 || input.history.is_empty() {
        String::new()
    } else {
        let turns = input.history[skip..]
            .iter()
            .map(|turn| format!("Owner: {}\nAssistant: {}", turn.human, turn.ai))
            .collect::<Vec<_>>()
            .join("\n");
        format!("\nConversation so far:\n{}\n", turns)
    };

    let count_instruction = match count_lead {
        Some(lead) => format!(
            "Your answer will be shown after the sentence \"{}\" Do not restate or change that number; continue with a short breakdown.\n",
            lead
        ),
        None => String::new(),
    };

    ANSWER_TEMPLATE
        .replace("{criteria}", &criteria)
        .replace("{review_count}", &input.review_count.to_string())
        .replace("{context}", &context)
        .replace("{history}", &history)
        .replace("{question}", input.question)
        .replace("{count_instruction}", &count_instruction)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(n: usize) -> ChatTurn {
        ChatTurn {
            human: format!("question {}", n),
            ai: format!("answer {}", n),
        }
    }

    #[test]
    fn test_count_sentence() {
        assert!(is_count_question("How many 1-star reviews are there?"));
        assert!(!is_count_question("What do people like?"));
        assert_eq!(
            count_sentence(7),
            "Based on the provided reviews, there are 7 reviews that match your criteria."
        );
        assert!(count_sentence(1).contains("there is 1 review that matches"));
    }

    #[test]
    fn test_prompt_includes_criteria_and_context() {
        let context = vec!["Soup was cold".to_string(), "Rude staff".to_string()];
        let filter = FilterSpec::ratings(vec![1]);
        let prompt = build_answer_prompt(
            &PromptInput {
                question: "What went wrong?",
                context: &context,
                filter: Some(&filter),
                review_count: 2,
                history: &[],
            },
            None,
            4,
        );

        assert!(prompt.contains("[1] Soup was cold"));
        assert!(prompt.contains("[2] Rude staff"));
        assert!(prompt.contains("\"$in\":[1]"));
        assert!(prompt.contains("Number of matching reviews: 2"));
        assert!(prompt.contains("Question: What went wrong?"));
        assert!(!prompt.contains("Conversation so far"));
    }

    #[test]
    fn test_history_is_bounded() {
        let history: Vec<ChatTurn> = (1..=6).map(turn).collect();
        let prompt = build_answer_prompt(
            &PromptInput {
                question: "And now?",
                context: &[],
                filter: None,
                review_count: 0,
                history: &history,
            },
            None,
            2,
        );

        assert!(prompt.contains("Filter criteria applied: none"));
        assert!(prompt.contains("question 5"));
        assert!(prompt.contains("answer 6"));
        assert!(!prompt.contains("question 4"));
    }
}
