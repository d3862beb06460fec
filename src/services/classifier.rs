//! Rule-based issue triage
//! Derives priority, summary, recommendations and sentiment from the submitted text.

use crate::domain::models::{Analysis, Category, Priority};

const HIGH_PRIORITY_KEYWORDS: [&str; 8] = [
    "fire",
    "emergency",
    "urgent",
    "danger",
    "leak",
    "broken",
    "safety",
    "security",
];

const MEDIUM_PRIORITY_KEYWORDS: [&str; 5] = ["repair", "fix", "maintenance", "issue", "problem"];

const NEGATIVE_WORDS: [&str; 5] = ["terrible", "awful", "horrible", "disgusting", "unacceptable"];

pub const NEGATIVE_SENTIMENT: f64 = -0.8;
pub const NEUTRAL_SENTIMENT: f64 = 0.2;

const SUMMARY_TITLE_CHARS: usize = 50;

fn recommendations_for(category: Category) -> &'static [&'static str; 3] {
    const MAINTENANCE: [&str; 3] = [
        "Check plumbing system",
        "Inspect electrical connections",
        "Contact maintenance team",
    ];
    const SAFETY: [&str; 3] = [
        "Immediate safety assessment required",
        "Evacuate if necessary",
        "Contact security",
    ];
    const FOOD: [&str; 3] = [
        "Inspect kitchen hygiene",
        "Check food storage",
        "Review meal preparation",
    ];
    const CLEANING: [&str; 3] = [
        "Schedule deep cleaning",
        "Check cleaning supplies",
        "Assign cleaning staff",
    ];
    const OTHERS: [&str; 3] = [
        "General inspection needed",
        "Assess situation",
        "Determine appropriate action",
    ];

    match category {
        Category::Maintenance => &MAINTENANCE,
        Category::Safety => &SAFETY,
        Category::Food => &FOOD,
        Category::Cleaning => &CLEANING,
        Category::Others => &OTHERS,
    }
}

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

fn detect_priority(text: &str) -> Priority {
    if contains_any(text, &HIGH_PRIORITY_KEYWORDS) {
        Priority::High
    } else if contains_any(text, &MEDIUM_PRIORITY_KEYWORDS) {
        Priority::Medium
    } else {
        Priority::Low
    }
}

fn summarize(category: Category, title: &str) -> String {
    let mut chars = title.chars();
    let head: String = chars.by_ref().take(SUMMARY_TITLE_CHARS).collect();
    let ellipsis = if chars.next().is_some() { "..." } else { "" };
    format!("Issue in {}: {}{}", category, head, ellipsis)
}

/// Classifies a submission. Used by both the preview endpoint and issue creation,
/// so the two always agree byte for byte.
pub fn classify(title: &str, description: &str, category: Category) -> Analysis {
    let text = format!("{} {}", title, description).to_lowercase();

    let sentiment_score = if contains_any(&text, &NEGATIVE_WORDS) {
        NEGATIVE_SENTIMENT
    } else {
        NEUTRAL_SENTIMENT
    };

    Analysis {
        priority: detect_priority(&text),
        summary: summarize(category, title),
        recommendations: recommendations_for(category)
            .iter()
            .map(|r| r.to_string())
            .collect(),
        sentiment_score,
    }
}

/// Preview entry point: a missing category is classified as `others`.
pub fn classify_preview(title: &str, description: &str, category: Option<Category>) -> Analysis {
    classify(title, description, category.unwrap_or(Category::Others))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_keyword_wins_over_medium() {
        let analysis = classify(
            "Need a repair",
            "the fix for this problem is urgent",
            Category::Maintenance,
        );
        assert_eq!(analysis.priority, Priority::High);
    }

    #[test]
    fn test_priority_levels() {
        assert_eq!(
            classify("Fan problem", "it wobbles", Category::Maintenance).priority,
            Priority::Medium
        );
        assert_eq!(
            classify("Menu", "more vegetables please", Category::Food).priority,
            Priority::Low
        );
        // substring match, not whole word
        assert_eq!(
            classify("Problematic door", "", Category::Others).priority,
            Priority::Medium
        );
        assert_eq!(
            classify("", "FIRE ALARM", Category::Safety).priority,
            Priority::High
        );
    }

    #[test]
    fn test_summary_truncation() {
        let long_title = "x".repeat(60);
        let analysis = classify(&long_title, "", Category::Cleaning);
        assert_eq!(
            analysis.summary,
            format!("Issue in cleaning: {}...", "x".repeat(50))
        );

        let short_title = "y".repeat(40);
        let analysis = classify(&short_title, "", Category::Food);
        assert_eq!(analysis.summary, format!("Issue in food: {}", short_title));

        let exact = "z".repeat(50);
        let analysis = classify(&exact, "", Category::Food);
        assert_eq!(analysis.summary, format!("Issue in food: {}", exact));
    }

    #[test]
    fn test_summary_counts_chars_not_bytes() {
        let title = "é".repeat(55);
        let analysis = classify(&title, "", Category::Others);
        assert_eq!(
            analysis.summary,
            format!("Issue in others: {}...", "é".repeat(50))
        );
    }

    #[test]
    fn test_recommendations_per_category() {
        for category in Category::ALL {
            let analysis = classify("t", "d", category);
            assert_eq!(analysis.recommendations.len(), 3);
        }
        assert_eq!(
            classify("t", "d", Category::Safety).recommendations[2],
            "Contact security"
        );
    }

    #[test]
    fn test_missing_category_uses_others() {
        let preview = classify_preview("Odd smell", "near stairs", None);
        assert_eq!(preview, classify("Odd smell", "near stairs", Category::Others));
        assert_eq!(preview.recommendations[0], "General inspection needed");
    }

    #[test]
    fn test_sentiment_is_binary() {
        assert_eq!(
            classify("Terrible food", "", Category::Food).sentiment_score,
            NEGATIVE_SENTIMENT
        );
        assert_eq!(
            classify("Food", "could be warmer", Category::Food).sentiment_score,
            NEUTRAL_SENTIMENT
        );
    }

    #[test]
    fn test_classify_is_deterministic() {
        let a = classify("Broken window", "awful draft", Category::Maintenance);
        let b = classify("Broken window", "awful draft", Category::Maintenance);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_input_is_valid() {
        let analysis = classify("", "", Category::Others);
        assert_eq!(analysis.priority, Priority::Low);
        assert_eq!(analysis.summary, "Issue in others: ");
    }
}
