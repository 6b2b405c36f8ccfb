//! Prompt construction and response parsing shared by every language-model
//! backend.

use crate::domain::entities::prediction::{Action, Prediction, PredictionRequest, Recommendation};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fmt::Write;

const DEFAULT_CONFIDENCE: u8 = 5;

pub fn build_prompt(request: &PredictionRequest) -> String {
    let mut prompt = String::from(
        "You are an expert financial analyst specializing in Indian equity markets.\n\
         Analyze the portfolio below and give one recommendation per holding.\n\n",
    );

    let invested: f64 = request.holdings.iter().map(|h| h.quantity * h.buy_price).sum();
    let current: f64 = request.holdings.iter().map(|h| h.quantity * h.current_price).sum();
    let pnl_pct = if invested > 0.0 {
        (current - invested) / invested * 100.0
    } else {
        0.0
    };

    let _ = writeln!(prompt, "PORTFOLIO:");
    let _ = writeln!(prompt, "Total Investment: ₹{invested:.2}");
    let _ = writeln!(prompt, "Current Value: ₹{current:.2} ({pnl_pct:+.2}%)");
    for h in &request.holdings {
        let _ = writeln!(
            prompt,
            "- {}: {} shares @ ₹{:.2} (Current: ₹{:.2}, P&L: {:+.2}%)",
            h.symbol, h.quantity, h.buy_price, h.current_price, h.pnl_percent
        );
    }

    let _ = writeln!(prompt, "\nNEWS SENTIMENT (-1 bearish .. 1 bullish):");
    for h in &request.holdings {
        let _ = writeln!(prompt, "- {}: {:.3}", h.symbol, request.sentiment_for(&h.symbol));
    }

    if request.financial_scores.is_empty() {
        let _ = writeln!(prompt, "\nFINANCIAL FUNDAMENTALS: Not available");
    } else {
        let _ = writeln!(prompt, "\nFINANCIAL HEALTH SCORES (0-10):");
        for (symbol, score) in &request.financial_scores {
            let _ = writeln!(prompt, "- {symbol}: {score:.1}");
        }
    }

    if !request.context.trim().is_empty() {
        let _ = writeln!(prompt, "\nRELEVANT CONTEXT:\n{}", request.context.trim());
    }

    prompt.push_str(
        "\nRespond using exactly these headings:\n\
         RECOMMENDATIONS:\n\
         one line per holding as `SYMBOL | BUY/SELL/HOLD | confidence 1-10 | reasoning`\n\
         PORTFOLIO ANALYSIS:\n\
         a short paragraph\n\
         ACTION ITEMS:\n\
         bullet list starting with `-`\n\
         MARKET INSIGHTS:\n\
         a short paragraph\n",
    );
    prompt
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Recommendations,
    Portfolio,
    Actions,
    Insights,
}

fn heading(line: &str) -> Option<Section> {
    let bare = line.trim().trim_matches('*').trim();
    let shouted = bare
        .chars()
        .filter(|c| c.is_alphabetic())
        .all(|c| c.is_uppercase());
    if !(bare.ends_with(':') || bare.starts_with('#') || shouted) {
        return None;
    }

    let cleaned: String = line
        .trim()
        .trim_start_matches(|c: char| c == '#' || c == '*' || c.is_ascii_digit() || c == '.' || c.is_whitespace())
        .to_uppercase();
    let cleaned = cleaned.trim_end_matches(|c: char| c == '*' || c == ':' || c.is_whitespace());
    if cleaned.len() > 40 {
        return None;
    }
    if cleaned.starts_with("RECOMMENDATIONS") || cleaned.starts_with("INDIVIDUAL STOCK") {
        Some(Section::Recommendations)
    } else if cleaned.starts_with("PORTFOLIO") {
        Some(Section::Portfolio)
    } else if cleaned.starts_with("ACTION ITEMS") {
        Some(Section::Actions)
    } else if cleaned.starts_with("MARKET INSIGHTS") {
        Some(Section::Insights)
    } else {
        None
    }
}

fn words(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| !(c.is_ascii_alphanumeric() || c == '&' || c == '-' || c == '.'))
        .map(|w| w.trim_matches('.'))
        .filter(|w| !w.is_empty())
}

fn mentions(line: &str, symbol: &str) -> bool {
    let base = symbol.rsplit_once('.').map(|(b, _)| b).unwrap_or(symbol);
    words(line).any(|w| w.eq_ignore_ascii_case(symbol) || w.eq_ignore_ascii_case(base))
}

fn action_in(line: &str) -> Option<Action> {
    words(line).find_map(|w| w.parse::<Action>().ok())
}

fn confidence_in(line: &str) -> u8 {
    line.split(|c: char| !c.is_ascii_digit())
        .filter_map(|n| n.parse::<u8>().ok())
        .find(|n| (1..=10).contains(n))
        .unwrap_or(DEFAULT_CONFIDENCE)
}

fn reasoning_in(line: &str) -> String {
    let line = line.trim().trim_start_matches(['-', '*', '•']).trim();
    match line.rsplit_once('|') {
        Some((_, last)) if !last.trim().is_empty() => last.trim().to_string(),
        _ => line.to_string(),
    }
}

/// Pulls recommendations and the narrative sections out of free text.
///
/// The first line that names a holding together with an action wins for
/// that holding. A response that yields no recommendation for a non-empty
/// portfolio is marked `fallback_mode`.
pub fn parse_analysis(text: &str, request: &PredictionRequest) -> Prediction {
    let mut recommendations = BTreeMap::new();
    let mut analysis = Vec::new();
    let mut actions = Vec::new();
    let mut insights = Vec::new();
    let mut section = Section::Preamble;

    for line in text.lines() {
        if let Some(next) = heading(line) {
            section = next;
            continue;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match section {
            Section::Portfolio => analysis.push(trimmed.to_string()),
            Section::Insights => insights.push(trimmed.to_string()),
            Section::Actions => {
                if let Some(item) = trimmed.strip_prefix(['-', '*', '•']) {
                    actions.push(item.trim().to_string());
                }
            }
            Section::Preamble | Section::Recommendations => {
                let Some(action) = action_in(trimmed) else {
                    continue;
                };
                for h in &request.holdings {
                    if recommendations.contains_key(&h.symbol) || !mentions(trimmed, &h.symbol) {
                        continue;
                    }
                    recommendations.insert(
                        h.symbol.clone(),
                        Recommendation {
                            action,
                            confidence: confidence_in(trimmed),
                            reasoning: reasoning_in(trimmed),
                        },
                    );
                }
            }
        }
    }

    let fallback_mode = text.trim().is_empty() || (!request.holdings.is_empty() && recommendations.is_empty());

    Prediction {
        recommendations,
        portfolio_analysis: analysis.join("\n"),
        action_items: actions,
        market_insights: insights.join("\n"),
        generated_at: Utc::now(),
        fallback_mode,
    }
}
