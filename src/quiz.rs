//! Investment-personality quiz: fixed questions, additive scoring, and a
//! suggested allocation per risk band.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("expected {expected} answers, got {got}")]
    WrongAnswerCount { expected: usize, got: usize },
    #[error("answer {answer} for question {question} is out of range")]
    OptionOutOfRange { question: usize, answer: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskProfile {
    Conservative,
    ModeratelyConservative,
    Moderate,
    Growth,
    Aggressive,
}

impl RiskProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskProfile::Conservative => "conservative",
            RiskProfile::ModeratelyConservative => "moderately_conservative",
            RiskProfile::Moderate => "moderate",
            RiskProfile::Growth => "growth",
            RiskProfile::Aggressive => "aggressive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "conservative" => Some(RiskProfile::Conservative),
            "moderately_conservative" => Some(RiskProfile::ModeratelyConservative),
            "moderate" => Some(RiskProfile::Moderate),
            "growth" => Some(RiskProfile::Growth),
            "aggressive" => Some(RiskProfile::Aggressive),
            _ => None,
        }
    }

    fn from_score(score: u32) -> Self {
        match score {
            0..=12 => RiskProfile::Conservative,
            13..=17 => RiskProfile::ModeratelyConservative,
            18..=22 => RiskProfile::Moderate,
            23..=27 => RiskProfile::Growth,
            _ => RiskProfile::Aggressive,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RiskProfile::Conservative => {
                "Capital preservation first. You accept lower returns to avoid large drawdowns."
            }
            RiskProfile::ModeratelyConservative => {
                "Mostly stable assets with a modest growth sleeve."
            }
            RiskProfile::Moderate => "A balanced mix of growth and stability.",
            RiskProfile::Growth => {
                "Long horizon and tolerance for volatility in exchange for higher expected returns."
            }
            RiskProfile::Aggressive => {
                "Maximum growth. Deep drawdowns are acceptable, including speculative assets."
            }
        }
    }

    /// Percentages summing to 100.
    pub fn suggested_allocation(&self) -> Allocation {
        let (stocks, bonds, cash, crypto) = match self {
            RiskProfile::Conservative => (20, 50, 30, 0),
            RiskProfile::ModeratelyConservative => (35, 45, 15, 5),
            RiskProfile::Moderate => (50, 30, 10, 10),
            RiskProfile::Growth => (65, 15, 5, 15),
            RiskProfile::Aggressive => (70, 0, 5, 25),
        };
        Allocation {
            stocks,
            bonds,
            cash,
            crypto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub stocks: u8,
    pub bonds: u8,
    pub cash: u8,
    pub crypto: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: usize,
    pub prompt: &'static str,
    pub options: [&'static str; 4],
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizResult {
    pub score: u32,
    pub max_score: u32,
    pub profile: RiskProfile,
    pub description: &'static str,
    pub allocation: Allocation,
}

const QUESTIONS: [(&str, [&str; 4]); 8] = [
    (
        "How long until you need most of this money?",
        ["Less than 2 years", "2 to 5 years", "5 to 10 years", "More than 10 years"],
    ),
    (
        "Your portfolio drops 25% in a month. What do you do?",
        [
            "Sell everything",
            "Sell some to limit losses",
            "Hold and wait",
            "Buy more at the lower price",
        ],
    ),
    (
        "What is your main investment goal?",
        [
            "Protect what I have",
            "Steady income",
            "Balanced growth",
            "Maximum long-term growth",
        ],
    ),
    (
        "How much investing experience do you have?",
        ["None", "Savings accounts and funds", "Individual stocks", "Derivatives or crypto"],
    ),
    (
        "How stable is your income?",
        ["Uncertain", "Somewhat stable", "Stable", "Very stable with savings buffer"],
    ),
    (
        "Which yearly outcome range would you choose?",
        ["-2% to +4%", "-8% to +12%", "-15% to +25%", "-35% to +60%"],
    ),
    (
        "How many months of expenses do you hold as emergency savings?",
        ["Under 1", "1 to 3", "3 to 6", "More than 6"],
    ),
    (
        "How do you feel about leverage and speculative assets?",
        ["Never", "Only in tiny amounts", "A small part of my portfolio", "Comfortable using them"],
    ),
];

pub fn questions() -> Vec<Question> {
    QUESTIONS
        .iter()
        .enumerate()
        .map(|(id, &(prompt, options))| Question {
            id,
            prompt,
            options,
        })
        .collect()
}

/// Score a full set of answers. `answers[i]` is the zero-based option index
/// chosen for question `i`; option `k` scores `k + 1`.
pub fn score(answers: &[usize]) -> Result<QuizResult, QuizError> {
    if answers.len() != QUESTIONS.len() {
        return Err(QuizError::WrongAnswerCount {
            expected: QUESTIONS.len(),
            got: answers.len(),
        });
    }
    let mut total = 0u32;
    for (question, &answer) in answers.iter().enumerate() {
        if answer >= QUESTIONS[question].1.len() {
            return Err(QuizError::OptionOutOfRange { question, answer });
        }
        total += answer as u32 + 1;
    }
    let profile = RiskProfile::from_score(total);
    Ok(QuizResult {
        score: total,
        max_score: (QUESTIONS.len() * 4) as u32,
        profile,
        description: profile.description(),
        allocation: profile.suggested_allocation(),
    })
}
