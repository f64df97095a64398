//! The onboarding question bank and the fixed tables that turn a chosen
//! option into a stored value.

use crate::models::{
    player::{CourtType, SkillLevel},
    wizard::SurveyStep,
};

pub struct SurveyQuestion {
    pub step: SurveyStep,
    pub prompt: &'static str,
    /// Button labels, empty for free-text steps.
    pub options: &'static [&'static str],
}

const LEVELS: [SkillLevel; 4] = [
    SkillLevel::Beginner,
    SkillLevel::Intermediate,
    SkillLevel::Advanced,
    SkillLevel::Expert,
];
const EXPERIENCE_YEARS: [i64; 4] = [0, 2, 4, 6];
const RATING_BANDS: [i64; 4] = [1100, 1300, 1500, 1700];
const COURTS: [CourtType; 4] = [
    CourtType::Hard,
    CourtType::Clay,
    CourtType::Grass,
    CourtType::Carpet,
];

const LEVEL_OPTIONS: &[&str] = &[
    "🎯 Beginner (playing less than a year)",
    "🏆 Amateur (playing 1-3 years)",
    "⭐ Advanced (playing 3-5 years)",
    "🔥 Expert (playing more than 5 years)",
];
const EXPERIENCE_OPTIONS: &[&str] = &[
    "🆕 Less than a year",
    "📖 1-3 years",
    "📚 3-5 years",
    "🎓 More than 5 years",
];
const RATING_OPTIONS: &[&str] = &[
    "🥉 1000-1200 (beginner)",
    "🥈 1200-1400 (amateur)",
    "🥇 1400-1600 (advanced)",
    "👑 1600+ (expert)",
];
const COURT_OPTIONS: &[&str] = &["🟢 Hard", "🟤 Clay", "🌱 Grass", "🔴 Carpet"];

pub fn question(step: SurveyStep) -> SurveyQuestion {
    let (prompt, options) = match step {
        SurveyStep::Level => ("How would you rate your tennis level?", LEVEL_OPTIONS),
        SurveyStep::Experience => (
            "📚 How many years have you been playing tennis?",
            EXPERIENCE_OPTIONS,
        ),
        SurveyStep::Rating => ("🏆 What is your tennis rating?", RATING_OPTIONS),
        SurveyStep::CourtType => (
            "🏟️ Which courts do you prefer to play on?",
            COURT_OPTIONS,
        ),
        SurveyStep::District => (
            "📍 Which district do you live in?\n\nSend the name of the district, for example: \"Central\", \"West\", \"North\".",
            &[][..],
        ),
        SurveyStep::Availability => (
            "⏰ When are you usually free to play?\n\nSend it as text, for example: \"weekends\", \"evenings, mornings\".",
            &[][..],
        ),
    };
    SurveyQuestion {
        step,
        prompt,
        options,
    }
}

pub fn level_for(index: usize) -> Option<SkillLevel> {
    LEVELS.get(index).copied()
}

pub fn experience_for(index: usize) -> Option<i64> {
    EXPERIENCE_YEARS.get(index).copied()
}

/// Rating band on the points scale for the chosen option.
pub fn rating_for(index: usize) -> Option<i64> {
    RATING_BANDS.get(index).copied()
}

pub fn court_for(index: usize) -> Option<CourtType> {
    COURTS.get(index).copied()
}

/// Splits an availability answer into tags. A single phrase stays one tag.
pub fn parse_availability(answer: &str) -> Vec<String> {
    answer
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
