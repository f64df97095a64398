use std::fmt::Display;

use crate::models::game::GameDraft;

/// Profile survey steps in the order they are asked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SurveyStep {
    Level,
    Experience,
    Rating,
    CourtType,
    District,
    Availability,
}

impl SurveyStep {
    pub const ALL: [SurveyStep; 6] = [
        SurveyStep::Level,
        SurveyStep::Experience,
        SurveyStep::Rating,
        SurveyStep::CourtType,
        SurveyStep::District,
        SurveyStep::Availability,
    ];

    pub fn next(&self) -> Option<SurveyStep> {
        match self {
            SurveyStep::Level => Some(SurveyStep::Experience),
            SurveyStep::Experience => Some(SurveyStep::Rating),
            SurveyStep::Rating => Some(SurveyStep::CourtType),
            SurveyStep::CourtType => Some(SurveyStep::District),
            SurveyStep::District => Some(SurveyStep::Availability),
            SurveyStep::Availability => None,
        }
    }

    /// Steps answered with a button tap; the rest take free text.
    pub fn takes_choice(&self) -> bool {
        !matches!(self, SurveyStep::District | SurveyStep::Availability)
    }

    pub fn number(&self) -> usize {
        *self as usize + 1
    }

    pub fn from_str<S: AsRef<str>>(str: S) -> Option<Self> {
        match str.as_ref() {
            "level" => Some(Self::Level),
            "experience" => Some(Self::Experience),
            "rating" => Some(Self::Rating),
            "court" => Some(Self::CourtType),
            "district" => Some(Self::District),
            "availability" => Some(Self::Availability),
            _ => None,
        }
    }
}

impl Display for SurveyStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurveyStep::Level => write!(f, "level"),
            SurveyStep::Experience => write!(f, "experience"),
            SurveyStep::Rating => write!(f, "rating"),
            SurveyStep::CourtType => write!(f, "court"),
            SurveyStep::District => write!(f, "district"),
            SurveyStep::Availability => write!(f, "availability"),
        }
    }
}

/// Game-creation wizard steps in the order they are asked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GameStep {
    DateTime,
    Location,
    Capacity,
    LevelHint,
    Title,
    Description,
}

impl GameStep {
    pub const COUNT: usize = 6;

    pub fn next(&self) -> Option<GameStep> {
        match self {
            GameStep::DateTime => Some(GameStep::Location),
            GameStep::Location => Some(GameStep::Capacity),
            GameStep::Capacity => Some(GameStep::LevelHint),
            GameStep::LevelHint => Some(GameStep::Title),
            GameStep::Title => Some(GameStep::Description),
            GameStep::Description => None,
        }
    }

    pub fn number(&self) -> usize {
        *self as usize + 1
    }
}

/// What a user is in the middle of answering.
#[derive(Debug, Clone, PartialEq)]
pub enum Session {
    Survey(SurveyStep),
    ManualRating,
    NewGame { step: GameStep, draft: GameDraft },
}
