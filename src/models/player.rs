use std::fmt::Display;

use crate::{errors::AppError, repositories::player_repo::DbPlayer};

/// Rating every new player starts with on the points scale.
pub const DEFAULT_RATING: i64 = 1000;

const NTRP_MIN: f64 = 1.0;
const NTRP_MAX: f64 = 7.0;
const POINTS_PER_NTRP: f64 = 120.0;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SkillLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl SkillLevel {
    pub fn from_str<S: AsRef<str>>(str: S) -> Self {
        match str.as_ref().trim().to_lowercase().as_str() {
            "intermediate" => Self::Intermediate,
            "advanced" => Self::Advanced,
            "expert" => Self::Expert,
            _ => Self::Beginner,
        }
    }
}

impl Display for SkillLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkillLevel::Beginner => write!(f, "beginner"),
            SkillLevel::Intermediate => write!(f, "intermediate"),
            SkillLevel::Advanced => write!(f, "advanced"),
            SkillLevel::Expert => write!(f, "expert"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CourtType {
    Hard,
    Clay,
    Grass,
    Carpet,
}

impl TryFrom<&str> for CourtType {
    type Error = AppError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "hard" => Ok(Self::Hard),
            "clay" => Ok(Self::Clay),
            "grass" => Ok(Self::Grass),
            "carpet" => Ok(Self::Carpet),
            _ => Err(AppError::Unknown),
        }
    }
}

impl Display for CourtType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CourtType::Hard => write!(f, "hard"),
            CourtType::Clay => write!(f, "clay"),
            CourtType::Grass => write!(f, "grass"),
            CourtType::Carpet => write!(f, "carpet"),
        }
    }
}

/// Parses a manually typed NTRP value, `1.0` to `7.0` in steps of `0.5`.
pub fn parse_ntrp(input: &str) -> Result<f64, AppError> {
    let normalized = input.trim().replace(',', ".");
    let value = normalized
        .parse::<f64>()
        .map_err(|_| AppError::InvalidNtrpRating(input.trim().to_string()))?;
    let doubled = value * 2.0;
    if !(NTRP_MIN..=NTRP_MAX).contains(&value) || doubled.fract() != 0.0 {
        return Err(AppError::InvalidNtrpRating(input.trim().to_string()));
    }
    Ok(value)
}

/// Maps an NTRP value onto the points scale: 1.0 is 1000, every full NTRP point adds 120.
pub fn ntrp_to_points(ntrp: f64) -> i64 {
    (DEFAULT_RATING as f64 + (ntrp - NTRP_MIN) * POINTS_PER_NTRP).round() as i64
}

/// Nearest NTRP half-step for a points rating, clamped to the NTRP range.
pub fn points_to_ntrp(points: i64) -> f64 {
    let raw = NTRP_MIN + (points - DEFAULT_RATING) as f64 / POINTS_PER_NTRP;
    ((raw * 2.0).round() / 2.0).clamp(NTRP_MIN, NTRP_MAX)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub skill_level: SkillLevel,
    pub experience_years: i64,
    pub rating: i64,
    pub rating_confirmed: bool,
    pub district: Option<String>,
    pub court_types: Vec<CourtType>,
    pub availability: Vec<String>,
}

impl Player {
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }

    /// A player may join games once both the rating and the district are known.
    pub fn is_onboarded(&self) -> bool {
        self.rating_confirmed && self.district.is_some()
    }
}

impl From<DbPlayer> for Player {
    fn from(value: DbPlayer) -> Self {
        let court_types: Vec<String> = serde_json::from_str(&value.court_types).unwrap_or_default();
        Self {
            id: value.id,
            first_name: value.first_name,
            last_name: value.last_name,
            username: value.username,
            skill_level: SkillLevel::from_str(value.skill_level),
            experience_years: value.experience_years,
            rating: value.rating,
            rating_confirmed: value.rating_set_at.is_some(),
            district: value.district,
            court_types: court_types
                .iter()
                .filter_map(|c| CourtType::try_from(c.as_str()).ok())
                .collect(),
            availability: serde_json::from_str(&value.availability).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ntrp() {
        assert_eq!(parse_ntrp("3.5").unwrap(), 3.5);
        assert_eq!(parse_ntrp(" 4,0 ").unwrap(), 4.0);
        assert_eq!(parse_ntrp("7").unwrap(), 7.0);
        assert!(matches!(parse_ntrp("3.3"), Err(AppError::InvalidNtrpRating(_))));
        assert!(matches!(parse_ntrp("0.5"), Err(AppError::InvalidNtrpRating(_))));
        assert!(matches!(parse_ntrp("7.5"), Err(AppError::InvalidNtrpRating(_))));
        assert!(matches!(parse_ntrp("good"), Err(AppError::InvalidNtrpRating(_))));
    }

    #[test]
    fn test_ntrp_points_mapping() {
        assert_eq!(ntrp_to_points(1.0), 1000);
        assert_eq!(ntrp_to_points(3.5), 1300);
        assert_eq!(ntrp_to_points(7.0), 1720);
        assert_eq!(points_to_ntrp(1000), 1.0);
        assert_eq!(points_to_ntrp(1300), 3.5);
        assert_eq!(points_to_ntrp(1700), 7.0);
        assert_eq!(points_to_ntrp(1100), 2.0);
        assert_eq!(points_to_ntrp(0), 1.0);
    }

    #[test]
    fn test_skill_level_round_trip_names() {
        for level in [
            SkillLevel::Beginner,
            SkillLevel::Intermediate,
            SkillLevel::Advanced,
            SkillLevel::Expert,
        ] {
            assert_eq!(SkillLevel::from_str(level.to_string()), level);
        }
        assert_eq!(SkillLevel::from_str("unknown"), SkillLevel::Beginner);
    }
}
