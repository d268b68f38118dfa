//! Runner profile — the record the completion engine drives to completeness.
//!
//! The field schema is static: `ProfileField` carries the declaration order,
//! the value kind, and the question prompt for every field the engine can
//! ask about. `Profile` is the typed record itself, keyed by the user's
//! e-mail address.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Value kind of a profile field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Empty when the trimmed string is empty.
    Text,
    /// Empty when equal to zero. Zero is indistinguishable from "unset" —
    /// a deliberate carry-over, see DESIGN.md.
    Number,
    /// Empty when there are no entries, or only blank ones.
    List,
}

/// A typed value for an explicit field update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Number(u32),
    List(Vec<String>),
}

/// The profile fields, in the order the engine asks about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    Name,
    Age,
    WeeklyMileage,
    RaceType,
    BestTime,
    BestTimeDate,
    LastTime,
    LastTimeDate,
    TargetRace,
    TargetTime,
    InjuryHistory,
    Nutrition,
}

impl ProfileField {
    /// Declaration order — the order `next_missing` walks.
    pub const ALL: [ProfileField; 12] = [
        Self::Name,
        Self::Age,
        Self::WeeklyMileage,
        Self::RaceType,
        Self::BestTime,
        Self::BestTimeDate,
        Self::LastTime,
        Self::LastTimeDate,
        Self::TargetRace,
        Self::TargetTime,
        Self::InjuryHistory,
        Self::Nutrition,
    ];

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Age | Self::WeeklyMileage => FieldKind::Number,
            Self::InjuryHistory | Self::Nutrition => FieldKind::List,
            _ => FieldKind::Text,
        }
    }

    /// The canned question the engine asks when this field is outstanding.
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::Name => "What's your name?",
            Self::Age => "How old are you?",
            Self::WeeklyMileage => "How many miles do you run per week?",
            Self::RaceType => "What type of races do you usually run (e.g., marathon, 5K)?",
            Self::BestTime => "What's your best race time?",
            Self::BestTimeDate => "When did you achieve your best time (YYYY-MM-DD)?",
            Self::LastTime => "What was your most recent race time?",
            Self::LastTimeDate => "When was your most recent race (YYYY-MM-DD)?",
            Self::TargetRace => "Do you have a target race coming up?",
            Self::TargetTime => "What's your target time for your next race?",
            Self::InjuryHistory => "Do you have any injury history? (Respond with 'none' if not)",
            Self::Nutrition => "Any specific nutrition practices or diet? (Respond with 'none' if not)",
        }
    }

    /// Snake-case field name used on the wire and in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Age => "age",
            Self::WeeklyMileage => "weekly_mileage",
            Self::RaceType => "race_type",
            Self::BestTime => "best_time",
            Self::BestTimeDate => "best_time_date",
            Self::LastTime => "last_time",
            Self::LastTimeDate => "last_time_date",
            Self::TargetRace => "target_race",
            Self::TargetTime => "target_time",
            Self::InjuryHistory => "injury_history",
            Self::Nutrition => "nutrition",
        }
    }
}

impl std::fmt::Display for ProfileField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProfileField {
    type Err = EngineError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| EngineError::UnknownField(s.to_string()))
    }
}

/// A runner's profile, keyed by e-mail. Created lazily with defaults on
/// first access and mutated only through the completion engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub weekly_mileage: u32,
    #[serde(default)]
    pub race_type: String,
    #[serde(default)]
    pub best_time: String,
    #[serde(default)]
    pub best_time_date: String,
    #[serde(default)]
    pub last_time: String,
    #[serde(default)]
    pub last_time_date: String,
    #[serde(default)]
    pub target_race: String,
    #[serde(default)]
    pub target_time: String,
    #[serde(default)]
    pub injury_history: Vec<String>,
    #[serde(default)]
    pub nutrition: Vec<String>,
    /// Stamped (YYYY-MM-DD) on each completed chat turn. Not part of the
    /// completeness check.
    #[serde(default)]
    pub last_check_in: String,
}

impl Profile {
    /// Create an empty profile for the given identity.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: String::new(),
            age: 0,
            weekly_mileage: 0,
            race_type: String::new(),
            best_time: String::new(),
            best_time_date: String::new(),
            last_time: String::new(),
            last_time_date: String::new(),
            target_race: String::new(),
            target_time: String::new(),
            injury_history: Vec::new(),
            nutrition: Vec::new(),
            last_check_in: String::new(),
        }
    }

    fn text_value(&self, field: ProfileField) -> &str {
        match field {
            ProfileField::Name => &self.name,
            ProfileField::RaceType => &self.race_type,
            ProfileField::BestTime => &self.best_time,
            ProfileField::BestTimeDate => &self.best_time_date,
            ProfileField::LastTime => &self.last_time,
            ProfileField::LastTimeDate => &self.last_time_date,
            ProfileField::TargetRace => &self.target_race,
            ProfileField::TargetTime => &self.target_time,
            _ => "",
        }
    }

    /// Whether `field` is still empty per its kind's emptiness predicate.
    pub fn is_field_empty(&self, field: ProfileField) -> bool {
        match field {
            ProfileField::Age => self.age == 0,
            ProfileField::WeeklyMileage => self.weekly_mileage == 0,
            ProfileField::InjuryHistory => {
                self.injury_history.iter().all(|s| s.trim().is_empty())
            }
            ProfileField::Nutrition => self.nutrition.iter().all(|s| s.trim().is_empty()),
            _ => self.text_value(field).trim().is_empty(),
        }
    }

    /// The first outstanding field in declaration order, with its prompt.
    /// `None` means the profile is complete.
    pub fn next_missing(&self) -> Option<(ProfileField, &'static str)> {
        ProfileField::ALL
            .into_iter()
            .find(|f| self.is_field_empty(*f))
            .map(|f| (f, f.prompt()))
    }

    /// Complete iff every schema field is non-empty per its predicate.
    pub fn is_complete(&self) -> bool {
        self.next_missing().is_none()
    }

    /// Apply a typed value to a field, checking the value against the
    /// field's kind. Numeric fields require a number, list fields a list;
    /// string values are trimmed, and a blank name is rejected. Any other
    /// value is accepted as-is, including ones that re-empty a field.
    pub fn set_value(
        &mut self,
        field: ProfileField,
        value: FieldValue,
    ) -> std::result::Result<(), EngineError> {
        match (field, value) {
            (ProfileField::Age, FieldValue::Number(n)) => self.age = n,
            (ProfileField::WeeklyMileage, FieldValue::Number(n)) => self.weekly_mileage = n,
            (ProfileField::InjuryHistory, FieldValue::List(items)) => self.injury_history = items,
            (ProfileField::Nutrition, FieldValue::List(items)) => self.nutrition = items,
            (field, FieldValue::Text(text)) if field.kind() == FieldKind::Text => {
                let text = text.trim().to_string();
                if field == ProfileField::Name && text.is_empty() {
                    return Err(EngineError::InvalidField {
                        field: field.to_string(),
                        reason: "name cannot be empty".to_string(),
                    });
                }
                let slot = match field {
                    ProfileField::Name => &mut self.name,
                    ProfileField::RaceType => &mut self.race_type,
                    ProfileField::BestTime => &mut self.best_time,
                    ProfileField::BestTimeDate => &mut self.best_time_date,
                    ProfileField::LastTime => &mut self.last_time,
                    ProfileField::LastTimeDate => &mut self.last_time_date,
                    ProfileField::TargetRace => &mut self.target_race,
                    ProfileField::TargetTime => &mut self.target_time,
                    // Numeric and list fields never reach here — the guard
                    // above restricts this arm to text kinds.
                    ProfileField::Age
                    | ProfileField::WeeklyMileage
                    | ProfileField::InjuryHistory
                    | ProfileField::Nutrition => {
                        return Err(EngineError::InvalidField {
                            field: field.to_string(),
                            reason: "a string value is not accepted here".to_string(),
                        });
                    }
                };
                *slot = text;
            }
            (field, _) => {
                return Err(EngineError::InvalidField {
                    field: field.to_string(),
                    reason: match field.kind() {
                        FieldKind::Number => "a numeric value is required".to_string(),
                        FieldKind::List => "a list value is required".to_string(),
                        FieldKind::Text => "a string value is required".to_string(),
                    },
                });
            }
        }
        Ok(())
    }
}
