//! The fixed facial expression vocabulary.

use crate::constants::UNLABELED;
use std::fmt;

/// A facial expression class.
///
/// Discriminants are the class ids the classifier is trained against and
/// never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Expression {
    Angry = 0,
    Happy = 1,
    Neutral = 2,
    Sad = 3,
    Surprise = 4,
    Fear = 5,
    Disgust = 6,
}

impl Expression {
    /// All classes, ordered by id
    pub const ALL: [Self; 7] = [
        Self::Angry,
        Self::Happy,
        Self::Neutral,
        Self::Sad,
        Self::Surprise,
        Self::Fear,
        Self::Disgust,
    ];

    /// Look up a class by its directory name (exact, case-sensitive)
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.name() == name)
    }

    /// Look up a class by id
    #[must_use]
    pub fn from_id(id: i64) -> Option<Self> {
        usize::try_from(id).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    /// Class id
    #[must_use]
    pub fn id(self) -> i64 {
        self as i64
    }

    /// Directory name of the class
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Angry => "Angry",
            Self::Happy => "Happy",
            Self::Neutral => "Neutral",
            Self::Sad => "Sad",
            Self::Surprise => "Surprise",
            Self::Fear => "Fear",
            Self::Disgust => "Disgust",
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Label id for a label directory name, or [`UNLABELED`] when unknown
#[must_use]
pub fn label_for_dir(name: &str) -> i64 {
    Expression::from_name(name).map_or(UNLABELED, Expression::id)
}
