use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Declares a closed set of upper-case wire/database labels.
///
/// Every enum stored in SQLite round-trips through `as_str` / `FromStr`, so the
/// text in the database is exactly what the host sends and receives.
macro_rules! labelled_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum $name {
            $(#[serde(rename = $label)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let t = s.trim().to_ascii_uppercase();
                match t.as_str() {
                    $($label => Ok($name::$variant),)+
                    _ => Err(format!(
                        "expected one of {}",
                        $name::ALL.iter().map(|v| v.as_str()).collect::<Vec<_>>().join(", ")
                    )),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

labelled_enum!(Role {
    Student => "STUDENT",
    Teacher => "TEACHER",
    Admin => "ADMIN",
    SuperAdmin => "SUPER_ADMIN",
});

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

labelled_enum!(
    /// Which running score an activity feeds.
    ScoreCategory {
        Readiness => "READINESS",
        Citizenship => "CITIZENSHIP",
        SelfManagement => "SELF_MANAGEMENT",
    }
);

impl ScoreCategory {
    /// Column on `student_profiles` holding the materialized total.
    pub fn score_column(self) -> &'static str {
        match self {
            ScoreCategory::Readiness => "readiness_score",
            ScoreCategory::Citizenship => "citizenship_score",
            ScoreCategory::SelfManagement => "self_management_score",
        }
    }
}

labelled_enum!(ActivityType {
    LearningDiscipline => "LEARNING_DISCIPLINE",
    SkillGrowth => "SKILL_GROWTH",
    Engagement => "ENGAGEMENT",
    CareerReadiness => "CAREER_READINESS",
    Autonomy => "AUTONOMY",
    SharedNotes => "SHARED_NOTES",
    HelpedPeer => "HELPED_PEER",
    ReportedIssue => "REPORTED_ISSUE",
    GaveFeedback => "GAVE_FEEDBACK",
    QualityContribution => "QUALITY_CONTRIBUTION",
    Appointment => "APPOINTMENT",
    Deadline => "DEADLINE",
    Attendance => "ATTENDANCE",
    AdminInteraction => "ADMIN_INTERACTION",
});

impl ActivityType {
    pub fn category(self) -> ScoreCategory {
        use ActivityType::*;
        match self {
            LearningDiscipline | SkillGrowth | Engagement | CareerReadiness | Autonomy => {
                ScoreCategory::Readiness
            }
            SharedNotes | HelpedPeer | ReportedIssue | GaveFeedback | QualityContribution => {
                ScoreCategory::Citizenship
            }
            Appointment | Deadline | Attendance | AdminInteraction => ScoreCategory::SelfManagement,
        }
    }
}

labelled_enum!(NotificationType {
    SystemAlert => "SYSTEM_ALERT",
    Deadline => "DEADLINE",
    Event => "EVENT",
});

labelled_enum!(NotificationPriority {
    Low => "LOW",
    Normal => "NORMAL",
    High => "HIGH",
    Urgent => "URGENT",
});

labelled_enum!(RecommendationType {
    Course => "COURSE",
    Event => "EVENT",
    Workshop => "WORKSHOP",
    Activity => "ACTIVITY",
});

labelled_enum!(RecommendationStatus {
    Pending => "PENDING",
    Viewed => "VIEWED",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
    Dismissed => "DISMISSED",
});

impl RecommendationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RecommendationStatus::Completed | RecommendationStatus::Dismissed
        )
    }

    /// Statuses only move forward; re-applying the current status is a no-op.
    pub fn can_move_to(self, next: RecommendationStatus) -> bool {
        use RecommendationStatus::*;
        if self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        match self {
            Pending => true,
            Viewed => matches!(next, InProgress | Completed | Dismissed),
            _ => matches!(next, Completed | Dismissed),
        }
    }
}

labelled_enum!(LocationType {
    Classroom => "CLASSROOM",
    Lab => "LAB",
    Library => "LIBRARY",
    Office => "OFFICE",
    Cafeteria => "CAFETERIA",
    SportsFacility => "SPORTS_FACILITY",
    StudyRoom => "STUDY_ROOM",
    Auditorium => "AUDITORIUM",
    Other => "OTHER",
});

/// Parses a label read back from SQLite; bad text is surfaced as a conversion error.
pub fn column_enum<T: FromStr<Err = String>>(
    idx: usize,
    raw: String,
) -> rusqlite::Result<T> {
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("{raw:?}: {e}").into(),
        )
    })
}
