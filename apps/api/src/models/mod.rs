pub mod job;
pub mod matching;
pub mod resume;

pub use job::{JobDescription, JobRequirement};
pub use matching::{
    AggregateStats, BatchMatchResult, MatchResult, MatchType, Recommendation, ScoreDimension,
    SkillMatch,
};
pub use resume::Resume;
