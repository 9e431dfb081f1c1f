pub mod consensus;
pub mod dot_product;
pub mod score_types;

pub use consensus::{
    Consensus,
    select_by_best_score,
    select_by_dot_product,
};
pub use dot_product::{
    DotProductMatch,
    compare,
};
pub use score_types::{
    ScoreDirection,
    UnclassifiedScoreType,
    classify_score_types,
};
