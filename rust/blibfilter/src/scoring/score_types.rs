use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreDirection {
    HigherIsBetter,
    LowerIsBetter,
}

impl ScoreDirection {
    /// Whether `candidate` beats `incumbent`.
    pub fn is_better(&self, candidate: f64, incumbent: f64) -> bool {
        match self {
            ScoreDirection::HigherIsBetter => candidate > incumbent,
            ScoreDirection::LowerIsBetter => candidate < incumbent,
        }
    }
}

pub const NOT_A_PROBABILITY: &str = "NOT_A_PROBABILITY_VALUE";
pub const PROBABILITY_CORRECT: &str = "PROBABILITY_THAT_IDENTIFICATION_IS_CORRECT";
pub const PROBABILITY_INCORRECT: &str = "PROBABILITY_THAT_IDENTIFICATION_IS_INCORRECT";

#[derive(Debug, Clone, Copy)]
pub struct ScoreTypeEntry {
    pub id: i64,
    pub name: &'static str,
    pub probability_type: &'static str,
    pub direction: Option<ScoreDirection>,
}

const fn entry(
    id: i64,
    name: &'static str,
    probability_type: &'static str,
    direction: Option<ScoreDirection>,
) -> ScoreTypeEntry {
    ScoreTypeEntry {
        id,
        name,
        probability_type,
        direction,
    }
}

use ScoreDirection::{
    HigherIsBetter,
    LowerIsBetter,
};

/// Score types as stored in the `ScoreTypes` table of a new library.
pub const SCORE_TYPES: &[ScoreTypeEntry] = &[
    entry(0, "UNKNOWN", NOT_A_PROBABILITY, None),
    entry(1, "PERCOLATOR QVALUE", PROBABILITY_INCORRECT, Some(LowerIsBetter)),
    entry(2, "PEPTIDE PROPHET SOMETHING", PROBABILITY_CORRECT, Some(HigherIsBetter)),
    entry(3, "SPECTRUM MILL", NOT_A_PROBABILITY, Some(HigherIsBetter)),
    entry(4, "IDPICKER FDR", PROBABILITY_INCORRECT, Some(LowerIsBetter)),
    entry(5, "MASCOT IONS SCORE", PROBABILITY_INCORRECT, Some(LowerIsBetter)),
    entry(6, "TANDEM EXPECTATION VALUE", PROBABILITY_INCORRECT, Some(LowerIsBetter)),
    entry(7, "PROTEIN PILOT CONFIDENCE", PROBABILITY_CORRECT, Some(HigherIsBetter)),
    entry(8, "SCAFFOLD SOMETHING", PROBABILITY_CORRECT, Some(HigherIsBetter)),
    entry(9, "WATERS MSE PEPTIDE SCORE", NOT_A_PROBABILITY, Some(HigherIsBetter)),
    entry(10, "OMSSA EXPECTATION SCORE", PROBABILITY_INCORRECT, Some(LowerIsBetter)),
    entry(11, "PROTEIN PROSPECTOR EXPECTATION SCORE", PROBABILITY_INCORRECT, Some(LowerIsBetter)),
    entry(12, "SEQUEST XCORR", NOT_A_PROBABILITY, Some(HigherIsBetter)),
    entry(13, "MAXQUANT SCORE", PROBABILITY_INCORRECT, Some(LowerIsBetter)),
    entry(14, "MORPHEUS SCORE", NOT_A_PROBABILITY, Some(HigherIsBetter)),
    entry(15, "MSGF+ SCORE", PROBABILITY_INCORRECT, Some(LowerIsBetter)),
    entry(16, "PEAKS CONFIDENCE SCORE", NOT_A_PROBABILITY, Some(HigherIsBetter)),
    entry(17, "BYONIC SCORE", PROBABILITY_INCORRECT, Some(LowerIsBetter)),
    entry(18, "PEPTIDE SHAKER CONFIDENCE", PROBABILITY_CORRECT, Some(HigherIsBetter)),
    entry(19, "GENERIC Q-VALUE", PROBABILITY_INCORRECT, Some(LowerIsBetter)),
    entry(20, "HARDKLOR IDOTP", NOT_A_PROBABILITY, Some(HigherIsBetter)),
];

/// Direction of a score type by name, `None` for unknown names.
pub fn score_direction(name: &str) -> Option<ScoreDirection> {
    let name = name.trim();
    SCORE_TYPES
        .iter()
        .find(|known| known.name.eq_ignore_ascii_case(name))
        .and_then(|known| known.direction)
}

/// A score type used in the library that has no known direction.
#[derive(Debug, Clone, PartialEq)]
pub struct UnclassifiedScoreType {
    pub id: Option<i64>,
    pub name: Option<String>,
}

/// Directions for every score type that spectra in a library actually use.
///
/// `observed` holds `(score type id, score type name)` for each distinct type
/// assigned to a spectrum. Types that are declared but never used do not
/// matter and should not be passed in.
pub fn classify_score_types(
    observed: &[(Option<i64>, Option<String>)],
) -> Result<HashMap<i64, ScoreDirection>, UnclassifiedScoreType> {
    let mut out = HashMap::with_capacity(observed.len());
    for (id, name) in observed {
        let direction = name.as_deref().and_then(score_direction);
        match (id, direction) {
            (Some(id), Some(direction)) => {
                out.insert(*id, direction);
            }
            _ => {
                return Err(UnclassifiedScoreType {
                    id: *id,
                    name: name.clone(),
                });
            }
        }
    }
    Ok(out)
}
