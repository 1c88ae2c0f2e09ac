//! Priority joints: token parsing, weight vectors and priority masks.
//!
//! Tokens name either a joint family (`elbow`, `shoulder`, `hip`, `knee`),
//! which covers both sides, or a single side (`elbow_l`, `knee_r`, ...).

use std::str::FromStr;

use formcoach_core::{Error, Joint, JointFamily, Result, ANGLE_DIMS};
use serde::{Deserialize, Serialize};

/// Weight vectors are renormalized to sum to this value
pub const WEIGHT_TOTAL: f64 = ANGLE_DIMS as f64;

/// Below this raw sum a weight vector is left unnormalized
const NORMALIZE_MIN_SUM: f64 = 1e-6;

/// A single parsed priority token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriorityToken {
    /// Both sides of a joint family
    Family(JointFamily),
    /// One side of one joint
    Joint(Joint),
}

impl PriorityToken {
    pub fn joints(&self) -> Vec<Joint> {
        match self {
            PriorityToken::Family(family) => family.joints().to_vec(),
            PriorityToken::Joint(joint) => vec![*joint],
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, PriorityToken::Family(_))
    }
}

impl FromStr for PriorityToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim().to_lowercase();
        if let Some(family) = JointFamily::ALL.iter().find(|f| f.token() == token) {
            return Ok(PriorityToken::Family(*family));
        }
        Joint::from_token(&token)
            .map(PriorityToken::Joint)
            .ok_or_else(|| Error::InvalidPriorityToken(s.to_string()))
    }
}

/// Parse a token list, ignoring blanks and duplicates.
///
/// Generic tokens are ordered before side-specific ones so that side-specific
/// settings are applied last.
pub fn parse_priority_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<PriorityToken>> {
    let mut parsed: Vec<PriorityToken> = Vec::new();
    for raw in tokens {
        if raw.as_ref().trim().is_empty() {
            continue;
        }
        let token: PriorityToken = raw.as_ref().parse()?;
        if !parsed.contains(&token) {
            parsed.push(token);
        }
    }
    parsed.sort_by_key(|t| !t.is_generic());
    Ok(parsed)
}

/// Per-joint weights for the DTW cost, indexed by [`Joint`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointWeights(pub [f64; ANGLE_DIMS]);

impl JointWeights {
    pub fn uniform() -> Self {
        Self([1.0; ANGLE_DIMS])
    }

    pub fn get(&self, joint: Joint) -> f64 {
        self.0[joint.index()]
    }

    pub fn as_array(&self) -> &[f64; ANGLE_DIMS] {
        &self.0
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Weights scaled to sum to one, or `None` when they are all ~zero
    pub fn unit(&self) -> Option<[f64; ANGLE_DIMS]> {
        let sum = self.sum();
        if sum <= 1e-12 {
            return None;
        }
        let mut out = self.0;
        out.iter_mut().for_each(|w| *w /= sum + 1e-6);
        Some(out)
    }
}

impl Default for JointWeights {
    fn default() -> Self {
        Self::uniform()
    }
}

/// Which joints are the focus of the exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PriorityMask(pub [bool; ANGLE_DIMS]);

impl PriorityMask {
    pub fn none() -> Self {
        Self([false; ANGLE_DIMS])
    }

    pub fn all() -> Self {
        Self([true; ANGLE_DIMS])
    }

    pub fn contains(&self, joint: Joint) -> bool {
        self.0[joint.index()]
    }

    pub fn any(&self) -> bool {
        self.0.iter().any(|&b| b)
    }

    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&b| b).count()
    }

    pub fn inverted(&self) -> Self {
        let mut out = self.0;
        out.iter_mut().for_each(|b| *b = !*b);
        Self(out)
    }

    /// Complement used for non-priority checks; empty when nothing is prioritized
    pub fn non_priority(&self) -> Self {
        if self.any() {
            self.inverted()
        } else {
            Self::none()
        }
    }

    /// Joints whose motion defines the exercise; every joint when nothing is
    /// prioritized
    pub fn amplitude_mask(&self) -> Self {
        if self.any() {
            *self
        } else {
            Self::all()
        }
    }

    pub fn joints(&self) -> impl Iterator<Item = Joint> + '_ {
        Joint::ALL.into_iter().filter(|j| self.contains(*j))
    }
}

/// Weight vector: non-priority joints get `nonpriority_weight`, priority
/// joints `priority_weight`, then the vector is renormalized to sum to 8.
pub fn weights_from_tokens(
    tokens: &[PriorityToken],
    priority_weight: f64,
    nonpriority_weight: f64,
) -> JointWeights {
    let mut w = [nonpriority_weight; ANGLE_DIMS];
    // Generic tokens first so side-specific ones override them.
    let ordered = tokens
        .iter()
        .filter(|t| t.is_generic())
        .chain(tokens.iter().filter(|t| !t.is_generic()));
    for token in ordered {
        for joint in token.joints() {
            w[joint.index()] = priority_weight;
        }
    }

    let sum: f64 = w.iter().sum();
    if sum > NORMALIZE_MIN_SUM {
        w.iter_mut().for_each(|x| *x = *x / sum * WEIGHT_TOTAL);
    }
    JointWeights(w)
}

pub fn mask_from_tokens(tokens: &[PriorityToken]) -> PriorityMask {
    let mut mask = PriorityMask::none();
    for joint in tokens.iter().flat_map(PriorityToken::joints) {
        mask.0[joint.index()] = true;
    }
    mask
}

/// Parse `tokens` and build the normalized weight vector
pub fn build_weights<S: AsRef<str>>(
    tokens: &[S],
    priority_weight: f64,
    nonpriority_weight: f64,
) -> Result<JointWeights> {
    let parsed = parse_priority_tokens(tokens)?;
    Ok(weights_from_tokens(&parsed, priority_weight, nonpriority_weight))
}

/// Parse `tokens` and build the priority mask
pub fn build_priority_mask<S: AsRef<str>>(tokens: &[S]) -> Result<PriorityMask> {
    Ok(mask_from_tokens(&parse_priority_tokens(tokens)?))
}
