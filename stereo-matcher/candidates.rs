use std::collections::BTreeSet;

use crate::error::{ContractViolation, MatchResult};
use crate::types::{ClaimOutcome, StereoMatch};

/// Frame1 keypoint compared against a frame0 keypoint during the initial pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub frame1_index: usize,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Claim {
    frame0_index: usize,
    score: f64,
}

/// Working state of one matching invocation.
///
/// Holds every comparison of the initial pass, the current owner of each
/// frame1 keypoint and the set of frame0 keypoints waiting for a second chance.
#[derive(Debug, Clone)]
pub struct CandidateTracker {
    candidates: Vec<Vec<Candidate>>,
    claims: Vec<Option<Claim>>,
    inferior: BTreeSet<usize>,
}

fn check_score(score: f64) -> MatchResult<()> {
    if score > 0.0 && score <= 1.0 {
        Ok(())
    } else {
        Err(ContractViolation::ScoreOutOfRange(score).into())
    }
}

fn check_index(index: usize, len: usize) -> MatchResult<()> {
    if index < len {
        Ok(())
    } else {
        Err(ContractViolation::IndexOutOfRange { index, len }.into())
    }
}

impl CandidateTracker {
    pub fn new(num_frame0: usize, num_frame1: usize) -> Self {
        Self {
            candidates: vec![Vec::new(); num_frame0],
            claims: vec![None; num_frame1],
            inferior: BTreeSet::new(),
        }
    }

    /// Appends a compared frame1 keypoint to the candidate list of `frame0_index`
    pub fn record_candidate(&mut self, frame0_index: usize, frame1_index: usize, score: f64) -> MatchResult<()> {
        check_score(score)?;
        check_index(frame0_index, self.candidates.len())?;
        check_index(frame1_index, self.claims.len())?;
        self.candidates[frame0_index].push(Candidate { frame1_index, score });
        Ok(())
    }

    /// Recorded candidates of `frame0_index`; empty for an unknown index
    pub fn candidates(&self, frame0_index: usize) -> &[Candidate] {
        self.candidates.get(frame0_index).map_or(&[][..], Vec::as_slice)
    }

    /// Claims `frame1_index` for `frame0_index` if it is free or held with a lower score.
    ///
    /// A preempted claimant is moved to the inferior set; a successful claimant
    /// leaves it.
    pub fn claim(&mut self, frame1_index: usize, frame0_index: usize, score: f64) -> MatchResult<ClaimOutcome> {
        check_score(score)?;
        check_index(frame0_index, self.candidates.len())?;
        check_index(frame1_index, self.claims.len())?;
        let slot = &mut self.claims[frame1_index];
        let outcome = match *slot {
            None => ClaimOutcome::Accepted,
            Some(existing) if existing.frame0_index != frame0_index && existing.score < score => {
                ClaimOutcome::Preempted(existing.frame0_index)
            }
            Some(_) => return Ok(ClaimOutcome::Rejected),
        };

        *slot = Some(Claim { frame0_index, score });
        self.inferior.remove(&frame0_index);
        if let ClaimOutcome::Preempted(evicted) = outcome {
            self.inferior.insert(evicted);
        }
        Ok(outcome)
    }

    /// Score of the current claim on `frame1_index`, if any
    pub fn claimed_score(&self, frame1_index: usize) -> Option<f64> {
        self.claims.get(frame1_index).copied().flatten().map(|c| c.score)
    }

    /// Frame0 keypoint currently holding `frame1_index`, if any
    pub fn claimant(&self, frame1_index: usize) -> Option<usize> {
        self.claims.get(frame1_index).copied().flatten().map(|c| c.frame0_index)
    }

    /// True if `score` would win `frame1_index` for `frame0_index`
    pub fn is_claimable(&self, frame1_index: usize, frame0_index: usize, score: f64) -> bool {
        match self.claims.get(frame1_index) {
            None => false,
            Some(None) => true,
            Some(Some(existing)) => existing.frame0_index != frame0_index && existing.score < score,
        }
    }

    pub fn mark_inferior(&mut self, frame0_index: usize) {
        self.inferior.insert(frame0_index);
    }

    pub fn unmark_inferior(&mut self, frame0_index: usize) {
        self.inferior.remove(&frame0_index);
    }

    pub fn is_inferior(&self, frame0_index: usize) -> bool {
        self.inferior.contains(&frame0_index)
    }

    /// Inferior keypoints in ascending index order
    pub fn inferior_snapshot(&self) -> Vec<usize> {
        self.inferior.iter().copied().collect()
    }

    pub fn num_inferior(&self) -> usize {
        self.inferior.len()
    }

    /// Converts the claim table into matches ordered by frame0 index
    pub fn into_matches(self) -> Vec<StereoMatch> {
        let mut matches: Vec<StereoMatch> = self
            .claims
            .into_iter()
            .enumerate()
            .filter_map(|(frame1_index, claim)| {
                claim.map(|c| StereoMatch {
                    frame0_index: c.frame0_index,
                    frame1_index,
                    score: c.score,
                })
            })
            .collect();
        matches.sort_by_key(|m| m.frame0_index);
        matches
    }
}
