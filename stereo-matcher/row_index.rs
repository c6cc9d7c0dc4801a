use std::ops::Range;

use stereo_core::KeypointFrame;

use crate::error::{ContractViolation, MatchError, MatchResult};

/// Frame1 keypoint as seen through the row-sorted view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortedKeypoint {
    /// Index into the frame's keypoint storage
    pub index: usize,
    pub row: f32,
}

/// Frame1 keypoints sorted by row plus a per-row lookup table.
///
/// `row_lut[r]` is the first position in the sorted view whose row is `>= r`,
/// so a band of rows maps to a contiguous slice of the view in O(1).
#[derive(Debug, Clone, PartialEq)]
pub struct RowIndex {
    sorted: Vec<SortedKeypoint>,
    row_lut: Vec<usize>,
}

impl RowIndex {
    /// Builds the sorted view and the row table for an image of `image_height` rows
    pub fn build<F: KeypointFrame + ?Sized>(frame: &F, image_height: u32) -> MatchResult<Self> {
        if image_height == 0 {
            return Err(MatchError::InvalidImageHeight(image_height));
        }

        let mut sorted: Vec<SortedKeypoint> = (0..frame.num_keypoints())
            .map(|index| SortedKeypoint {
                index,
                row: frame.keypoint(index).y,
            })
            .collect();
        // Stable sort: equal rows keep storage order, which keeps matching deterministic
        sorted.sort_by(|a, b| a.row.total_cmp(&b.row));

        let mut row_lut = Vec::with_capacity(image_height as usize);
        let mut position = 0;
        for row in 0..image_height as usize {
            while position < sorted.len() && sorted[position].row < row as f32 {
                position += 1;
            }
            row_lut.push(position);
        }

        let index = Self { sorted, row_lut };
        #[cfg(debug_assertions)]
        index.validate()?;
        Ok(index)
    }

    /// Checks the ordering of the view and the bounds of the row table
    pub fn validate(&self) -> MatchResult<()> {
        if let Some(position) = self
            .sorted
            .windows(2)
            .position(|pair| pair[1].row < pair[0].row)
        {
            return Err(ContractViolation::UnsortedView { position: position + 1 }.into());
        }

        let view_len = self.sorted.len();
        let mut previous = 0;
        for (row, &value) in self.row_lut.iter().enumerate() {
            if value < previous || value > view_len {
                return Err(ContractViolation::MalformedRowTable { row, value, view_len }.into());
            }
            previous = value;
        }
        Ok(())
    }

    /// Top and bottom table rows of the band around `predicted_row`, clamped to the image
    pub fn clamped_rows(&self, predicted_row: f32, half_window: u32) -> MatchResult<(usize, usize)> {
        if half_window == 0 {
            return Err(ContractViolation::NonPositiveHalfWindow(half_window).into());
        }

        let last_row = self.row_lut.len() as i64 - 1;
        let clamp = |row: f32| (row.floor() as i64).clamp(0, last_row) as usize;
        let top = clamp(predicted_row + 0.5 - half_window as f32);
        let bottom = clamp(predicted_row + 0.5 + half_window as f32);
        Ok((top, bottom))
    }

    /// Half-open range into the sorted view covering the band around `predicted_row`.
    ///
    /// Band edges are quantized to whole rows: the view is cut at table rows
    /// `floor(predicted_row + 0.5 -/+ half_window)`, so a returned keypoint can
    /// lie up to half a row beyond `half_window` from the prediction. The end
    /// is exclusive at the clamped bottom row, which leaves keypoints on the
    /// last image row outside every band.
    pub fn query(&self, predicted_row: f32, half_window: u32) -> MatchResult<Range<usize>> {
        let (top, bottom) = self.clamped_rows(predicted_row, half_window)?;
        let begin = self.row_lut[top];
        let end = self.row_lut[bottom];

        let view_len = self.sorted.len();
        if begin > end || end > view_len {
            return Err(ContractViolation::MalformedRowTable { row: bottom, value: end, view_len }.into());
        }
        Ok(begin..end)
    }

    pub fn sorted_view(&self) -> &[SortedKeypoint] {
        &self.sorted
    }

    pub fn row_lut(&self) -> &[usize] {
        &self.row_lut
    }

    pub fn image_height(&self) -> u32 {
        self.row_lut.len() as u32
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }
}
