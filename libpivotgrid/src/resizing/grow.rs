use std::collections::HashMap;

use super::{MANUALLY_SIZED_MAX_WIDTH, MIN_WIDTH};

/// A displayed column as seen by [`grow_to_fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct GrowColumn {
    pub id: String,
    /// Width before growing: manual, then measured, then the default.
    pub width: f32,
    /// Manually sized without opting into growing.
    pub suppress_size_to_fit: bool,
}

/// Stretches the columns to exactly fill `client_width`.
///
/// Returns `None` when the columns already fill it. Otherwise returns the new width of
/// every column that takes part, keyed by id. Columns hitting [`MIN_WIDTH`] or
/// [`MANUALLY_SIZED_MAX_WIDTH`] are pinned there and the rest is spread again until
/// nothing moves.
#[must_use]
pub fn grow_to_fit(columns: &[GrowColumn], client_width: f32) -> Option<HashMap<String, f32>> {
    let total: f32 = columns.iter().map(|col| col.width).sum();
    if columns.is_empty() || total >= client_width {
        return None;
    }

    let mut widths: Vec<f32> = columns.iter().map(|col| col.width).collect();
    let (mut spread, mut fixed): (Vec<usize>, Vec<usize>) =
        (0..columns.len()).partition(|i| !columns[*i].suppress_size_to_fit);
    let participants = spread.clone();

    let mut finished = false;
    while !finished {
        finished = true;
        let available = client_width - fixed.iter().map(|i| widths[*i]).sum::<f32>();
        if available <= 0. {
            for i in &spread {
                widths[*i] = MIN_WIDTH;
            }
            break;
        }

        let spread_total: f32 = spread.iter().map(|i| widths[*i]).sum();
        if spread_total <= 0. {
            break;
        }
        let scale = available / spread_total;
        let mut pixels_for_last = available;

        for pos in (0..spread.len()).rev() {
            let index = spread[pos];
            // the leftmost column takes the rounding remainder
            let mut width = if pos == 0 {
                pixels_for_last
            } else {
                (widths[index] * scale).round()
            };
            if width < MIN_WIDTH {
                width = MIN_WIDTH;
                fixed.push(spread.remove(pos));
                finished = false;
            } else if width > MANUALLY_SIZED_MAX_WIDTH {
                width = MANUALLY_SIZED_MAX_WIDTH;
                fixed.push(spread.remove(pos));
                finished = false;
            }
            widths[index] = width;
            pixels_for_last -= width;
        }
    }

    Some(
        participants
            .into_iter()
            .map(|i| (columns[i].id.clone(), widths[i]))
            .collect(),
    )
}
