use super::GoldenSelection;
use crate::config::SelectionMethod;
use crate::track::{candidate, MissingCandidate, TrackList};

pub(super) fn select(
    tracks: &mut dyn TrackList,
    sort: bool,
) -> Result<GoldenSelection, MissingCandidate> {
    let method = SelectionMethod::SortedFirst;
    if tracks.is_empty() {
        return Ok(GoldenSelection::none(method));
    }
    if sort {
        tracks.sort_by_chi2_per_dof();
    }
    candidate(&*tracks, 0)?;
    Ok(GoldenSelection {
        golden: Some(0),
        method,
        fallback: false,
    })
}
