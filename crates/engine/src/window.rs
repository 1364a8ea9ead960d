//! Stop window selector: picks the downstream stop times to alert for.

use delay_common::error::AppError;
use delay_common::types::StopTime;

/// Default number of stop times notified per delay event.
pub const LOOK_AHEAD: usize = 5;

/// Index of the first stop time with the given id.
pub fn find_stop_time_index(stop_times: &[StopTime], stop_time_id: &str) -> Result<usize, AppError> {
    stop_times
        .iter()
        .position(|st| st.id == stop_time_id)
        .ok_or_else(|| {
            AppError::NotFound(format!("Stop time {} not in trip stop times", stop_time_id))
        })
}

/// The stop times from `stop_time_id` to the end of the trip, at most
/// `look_ahead` of them.
pub fn select_window<'a>(
    stop_times: &'a [StopTime],
    stop_time_id: &str,
    look_ahead: usize,
) -> Result<&'a [StopTime], AppError> {
    let start = find_stop_time_index(stop_times, stop_time_id)?;
    let end = stop_times.len().min(start.saturating_add(look_ahead));
    Ok(&stop_times[start..end])
}
