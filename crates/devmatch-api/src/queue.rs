use std::time::Duration;

use thiserror::Error;
use tokio::time::MissedTickBehavior;

use crate::client::MatchmakingApi;
use crate::error::ApiError;
use crate::model::QueueState;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("left the matching queue before a match was found")]
    LeftQueue,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Polls the queue until the backend reports a match and returns its id.
///
/// The first poll happens immediately. Polling stops on the first HTTP error
/// or when the queue reports the user as idle (left from another client, or
/// removed by the backend).
pub async fn wait_for_match(
    api: &dyn MatchmakingApi,
    poll_interval: Duration,
) -> Result<String, QueueError> {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let status = api.queue_status().await?;
        match status.state {
            QueueState::Matched => match status.match_id {
                Some(match_id) => {
                    tracing::info!(target: "devmatch::queue", %match_id, "match found");
                    return Ok(match_id);
                }
                None => {
                    tracing::warn!(target: "devmatch::queue", "matched status without a match id");
                }
            },
            QueueState::Waiting => {
                tracing::debug!(
                    target: "devmatch::queue",
                    position = ?status.position,
                    "still waiting for a partner"
                );
            }
            QueueState::Idle => return Err(QueueError::LeftQueue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QueueStatus;
    use crate::testing::ScriptedApi;
    use reqwest::StatusCode;

    fn status(state: QueueState, position: Option<u32>, match_id: Option<&str>) -> QueueStatus {
        QueueStatus {
            state,
            position,
            match_id: match_id.map(str::to_string),
        }
    }

    #[test_timeout::tokio_timeout_test(paused)]
    async fn polls_until_matched() {
        let api = ScriptedApi::default().with_queue_statuses([
            Ok(status(QueueState::Waiting, Some(2), None)),
            Ok(status(QueueState::Waiting, Some(1), None)),
            Ok(status(QueueState::Matched, None, None)),
            Ok(status(QueueState::Matched, None, Some("m-9"))),
        ]);
        let started = tokio::time::Instant::now();
        let match_id = wait_for_match(&api, Duration::from_secs(3)).await.unwrap();
        assert_eq!(match_id, "m-9");
        assert_eq!(api.queue_polls(), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(9));
    }

    #[test_timeout::tokio_timeout_test(paused)]
    async fn idle_queue_ends_polling() {
        let api = ScriptedApi::default().with_queue_statuses([
            Ok(status(QueueState::Waiting, Some(1), None)),
            Ok(status(QueueState::Idle, None, None)),
        ]);
        let err = wait_for_match(&api, DEFAULT_POLL_INTERVAL).await.unwrap_err();
        assert!(matches!(err, QueueError::LeftQueue));
    }

    #[test_timeout::tokio_timeout_test(paused)]
    async fn http_errors_end_polling() {
        let api = ScriptedApi::default()
            .with_queue_statuses([Err(StatusCode::UNAUTHORIZED)]);
        let err = wait_for_match(&api, DEFAULT_POLL_INTERVAL).await.unwrap_err();
        assert!(matches!(err, QueueError::Api(ApiError::Unauthorized(_))));
        assert_eq!(api.queue_polls(), 1);
    }
}
