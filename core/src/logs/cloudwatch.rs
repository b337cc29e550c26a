use aws_config::BehaviorVersion;
use aws_sdk_cloudwatchlogs::Client;
use tracing::debug;

use crate::config::LogPollConfig;
use crate::errors::LogError;
use crate::logs::LogSource;

/// CloudWatch Logs implementation of the log source, querying one log
/// group with a filter pattern and a run-scoped start time.
pub struct CloudWatchLogSource {
    client: Client,
    log_group: String,
    filter_pattern: String,
}

impl CloudWatchLogSource {
    pub async fn new(config: &LogPollConfig) -> Result<Self, LogError> {
        let region = aws_config::Region::new(config.region.clone());
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .load()
            .await;

        Ok(Self {
            client: Client::new(&aws_config),
            log_group: config.log_group.clone(),
            filter_pattern: config.filter_pattern.clone(),
        })
    }
}

impl LogSource for CloudWatchLogSource {
    async fn fetch_events(&self, since_ms: i64) -> Result<Vec<String>, LogError> {
        let mut lines = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .filter_log_events()
                .log_group_name(&self.log_group)
                .start_time(since_ms);
            if !self.filter_pattern.is_empty() {
                request = request.filter_pattern(&self.filter_pattern);
            }

            let response = request
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| LogError::Fetch {
                    reason: e.into_service_error().to_string(),
                })?;

            lines.extend(
                response
                    .events()
                    .iter()
                    .filter_map(|event| event.message().map(str::to_string)),
            );

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        debug!(lines = lines.len(), group = %self.log_group, "fetched log events");
        Ok(lines)
    }
}
