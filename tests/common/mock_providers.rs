/*!
 * Mock completion services for pipeline tests
 */

use std::time::Duration;

use treelingo::ProviderError;
use treelingo::providers::MockCompletion;

/// Translates numbered items with `prefix`, answering detection and reflection prompts with nothing useful
pub fn prefixing_mock(prefix: &'static str) -> MockCompletion {
    MockCompletion::working().with_responder(move |request| {
        Ok(MockCompletion::answer_numbered(&request.prompt, |text| {
            format!("{}{}", prefix, text)
        }))
    })
}

/// Fails every request whose prompt contains `marker`; other batches answer after `latency`
pub fn failing_on(marker: &'static str, latency: Duration) -> MockCompletion {
    MockCompletion::working()
        .with_responder(move |request| {
            if request.prompt.contains(marker) {
                Err(ProviderError::ApiError {
                    status_code: 500,
                    message: "internal error".to_string(),
                })
            } else {
                Ok(MockCompletion::answer_numbered(
                    &request.prompt,
                    MockCompletion::mock_translation,
                ))
            }
        })
        .with_latency(latency)
}

/// Answers numbered items with `translate`, which sees each source text
pub fn translating_with<F>(translate: F) -> MockCompletion
where
    F: Fn(&str) -> String + Send + Sync + 'static,
{
    MockCompletion::working()
        .with_responder(move |request| Ok(MockCompletion::answer_numbered(&request.prompt, &translate)))
}
