/*!
 * Translation of text trees through a completion service.
 *
 * - `batch`: batching, prompt building, response parsing and the concurrent scheduler
 * - `reflection`: local quality checks and one consolidated correction request
 * - `pipeline`: the orchestrator tying filtering, change detection and the above together
 */

pub mod batch;
pub mod pipeline;
pub mod reflection;

pub use self::batch::{
    Batch, BatchEvent, BatchItem, BatchOutcome, BatchRequest, BatchScheduler, BatchState,
    ProgressCallback, SchedulerConfig, build_batch_prompt, create_batches, infer_context,
    parse_batch_response,
};
pub use self::pipeline::{TranslateOptions, TranslationOutput, TranslationPipeline, TranslationStats};
pub use self::reflection::{
    IssueKind, QualityIssue, ReflectionEngine, ReflectionOutcome, ReflectionReport, ReflectionStats,
    Severity, TranslatedItem, analyze, should_reflect,
};
