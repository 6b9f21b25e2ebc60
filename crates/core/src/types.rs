//! Core vocabulary shared across the workspace.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Opaque identifier assigned by a remote system at submission time.
///
/// Backends disagree on the field name (`job_id` vs `workflow_id`) but the
/// value itself is always an opaque string, unique for the job's lifetime.
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Which remote operation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// SAM3 point-prompt jewelry segmentation.
    Segmentation,
    /// BiRefNet background removal.
    BackgroundRemoval,
    /// Multi-step photoshoot generation workflow.
    Pipeline,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Segmentation => "segmentation",
            JobKind::BackgroundRemoval => "background_removal",
            JobKind::Pipeline => "pipeline",
        }
    }
}

/// Client-side projection of a remote job's status.
///
/// `Completed`, `Failed`, `Cancelled`, and `TimedOut` are terminal: once a
/// job enters one of them no further transition occurs. `TimedOut` is
/// client-assigned (the polling attempt budget ran out); a remote-reported
/// timeout arrives as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl JobState {
    /// Whether this state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled | JobState::TimedOut
        )
    }
}

/// Steps of the photoshoot generation pipeline, in execution order.
///
/// Mirrors the workflow's own progress vocabulary so `current_step` values
/// pass through the proxy unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStep {
    UploadingImage,
    ResizingImage,
    CheckingZoom,
    RemovingBackground,
    GeneratingMask,
    RefiningMask,
    UploadingMask,
    GeneratingImages,
    Completed,
}

/// A point marked by the user to prompt segmentation.
///
/// Coordinates are normalized to the unit square; `label` selects
/// foreground (1) or background (0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MaskPoint {
    #[validate(range(min = 0.0, max = 1.0))]
    pub x: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub y: f64,
    #[validate(range(min = 0, max = 1))]
    pub label: u8,
}

/// A point within a brush stroke, normalized to the unit square.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct StrokePoint {
    #[validate(range(min = 0.0, max = 1.0))]
    pub x: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub y: f64,
}

/// Whether a brush stroke grows or shrinks the mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeMode {
    Add,
    Remove,
}

/// A brush stroke applied during mask refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BrushStroke {
    #[validate(nested)]
    pub points: Vec<StrokePoint>,
    pub mode: StrokeMode,
    /// Brush size in pixels.
    #[validate(range(min = 1, max = 100))]
    pub size: u32,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
